//! Shared configuration for the hmctl CLI.
//!
//! TOML profiles merged with `HMCTL_` environment overrides, and
//! translation to `homematic_core::CcuConfig`. The CLI layers its global
//! flags on top of the result.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use homematic_core::{CcuConfig, InterfaceConfig};

/// Prefix of environment variables overriding file values.
/// Nested keys are separated by a double underscore, e.g.
/// `HMCTL_PROFILES__HOME__HOST`.
pub const ENV_PREFIX: &str = "HMCTL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is selected on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named CCU profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    5
}

/// A named CCU profile. Unset fields fall back to the stock CCU layout.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Controller host name or IP address.
    pub host: String,

    /// Interfaces to synchronize; defaults to wired, rf and hmIP.
    pub interfaces: Option<Vec<InterfaceEntry>>,

    /// Port of the script endpoint.
    pub script_port: Option<u16>,

    /// Override the request timeout (seconds).
    pub timeout: Option<u64>,

    /// Maximum device cache age (seconds).
    pub refresh_interval: Option<u64>,

    /// Maximum interface silence before re-registering (seconds).
    pub event_timeout: Option<u64>,

    /// Callback server bind address, e.g. "0.0.0.0:9292".
    pub callback_bind: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterfaceEntry {
    pub id: String,
    pub port: u16,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "hmctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hmctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (a missing file is not an error) + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Profile → CcuConfig ─────────────────────────────────────────────

/// Build a `CcuConfig` from a profile, filling gaps from `defaults` and
/// the stock CCU layout.
pub fn profile_to_ccu_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<CcuConfig, ConfigError> {
    let mut config = CcuConfig::new(profile.host.trim());

    if let Some(ref entries) = profile.interfaces {
        config.interfaces = entries
            .iter()
            .map(|e| InterfaceConfig::new(e.id.clone(), e.port))
            .collect();
    }
    if let Some(port) = profile.script_port {
        config.script_port = port;
    }
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if let Some(secs) = profile.refresh_interval {
        config.refresh_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.event_timeout {
        config.event_timeout = Duration::from_secs(secs);
    }
    if let Some(ref bind) = profile.callback_bind {
        config.callback_bind = bind
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Validation {
                field: "callback_bind".into(),
                reason: format!("'{bind}': {e}"),
            })?;
    }

    config.validate().map_err(|e| ConfigError::Validation {
        field: "profile".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}
