//! CLI-side configuration: resolves the active profile from the config
//! file and layers `GlobalOpts` overrides on top.
//!
//! Core never sees these types -- it receives a pre-built `CcuConfig`.

use std::time::Duration;

use homematic_config::{Config, ConfigError};
use homematic_core::CcuConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build the `CcuConfig` for this invocation.
///
/// An existing profile supplies the base; `--host` and `--timeout`
/// override it. Without a profile, `--host` alone is enough.
pub fn resolve_ccu_config(global: &GlobalOpts, cfg: &Config) -> Result<CcuConfig, CliError> {
    let mut ccu = match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => {
            tracing::debug!(profile = name, "using profile");
            homematic_config::profile_to_ccu_config(profile, &cfg.defaults)?
        }
        Err(ConfigError::UnknownProfile { name }) => {
            if global.profile.is_some() {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: available_profiles(cfg),
                });
            }
            let host = global.host.as_deref().ok_or_else(|| CliError::NoConfig {
                path: homematic_config::config_path().display().to_string(),
            })?;
            let mut ccu = CcuConfig::new(host);
            ccu.timeout = Duration::from_secs(cfg.defaults.timeout);
            ccu
        }
        Err(other) => return Err(other.into()),
    };

    if let Some(ref host) = global.host {
        ccu.host.clone_from(host);
    }
    if let Some(secs) = global.timeout {
        ccu.timeout = Duration::from_secs(secs);
    }

    ccu.validate()?;
    Ok(ccu)
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}
