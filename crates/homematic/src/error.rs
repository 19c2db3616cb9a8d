//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use homematic_config::ConfigError;
use homematic_core::CoreError;

/// Process exit codes. Success exits with 0.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to CCU at {url}")]
    #[diagnostic(
        code(hmctl::connection_failed),
        help(
            "Check that the CCU is running and its interface ports are reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out: {reason}")]
    #[diagnostic(
        code(hmctl::timeout),
        help("Increase timeout with --timeout or check CCU responsiveness.")
    )]
    Timeout { reason: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(hmctl::not_found),
        help("Run: hmctl {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Controller ───────────────────────────────────────────────────

    #[error("CCU fault ({code}): {message}")]
    #[diagnostic(code(hmctl::fault))]
    Fault { code: i32, message: String },

    #[error("Unexpected reply from CCU: {0}")]
    #[diagnostic(code(hmctl::protocol))]
    Protocol(String),

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hmctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(hmctl::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No CCU configured")]
    #[diagnostic(
        code(hmctl::no_config),
        help(
            "Pass --host, set HMCTL_HOST, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(hmctl::config))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(hmctl::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(hmctl::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    #[diagnostic(code(hmctl::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::Timeout { reason } => CliError::Timeout { reason },

            CoreError::Rpc { code, message } => CliError::Fault { code, message },

            CoreError::Protocol(message) => CliError::Protocol(message),

            CoreError::DeviceNotFound { address } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: address,
                list_command: "devices".into(),
            },

            CoreError::UnknownInterface { id } => CliError::NotFound {
                resource_type: "interface".into(),
                identifier: id,
                list_command: "devices".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::ConnectionFailed {
                    url: "http://ccu:2001/".into(),
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::Timeout {
                    reason: "5s".into(),
                },
                exit_code::TIMEOUT,
            ),
            (
                CoreError::DeviceNotFound {
                    address: "LEQ0000001".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::Rpc {
                    code: -2,
                    message: "Unknown instance".into(),
                },
                exit_code::GENERAL,
            ),
            (
                CoreError::Config {
                    message: "host must not be empty".into(),
                },
                exit_code::USAGE,
            ),
        ];

        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }
}
