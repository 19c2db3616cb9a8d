// ── Core error types ──
//
// User-facing errors from homematic-core. Consumers never see raw XML
// decode failures or reqwest errors; the `From<homematic_rpc::Error>` impl
// translates wire-level errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out: {reason}")]
    Timeout { reason: String },

    // ── Remote errors ────────────────────────────────────────────────
    /// The controller answered with a fault.
    #[error("Controller fault {code}: {message}")]
    Rpc { code: i32, message: String },

    /// The controller sent something the codec could not decode, or a
    /// reply did not have the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {address}")]
    DeviceNotFound { address: String },

    #[error("Unknown interface: {id}")]
    UnknownInterface { id: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Fault code if the controller rejected the call.
    pub fn fault_code(&self) -> Option<i32> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

// ── Conversion from wire-level errors ────────────────────────────────

impl From<homematic_rpc::Error> for CoreError {
    fn from(err: homematic_rpc::Error) -> Self {
        use homematic_rpc::Error as E;

        match err {
            E::Transport(ref e) => {
                let url = e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string);
                if e.is_timeout() {
                    CoreError::Timeout {
                        reason: format!("{url}: {e}"),
                    }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url,
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Protocol(e.to_string())
                }
            }
            E::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => CoreError::Timeout {
                reason: e.to_string(),
            },
            E::Io(e) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: e.to_string(),
            },
            E::HttpStatus { status, url } => CoreError::ConnectionFailed {
                url,
                reason: format!("HTTP status {status}"),
            },
            E::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            E::Fault { code, message } => CoreError::Rpc { code, message },
            E::Server(msg) => CoreError::Internal(msg),
            other => CoreError::Protocol(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_maps_to_rpc() {
        let err = CoreError::from(homematic_rpc::Error::Fault {
            code: -2,
            message: "Unknown instance".into(),
        });
        assert_eq!(err.fault_code(), Some(-2));
        assert_eq!(err.to_string(), "Controller fault -2: Unknown instance");
    }

    #[test]
    fn decode_failures_map_to_protocol() {
        let err = CoreError::from(homematic_rpc::Error::InvalidValueType("nil".into()));
        assert!(matches!(err, CoreError::Protocol(ref m) if m == "invalid value type nil"));
    }

    #[test]
    fn http_status_maps_to_connection_failed() {
        let err = CoreError::from(homematic_rpc::Error::HttpStatus {
            status: 503,
            url: "http://ccu:2001/".into(),
        });
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }

    #[test]
    fn timed_out_io_maps_to_timeout() {
        let err = CoreError::from(homematic_rpc::Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "no connection within 5s",
        )));
        assert!(matches!(err, CoreError::Timeout { .. }));

        let err = CoreError::from(homematic_rpc::Error::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        )));
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }
}
