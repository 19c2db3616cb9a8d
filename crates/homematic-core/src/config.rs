// ── Runtime connection configuration ──
//
// These types describe *how* to reach a CCU and how aggressively to keep
// the device cache fresh. They never touch disk; the CLI builds a
// `CcuConfig` (usually via homematic-config) and hands it in.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::CoreError;

/// Interface id of the wired bus.
pub const WIRED: &str = "wired";
/// Interface id of the classic radio interface.
pub const RF: &str = "rf";
/// Interface id of HomeMatic IP.
pub const HMIP: &str = "hmIP";

/// One RPC interface of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    /// Stable id, also sent to the controller when registering callbacks.
    pub id: String,
    /// TCP port of the interface's XML-RPC endpoint.
    pub port: u16,
}

impl InterfaceConfig {
    pub fn new(id: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            port,
        }
    }

    /// The three stock CCU interfaces: wired 2000, rf 2001, hmIP 2010.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(WIRED, 2000),
            Self::new(RF, 2001),
            Self::new(HMIP, 2010),
        ]
    }
}

/// Configuration for one CCU.
#[derive(Debug, Clone)]
pub struct CcuConfig {
    /// Controller host name or IP address.
    pub host: String,
    pub interfaces: Vec<InterfaceConfig>,
    /// Port of the script endpoint used for name lookup.
    pub script_port: u16,
    /// Per-request timeout for every controller call.
    pub timeout: Duration,
    /// Maximum age of the device cache before a full reconciliation.
    pub refresh_interval: Duration,
    /// Maximum silence on an interface before callbacks are re-registered.
    pub event_timeout: Duration,
    /// Where the callback server listens. Port 0 lets the OS choose.
    pub callback_bind: SocketAddr,
}

impl CcuConfig {
    /// Defaults for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn interface(&self, id: &str) -> Option<&InterfaceConfig> {
        self.interfaces.iter().find(|i| i.id == id)
    }

    /// Reject configurations that cannot produce a working engine.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.host.trim().is_empty() {
            return Err(CoreError::Config {
                message: "host must not be empty".into(),
            });
        }
        if self.interfaces.is_empty() {
            return Err(CoreError::Config {
                message: "at least one interface is required".into(),
            });
        }
        for (idx, iface) in self.interfaces.iter().enumerate() {
            if iface.id.is_empty() {
                return Err(CoreError::Config {
                    message: "interface id must not be empty".into(),
                });
            }
            if self.interfaces[..idx].iter().any(|i| i.id == iface.id) {
                return Err(CoreError::Config {
                    message: format!("duplicate interface id '{}'", iface.id),
                });
            }
        }
        Ok(())
    }
}

impl Default for CcuConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            interfaces: InterfaceConfig::defaults(),
            script_port: homematic_rpc::script::DEFAULT_SCRIPT_PORT,
            timeout: homematic_rpc::transport::DEFAULT_TIMEOUT,
            refresh_interval: Duration::from_secs(600),
            event_timeout: Duration::from_secs(600),
            callback_bind: SocketAddr::from(([0, 0, 0, 0], 0)),
        }
    }
}
