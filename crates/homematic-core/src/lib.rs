// homematic-core: Device synchronization between a CCU and its consumers (CLI).

pub mod ccu;
pub mod config;
pub mod error;
pub mod model;
pub mod store;

#[cfg(test)]
mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use ccu::Ccu;
pub use config::{CcuConfig, InterfaceConfig};
pub use error::CoreError;
pub use store::{DeviceMap, DeviceStore, MergeStats};

pub use model::{
    DeviceDescription, DeviceFlags, Device, DeviceSummary, Operations, ParameterDescription,
    ParameterFlags, ValueChangedHandler,
};

// The wire value type appears throughout the public API.
pub use homematic_rpc::Value;
