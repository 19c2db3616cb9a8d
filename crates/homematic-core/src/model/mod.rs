// ── Domain model ──
//
// Devices as cached by the synchronization engine, and the decoded
// descriptions the controller reports for devices and their parameters.

pub mod description;
pub mod device;

pub use description::{
    DeviceDescription, DeviceFlags, Operations, ParameterDescription, ParameterFlags, VALUES,
};
pub use device::{Device, DeviceSummary, ValueChangedHandler};
