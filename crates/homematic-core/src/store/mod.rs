// ── Device cache ──
//
// Address-keyed device storage with change notification, plus the apply
// step of reconciliation.

mod device_store;
mod reconcile;

pub use device_store::{DeviceMap, DeviceStore};
pub use reconcile::MergeStats;
pub(crate) use reconcile::Discovered;
