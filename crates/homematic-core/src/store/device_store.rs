// ── Device cache ──
//
// Devices keyed by address plus the refresh and per-interface event
// timestamps, all behind one reader/writer lock. Guards are only held for
// synchronous work and never across an await. Every mutation of the
// device set republishes a snapshot on a `watch` channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::model::Device;

/// Address-keyed device map, as handed out in snapshots.
pub type DeviceMap = HashMap<String, Arc<Device>>;

#[derive(Default)]
pub(crate) struct StoreState {
    pub(crate) devices: DeviceMap,
    pub(crate) last_update: Option<DateTime<Utc>>,
    pub(crate) last_event: HashMap<String, DateTime<Utc>>,
}

/// Concurrent cache of the controller's devices.
pub struct DeviceStore {
    pub(crate) state: RwLock<StoreState>,
    snapshot: watch::Sender<Arc<DeviceMap>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(DeviceMap::new()));
        Self {
            state: RwLock::new(StoreState::default()),
            snapshot,
        }
    }

    // ── Device access ────────────────────────────────────────────────

    pub fn get(&self, address: &str) -> Option<Arc<Device>> {
        self.state.read().devices.get(address).cloned()
    }

    pub fn snapshot(&self) -> DeviceMap {
        self.state.read().devices.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().devices.is_empty()
    }

    /// `(address, version)` of every cached device.
    pub fn versions(&self) -> Vec<(String, i32)> {
        self.state
            .read()
            .devices
            .values()
            .map(|d| (d.address().to_owned(), d.version()))
            .collect()
    }

    /// Receive a fresh snapshot after every change to the device set.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DeviceMap>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn publish(&self, devices: &DeviceMap) {
        self.snapshot.send_replace(Arc::new(devices.clone()));
    }

    // ── Timestamps ───────────────────────────────────────────────────

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_update
    }

    pub(crate) fn mark_updated(&self, at: DateTime<Utc>) {
        self.state.write().last_update = Some(at);
    }

    /// Whether a non-forced reconciliation is due.
    pub fn needs_refresh(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.state.read().last_update {
            None => true,
            Some(at) => elapsed(at, now) >= interval,
        }
    }

    pub fn last_event(&self, interface: &str) -> Option<DateTime<Utc>> {
        self.state.read().last_event.get(interface).copied()
    }

    pub fn record_event(&self, interface: &str, at: DateTime<Utc>) {
        self.state
            .write()
            .last_event
            .insert(interface.to_owned(), at);
    }

    pub(crate) fn clear_events(&self) {
        self.state.write().last_event.clear();
    }

    /// Interfaces among `ids` with no event within `timeout` of `now`.
    /// An interface that never saw an event counts as silent.
    pub fn silent_interfaces<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Vec<String> {
        let state = self.state.read();
        ids.into_iter()
            .filter(|id| {
                state
                    .last_event
                    .get(*id)
                    .is_none_or(|at| elapsed(*at, now) >= timeout)
            })
            .map(ToOwned::to_owned)
            .collect()
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-negative time between `earlier` and `now`.
fn elapsed(earlier: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - earlier).to_std().unwrap_or(Duration::ZERO)
}
