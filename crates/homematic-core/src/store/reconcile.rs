// ── Reconciliation apply logic ──
//
// Folds device lists fetched from the controller into the cache. Existing
// entries keep their identity (and with it their handler and cached
// descriptions); only unseen addresses get new `Device`s.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use homematic_rpc::RpcClient;
use tracing::debug;

use super::DeviceStore;
use crate::model::{Device, DeviceDescription};

/// Devices reported by one interface.
pub(crate) struct Discovered {
    pub interface: String,
    pub client: Arc<dyn RpcClient>,
    pub devices: Vec<DeviceDescription>,
}

/// What changed in one apply step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub removed: usize,
}

impl DeviceStore {
    /// Upsert every discovered device. With `names`, each seen device gets
    /// its looked-up name (empty when unknown). With `prune`, cached
    /// addresses absent from `batches` are removed.
    pub(crate) fn merge(
        &self,
        batches: Vec<Discovered>,
        names: Option<&HashMap<String, String>>,
        prune: bool,
    ) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut seen = HashSet::new();
        let mut state = self.state.write();

        for batch in batches {
            for description in batch.devices {
                let address = description.address.clone();
                let device = state
                    .devices
                    .entry(address.clone())
                    .or_insert_with(|| {
                        stats.added += 1;
                        Arc::new(Device::new(
                            description,
                            batch.interface.clone(),
                            Arc::clone(&batch.client),
                        ))
                    });
                if let Some(names) = names {
                    device.set_name(names.get(&address).map_or("", String::as_str));
                }
                seen.insert(address);
            }
        }

        if prune {
            let before = state.devices.len();
            state.devices.retain(|address, _| seen.contains(address));
            stats.removed = before - state.devices.len();
        }

        if stats != MergeStats::default() {
            debug!(added = stats.added, removed = stats.removed, "device set changed");
            self.publish(&state.devices);
        }
        stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{FnClient, device_value};

    fn batch(interface: &str, addresses: &[&str]) -> Discovered {
        Discovered {
            interface: interface.into(),
            client: FnClient::unreachable(),
            devices: addresses
                .iter()
                .map(|a| DeviceDescription::from_value(&device_value(a)).unwrap())
                .collect(),
        }
    }

    fn names(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(a, n)| ((*a).to_owned(), (*n).to_owned()))
            .collect()
    }

    #[test]
    fn prune_removes_unseen_addresses() {
        let store = DeviceStore::new();
        store.merge(vec![batch("rf", &["a", "b"])], None, true);
        assert_eq!(store.len(), 2);

        let stats = store.merge(vec![batch("rf", &["a"])], None, true);
        assert_eq!(stats, MergeStats { added: 0, removed: 1 });
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
    }

    #[test]
    fn merge_without_prune_keeps_everything() {
        let store = DeviceStore::new();
        store.merge(vec![batch("rf", &["a"])], None, true);
        store.merge(vec![batch("wired", &["b"])], None, false);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("b").unwrap().interface(), "wired");
    }

    #[test]
    fn existing_devices_keep_identity_and_get_names() {
        let store = DeviceStore::new();
        store.merge(vec![batch("rf", &["a"])], Some(&names(&[("a", "Lamp")])), true);
        let first = store.get("a").unwrap();
        assert_eq!(first.name(), "Lamp");

        store.merge(vec![batch("rf", &["a"])], Some(&names(&[("a", "Desk")])), true);
        let second = store.get("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.name(), "Desk");

        store.merge(vec![batch("rf", &["a"])], Some(&names(&[])), true);
        assert_eq!(second.name(), "");

        store.merge(vec![batch("rf", &["a"])], None, true);
        assert_eq!(second.name(), "");
    }

    #[test]
    fn subscribers_see_changes_only() {
        let store = DeviceStore::new();
        let mut rx = store.subscribe();
        assert!(rx.borrow_and_update().is_empty());

        store.merge(vec![batch("rf", &["a"])], None, true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().contains_key("a"));

        store.merge(vec![batch("rf", &["a"])], None, true);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn versions_report_every_device() {
        let store = DeviceStore::new();
        store.merge(vec![batch("rf", &["a", "b"])], None, true);
        let mut versions = store.versions();
        versions.sort();
        assert_eq!(versions, vec![("a".to_owned(), 1), ("b".to_owned(), 1)]);
    }
}
