// ── Callback handling ──
//
// Methods the controller invokes on our callback server: value events,
// device list queries and new-device announcements. Request-shape
// problems are answered with faults; failures of follow-up work (liveness
// checks, reconciliation, name lookup) are logged and swallowed.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use chrono::Utc;
use homematic_rpc::{Fault, Handler, Value};
use tracing::{debug, warn};

use super::{Ccu, CcuInner};
use crate::model::DeviceDescription;
use crate::store::Discovered;

/// Server-side handler holding a weak reference back to its engine.
#[derive(Default)]
pub(crate) struct CallbackHandler {
    engine: OnceLock<Weak<CcuInner>>,
}

impl CallbackHandler {
    pub(crate) fn attach(&self, inner: &Arc<CcuInner>) {
        let _ = self.engine.set(Arc::downgrade(inner));
    }
}

#[async_trait]
impl Handler for CallbackHandler {
    async fn handle(&self, method: &str, params: Vec<Value>) -> Result<Vec<Value>, Fault> {
        let Some(inner) = self.engine.get().and_then(Weak::upgrade) else {
            return Err(Fault::new(-1, "engine unavailable"));
        };
        Ccu { inner }.handle_callback(method, &params).await
    }
}

impl Ccu {
    /// Answer one callback method.
    pub async fn handle_callback(
        &self,
        method: &str,
        params: &[Value],
    ) -> Result<Vec<Value>, Fault> {
        match method {
            "event" => self.callback_event(params).await,
            "listDevices" => Ok(self.callback_list_devices()),
            "newDevices" => self.callback_new_devices(params).await,
            other => {
                debug!(method = other, "unhandled callback");
                Ok(vec![Value::Bool(true)])
            }
        }
    }

    /// `event(interfaceId, address, parameter, value)`.
    async fn callback_event(&self, params: &[Value]) -> Result<Vec<Value>, Fault> {
        let [interface, address, parameter, value, ..] = params else {
            return Err(Fault::new(-1, "invalid event call"));
        };
        let interface = interface.to_string_lossy();
        let address = address.to_string_lossy();

        self.inner.store.record_event(&interface, Utc::now());
        let device = self.inner.store.get(&address);

        if let Some(device) = device {
            device.value_changed(&parameter.to_string_lossy(), value);
            if let Err(e) = self.check_event_handling().await {
                warn!(error = %e, "event liveness check failed");
            }
        } else {
            debug!(%interface, %address, "event for unknown device, reconciling");
            if let Err(e) = self.update_devices(true).await {
                warn!(%address, error = %e, "reconciliation after unknown event failed");
            }
        }
        Ok(Vec::new())
    }

    /// `listDevices(interfaceId)`: every cached device as `{ADDRESS, VERSION}`.
    fn callback_list_devices(&self) -> Vec<Value> {
        let devices = self
            .inner
            .store
            .versions()
            .into_iter()
            .map(|(address, version)| {
                Value::structure([
                    ("ADDRESS", Value::String(address)),
                    ("VERSION", Value::Int(version)),
                ])
            })
            .collect();
        vec![Value::Array(devices)]
    }

    /// `newDevices(interfaceId, descriptions)`: merge without pruning.
    async fn callback_new_devices(&self, params: &[Value]) -> Result<Vec<Value>, Fault> {
        let [interface, descriptions, ..] = params else {
            return Err(Fault::new(-1, "invalid newDevices call"));
        };
        let interface = interface.to_string_lossy();
        let Some(client) = self.client(&interface) else {
            return Err(Fault::new(-1, "invalid interface id"));
        };

        let devices = DeviceDescription::list_from_value(Some(descriptions));
        debug!(%interface, count = devices.len(), "newDevices");
        let batch = Discovered {
            interface: interface.clone(),
            client: Arc::clone(client),
            devices,
        };

        let names = match self.inner.names.device_names().await {
            Ok(names) => Some(names),
            Err(e) => {
                warn!(%interface, error = %e, "name lookup failed, keeping previous names");
                None
            }
        };
        self.inner.store.merge(vec![batch], names.as_ref(), false);

        Ok(vec![Value::Bool(true)])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homematic_rpc::RpcClient;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::CcuConfig;
    use crate::test_support::{CallLog, FnClient, StaticNames, device_value};

    fn config() -> CcuConfig {
        let mut config = CcuConfig::new("127.0.0.1");
        config.callback_bind = "127.0.0.1:0".parse().unwrap();
        config
    }

    fn listing(addresses: &'static [&'static str]) -> (Arc<dyn RpcClient>, CallLog) {
        FnClient::recording(move |method, _| match method {
            "listDevices" => Ok(vec![Value::Array(
                addresses.iter().map(|a| device_value(a)).collect(),
            )]),
            _ => Ok(vec![]),
        })
    }

    fn ccu_with(client: Arc<dyn RpcClient>, names: Arc<dyn homematic_rpc::NameLookup>) -> Ccu {
        Ccu::with_clients(config(), vec![("rf".into(), client)], names).unwrap()
    }

    #[tokio::test]
    async fn unknown_methods_answer_true() {
        let ccu = ccu_with(FnClient::unreachable(), StaticNames::of(&[]));
        let result = ccu.handle_callback("deleteDevices", &[]).await.unwrap();
        assert_eq!(result, vec![Value::Bool(true)]);
    }

    #[tokio::test]
    async fn short_event_is_a_fault() {
        let ccu = ccu_with(FnClient::unreachable(), StaticNames::of(&[]));
        let err = ccu
            .handle_callback("event", &[Value::from("rf"), "a".into(), "STATE".into()])
            .await
            .unwrap_err();
        assert_eq!(err, Fault::new(-1, "invalid event call"));
    }

    #[tokio::test]
    async fn event_for_known_device_notifies_handler() {
        let (client, log) = listing(&["a"]);
        let ccu = ccu_with(client, StaticNames::of(&[]));
        ccu.update_devices(true).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ccu.store()
            .get("a")
            .unwrap()
            .set_value_changed_handler(Some(Arc::new(move |k: &str, v: &Value| {
                sink.lock().push((k.to_owned(), v.clone()));
            })));

        let calls_before = log.lock().len();
        let result = ccu
            .handle_callback(
                "event",
                &[Value::from("rf"), "a".into(), "STATE".into(), Value::Bool(true)],
            )
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(*seen.lock(), vec![("STATE".to_owned(), Value::Bool(true))]);
        assert_eq!(log.lock().len(), calls_before);
        assert!(ccu.store().last_event("rf").is_some());
    }

    #[tokio::test]
    async fn event_for_unknown_device_forces_reconciliation() {
        let (client, log) = listing(&["new"]);
        let ccu = ccu_with(client, StaticNames::of(&[("new", "Sensor")]));

        ccu.handle_callback(
            "event",
            &[Value::from("rf"), "new".into(), "STATE".into(), Value::Int(1)],
        )
        .await
        .unwrap();

        assert_eq!(
            log.lock().iter().filter(|(m, _)| m == "listDevices").count(),
            1
        );
        assert_eq!(ccu.store().get("new").unwrap().name(), "Sensor");
    }

    #[tokio::test]
    async fn event_reconciliation_failure_is_swallowed() {
        let ccu = ccu_with(FnClient::unreachable(), StaticNames::of(&[]));
        let result = ccu
            .handle_callback(
                "event",
                &[Value::from("rf"), "x".into(), "STATE".into(), Value::Int(1)],
            )
            .await;
        assert_eq!(result, Ok(vec![]));
    }

    #[tokio::test]
    async fn list_devices_reports_cache() {
        let (client, _log) = listing(&["a", "b"]);
        let ccu = ccu_with(client, StaticNames::of(&[]));
        ccu.update_devices(true).await.unwrap();

        let result = ccu.handle_callback("listDevices", &[Value::from("rf")]).await.unwrap();
        let entries = result[0].as_array().unwrap();
        let mut addresses: Vec<_> = entries
            .iter()
            .map(|e| e.get("ADDRESS").unwrap().as_str().unwrap().to_owned())
            .collect();
        addresses.sort();
        assert_eq!(addresses, vec!["a", "b"]);
        assert_eq!(entries[0].get("VERSION"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn new_devices_validates_params() {
        let ccu = ccu_with(FnClient::unreachable(), StaticNames::of(&[]));

        let err = ccu
            .handle_callback("newDevices", &[Value::from("rf")])
            .await
            .unwrap_err();
        assert_eq!(err, Fault::new(-1, "invalid newDevices call"));

        let err = ccu
            .handle_callback("newDevices", &[Value::from("zigbee"), Value::Array(vec![])])
            .await
            .unwrap_err();
        assert_eq!(err, Fault::new(-1, "invalid interface id"));
        assert!(ccu.store().is_empty());
    }

    #[tokio::test]
    async fn new_devices_merges_without_pruning() {
        let (client, _log) = listing(&["a"]);
        let ccu = ccu_with(client, StaticNames::of(&[("a", "Lamp"), ("b", "Fan")]));
        ccu.update_devices(true).await.unwrap();

        let result = ccu
            .handle_callback(
                "newDevices",
                &[Value::from("rf"), Value::Array(vec![device_value("b")])],
            )
            .await
            .unwrap();

        assert_eq!(result, vec![Value::Bool(true)]);
        assert_eq!(ccu.store().len(), 2);
        assert_eq!(ccu.store().get("a").unwrap().name(), "Lamp");
        assert_eq!(ccu.store().get("b").unwrap().name(), "Fan");
        assert_eq!(ccu.store().get("b").unwrap().interface(), "rf");
    }

    #[tokio::test]
    async fn new_devices_survives_name_lookup_failure() {
        let ccu = ccu_with(FnClient::unreachable(), StaticNames::failing());

        let result = ccu
            .handle_callback(
                "newDevices",
                &[Value::from("rf"), Value::Array(vec![device_value("b")])],
            )
            .await
            .unwrap();

        assert_eq!(result, vec![Value::Bool(true)]);
        assert_eq!(ccu.store().get("b").unwrap().name(), "");
    }
}
