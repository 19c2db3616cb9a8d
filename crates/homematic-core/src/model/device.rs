// ── Device entity ──
//
// A device or channel known to the cache. Identity and description are
// fixed at construction; the name, the value-change handler and the
// parameter description cache sit behind the device's own locks so the
// store lock is never needed to touch them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use homematic_rpc::{RpcClient, Value};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use super::description::{DeviceDescription, DeviceFlags, ParameterDescription, VALUES};
use crate::error::CoreError;

/// Callback for value changes pushed by the controller: `(parameter, value)`.
pub type ValueChangedHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

pub struct Device {
    description: DeviceDescription,
    interface: String,
    client: Arc<dyn RpcClient>,
    name: RwLock<String>,
    handler: Mutex<Option<ValueChangedHandler>>,
    values_description: OnceCell<BTreeMap<String, ParameterDescription>>,
}

/// Serializable point-in-time view of a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub address: String,
    pub name: String,
    pub device_type: String,
    pub interface: String,
    pub parent: String,
    pub children: Vec<String>,
    pub paramsets: Vec<String>,
    pub version: i32,
    pub flags: DeviceFlags,
}

impl Device {
    pub fn new(
        description: DeviceDescription,
        interface: impl Into<String>,
        client: Arc<dyn RpcClient>,
    ) -> Self {
        Self {
            description,
            interface: interface.into(),
            client,
            name: RwLock::new(String::new()),
            handler: Mutex::new(None),
            values_description: OnceCell::new(),
        }
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn address(&self) -> &str {
        &self.description.address
    }

    pub fn device_type(&self) -> &str {
        &self.description.device_type
    }

    /// Interface id this device was discovered on.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn parent(&self) -> &str {
        &self.description.parent
    }

    pub fn children(&self) -> &[String] {
        &self.description.children
    }

    pub fn paramsets(&self) -> &[String] {
        &self.description.paramsets
    }

    pub fn version(&self) -> i32 {
        self.description.version
    }

    pub fn flags(&self) -> DeviceFlags {
        self.description.flags
    }

    pub fn description(&self) -> &DeviceDescription {
        &self.description
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        let mut current = self.name.write();
        if *current != name {
            name.clone_into(&mut *current);
        }
    }

    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            address: self.description.address.clone(),
            name: self.name(),
            device_type: self.description.device_type.clone(),
            interface: self.interface.clone(),
            parent: self.description.parent.clone(),
            children: self.description.children.clone(),
            paramsets: self.description.paramsets.clone(),
            version: self.description.version,
            flags: self.description.flags,
        }
    }

    // ── Value-change notification ────────────────────────────────────

    /// Install (or with `None`, remove) the value-change handler.
    ///
    /// The handler runs under this device's handler lock, so it must not
    /// replace its own device's handler.
    pub fn set_value_changed_handler(&self, handler: Option<ValueChangedHandler>) {
        *self.handler.lock() = handler;
    }

    pub(crate) fn value_changed(&self, parameter: &str, value: &Value) {
        let handler = self.handler.lock();
        match handler.as_ref() {
            Some(notify) => (**notify)(parameter, value),
            None => debug!(address = %self.address(), parameter, "value change without handler"),
        }
    }

    // ── Remote accessors ─────────────────────────────────────────────

    /// Whether the device exposes a `VALUES` paramset.
    pub fn has_values(&self) -> bool {
        self.description.has_paramset(VALUES)
    }

    /// Current contents of the `VALUES` paramset.
    pub async fn values(&self) -> Result<BTreeMap<String, Value>, CoreError> {
        let result = self
            .client
            .call("getParamset", vec![self.address().into(), VALUES.into()])
            .await?;
        match result.into_iter().next() {
            Some(Value::Struct(values)) => Ok(values),
            None => Ok(BTreeMap::new()),
            Some(other) => Err(CoreError::protocol(format!(
                "getParamset returned {} instead of struct",
                other.type_name()
            ))),
        }
    }

    pub async fn value(&self, parameter: &str) -> Result<Value, CoreError> {
        let result = self
            .client
            .call("getValue", vec![self.address().into(), parameter.into()])
            .await?;
        result
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::protocol("getValue returned no value"))
    }

    pub async fn set_value(
        &self,
        parameter: &str,
        value: impl Into<Value> + Send,
    ) -> Result<(), CoreError> {
        self.client
            .call(
                "setValue",
                vec![self.address().into(), parameter.into(), value.into()],
            )
            .await?;
        Ok(())
    }

    /// Descriptions of the `VALUES` parameters, fetched once and cached.
    pub async fn values_description(
        &self,
    ) -> Result<&BTreeMap<String, ParameterDescription>, CoreError> {
        self.values_description
            .get_or_try_init(|| async {
                let result = self
                    .client
                    .call(
                        "getParamsetDescription",
                        vec![self.address().into(), VALUES.into()],
                    )
                    .await?;
                Ok::<_, CoreError>(ParameterDescription::map_from_value(result.first()))
            })
            .await
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("address", &self.description.address)
            .field("type", &self.description.device_type)
            .field("interface", &self.interface)
            .field("name", &*self.name.read())
            .finish_non_exhaustive()
    }
}
