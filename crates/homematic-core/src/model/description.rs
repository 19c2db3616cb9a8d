// ── Device and parameter descriptions ──
//
// Decoded forms of the structs returned by `listDevices` and
// `getParamsetDescription`. Decoding is lenient: the controller omits
// members freely and is loose about scalar types.

use std::collections::BTreeMap;

use homematic_rpc::Value;
use serde::Serialize;

/// Name of the paramset holding a channel's live values.
pub const VALUES: &str = "VALUES";

// ── Flags ───────────────────────────────────────────────────────────

/// Device `FLAGS` bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceFlags {
    pub visible: bool,
    pub internal: bool,
    pub dont_delete: bool,
}

impl DeviceFlags {
    pub fn from_bits(bits: i32) -> Self {
        Self {
            visible: bits & 0x01 != 0,
            internal: bits & 0x02 != 0,
            dont_delete: bits & 0x08 != 0,
        }
    }
}

/// Parameter `OPERATIONS` bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Operations {
    pub read: bool,
    pub write: bool,
    pub event: bool,
}

impl Operations {
    pub fn from_bits(bits: i32) -> Self {
        Self {
            read: bits & 0x01 != 0,
            write: bits & 0x02 != 0,
            event: bits & 0x04 != 0,
        }
    }
}

/// Parameter `FLAGS` bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ParameterFlags {
    pub visible: bool,
    pub internal: bool,
    pub transform: bool,
    pub service: bool,
    pub sticky: bool,
}

impl ParameterFlags {
    pub fn from_bits(bits: i32) -> Self {
        Self {
            visible: bits & 0x01 != 0,
            internal: bits & 0x02 != 0,
            transform: bits & 0x04 != 0,
            service: bits & 0x08 != 0,
            sticky: bits & 0x10 != 0,
        }
    }
}

// ── DeviceDescription ───────────────────────────────────────────────

/// One entry of a `listDevices` / `newDevices` list. Channels are devices
/// too; their address carries a `:<index>` suffix and a parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceDescription {
    pub address: String,
    pub device_type: String,
    pub children: Vec<String>,
    pub parent: String,
    pub paramsets: Vec<String>,
    pub version: i32,
    pub flags: DeviceFlags,
}

impl DeviceDescription {
    /// Decode one struct. `None` if the value is not a struct or lacks an address.
    pub fn from_value(value: &Value) -> Option<Self> {
        let members = value.as_struct()?;
        let address = text(members, "ADDRESS");
        if address.is_empty() {
            return None;
        }
        Some(Self {
            address,
            device_type: text(members, "TYPE"),
            children: strings(members, "CHILDREN"),
            parent: text(members, "PARENT"),
            paramsets: strings(members, "PARAMSETS"),
            version: int(members, "VERSION"),
            flags: DeviceFlags::from_bits(int(members, "FLAGS")),
        })
    }

    /// Decode a list of descriptions, skipping entries that do not decode.
    pub fn list_from_value(value: Option<&Value>) -> Vec<Self> {
        value
            .and_then(Value::as_array)
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| {
                let decoded = Self::from_value(entry);
                if decoded.is_none() {
                    tracing::warn!(entry = %entry, "skipping malformed device description");
                }
                decoded
            })
            .collect()
    }

    pub fn has_paramset(&self, name: &str) -> bool {
        self.paramsets.iter().any(|p| p == name)
    }
}

// ── ParameterDescription ────────────────────────────────────────────

/// Metadata for one parameter of a paramset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterDescription {
    pub id: String,
    pub default: Option<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub param_type: String,
    pub unit: String,
    pub tab_order: i32,
    pub value_list: Vec<String>,
    pub operations: Operations,
    pub flags: ParameterFlags,
}

impl ParameterDescription {
    /// Decode one parameter struct; non-struct values yield the defaults.
    pub fn from_value(value: &Value) -> Self {
        let Some(members) = value.as_struct() else {
            return Self::default();
        };
        Self {
            id: text(members, "ID"),
            default: members.get("DEFAULT").cloned(),
            min: members.get("MIN").cloned(),
            max: members.get("MAX").cloned(),
            param_type: text(members, "TYPE"),
            unit: text(members, "UNIT"),
            tab_order: int(members, "TAB_ORDER"),
            value_list: strings(members, "VALUE_LIST"),
            operations: Operations::from_bits(int(members, "OPERATIONS")),
            flags: ParameterFlags::from_bits(int(members, "FLAGS")),
        }
    }

    /// Decode a whole `getParamsetDescription` reply keyed by parameter name.
    pub fn map_from_value(value: Option<&Value>) -> BTreeMap<String, Self> {
        value
            .and_then(Value::as_struct)
            .map(|members| {
                members
                    .iter()
                    .map(|(name, desc)| (name.clone(), Self::from_value(desc)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ── Lenient member access ───────────────────────────────────────────

fn text(members: &BTreeMap<String, Value>, key: &str) -> String {
    members.get(key).map(Value::to_string_lossy).unwrap_or_default()
}

fn int(members: &BTreeMap<String, Value>, key: &str) -> i32 {
    members
        .get(key)
        .and_then(Value::to_i32_lossy)
        .unwrap_or_default()
}

fn strings(members: &BTreeMap<String, Value>, key: &str) -> Vec<String> {
    members
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(Value::to_string_lossy).collect())
        .unwrap_or_default()
}
