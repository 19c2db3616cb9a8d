// Scripted stand-ins for the controller used by unit tests.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use homematic_rpc::{Error, NameLookup, RpcClient, Value};
use parking_lot::Mutex;

pub(crate) type CallLog = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

type CallFn = dyn Fn(&str, Vec<Value>) -> Result<Vec<Value>, Error> + Send + Sync;

/// `RpcClient` answering every call through a closure and logging it.
pub(crate) struct FnClient {
    respond: Box<CallFn>,
    log: CallLog,
}

impl FnClient {
    pub(crate) fn new<F>(respond: F) -> Arc<dyn RpcClient>
    where
        F: Fn(&str, Vec<Value>) -> Result<Vec<Value>, Error> + Send + Sync + 'static,
    {
        Self::recording(respond).0
    }

    pub(crate) fn recording<F>(respond: F) -> (Arc<dyn RpcClient>, CallLog)
    where
        F: Fn(&str, Vec<Value>) -> Result<Vec<Value>, Error> + Send + Sync + 'static,
    {
        let log = CallLog::default();
        let client = Self {
            respond: Box::new(respond),
            log: Arc::clone(&log),
        };
        (Arc::new(client), log)
    }

    /// Client whose every call fails.
    pub(crate) fn unreachable() -> Arc<dyn RpcClient> {
        Self::new(|method, _| Err(Error::Server(format!("unexpected call {method}"))))
    }
}

#[async_trait]
impl RpcClient for FnClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Vec<Value>, Error> {
        self.log.lock().push((method.to_owned(), params.clone()));
        (self.respond)(method, params)
    }

    async fn local_ip(&self) -> Result<IpAddr, Error> {
        Ok(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

/// `NameLookup` with a fixed answer; `None` simulates a failing lookup.
pub(crate) struct StaticNames(pub Option<HashMap<String, String>>);

impl StaticNames {
    pub(crate) fn of(pairs: &[(&str, &str)]) -> Arc<dyn NameLookup> {
        Arc::new(Self(Some(
            pairs
                .iter()
                .map(|(a, n)| ((*a).to_owned(), (*n).to_owned()))
                .collect(),
        )))
    }

    pub(crate) fn failing() -> Arc<dyn NameLookup> {
        Arc::new(Self(None))
    }
}

#[async_trait]
impl NameLookup for StaticNames {
    async fn device_names(&self) -> Result<HashMap<String, String>, Error> {
        self.0
            .clone()
            .ok_or_else(|| Error::Server("script endpoint unavailable".into()))
    }
}

/// A `listDevices`-style struct for `address`.
pub(crate) fn device_value(address: &str) -> Value {
    Value::structure([
        ("ADDRESS", Value::from(address)),
        ("TYPE", Value::from("SWITCH")),
        ("VERSION", Value::Int(1)),
        ("PARAMSETS", Value::Array(vec!["VALUES".into()])),
    ])
}
