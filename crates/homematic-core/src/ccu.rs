// ── CCU synchronization engine ──
//
// Owns one transport client per controller interface, the callback server
// the controller pushes events to, and the device cache. Keeps the cache
// in step with the controller through periodic reconciliation and keeps
// event delivery alive by re-registering silent interfaces.

mod callbacks;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use homematic_rpc::script::ScriptClient;
use homematic_rpc::{
    CallbackServer, Handler, HttpRpcClient, NameLookup, RpcClient, TransportConfig, Value,
};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::config::CcuConfig;
use crate::error::CoreError;
use crate::model::{Device, DeviceDescription};
use crate::store::{DeviceMap, DeviceStore, Discovered};

use self::callbacks::CallbackHandler;

// ── Ccu ──────────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CcuInner>`. Construction binds the callback
/// server but does not serve; [`start()`](Self::start) begins serving and
/// registers with the controller.
#[derive(Clone)]
pub struct Ccu {
    inner: Arc<CcuInner>,
}

pub(crate) struct CcuInner {
    config: CcuConfig,
    /// Interface id → client, in configuration order. Never mutated.
    clients: Vec<(String, Arc<dyn RpcClient>)>,
    names: Arc<dyn NameLookup>,
    store: DeviceStore,
    server: CallbackServer,
    /// Serializes reconciliation passes. Taken before the store lock, never while holding it.
    refresh_gate: Mutex<()>,
}

impl Ccu {
    /// Build HTTP clients for every configured interface and the script
    /// endpoint, and bind the callback server.
    pub fn new(config: CcuConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let transport = TransportConfig::with_timeout(config.timeout);

        let mut clients: Vec<(String, Arc<dyn RpcClient>)> = Vec::new();
        for iface in &config.interfaces {
            let client = HttpRpcClient::for_host(&config.host, iface.port, &transport)?;
            clients.push((iface.id.clone(), Arc::new(client)));
        }
        let names = ScriptClient::for_host(&config.host, config.script_port, &transport)?;

        Self::with_clients(config, clients, Arc::new(names))
    }

    /// Assemble an engine from pre-built collaborators.
    pub fn with_clients(
        config: CcuConfig,
        clients: Vec<(String, Arc<dyn RpcClient>)>,
        names: Arc<dyn NameLookup>,
    ) -> Result<Self, CoreError> {
        let handler = Arc::new(CallbackHandler::default());
        let server_handler: Arc<dyn Handler> = handler.clone();
        let server = CallbackServer::bind(config.callback_bind, server_handler)?;
        debug!(port = server.port(), "callback server allocated");

        let inner = Arc::new(CcuInner {
            config,
            clients,
            names,
            store: DeviceStore::new(),
            server,
            refresh_gate: Mutex::new(()),
        });
        handler.attach(&inner);

        Ok(Self { inner })
    }

    pub fn config(&self) -> &CcuConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &DeviceStore {
        &self.inner.store
    }

    /// Interface ids in configuration order.
    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.inner.clients.iter().map(|(id, _)| id.as_str())
    }

    pub fn callback_addr(&self) -> SocketAddr {
        self.inner.server.local_addr()
    }

    pub fn is_running(&self) -> bool {
        self.inner.server.is_running()
    }

    pub(crate) fn client(&self, interface: &str) -> Option<&Arc<dyn RpcClient>> {
        self.inner
            .clients
            .iter()
            .find(|(id, _)| id == interface)
            .map(|(_, client)| client)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Serve callbacks and register with every interface.
    ///
    /// Registration is best effort: a failing interface is logged and the
    /// others are still registered.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.inner.server.start()?;

        for (id, client) in &self.inner.clients {
            if let Err(e) = self.register(id, client.as_ref(), id).await {
                warn!(interface = %id, error = %e, "callback registration failed");
            } else {
                info!(interface = %id, "registered for events");
            }
            self.inner.store.record_event(id, Utc::now());
        }
        Ok(())
    }

    /// Unregister from every interface, then stop the callback server.
    pub async fn stop(&self) -> Result<(), CoreError> {
        for (id, client) in &self.inner.clients {
            if let Err(e) = self.register(id, client.as_ref(), "").await {
                warn!(interface = %id, error = %e, "callback unregistration failed");
            }
        }
        self.inner.store.clear_events();
        self.inner.server.stop().await?;
        Ok(())
    }

    /// `init(callbackURL, registration)` on one interface.
    async fn register(
        &self,
        interface: &str,
        client: &dyn RpcClient,
        registration: &str,
    ) -> Result<(), CoreError> {
        let ip = client.local_ip().await?;
        let url = format!("http://{}", SocketAddr::new(ip, self.inner.server.port()));
        debug!(interface, %url, registration, "init");
        client
            .call("init", vec![url.into(), registration.into()])
            .await?;
        Ok(())
    }

    // ── Liveness ─────────────────────────────────────────────────────

    /// Re-register every interface that has been silent longer than the
    /// event timeout. Does nothing while the callback server is stopped.
    pub async fn check_event_handling(&self) -> Result<(), CoreError> {
        if !self.inner.server.is_running() {
            return Ok(());
        }

        let silent = self.inner.store.silent_interfaces(
            self.interfaces(),
            Utc::now(),
            self.inner.config.event_timeout,
        );
        for id in silent {
            let Some(client) = self.client(&id) else {
                continue;
            };
            info!(interface = %id, "no events within timeout, re-registering");
            self.register(&id, client.as_ref(), &id).await?;
            self.inner.store.record_event(&id, Utc::now());
        }
        Ok(())
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Refresh the device cache from the controller.
    ///
    /// Without `force` the pass is skipped while the last successful one is
    /// younger than the refresh interval.
    pub async fn update_devices(&self, force: bool) -> Result<(), CoreError> {
        self.check_event_handling().await?;

        let _gate = self.inner.refresh_gate.lock().await;
        if !force
            && !self
                .inner
                .store
                .needs_refresh(Utc::now(), self.inner.config.refresh_interval)
        {
            return Ok(());
        }

        let names = self.inner.names.device_names().await?;

        let mut batches = Vec::with_capacity(self.inner.clients.len());
        for (id, client) in &self.inner.clients {
            let result = client.call("listDevices", Vec::new()).await?;
            let devices = DeviceDescription::list_from_value(result.first());
            debug!(interface = %id, count = devices.len(), "listDevices");
            batches.push(Discovered {
                interface: id.clone(),
                client: Arc::clone(client),
                devices,
            });
        }

        let stats = self.inner.store.merge(batches, Some(&names), true);
        self.inner.store.mark_updated(Utc::now());
        info!(
            devices = self.inner.store.len(),
            added = stats.added,
            removed = stats.removed,
            "device list reconciled"
        );
        Ok(())
    }

    /// All devices, reconciling first if the cache is stale.
    pub async fn get_devices(&self) -> Result<DeviceMap, CoreError> {
        self.update_devices(false).await?;
        Ok(self.inner.store.snapshot())
    }

    /// One device by address, reconciling first if the cache is stale.
    pub async fn device(&self, address: &str) -> Result<Arc<Device>, CoreError> {
        self.update_devices(false).await?;
        self.inner
            .store
            .get(address)
            .ok_or_else(|| CoreError::DeviceNotFound {
                address: address.to_owned(),
            })
    }

    /// Snapshot stream of the device set.
    pub fn subscribe_devices(&self) -> watch::Receiver<Arc<DeviceMap>> {
        self.inner.store.subscribe()
    }

    // ── Introspection ────────────────────────────────────────────────

    /// `system.listMethods` on one interface.
    pub async fn list_methods(&self, interface: &str) -> Result<Vec<String>, CoreError> {
        let client = self
            .client(interface)
            .ok_or_else(|| CoreError::UnknownInterface {
                id: interface.to_owned(),
            })?;
        let result = client.call("system.listMethods", Vec::new()).await?;
        Ok(result
            .first()
            .and_then(Value::as_array)
            .unwrap_or_default()
            .iter()
            .map(Value::to_string_lossy)
            .collect())
    }
}
