//! Entry lifecycle
//!
//! [`SonySdcpProjector`] is the integration object registered with the
//! config entry manager. It owns every loaded entry's runtime: the projector
//! client, the executor and the remote entity.

use async_trait::async_trait;
use dashmap::DashMap;
use ha_config_entries::{
    ConfigEntries, ConfigEntry, ConfigFlow, EntryHandler, FlowFactory, FlowManager,
};
use ha_registries::DeviceRegistry;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::ClientFactory;
use crate::config_flow::{is_host_valid, SdcpConfigFlow};
use crate::constants::{CONF_HOST, DOMAIN};
use crate::error::{RemoteError, RemoteResult, SetupError};
use crate::executor::Executor;
use crate::options::SdcpOptions;
use crate::remote::{self, RemoteState, SonySdcpRemote};
use crate::runtime::EntryContext;
use crate::services::RemoteServiceCall;

struct LoadedEntry {
    context: EntryContext,
    remote: Arc<Mutex<SonySdcpRemote>>,
}

/// The Sony SDCP projector integration
pub struct SonySdcpProjector {
    factory: Arc<dyn ClientFactory>,
    defaults: SdcpOptions,
    devices: Option<Arc<DeviceRegistry>>,
    loaded: DashMap<String, LoadedEntry>,
}

impl SonySdcpProjector {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            defaults: SdcpOptions::default(),
            devices: None,
            loaded: DashMap::new(),
        }
    }

    /// Defaults applied beneath each entry's own options
    pub fn with_options(mut self, defaults: SdcpOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_device_registry(mut self, devices: Arc<DeviceRegistry>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Register the entry handler and config flow with the host.
    pub fn register(self: &Arc<Self>, entries: &ConfigEntries, flows: &FlowManager) {
        entries.register_handler(DOMAIN, Arc::clone(self) as Arc<dyn EntryHandler>);

        let factory: FlowFactory =
            Arc::new(|| Box::new(SdcpConfigFlow::new()) as Box<dyn ConfigFlow>);
        flows.register(DOMAIN, factory);
        debug!("Registered {} integration", DOMAIN);
    }

    /// Build the runtime for an entry and set up its remote.
    pub async fn async_setup_entry(&self, entry: &ConfigEntry) -> Result<(), SetupError> {
        if self.loaded.contains_key(&entry.entry_id) {
            return Err(SetupError::AlreadySetUp(entry.entry_id.clone()));
        }

        let host = entry
            .get_data::<String>(CONF_HOST)
            .filter(|host| is_host_valid(host))
            .ok_or(SetupError::MissingHost { key: CONF_HOST })?;
        let unique_id = entry
            .unique_id
            .clone()
            .ok_or(SetupError::MissingUniqueId)?;
        let options = self.defaults.merged_with(&entry.options)?;

        let client = self
            .factory
            .create(&host)
            .map_err(|source| SetupError::Client {
                host: host.clone(),
                source,
            })?;

        let context = EntryContext {
            entry_id: entry.entry_id.clone(),
            host,
            unique_id,
            client,
            executor: Executor::new(options.max_workers),
            options,
        };

        let remote = remote::setup_entry(&context, self.devices.as_deref()).await?;
        info!("Set up projector {} ({})", context.host, entry.entry_id);

        self.loaded.insert(
            entry.entry_id.clone(),
            LoadedEntry {
                context,
                remote: Arc::new(Mutex::new(remote)),
            },
        );
        Ok(())
    }

    /// Unload an entry's remote and drop its runtime.
    ///
    /// Returns false when the entry was not loaded.
    pub async fn async_unload_entry(&self, entry_id: &str) -> bool {
        let Some((_, loaded)) = self.loaded.remove(entry_id) else {
            warn!("Entry {} is not loaded", entry_id);
            return false;
        };

        // Waits for an in-flight service call to finish
        let entity = loaded.remote.lock().await;
        remote::unload_entry(&loaded.context, &entity);

        info!("Unloaded projector {} ({})", loaded.context.host, entry_id);
        true
    }

    pub fn is_loaded(&self, entry_id: &str) -> bool {
        self.loaded.contains_key(entry_id)
    }

    pub fn loaded_entries(&self) -> Vec<String> {
        self.loaded.iter().map(|e| e.key().clone()).collect()
    }

    /// The remote entity of a loaded entry
    pub fn remote(&self, entry_id: &str) -> Option<Arc<Mutex<SonySdcpRemote>>> {
        self.loaded.get(entry_id).map(|e| Arc::clone(&e.remote))
    }

    pub fn context(&self, entry_id: &str) -> Option<EntryContext> {
        self.loaded.get(entry_id).map(|e| e.context.clone())
    }

    pub async fn state(&self, entry_id: &str) -> Option<RemoteState> {
        let remote = self.remote(entry_id)?;
        let remote = remote.lock().await;
        Some(remote.snapshot())
    }

    /// Call a remote service on an entry's entity.
    ///
    /// The data is fully validated before the entity is touched.
    pub async fn call_service(
        &self,
        entry_id: &str,
        service: &str,
        data: &Value,
    ) -> RemoteResult<()> {
        let call = RemoteServiceCall::parse(service, data)?;
        let remote = self
            .remote(entry_id)
            .ok_or_else(|| RemoteError::EntryNotLoaded(entry_id.to_string()))?;

        let mut remote = remote.lock().await;
        call.dispatch(&mut remote).await
    }
}

#[async_trait]
impl EntryHandler for SonySdcpProjector {
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), String> {
        self.async_setup_entry(entry)
            .await
            .map_err(|e| e.to_string())
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<bool, String> {
        Ok(self.async_unload_entry(&entry.entry_id).await)
    }
}
