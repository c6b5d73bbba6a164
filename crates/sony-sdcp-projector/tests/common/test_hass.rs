//! Minimal host harness

use ha_config_entries::{ConfigEntries, ConfigEntry, FlowManager};
use ha_registries::{DeviceRegistry, Storage};
use serde_json::json;
use sony_sdcp_projector::{SdcpOptions, SonySdcpProjector, CONF_HOST, DOMAIN};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use super::MockFactory;

/// Options without the settle pause, so tests do not sleep
pub fn fast_options() -> SdcpOptions {
    SdcpOptions {
        settle_delay: 0.0,
        ..SdcpOptions::default()
    }
}

/// Storage, registries, entry and flow managers with the integration registered
pub struct TestHass {
    pub dir: TempDir,
    pub storage: Arc<Storage>,
    pub devices: Arc<DeviceRegistry>,
    pub entries: Arc<ConfigEntries>,
    pub flows: FlowManager,
    pub factory: Arc<MockFactory>,
    pub projector: Arc<SonySdcpProjector>,
}

impl TestHass {
    pub fn new() -> Self {
        Self::with_options(fast_options())
    }

    pub fn with_options(options: SdcpOptions) -> Self {
        let dir = TempDir::new().unwrap();
        Self::in_dir(dir, options)
    }

    /// Build a harness over an existing config directory
    pub fn in_dir(dir: TempDir, options: SdcpOptions) -> Self {
        let storage = Arc::new(Storage::new(dir.path()));
        let devices = Arc::new(DeviceRegistry::new(Arc::clone(&storage)));
        let entries = Arc::new(
            ConfigEntries::new(Arc::clone(&storage)).with_device_registry(Arc::clone(&devices)),
        );
        let flows = FlowManager::new(Arc::clone(&entries));
        let factory = Arc::new(MockFactory::new());

        let projector = Arc::new(
            SonySdcpProjector::new(factory.clone())
                .with_options(options)
                .with_device_registry(Arc::clone(&devices)),
        );
        projector.register(&entries, &flows);

        Self {
            dir,
            storage,
            devices,
            entries,
            flows,
            factory,
            projector,
        }
    }

    /// Add a projector entry keyed by its host, without setting it up
    pub async fn add_entry(&self, host: &str) -> ConfigEntry {
        let mut data = HashMap::new();
        data.insert(CONF_HOST.to_string(), json!(host));
        let entry = ConfigEntry::new(DOMAIN, format!("SDCP Projector ({host})"))
            .with_data(data)
            .with_unique_id(host);
        self.entries.add(entry).await.unwrap()
    }

    /// Add and set up a projector entry
    pub async fn setup_entry(&self, host: &str) -> ConfigEntry {
        let entry = self.add_entry(host).await;
        self.entries.setup(&entry.entry_id).await.unwrap();
        self.entries.get(&entry.entry_id).unwrap()
    }
}
