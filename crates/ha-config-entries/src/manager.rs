//! Config Entries Manager
//!
//! Manages persistence and the setup/unload lifecycle of configuration entries.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ha_registries::{DeviceRegistry, Storable, Storage, StorageResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::state_machine::InvalidTransition;

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Unload failed: {0}")]
    UnloadFailed(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] ha_registries::StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Integration side of the entry lifecycle.
///
/// `setup_entry` returning `Err` puts the entry in SetupError.
/// `unload_entry` returning `Ok(false)` or `Err` puts it in FailedUnload.
#[async_trait]
pub trait EntryHandler: Send + Sync {
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), String>;

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<bool, String>;
}

/// Config Entries Manager
///
/// Responsible for:
/// - Loading/saving from storage
/// - Entry creation and removal, with unique_id enforcement per domain
/// - Driving registered [`EntryHandler`]s through setup and unload
pub struct ConfigEntries {
    storage: Arc<Storage>,

    /// Devices are detached from removed entries when set
    devices: Option<Arc<DeviceRegistry>>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Serialises setup/unload across entries
    setup_lock: Mutex<()>,

    handlers: DashMap<String, Arc<dyn EntryHandler>>,
}

impl ConfigEntries {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            devices: None,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            setup_lock: Mutex::new(()),
            handlers: DashMap::new(),
        }
    }

    /// Attach a device registry so removed entries release their devices
    pub fn with_device_registry(mut self, devices: Arc<DeviceRegistry>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(data) = self.storage.load_data::<ConfigEntriesData>().await? {
            info!("Loading {} config entries from storage", data.entries.len());
            for entry in data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let mut entries: Vec<ConfigEntry> = self.entries.iter().map(|r| r.value().clone()).collect();
        entries.sort_by_key(|e| e.created_at);

        self.storage
            .save_data(&ConfigEntriesData { entries })
            .await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();

        self.entries.insert(entry_id.clone(), entry.clone());

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id);
        }
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .and_then(|entry_id| self.get(&entry_id))
    }

    /// Add a new config entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        if let Err(e) = self.save().await {
            self.unindex_entry(&entry);
            return Err(e.into());
        }

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        Ok(entry)
    }

    /// Remove an entry, unloading it first if it is loaded
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_loaded() {
            self.unload(entry_id).await?;
        }

        self.unindex_entry(&entry);
        self.save().await?;

        if let Some(devices) = &self.devices {
            let removed = devices.remove_config_entry(entry_id);
            if !removed.is_empty() {
                devices.save().await?;
            }
        }

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );

        Ok(entry)
    }

    /// Move an entry to a new state, validating the transition
    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Register the lifecycle handler for a domain
    pub fn register_handler(&self, domain: &str, handler: Arc<dyn EntryHandler>) {
        self.handlers.insert(domain.to_string(), handler);
        debug!("Registered entry handler for domain: {}", domain);
    }

    fn handler(&self, domain: &str) -> Option<Arc<dyn EntryHandler>> {
        self.handlers.get(domain).map(|h| Arc::clone(h.value()))
    }

    /// Set up an entry through its domain's handler
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let Some(handler) = self.handler(&entry.domain) else {
            debug!(
                "No entry handler for domain {}, marking as loaded",
                entry.domain
            );
            return self.transition(entry_id, ConfigEntryState::Loaded, None);
        };

        match handler.setup_entry(&entry).await {
            Ok(()) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(reason) => {
                warn!("Setup failed for entry {}: {}", entry_id, reason);
                self.transition(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                Err(ConfigEntriesError::SetupFailed(reason))
            }
        }
    }

    /// Unload an entry through its domain's handler
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.state == ConfigEntryState::NotLoaded {
            return Ok(());
        }
        if !entry.state.can_transition_to(ConfigEntryState::UnloadInProgress) {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }

        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        // Entries that never finished setup have nothing to tear down
        let result = match (entry.state, self.handler(&entry.domain)) {
            (ConfigEntryState::Loaded, Some(handler)) => handler.unload_entry(&entry).await,
            _ => Ok(true),
        };

        match result {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Ok(false) => {
                let reason = "integration reported unload failure".to_string();
                warn!("Unload failed for entry {}", entry_id);
                self.transition(entry_id, ConfigEntryState::FailedUnload, Some(reason.clone()))?;
                Err(ConfigEntriesError::UnloadFailed(reason))
            }
            Err(reason) => {
                warn!("Unload failed for entry {}: {}", entry_id, reason);
                self.transition(entry_id, ConfigEntryState::FailedUnload, Some(reason.clone()))?;
                Err(ConfigEntriesError::UnloadFailed(reason))
            }
        }
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup(entry_id).await
    }

    /// Set up every entry, collecting per-entry results
    pub async fn setup_all(&self) -> Vec<ConfigEntriesResult<()>> {
        let mut entries: Vec<ConfigEntry> = self.iter().collect();
        entries.sort_by_key(|e| e.created_at);

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            results.push(self.setup(&entry.entry_id).await);
        }
        results
    }

    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        self.entries.iter().map(|r| r.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConfigEntrySource;
    use ha_registries::{DeviceIdentifier, DeviceInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    fn create_test_manager() -> (TempDir, ConfigEntries) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let manager = ConfigEntries::new(storage);
        (temp_dir, manager)
    }

    #[derive(Default)]
    struct CountingHandler {
        setups: AtomicUsize,
        unloads: AtomicUsize,
        fail_setup: bool,
        unload_result: Option<bool>,
    }

    #[async_trait]
    impl EntryHandler for CountingHandler {
        async fn setup_entry(&self, _entry: &ConfigEntry) -> Result<(), String> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            if self.fail_setup {
                Err("Connection failed".to_string())
            } else {
                Ok(())
            }
        }

        async fn unload_entry(&self, _entry: &ConfigEntry) -> Result<bool, String> {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            Ok(self.unload_result.unwrap_or(true))
        }
    }

    #[tokio::test]
    async fn test_add_entry() {
        let (_dir, manager) = create_test_manager();

        let entry = ConfigEntry::new("sony_sdcp_projector", "Projector").with_unique_id("10.0.0.5");

        let added = manager.add(entry).await.unwrap();
        assert_eq!(added.domain, "sony_sdcp_projector");
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get_by_domain("sony_sdcp_projector").len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let (_dir, manager) = create_test_manager();

        let entry1 = ConfigEntry::new("sony_sdcp_projector", "P1").with_unique_id("same-host");
        let entry2 = ConfigEntry::new("sony_sdcp_projector", "P2").with_unique_id("same-host");
        let other_domain = ConfigEntry::new("other", "Other").with_unique_id("same-host");

        manager.add(entry1).await.unwrap();
        let result = manager.add(entry2).await;

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
        // unique_id is scoped per domain
        manager.add(other_domain).await.unwrap();
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_save_does_not_keep_entry() {
        let (dir, manager) = create_test_manager();
        // A plain file where the storage directory should be
        let storage_dir = dir.path().join(".storage");
        std::fs::write(&storage_dir, b"").unwrap();

        let entry = ConfigEntry::new("sony_sdcp_projector", "Projector").with_unique_id("10.0.0.5");
        let result = manager.add(entry.clone()).await;

        assert!(matches!(result, Err(ConfigEntriesError::Storage(_))));
        assert!(manager.is_empty());
        assert!(manager.get_by_domain("sony_sdcp_projector").is_empty());
        assert!(manager
            .get_by_unique_id("sony_sdcp_projector", "10.0.0.5")
            .is_none());

        std::fs::remove_file(&storage_dir).unwrap();
        let added = manager.add(entry).await.unwrap();
        assert_eq!(manager.get(&added.entry_id).unwrap().title, "Projector");
    }

    #[tokio::test]
    async fn test_setup_and_unload_without_handler() {
        let (_dir, manager) = create_test_manager();

        let entry = manager.add(ConfigEntry::new("test", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());

        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
    }

    #[tokio::test]
    async fn test_handler_lifecycle() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(CountingHandler::default());
        manager.register_handler("test", handler.clone());

        let entry = manager.add(ConfigEntry::new("test", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        manager.reload(&entry.entry_id).await.unwrap();

        assert_eq!(handler.setups.load(Ordering::SeqCst), 2);
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_setup_twice_is_rejected() {
        let (_dir, manager) = create_test_manager();

        let entry = manager.add(ConfigEntry::new("test", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        let result = manager.setup(&entry.entry_id).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::InvalidTransition(_))
        ));
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_setup_handler_failure() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(CountingHandler {
            fail_setup: true,
            ..Default::default()
        });
        manager.register_handler("test", handler.clone());

        let entry = manager.add(ConfigEntry::new("test", "Test")).await.unwrap();
        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));
        let stored = manager.get(&entry.entry_id).unwrap();
        assert_eq!(stored.state, ConfigEntryState::SetupError);
        assert_eq!(stored.reason.as_deref(), Some("Connection failed"));

        // An entry that never loaded unloads without calling the handler
        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unload_reported_failure() {
        let (_dir, manager) = create_test_manager();
        manager.register_handler(
            "test",
            Arc::new(CountingHandler {
                unload_result: Some(false),
                ..Default::default()
            }),
        );

        let entry = manager.add(ConfigEntry::new("test", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        let result = manager.unload(&entry.entry_id).await;
        assert!(matches!(result, Err(ConfigEntriesError::UnloadFailed(_))));
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::FailedUnload
        );

        let result = manager.unload(&entry.entry_id).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::CannotUnload(ConfigEntryState::FailedUnload))
        ));
    }

    #[tokio::test]
    async fn test_remove_unloads_and_releases_devices() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let devices = Arc::new(DeviceRegistry::new(storage.clone()));
        let manager = ConfigEntries::new(storage).with_device_registry(devices.clone());
        let handler = Arc::new(CountingHandler::default());
        manager.register_handler("test", handler.clone());

        let entry = manager.add(ConfigEntry::new("test", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        devices.get_or_create(
            &entry.entry_id,
            &DeviceInfo::new(DeviceIdentifier::new("test", "device-1")),
        );

        let removed = manager.remove(&entry.entry_id).await.unwrap();
        assert_eq!(removed.entry_id, entry.entry_id);
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
        assert!(manager.is_empty());
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        {
            let manager = ConfigEntries::new(storage.clone());
            manager
                .add(
                    ConfigEntry::new("sony_sdcp_projector", "SDCP Projector (10.0.0.5)")
                        .with_unique_id("10.0.0.5"),
                )
                .await
                .unwrap();
        }

        let manager = ConfigEntries::new(storage);
        manager.load().await.unwrap();

        assert_eq!(manager.len(), 1);
        let entry = manager
            .get_by_unique_id("sony_sdcp_projector", "10.0.0.5")
            .unwrap();
        assert_eq!(entry.title, "SDCP Projector (10.0.0.5)");
        assert_eq!(entry.source, ConfigEntrySource::User);
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
    }
}
