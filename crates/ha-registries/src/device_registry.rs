//! Device Registry
//!
//! Tracks the physical devices behind config entries. Integrations attach
//! [`DeviceInfo`] metadata when their entities are set up; the registry
//! merges it into a persistent [`DeviceEntry`] keyed by identifier.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{Storable, Storage, StorageResult};

/// Storage key for device registry
pub const STORAGE_KEY: &str = "core.device_registry";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// A device identifier (domain, id) pair, stored as a two element array
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier(pub String, pub String);

impl DeviceIdentifier {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self(domain.into(), id.into())
    }

    pub fn domain(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        &self.1
    }

    /// Create a key for indexing
    pub fn key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }
}

/// Device metadata supplied by an integration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<DeviceIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl DeviceInfo {
    pub fn new(identifier: DeviceIdentifier) -> Self {
        Self {
            identifiers: vec![identifier],
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A registered device entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Internal UUID
    pub id: String,

    /// Unique identifiers by domain (e.g., [["sony_sdcp_projector", "10.0.0.5"]])
    #[serde(default)]
    pub identifiers: Vec<DeviceIdentifier>,

    /// Associated config entries
    #[serde(default)]
    pub config_entries: Vec<String>,

    /// Primary config entry ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_config_entry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl DeviceEntry {
    fn from_info(config_entry_id: &str, info: &DeviceInfo) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            identifiers: info.identifiers.clone(),
            config_entries: vec![config_entry_id.to_string()],
            primary_config_entry: Some(config_entry_id.to_string()),
            name: info.name.clone(),
            manufacturer: info.manufacturer.clone(),
            model: info.model.clone(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Merge newer metadata into this entry. Returns true if anything changed.
    fn merge(&mut self, config_entry_id: &str, info: &DeviceInfo) -> bool {
        let mut changed = false;

        if !self.config_entries.iter().any(|id| id == config_entry_id) {
            self.config_entries.push(config_entry_id.to_string());
            changed = true;
        }
        if self.primary_config_entry.is_none() {
            self.primary_config_entry = Some(config_entry_id.to_string());
            changed = true;
        }
        for identifier in &info.identifiers {
            if !self.identifiers.contains(identifier) {
                self.identifiers.push(identifier.clone());
                changed = true;
            }
        }
        for (field, value) in [
            (&mut self.name, &info.name),
            (&mut self.manufacturer, &info.manufacturer),
            (&mut self.model, &info.model),
        ] {
            if value.is_some() && *field != *value {
                field.clone_from(value);
                changed = true;
            }
        }

        if changed {
            self.modified_at = Utc::now();
        }
        changed
    }
}

/// Device registry data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRegistryData {
    pub devices: Vec<DeviceEntry>,
}

impl Storable for DeviceRegistryData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Device Registry
///
/// Lookups by id, identifier and config entry. Entries are stored as
/// `Arc<DeviceEntry>` so reads don't clone.
pub struct DeviceRegistry {
    storage: Arc<Storage>,

    /// Primary index: device_id -> DeviceEntry
    by_id: DashMap<String, Arc<DeviceEntry>>,

    /// Index: identifier key -> device_id
    by_identifier: DashMap<String, String>,

    /// Index: config_entry_id -> set of device_ids
    by_config_entry_id: DashMap<String, HashSet<String>>,
}

impl DeviceRegistry {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            by_id: DashMap::new(),
            by_identifier: DashMap::new(),
            by_config_entry_id: DashMap::new(),
        }
    }

    /// Load from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(data) = self.storage.load_data::<DeviceRegistryData>().await? {
            info!("Loading {} devices from storage", data.devices.len());
            for entry in data.devices {
                self.index_entry(Arc::new(entry));
            }
        }
        Ok(())
    }

    /// Save to storage
    pub async fn save(&self) -> StorageResult<()> {
        let mut devices: Vec<DeviceEntry> =
            self.by_id.iter().map(|r| (**r.value()).clone()).collect();
        devices.sort_by_key(|d| d.created_at);

        self.storage
            .save_data(&DeviceRegistryData { devices })
            .await?;
        debug!("Saved {} devices to storage", self.by_id.len());
        Ok(())
    }

    fn index_entry(&self, entry: Arc<DeviceEntry>) {
        let device_id = entry.id.clone();

        for identifier in &entry.identifiers {
            self.by_identifier
                .insert(identifier.key(), device_id.clone());
        }

        for config_entry_id in &entry.config_entries {
            self.by_config_entry_id
                .entry(config_entry_id.clone())
                .or_default()
                .insert(device_id.clone());
        }

        self.by_id.insert(device_id, entry);
    }

    fn unindex_entry(&self, entry: &DeviceEntry) {
        for identifier in &entry.identifiers {
            self.by_identifier.remove(&identifier.key());
        }

        for config_entry_id in &entry.config_entries {
            if let Some(mut ids) = self.by_config_entry_id.get_mut(config_entry_id) {
                ids.remove(&entry.id);
            }
        }

        self.by_id.remove(&entry.id);
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_id.get(device_id).map(|r| Arc::clone(r.value()))
    }

    pub fn get_by_identifier(&self, domain: &str, id: &str) -> Option<Arc<DeviceEntry>> {
        let key = format!("{}:{}", domain, id);
        self.by_identifier
            .get(&key)
            .and_then(|device_id| self.get(&device_id))
    }

    /// Get all devices for a config entry
    pub fn get_by_config_entry_id(&self, config_entry_id: &str) -> Vec<Arc<DeviceEntry>> {
        self.by_config_entry_id
            .get(config_entry_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get or create the device described by `info` for a config entry.
    ///
    /// Existing devices are found by any of the identifiers and have the new
    /// metadata merged in.
    pub fn get_or_create(&self, config_entry_id: &str, info: &DeviceInfo) -> Arc<DeviceEntry> {
        let existing = info
            .identifiers
            .iter()
            .find_map(|ident| self.get_by_identifier(ident.domain(), ident.id()));

        if let Some(existing) = existing {
            let mut updated = (*existing).clone();
            if !updated.merge(config_entry_id, info) {
                return existing;
            }
            debug!("Updated device {} from {}", updated.id, config_entry_id);
            self.unindex_entry(&existing);
            let updated = Arc::new(updated);
            self.index_entry(Arc::clone(&updated));
            return updated;
        }

        let entry = Arc::new(DeviceEntry::from_info(config_entry_id, info));
        info!(
            "Registered device {} ({}) for config entry {}",
            entry.id,
            entry.name.as_deref().unwrap_or("unnamed"),
            config_entry_id
        );
        self.index_entry(Arc::clone(&entry));
        entry
    }

    /// Detach a config entry from all its devices.
    ///
    /// Devices left without any config entry are removed. Returns the ids
    /// of removed devices.
    pub fn remove_config_entry(&self, config_entry_id: &str) -> Vec<String> {
        let mut removed = Vec::new();

        for device in self.get_by_config_entry_id(config_entry_id) {
            self.unindex_entry(&device);

            let mut updated = (*device).clone();
            updated.config_entries.retain(|id| id != config_entry_id);
            if updated.primary_config_entry.as_deref() == Some(config_entry_id) {
                updated.primary_config_entry = updated.config_entries.first().cloned();
            }

            if updated.config_entries.is_empty() {
                debug!("Removed device {}", updated.id);
                removed.push(updated.id);
            } else {
                updated.modified_at = Utc::now();
                self.index_entry(Arc::new(updated));
            }
        }

        self.by_config_entry_id.remove(config_entry_id);
        removed
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_registry() -> (TempDir, DeviceRegistry) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        (temp_dir, DeviceRegistry::new(storage))
    }

    fn projector_info(id: &str) -> DeviceInfo {
        DeviceInfo::new(DeviceIdentifier::new("sony_sdcp_projector", id))
            .with_name("Sony SDCP Projector")
            .with_manufacturer("Sony")
            .with_model("SDCP Projector")
    }

    #[test]
    fn test_get_or_create_new_device() {
        let (_dir, registry) = create_test_registry();

        let device = registry.get_or_create("entry1", &projector_info("10.0.0.5"));
        assert_eq!(device.manufacturer.as_deref(), Some("Sony"));
        assert_eq!(device.config_entries, vec!["entry1".to_string()]);
        assert_eq!(device.primary_config_entry.as_deref(), Some("entry1"));
        assert_eq!(registry.len(), 1);

        let found = registry
            .get_by_identifier("sony_sdcp_projector", "10.0.0.5")
            .unwrap();
        assert_eq!(found.id, device.id);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (_dir, registry) = create_test_registry();

        let first = registry.get_or_create("entry1", &projector_info("10.0.0.5"));
        let second = registry.get_or_create("entry1", &projector_info("10.0.0.5"));

        assert_eq!(first.id, second.id);
        assert_eq!(first.modified_at, second.modified_at);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_or_create_merges_metadata() {
        let (_dir, registry) = create_test_registry();

        let info = DeviceInfo::new(DeviceIdentifier::new("sony_sdcp_projector", "p1"));
        let first = registry.get_or_create("entry1", &info);
        assert!(first.model.is_none());

        let second = registry.get_or_create("entry2", &projector_info("p1"));
        assert_eq!(first.id, second.id);
        assert_eq!(second.model.as_deref(), Some("SDCP Projector"));
        assert_eq!(second.config_entries.len(), 2);
        assert_eq!(registry.get_by_config_entry_id("entry2").len(), 1);
    }

    #[test]
    fn test_remove_config_entry() {
        let (_dir, registry) = create_test_registry();

        let shared = registry.get_or_create("entry1", &projector_info("p1"));
        registry.get_or_create("entry2", &projector_info("p1"));
        let only_one = registry.get_or_create("entry1", &projector_info("p2"));

        let removed = registry.remove_config_entry("entry1");
        assert_eq!(removed, vec![only_one.id.clone()]);
        assert!(registry.get(&only_one.id).is_none());

        let remaining = registry.get(&shared.id).unwrap();
        assert_eq!(remaining.config_entries, vec!["entry2".to_string()]);
        assert_eq!(remaining.primary_config_entry.as_deref(), Some("entry2"));
        assert!(registry.get_by_config_entry_id("entry1").is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        let device_id = {
            let registry = DeviceRegistry::new(storage.clone());
            let device = registry.get_or_create("entry1", &projector_info("10.0.0.5"));
            registry.save().await.unwrap();
            device.id.clone()
        };

        let registry = DeviceRegistry::new(storage);
        registry.load().await.unwrap();

        assert_eq!(registry.len(), 1);
        let device = registry.get(&device_id).unwrap();
        assert_eq!(device.name.as_deref(), Some("Sony SDCP Projector"));
        assert_eq!(registry.get_by_config_entry_id("entry1").len(), 1);
    }
}
