//! Home Assistant Registries
//!
//! Persistent host-side registries:
//! - JSON storage in the `.storage/` directory (Storage)
//! - Devices (DeviceRegistry)
//!
//! Files carry a major/minor version pair so older data can be detected.

pub mod device_registry;
pub mod storage;

pub use device_registry::{
    DeviceEntry, DeviceIdentifier, DeviceInfo, DeviceRegistry, DeviceRegistryData,
};
pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};
