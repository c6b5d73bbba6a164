//! Config Entries
//!
//! This crate provides the configuration entry system: config entries
//! represent individual integration instances, config flows create them, and
//! the manager drives their lifecycle (setup, unload, reload).
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`EntryHandler`] - Integration hooks called on setup and unload
//! - [`ConfigFlow`] / [`FlowManager`] - Wizards that create entries
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries` with
//! version tracking.

pub mod entry;
pub mod flow;
pub mod manager;
pub mod state_machine;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState};

pub use flow::{
    ConfigFlow, FlowContext, FlowError, FlowFactory, FlowManager, FlowResponse, FlowResult,
    FlowResultOrError, FormField, ABORT_ALREADY_CONFIGURED,
};

pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, EntryHandler,
    STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};

pub use state_machine::InvalidTransition;
