//! Shared test utilities for the projector integration
//!
//! A recording mock projector, a factory handing those out per host, and a
//! small host harness wiring storage, registries, entries and flows.

#![allow(dead_code, unused_imports)]

mod mock_projector;
mod test_hass;

pub use mock_projector::*;
pub use test_hass::*;
