//! Integration test modules for patchbay
//!
//! Test categories:
//! - system: install/start gating, update, stop, restart
//! - routing: hierarchical wiring, control ports, reconciliation
//! - buses: named send/receive channels and sticky flags
//! - notes: pattern players, topics, instrument adaptation
//! - voices: voice pools, deferred binding, trigger replay

pub mod notes;
pub mod routing;
pub mod system;
pub mod voices;
