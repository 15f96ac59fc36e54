//! Test helpers and fixtures for patchbay integration tests
//!
//! Everything runs on the sim backend. `test_engine()` hands back the
//! engine together with the rig (for event/edge assertions) and the
//! clock (for driving musical time by hand).

#![allow(dead_code)]

use std::sync::Arc;

use patchbay::prelude::*;
use patchbay::{AudioBackend, NodeId};

/// Default test tempo: one beat every half second.
pub const TEST_BPM: f64 = 120.0;

pub struct TestEngine {
    pub engine: PatchbayEngine,
    pub rig: VirtualRig,
    pub clock: Arc<StepClock>,
}

/// Create a basic test engine on the sim backend.
pub fn test_engine() -> TestEngine {
    let rig = VirtualRig::new();
    let clock = Arc::new(StepClock::new(TEST_BPM));
    let engine = PatchbayEngine::builder()
        .backend(Arc::new(rig.clone()))
        .transport(clock.clone())
        .build()
        .expect("Failed to create test engine");
    TestEngine { engine, rig, clock }
}

/// Id of the rig's global output.
pub fn destination_id(rig: &VirtualRig) -> NodeId {
    rig.destination().id()
}

/// A plain processing-node declaration (reverb).
pub fn reverb(rig: &VirtualRig) -> Blueprint {
    let rig = rig.clone();
    Blueprint::node(move || rig.reverb(3.0))
}

/// A processing node exposing a `frequency` control (filter).
pub fn filter(rig: &VirtualRig) -> Blueprint {
    let rig = rig.clone();
    Blueprint::node(move || rig.filter(800.0, 1.0))
}

/// A transport-synced source (LFO).
pub fn lfo(rig: &VirtualRig) -> Blueprint {
    let rig = rig.clone();
    Blueprint::source(move || rig.lfo(200.0, 2000.0, 4.0))
}

/// A mono synth listening on `topic`.
pub fn synth(rig: &VirtualRig, topic: &str) -> Blueprint {
    let rig = rig.clone();
    Blueprint::instrument(move || rig.mono_synth()).topic(topic)
}
