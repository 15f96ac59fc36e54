//! # Patchbay - Declarative Audio Patch Orchestration
//!
//! Describe a signal chain as a tree of blueprints; the engine mounts it,
//! keeps the wiring reconciled as the description changes, and tears it
//! down when it goes away.
//!
//! ## Architecture
//!
//! Patchbay is an umbrella crate that coordinates:
//! - **patchbay-core** - Routing core (blueprints, rack reconciler, buses,
//!   note transport, voice pools)
//! - **patchbay-sim** - In-memory reference backend (`VirtualRig`) and a
//!   deterministic manually-advanced clock (`StepClock`)
//!
//! ## Quick Start
//!
//! ```ignore
//! use patchbay::prelude::*;
//!
//! let engine = PatchbayEngine::builder()
//!     .backend(my_backend)
//!     .transport(my_clock)
//!     .build()?;
//!
//! // Describe the patch
//! let reverb_rig = rig.clone();
//! let synth_rig = rig.clone();
//! let patch = Blueprint::node(move || reverb_rig.reverb(4.0))
//!     .child(Blueprint::instrument(move || synth_rig.mono_synth()).topic("bassline"));
//!
//! engine.install(patch);
//!
//! // Nothing sounds until the embedder says go
//! engine.start()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Routing core plus the sim backend
//! - `sim` - `VirtualRig` and `StepClock` for tests, demos, and offline use

/// Re-export of patchbay-core for direct access
pub use patchbay_core as core;

// Core types
pub use patchbay_core::{
    // Description
    Blueprint,
    BusRegistry,
    // Error
    Error,
    Inlet,
    InstrumentFactory,
    MountedRack,
    // Node seams
    AudioBackend,
    AudioNode,
    InstrumentNode,
    NodeFactory,
    NodeId,
    NodeRef,
    // Notes
    NoteBus,
    NoteDuration,
    NoteEvent,
    NoteSpec,
    NoteValue,
    PartStep,
    PatchbayConfig,
    PatternSpec,
    // Runtime
    Rack,
    Result,
    RoutingContext,
    ScheduleId,
    SharedNode,
    SharedTransport,
    SourceFactory,
    SourceNode,
    // Transport
    Transport,
    VoiceProxy,
    VoiceSpawner,
    VoiceTemplate,
};

// Sim backend
#[cfg(feature = "sim")]
pub use patchbay_sim as sim;

#[cfg(feature = "sim")]
pub use patchbay_sim::{PatchEvent, StepClock, VirtualRig};

mod builder;
mod engine;

pub use builder::PatchbayEngineBuilder;
pub use engine::PatchbayEngine;

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{PatchbayEngine, PatchbayEngineBuilder};

    // Essential types
    pub use crate::core::{
        AudioBackend, AudioNode, Blueprint, InstrumentNode, NoteSpec, NoteValue, PartStep,
        PatternSpec, SharedNode, SourceNode, Transport,
    };

    pub use crate::{Error, Result};

    // Sim backend
    #[cfg(feature = "sim")]
    pub use crate::sim::{StepClock, VirtualRig};
}
