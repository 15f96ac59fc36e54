//! Connection/lifecycle core for declarative audio patch orchestration.
//!
//! A [`Blueprint`] tree describes audio nodes and their connections; the
//! [`Rack`] turns it into a live, imperative routing graph with correct
//! creation order, connect/disconnect pairing on mount/unmount, named
//! send/receive buses that bypass the hierarchy, and a note bus that lets
//! pattern producers drive instrument consumers without a direct
//! reference.
//!
//! # Primary API
//!
//! - [`Patchbay`] / [`PatchbayBuilder`]: main entry point, start gating
//! - [`Blueprint`]: the declaration tree
//! - [`NoteBus`] / [`NoteEmitter`]: transport note pub/sub
//! - [`VoiceProxy`] / [`VoiceSpawner`]: deferred polyphonic voices
//!
//! The DSP itself lives behind two collaborator traits: [`AudioBackend`]
//! (node capability) and [`Transport`] (clock/scheduler). `patchbay-sim`
//! implements both in memory for tests and demos.
//!
//! # Example
//!
//! ```ignore
//! use patchbay_core::prelude::*;
//!
//! let patchbay = Patchbay::builder()
//!     .backend(backend)
//!     .transport(transport)
//!     .build()?;
//!
//! patchbay.install(
//!     Blueprint::node(move || rig.reverb(5.0))
//!         .child(Blueprint::instrument(move || rig.mono_synth())
//!             .topic("bassline")
//!             .duration("8n")),
//! );
//!
//! // From the user gesture that unlocks the audio engine:
//! patchbay.start()?;
//! ```

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::PatchbayConfig;

pub mod node;
pub use node::{AudioBackend, AudioNode, Inlet, InstrumentNode, NodeId, NodeRef, SharedNode, SourceNode};

mod context;
pub use context::RoutingContext;

mod patch;
pub use patch::{resolve, PatchCord};

pub mod notes;
pub use notes::{
    NoteBus, NoteDuration, NoteEmitter, NoteEvent, NoteField, NoteSpec, NoteSubscription,
    NoteValue,
};

mod bus;
pub use bus::BusRegistry;

mod channel;
pub use channel::Channel;

mod instrument;
pub use instrument::{InstrumentBinding, NoteDefaults};

mod voice;
pub use voice::{TriggerCall, VoiceProxy, VoiceSpawner};

pub mod transport;
pub use transport::{PartStep, ScheduleId, SharedTransport, Transport};

mod pattern;
pub use pattern::{PatternPlayer, PatternSpec};

mod blueprint;
pub use blueprint::{Blueprint, InstrumentFactory, NodeFactory, SourceFactory, VoiceTemplate};

mod rack;
pub use rack::{MountedRack, Rack};

mod system;
pub use system::{Patchbay, PatchbayBuilder};

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::blueprint::Blueprint;
    pub use crate::config::PatchbayConfig;
    pub use crate::context::RoutingContext;
    pub use crate::node::{
        AudioBackend, AudioNode, Inlet, InstrumentNode, NodeId, NodeRef, SharedNode, SourceNode,
    };
    pub use crate::notes::{
        NoteBus, NoteDuration, NoteEmitter, NoteEvent, NoteSpec, NoteValue,
    };
    pub use crate::pattern::PatternSpec;
    pub use crate::system::{Patchbay, PatchbayBuilder};
    pub use crate::transport::{PartStep, ScheduleId, SharedTransport, Transport};
    pub use crate::voice::{VoiceProxy, VoiceSpawner};
    pub use crate::{Error, Result};
}
