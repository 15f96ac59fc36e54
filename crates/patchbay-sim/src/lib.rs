//! In-memory reference implementations of patchbay's two external
//! collaborators, for tests and demos.
//!
//! - [`VirtualRig`]: an [`AudioBackend`](patchbay_core::AudioBackend)
//!   whose nodes record every capability call into a shared patch-event
//!   log instead of rendering audio.
//! - [`StepClock`]: a [`Transport`](patchbay_core::Transport) advanced by
//!   hand, with deterministic callback ordering.

mod rig;
pub use rig::{PatchEvent, VirtualNode, VirtualRig};

mod clock;
pub use clock::StepClock;
