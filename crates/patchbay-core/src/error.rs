//! Error types for patchbay-core.

use thiserror::Error;

/// Error type for patchbay-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// No ambient routing target: the declaration mounted outside any
    /// container that establishes a destination.
    #[error("no output to connect to")]
    NoRoutingTarget,

    /// The ambient target resolved, but it does not accept audio input.
    #[error("routing target is not a connectable audio node")]
    TargetNotConnectable,

    /// A named control input was requested that the ambient target does not
    /// expose (e.g. `connect("frequency")` on a node without that control).
    #[error("cannot connect to audio node property: {0}")]
    NoSuchControl(String),

    /// A bus label already has a live sender.
    #[error("bus {0:?} already has a sender")]
    BusOccupied(String),

    /// The voice proxy's deferred binding did not resolve within the
    /// configured wait.
    #[error("voice binding did not resolve within {waited_ms} ms")]
    VoiceBindTimeout { waited_ms: u64 },

    /// Mount was requested while a tree is already mounted.
    #[error("a patch tree is already mounted")]
    AlreadyStarted,

    /// Start was requested with no installed blueprint.
    #[error("no blueprint installed")]
    NothingInstalled,
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
