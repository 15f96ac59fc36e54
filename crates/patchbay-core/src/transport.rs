//! The transport boundary: the external clock/scheduler driving musical
//! time.
//!
//! The core never keeps time itself. It hands schedules to whatever
//! implements [`Transport`] and reacts to the time-stamped callbacks that
//! come back. `patchbay-sim` ships a deterministic manually-advanced
//! implementation for tests; embedders wrap their engine's clock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::notes::NoteValue;

static NEXT_SCHEDULE_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one registered schedule, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleId(u64);

impl ScheduleId {
    /// Mint a fresh id. Transport implementations call this once per
    /// schedule they accept.
    pub fn fresh() -> Self {
        ScheduleId(NEXT_SCHEDULE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sched#{}", self.0)
    }
}

/// One step of a part schedule: a loosely-typed payload positioned at a
/// musical time, in beats from the part's start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartStep {
    pub beats: f64,
    pub value: NoteValue,
}

impl PartStep {
    pub fn new(beats: f64, value: impl Into<NoteValue>) -> Self {
        PartStep {
            beats,
            value: value.into(),
        }
    }
}

/// Callback for repeat schedules. Receives the scheduled transport time in
/// seconds.
pub type RepeatCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Callback for part schedules. Receives the scheduled transport time and
/// the step payload.
pub type PartCallback = Arc<dyn Fn(f64, &NoteValue) + Send + Sync>;

/// The external clock/scheduler collaborator.
///
/// Callbacks are invoked from the transport's own clock context,
/// asynchronously with respect to mounting; everything they touch inside
/// the core uses interior synchronization. Scheduled times are transport
/// seconds.
pub trait Transport: Send + Sync {
    /// Start musical time.
    fn start(&self);

    /// Stop musical time. Schedules stay registered.
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Current transport position in seconds.
    fn now(&self) -> f64;

    fn bpm(&self) -> f64;

    fn set_bpm(&self, bpm: f64);

    /// Tempo-relative conversion at the current bpm.
    fn beats_to_seconds(&self, beats: f64) -> f64;

    /// Invoke `callback` every `interval_beats`, starting from the current
    /// position.
    fn schedule_repeat(&self, interval_beats: f64, callback: RepeatCallback) -> ScheduleId;

    /// Invoke `callback` for each step at its musical position. With
    /// `loop_beats` set, the part repeats with that period; without it,
    /// every step fires once.
    fn schedule_part(
        &self,
        steps: Vec<PartStep>,
        loop_beats: Option<f64>,
        callback: PartCallback,
    ) -> ScheduleId;

    /// Cancel a schedule. Unknown ids are ignored.
    fn clear(&self, id: ScheduleId);
}

/// Shared transport handle, the form the core holds it in.
pub type SharedTransport = Arc<dyn Transport>;
