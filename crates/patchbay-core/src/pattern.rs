//! Pattern players: transport-driven note producers.
//!
//! A pattern declares loosely-typed payloads at musical positions; mounting
//! schedules them on the external transport and forwards every callback
//! onto the note bus under the declared topic. Like node parameters, step
//! data is captured at mount; edit a playing pattern by remounting it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::notes::{NoteBus, NoteEvent, NoteValue};
use crate::transport::{PartStep, ScheduleId, SharedTransport};

/// Declaration of one pattern: a topic, positioned steps, and an optional
/// loop period in beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub topic: String,
    pub steps: Vec<PartStep>,
    pub loop_beats: Option<f64>,
}

impl PatternSpec {
    pub fn new(topic: impl Into<String>) -> Self {
        PatternSpec {
            topic: topic.into(),
            steps: Vec::new(),
            loop_beats: None,
        }
    }

    /// Place a payload at a musical position, in beats from the start.
    pub fn step(mut self, beats: f64, value: impl Into<NoteValue>) -> Self {
        self.steps.push(PartStep::new(beats, value));
        self
    }

    /// Repeat the pattern with this period.
    pub fn looped(mut self, loop_beats: f64) -> Self {
        self.loop_beats = Some(loop_beats);
        self
    }
}

/// A mounted pattern: the live schedule on the transport. Dropping clears
/// the schedule.
pub struct PatternPlayer {
    transport: SharedTransport,
    schedule: ScheduleId,
    topic: String,
}

impl PatternPlayer {
    pub fn mount(spec: &PatternSpec, transport: SharedTransport, bus: &NoteBus) -> Self {
        let emitter = bus.emitter(&spec.topic);
        let schedule = transport.schedule_part(
            spec.steps.clone(),
            spec.loop_beats,
            std::sync::Arc::new(move |time, value: &NoteValue| {
                emitter.emit_event(&NoteEvent {
                    time: Some(time),
                    value: value.clone(),
                });
            }),
        );
        debug!(topic = %spec.topic, steps = spec.steps.len(), %schedule, "pattern mounted");
        PatternPlayer {
            transport,
            schedule,
            topic: spec.topic.clone(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for PatternPlayer {
    fn drop(&mut self) {
        debug!(topic = %self.topic, schedule = %self.schedule, "pattern cleared");
        self.transport.clear(self.schedule);
    }
}
