//! The instrument adapter: translates note-bus events into timed trigger
//! calls on an instrument node.
//!
//! The adapter's `duration`/`velocity` defaults are live props: they are
//! read fresh at event time through a shared cell, not captured at
//! subscribe time, so a re-declaration with new defaults affects the very
//! next note. The subscribed topic, by contrast, is fixed at mount.

use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::node::InstrumentNode;
use crate::notes::{NoteBus, NoteDuration, NoteEvent, NoteField, NoteSubscription, NoteValue};

#[derive(Debug, Clone, Default)]
struct DefaultsSnapshot {
    duration: Option<NoteDuration>,
    velocity: Option<f32>,
}

/// Live note defaults for one adapter.
///
/// Clones share the cell. The mounting machinery writes new values on
/// re-declaration; the note listener reads on every event.
#[derive(Clone, Default)]
pub struct NoteDefaults {
    inner: Arc<ArcSwap<DefaultsSnapshot>>,
}

impl NoteDefaults {
    pub fn new(duration: Option<NoteDuration>, velocity: Option<f32>) -> Self {
        NoteDefaults {
            inner: Arc::new(ArcSwap::from_pointee(DefaultsSnapshot {
                duration,
                velocity,
            })),
        }
    }

    /// Replace both defaults at once.
    pub fn set(&self, duration: Option<NoteDuration>, velocity: Option<f32>) {
        self.inner
            .store(Arc::new(DefaultsSnapshot { duration, velocity }));
    }

    pub fn duration(&self) -> Option<NoteDuration> {
        self.inner.load().duration.clone()
    }

    pub fn velocity(&self) -> Option<f32> {
        self.inner.load().velocity
    }
}

/// Duration field of a structured event. Numbers and strings pass through;
/// anything else collapses to the configured fallback constant, ignoring
/// the adapter's duration prop.
fn parse_event_duration(field: &NoteField, fallback_seconds: f64) -> NoteDuration {
    match field {
        NoteField::Number(seconds) => NoteDuration::Seconds(*seconds),
        NoteField::Text(symbol) => NoteDuration::Symbol(symbol.clone()),
        other => {
            warn!(?other, "invalid note duration, using fallback constant");
            NoteDuration::Seconds(fallback_seconds)
        }
    }
}

/// Velocity field of a structured event. Only numbers pass through; anything
/// else falls back to the adapter's velocity prop rather than a constant, which is
/// why this path differs from duration.
fn parse_event_velocity(field: &NoteField, defaults: &NoteDefaults) -> Option<f32> {
    match field {
        NoteField::Number(velocity) => Some(*velocity as f32),
        other => {
            warn!(?other, "invalid note velocity, using adapter default");
            defaults.velocity()
        }
    }
}

fn handle_event(
    instrument: &Arc<dyn InstrumentNode>,
    defaults: &NoteDefaults,
    fallback_seconds: f64,
    event: &NoteEvent,
) {
    // Events without a scheduled time are dropped outright.
    let Some(time) = event.time else {
        return;
    };

    match &event.value {
        NoteValue::Name(note) => {
            let duration = defaults
                .duration()
                .unwrap_or(NoteDuration::Seconds(fallback_seconds));
            instrument.trigger_attack_release(note, duration, time, defaults.velocity());
        }
        NoteValue::Spec(spec) => {
            let duration = match &spec.duration {
                None => defaults
                    .duration()
                    .unwrap_or(NoteDuration::Seconds(fallback_seconds)),
                Some(field) => parse_event_duration(field, fallback_seconds),
            };
            let velocity = match &spec.velocity {
                None => defaults.velocity(),
                Some(field) => parse_event_velocity(field, defaults),
            };
            instrument.trigger_attack_release(&spec.note, duration, time, velocity);
        }
        // Numbers, flags and other non-note shapes are not ours to judge.
        _ => {}
    }
}

/// One mounted adapter: an instrument paired with its note subscription.
///
/// Built at mount, dropped at unmount; dropping unsubscribes and, in synced
/// mode, unsyncs. The topic cannot change for the life of the binding.
pub struct InstrumentBinding {
    instrument: Arc<dyn InstrumentNode>,
    defaults: NoteDefaults,
    synced: bool,
    subscription: Option<NoteSubscription>,
}

impl InstrumentBinding {
    /// Wire `instrument` to `topic` on `bus`. A `None` topic mounts the
    /// instrument without any subscription. Synced mode additionally calls
    /// `sync()` now and `unsync()` at drop, aligning tempo-relative
    /// durations with the transport.
    pub fn mount(
        instrument: Arc<dyn InstrumentNode>,
        bus: &NoteBus,
        topic: Option<&str>,
        defaults: NoteDefaults,
        synced: bool,
        fallback_duration: f64,
    ) -> Self {
        let subscription = topic.map(|topic| {
            let instr = instrument.clone();
            let live = defaults.clone();
            debug!(instrument = %instrument.id(), topic, "instrument listening for notes");
            bus.subscribe(topic, move |event| {
                handle_event(&instr, &live, fallback_duration, event)
            })
        });
        if synced {
            instrument.sync();
        }
        InstrumentBinding {
            instrument,
            defaults,
            synced,
            subscription,
        }
    }

    pub fn instrument(&self) -> &Arc<dyn InstrumentNode> {
        &self.instrument
    }

    /// The live defaults cell; write through it to affect future events.
    pub fn defaults(&self) -> &NoteDefaults {
        &self.defaults
    }

    pub fn topic(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.topic())
    }
}

impl Drop for InstrumentBinding {
    fn drop(&mut self) {
        if self.synced {
            self.instrument.unsync();
        }
        // Subscription drops with us, unsubscribing.
        self.subscription.take();
    }
}
