//! The transport note bus: topic-keyed pub/sub decoupling pattern
//! producers from instrument consumers.
//!
//! Payloads are deliberately loose: pattern data arrives as bare note
//! names, structured `{note, duration, velocity}` records with fields of
//! whatever type the author wrote, or shapes that are not notes at all.
//! The bus carries everything verbatim; adapters decide what to do
//! (see [`crate::instrument`]).
//!
//! Topics are namespaced internally as `"note:" + topic` so the registry
//! could host other event families without collisions.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// A note length: transport seconds, or a notation symbol the backend
/// interprets against the tempo (`"8n"`, `"4n."`, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteDuration {
    Seconds(f64),
    Symbol(String),
}

impl From<f64> for NoteDuration {
    fn from(seconds: f64) -> Self {
        NoteDuration::Seconds(seconds)
    }
}

impl From<&str> for NoteDuration {
    fn from(symbol: &str) -> Self {
        NoteDuration::Symbol(symbol.to_string())
    }
}

impl fmt::Display for NoteDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteDuration::Seconds(s) => write!(f, "{}s", s),
            NoteDuration::Symbol(sym) => write!(f, "{}", sym),
        }
    }
}

/// A loosely-typed field inside a structured note payload.
///
/// Pattern data is authored by hand; a velocity of `"loud"` or a boolean
/// duration is representable and reaches the adapter, which falls back and
/// logs rather than crashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteField {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl From<f64> for NoteField {
    fn from(n: f64) -> Self {
        NoteField::Number(n)
    }
}

impl From<&str> for NoteField {
    fn from(s: &str) -> Self {
        NoteField::Text(s.to_string())
    }
}

impl From<bool> for NoteField {
    fn from(b: bool) -> Self {
        NoteField::Flag(b)
    }
}

/// Structured note payload: `{note, duration?, velocity?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSpec {
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<NoteField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<NoteField>,
}

impl NoteSpec {
    pub fn new(note: impl Into<String>) -> Self {
        NoteSpec {
            note: note.into(),
            duration: None,
            velocity: None,
        }
    }

    pub fn with_duration(mut self, duration: impl Into<NoteField>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn with_velocity(mut self, velocity: impl Into<NoteField>) -> Self {
        self.velocity = Some(velocity.into());
        self
    }
}

/// What a producer put on the bus.
///
/// `Name` and `Spec` are the note shapes adapters act on; `Number` and
/// `Flag` exist because pattern data can carry them, and adapters ignore
/// them silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteValue {
    Spec(NoteSpec),
    Name(String),
    Number(f64),
    Flag(bool),
}

impl From<&str> for NoteValue {
    fn from(name: &str) -> Self {
        NoteValue::Name(name.to_string())
    }
}

impl From<NoteSpec> for NoteValue {
    fn from(spec: NoteSpec) -> Self {
        NoteValue::Spec(spec)
    }
}

/// One bus event: a scheduled transport time plus a payload.
///
/// Time is optional at the type level because producers can emit without
/// one; adapters drop such events instead of guessing a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub time: Option<f64>,
    pub value: NoteValue,
}

impl NoteEvent {
    /// Event scheduled at a transport time.
    pub fn at(time: f64, value: impl Into<NoteValue>) -> Self {
        NoteEvent {
            time: Some(time),
            value: value.into(),
        }
    }

    /// Event with no time. Adapters drop these.
    pub fn untimed(value: impl Into<NoteValue>) -> Self {
        NoteEvent {
            time: None,
            value: value.into(),
        }
    }
}

type Listener = Arc<dyn Fn(&NoteEvent) + Send + Sync>;

#[derive(Default)]
struct TopicSlot {
    listeners: Mutex<Vec<(u64, Listener)>>,
}

struct NoteBusInner {
    topics: DashMap<String, Arc<TopicSlot>>,
    next_listener: AtomicU64,
}

fn note_key(topic: &str) -> String {
    format!("note:{topic}")
}

/// The note-event multiplexer.
///
/// One instance is shared by every participant of a system. Listener lists
/// are ordered: within one topic, every listener sees events in emission
/// order, and listeners subscribed earlier run first for each event.
///
/// Dispatch takes a snapshot of the listener list before invoking anything,
/// so a listener may unsubscribe or emit from inside its callback without
/// deadlocking.
#[derive(Clone)]
pub struct NoteBus {
    inner: Arc<NoteBusInner>,
}

impl NoteBus {
    pub fn new() -> Self {
        NoteBus {
            inner: Arc::new(NoteBusInner {
                topics: DashMap::new(),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to a topic. The returned guard unsubscribes on drop;
    /// dropping it is the only way to unsubscribe.
    pub fn subscribe(
        &self,
        topic: &str,
        listener: impl Fn(&NoteEvent) + Send + Sync + 'static,
    ) -> NoteSubscription {
        let key = note_key(topic);
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let slot = self
            .inner
            .topics
            .entry(key.clone())
            .or_default()
            .value()
            .clone();
        slot.listeners.lock().push((id, Arc::new(listener)));
        trace!(topic, listener = id, "note bus subscribe");
        NoteSubscription {
            bus: self.clone(),
            topic: topic.to_string(),
            key,
            id,
        }
    }

    /// Deliver an event to every listener on `topic`, in subscription order.
    pub fn emit(&self, topic: &str, event: &NoteEvent) {
        let slot = match self.inner.topics.get(&note_key(topic)) {
            Some(entry) => entry.value().clone(),
            None => return,
        };
        // Snapshot under the lock, invoke outside it.
        let snapshot: SmallVec<[Listener; 4]> = slot
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        trace!(topic, listeners = snapshot.len(), "note bus emit");
        for listener in snapshot {
            listener(event);
        }
    }

    /// Producer handle bound to one topic.
    pub fn emitter(&self, topic: &str) -> NoteEmitter {
        NoteEmitter {
            bus: self.clone(),
            topic: topic.to_string(),
        }
    }

    /// Number of live listeners on a topic.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .get(&note_key(topic))
            .map(|slot| slot.listeners.lock().len())
            .unwrap_or(0)
    }

    fn unsubscribe(&self, key: &str, id: u64) {
        let empty = match self.inner.topics.get(key) {
            Some(slot) => {
                let mut listeners = slot.listeners.lock();
                listeners.retain(|(lid, _)| *lid != id);
                listeners.is_empty()
            }
            None => return,
        };
        if empty {
            self.inner
                .topics
                .remove_if(key, |_, slot| slot.listeners.lock().is_empty());
        }
    }
}

impl Default for NoteBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription disposer. Dropping it removes the listener.
pub struct NoteSubscription {
    bus: NoteBus,
    topic: String,
    key: String,
    id: u64,
}

impl NoteSubscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for NoteSubscription {
    fn drop(&mut self) {
        trace!(topic = %self.topic, listener = self.id, "note bus unsubscribe");
        self.bus.unsubscribe(&self.key, self.id);
    }
}

/// Producer handle: emits onto one topic of one bus.
#[derive(Clone)]
pub struct NoteEmitter {
    bus: NoteBus,
    topic: String,
}

impl NoteEmitter {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Emit a scheduled event.
    pub fn emit(&self, time: f64, value: impl Into<NoteValue>) {
        self.bus.emit(&self.topic, &NoteEvent::at(time, value));
    }

    /// Emit a pre-built event (used by players forwarding raw data).
    pub fn emit_event(&self, event: &NoteEvent) {
        self.bus.emit(&self.topic, event);
    }
}
