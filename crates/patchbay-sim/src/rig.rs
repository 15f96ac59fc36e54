//! The virtual rig: an audio backend whose nodes record what is done to
//! them.
//!
//! Every capability call lands in one shared, ordered event log, and live
//! edges are tracked separately so tests can assert on the wiring that
//! exists right now as well as on the history that produced it. The stock
//! node kinds mirror a small studio: distortion, feedback delay, filter
//! (with a `frequency` control inlet), LFO, mono synth, reverb, channel
//! strip, gain.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

use patchbay_core::{
    AudioBackend, AudioNode, Inlet, InstrumentNode, NodeId, NoteDuration, SharedNode, SourceNode,
};

/// One recorded capability call.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchEvent {
    Connected {
        source: NodeId,
        target: Inlet,
    },
    Disconnected {
        source: NodeId,
        target: Inlet,
    },
    DisconnectedAll {
        source: NodeId,
    },
    Disposed {
        node: NodeId,
    },
    Started {
        node: NodeId,
        time: f64,
    },
    Stopped {
        node: NodeId,
    },
    Synced {
        node: NodeId,
    },
    Unsynced {
        node: NodeId,
    },
    Attack {
        node: NodeId,
        note: String,
        time: f64,
        velocity: Option<f32>,
    },
    Release {
        node: NodeId,
        time: f64,
    },
    AttackRelease {
        node: NodeId,
        note: String,
        duration: NoteDuration,
        time: f64,
        velocity: Option<f32>,
    },
}

#[derive(Default)]
struct RigState {
    events: Mutex<Vec<PatchEvent>>,
    edges: Mutex<Vec<(NodeId, Inlet)>>,
    disposed: Mutex<HashSet<NodeId>>,
}

impl RigState {
    fn record(&self, event: PatchEvent) {
        trace!(?event, "rig event");
        self.events.lock().push(event);
    }
}

/// One backend node. Does no DSP; remembers everything.
pub struct VirtualNode {
    id: NodeId,
    kind: &'static str,
    has_input: bool,
    controls: &'static [&'static str],
    state: Arc<RigState>,
}

impl VirtualNode {
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl AudioNode for VirtualNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn inlet(&self) -> Option<Inlet> {
        self.has_input.then(|| Inlet::of(self.id))
    }

    fn control_inlet(&self, name: &str) -> Option<Inlet> {
        self.controls
            .iter()
            .any(|c| *c == name)
            .then(|| Inlet::control(self.id, name))
    }

    fn connect(&self, target: &Inlet) {
        self.state.edges.lock().push((self.id, target.clone()));
        self.state.record(PatchEvent::Connected {
            source: self.id,
            target: target.clone(),
        });
    }

    fn disconnect(&self, target: &Inlet) {
        let mut edges = self.state.edges.lock();
        if let Some(pos) = edges
            .iter()
            .position(|(source, t)| *source == self.id && t == target)
        {
            edges.remove(pos);
        }
        drop(edges);
        self.state.record(PatchEvent::Disconnected {
            source: self.id,
            target: target.clone(),
        });
    }

    fn disconnect_all(&self) {
        self.state
            .edges
            .lock()
            .retain(|(source, _)| *source != self.id);
        self.state
            .record(PatchEvent::DisconnectedAll { source: self.id });
    }

    fn dispose(&self) {
        self.state.disposed.lock().insert(self.id);
        self.state.record(PatchEvent::Disposed { node: self.id });
    }
}

impl SourceNode for VirtualNode {
    fn start(&self, time: f64) {
        self.state.record(PatchEvent::Started {
            node: self.id,
            time,
        });
    }

    fn stop(&self) {
        self.state.record(PatchEvent::Stopped { node: self.id });
    }

    fn sync(&self) {
        self.state.record(PatchEvent::Synced { node: self.id });
    }

    fn unsync(&self) {
        self.state.record(PatchEvent::Unsynced { node: self.id });
    }
}

impl InstrumentNode for VirtualNode {
    fn trigger_attack(&self, note: &str, time: f64, velocity: Option<f32>) {
        self.state.record(PatchEvent::Attack {
            node: self.id,
            note: note.to_string(),
            time,
            velocity,
        });
    }

    fn trigger_release(&self, time: f64) {
        self.state.record(PatchEvent::Release {
            node: self.id,
            time,
        });
    }

    fn trigger_attack_release(
        &self,
        note: &str,
        duration: NoteDuration,
        time: f64,
        velocity: Option<f32>,
    ) {
        self.state.record(PatchEvent::AttackRelease {
            node: self.id,
            note: note.to_string(),
            duration,
            time,
            velocity,
        });
    }

    fn sync(&self) {
        self.state.record(PatchEvent::Synced { node: self.id });
    }

    fn unsync(&self) {
        self.state.record(PatchEvent::Unsynced { node: self.id });
    }
}

/// The backend: mints virtual nodes sharing one event log. Clones share
/// the rig.
#[derive(Clone)]
pub struct VirtualRig {
    state: Arc<RigState>,
    destination: Arc<VirtualNode>,
}

impl VirtualRig {
    pub fn new() -> Self {
        let state = Arc::new(RigState::default());
        let destination = Arc::new(VirtualNode {
            id: NodeId::fresh(),
            kind: "destination",
            has_input: true,
            controls: &[],
            state: state.clone(),
        });
        VirtualRig { state, destination }
    }

    fn mint(
        &self,
        kind: &'static str,
        has_input: bool,
        controls: &'static [&'static str],
    ) -> Arc<VirtualNode> {
        Arc::new(VirtualNode {
            id: NodeId::fresh(),
            kind,
            has_input,
            controls,
            state: self.state.clone(),
        })
    }

    // Stock node kinds. Construction parameters are opaque to the
    // orchestration layer, so the rig accepts and drops them.

    pub fn distortion(&self, _amount: f64) -> SharedNode {
        self.mint("distortion", true, &[])
    }

    pub fn feedback_delay(&self, _delay: impl Into<NoteDuration>, _feedback: f64) -> SharedNode {
        self.mint("feedback-delay", true, &[])
    }

    /// Filter with a modulatable `"frequency"` control inlet.
    pub fn filter(&self, _frequency: f64, _q: f64) -> SharedNode {
        self.mint("filter", true, &["frequency"])
    }

    /// A source: accepts no audio input, follows the transport.
    pub fn lfo(&self, _min: f64, _max: f64, _frequency: impl Into<NoteDuration>) -> Arc<dyn SourceNode> {
        self.mint("lfo", false, &[])
    }

    pub fn mono_synth(&self) -> Arc<dyn InstrumentNode> {
        self.mint("mono-synth", true, &[])
    }

    pub fn reverb(&self, _decay: f64) -> SharedNode {
        self.mint("reverb", true, &[])
    }

    pub fn gain(&self) -> SharedNode {
        self.mint("gain", true, &[])
    }

    // Queries.

    /// The full event history, in call order.
    pub fn events(&self) -> Vec<PatchEvent> {
        self.state.events.lock().clone()
    }

    /// Live edges, in connection order.
    pub fn edges(&self) -> Vec<(NodeId, Inlet)> {
        self.state.edges.lock().clone()
    }

    pub fn edges_from(&self, source: NodeId) -> Vec<Inlet> {
        self.state
            .edges
            .lock()
            .iter()
            .filter(|(s, _)| *s == source)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn has_edge(&self, source: NodeId, target: &Inlet) -> bool {
        self.state
            .edges
            .lock()
            .iter()
            .any(|(s, t)| *s == source && t == target)
    }

    pub fn is_disposed(&self, node: NodeId) -> bool {
        self.state.disposed.lock().contains(&node)
    }

    /// Trigger history of one instrument node.
    pub fn triggers_on(&self, node: NodeId) -> Vec<PatchEvent> {
        self.state
            .events
            .lock()
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    PatchEvent::Attack { node: n, .. }
                    | PatchEvent::Release { node: n, .. }
                    | PatchEvent::AttackRelease { node: n, .. }
                    if *n == node
                )
            })
            .cloned()
            .collect()
    }

    /// Forget the history so far. Live edges and disposal stay.
    pub fn clear_events(&self) {
        self.state.events.lock().clear();
    }
}

impl Default for VirtualRig {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for VirtualRig {
    fn destination(&self) -> SharedNode {
        self.destination.clone()
    }

    fn make_channel(&self) -> SharedNode {
        self.mint("channel", true, &[])
    }

    fn make_gain(&self) -> SharedNode {
        self.gain()
    }
}
