//! Polyphonic voice proxies: stand-ins for voices the engine asked for
//! before their declared instrument exists.
//!
//! A polyphonic engine constructs voices on its own schedule, but the voice
//! instrument is declared by the caller as a template in the tree. The
//! proxy bridges the two timelines: it is handed out immediately with the
//! full instrument surface, queues every trigger while its binding is
//! pending, and replays the queue in original order the moment the real
//! instrument materializes. No call is dropped or reordered; that is the
//! correctness contract, not an optimization.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::blueprint::VoiceTemplate;
use crate::context::RoutingContext;
use crate::node::{AudioNode, Inlet, InstrumentNode, NodeId, NodeRef, SharedNode};
use crate::notes::NoteDuration;
use crate::patch::PatchCord;
use crate::rack::{MountedRack, Rack};
use crate::{Error, Result};

/// One buffered trigger, replayed verbatim at bind time.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerCall {
    Attack {
        note: String,
        time: f64,
        velocity: Option<f32>,
    },
    Release {
        time: f64,
    },
    AttackRelease {
        note: String,
        duration: NoteDuration,
        time: f64,
        velocity: Option<f32>,
    },
}

impl TriggerCall {
    fn apply(self, instrument: &Arc<dyn InstrumentNode>) {
        match self {
            TriggerCall::Attack {
                note,
                time,
                velocity,
            } => instrument.trigger_attack(&note, time, velocity),
            TriggerCall::Release { time } => instrument.trigger_release(time),
            TriggerCall::AttackRelease {
                note,
                duration,
                time,
                velocity,
            } => instrument.trigger_attack_release(&note, duration, time, velocity),
        }
    }
}

struct VoiceState {
    bound: Option<Arc<dyn InstrumentNode>>,
    disposed: bool,
}

/// A not-yet-materialized voice.
///
/// Audio side: the proxy IS a node: it delegates routing to an internal
/// sink (a backend pass-through), so the engine can wire the voice into the
/// declared chain before it is playable. Trigger side: calls go straight to
/// the bound instrument once resolution happened, and into a bounded FIFO
/// queue before that.
pub struct VoiceProxy {
    sink: SharedNode,
    state: Mutex<VoiceState>,
    bound_cv: Condvar,
    queue_tx: Sender<TriggerCall>,
    queue_rx: Receiver<TriggerCall>,
}

impl VoiceProxy {
    /// Wrap a backend pass-through node as the voice's audio sink.
    /// `queue_cap` bounds the pending-trigger queue; overflow drops the
    /// call with a logged error rather than growing without limit.
    pub fn new(sink: SharedNode, queue_cap: usize) -> Self {
        let (queue_tx, queue_rx) = bounded(queue_cap);
        VoiceProxy {
            sink,
            state: Mutex::new(VoiceState {
                bound: None,
                disposed: false,
            }),
            bound_cv: Condvar::new(),
            queue_tx,
            queue_rx,
        }
    }

    pub fn sink(&self) -> &SharedNode {
        &self.sink
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().bound.is_some()
    }

    /// Number of triggers waiting for the binding.
    pub fn pending(&self) -> usize {
        self.queue_rx.len()
    }

    /// Fulfil the deferred binding: connect the instrument's output into
    /// the sink and replay every queued trigger, in original order.
    ///
    /// A second bind on an already-bound or disposed proxy is refused with
    /// a diagnostic.
    pub fn bind(&self, instrument: Arc<dyn InstrumentNode>) {
        let mut state = self.state.lock();
        if state.disposed {
            warn!(sink = %self.sink.id(), "voice proxy already retired, ignoring bind");
            return;
        }
        if state.bound.is_some() {
            warn!(sink = %self.sink.id(), "voice proxy already bound, ignoring rebind");
            return;
        }
        if let Some(inlet) = self.sink.inlet() {
            instrument.connect(&inlet);
        }
        let mut replayed = 0usize;
        while let Ok(call) = self.queue_rx.try_recv() {
            call.apply(&instrument);
            replayed += 1;
        }
        debug!(
            sink = %self.sink.id(),
            instrument = %instrument.id(),
            replayed,
            "voice proxy bound"
        );
        state.bound = Some(instrument);
        self.bound_cv.notify_all();
    }

    /// Block until the binding resolves, up to `timeout`. The guard against
    /// a template that never materializes; without it a voice whose ref is
    /// lost queues triggers forever.
    pub fn await_bound(&self, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        let mut state = self.state.lock();
        while state.bound.is_none() {
            if self
                .bound_cv
                .wait_for(&mut state, timeout.saturating_sub(started.elapsed()))
                .timed_out()
                && state.bound.is_none()
            {
                return Err(Error::VoiceBindTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    fn deliver(&self, call: TriggerCall) {
        let state = self.state.lock();
        match &state.bound {
            Some(instrument) => {
                let instrument = instrument.clone();
                drop(state);
                call.apply(&instrument);
            }
            None => {
                if let Err(TrySendError::Full(call)) = self.queue_tx.try_send(call) {
                    error!(
                        sink = %self.sink.id(),
                        ?call,
                        "voice trigger queue full, dropping call"
                    );
                }
            }
        }
    }
}

impl AudioNode for VoiceProxy {
    fn id(&self) -> NodeId {
        self.sink.id()
    }

    fn inlet(&self) -> Option<Inlet> {
        self.sink.inlet()
    }

    fn connect(&self, target: &Inlet) {
        self.sink.connect(target);
    }

    fn disconnect(&self, target: &Inlet) {
        self.sink.disconnect(target);
    }

    fn disconnect_all(&self) {
        self.sink.disconnect_all();
    }

    /// Disposes the sink and, once resolved, the bound instrument.
    fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        if let Some(instrument) = state.bound.take() {
            instrument.disconnect_all();
            instrument.dispose();
        }
        self.sink.disconnect_all();
        self.sink.dispose();
    }
}

impl InstrumentNode for VoiceProxy {
    fn trigger_attack(&self, note: &str, time: f64, velocity: Option<f32>) {
        self.deliver(TriggerCall::Attack {
            note: note.to_string(),
            time,
            velocity,
        });
    }

    fn trigger_release(&self, time: f64) {
        self.deliver(TriggerCall::Release { time });
    }

    fn trigger_attack_release(
        &self,
        note: &str,
        duration: NoteDuration,
        time: f64,
        velocity: Option<f32>,
    ) {
        self.deliver(TriggerCall::AttackRelease {
            note: note.to_string(),
            duration,
            time,
            velocity,
        });
    }

    fn sync(&self) {
        if let Some(instrument) = self.state.lock().bound.clone() {
            instrument.sync();
        }
    }

    fn unsync(&self) {
        if let Some(instrument) = self.state.lock().bound.clone() {
            instrument.unsync();
        }
    }
}

struct SpawnedVoice {
    proxy: Arc<VoiceProxy>,
    // Keeps the voice's output edge and template subtree alive.
    _cord: PatchCord,
    template: MountedRack,
}

/// The interception point between a polyphonic engine and the declarative
/// layer.
///
/// Each `spawn` immediately returns a playable [`VoiceProxy`] and
/// synchronously mounts one more clone of the voice template, wired through
/// a [`NodeRef`] whose bind fulfils the proxy. The template's root must be
/// an instrument declaration carrying that ref and marked `detached()`;
/// the proxy does the wiring into its own sink.
pub struct VoiceSpawner {
    rack: Rack,
    ctx: RoutingContext,
    template: VoiceTemplate,
    queue_cap: usize,
    voices: Mutex<Vec<SpawnedVoice>>,
}

impl VoiceSpawner {
    pub fn new(rack: Rack, ctx: RoutingContext, template: VoiceTemplate, queue_cap: usize) -> Self {
        VoiceSpawner {
            rack,
            ctx,
            template,
            queue_cap,
            voices: Mutex::new(Vec::new()),
        }
    }

    /// Allocate one voice. The returned proxy is immediately usable; its
    /// sink is already patched into the chain captured at the container's
    /// mount point.
    pub fn spawn(&self) -> Result<Arc<VoiceProxy>> {
        let sink = self.rack.backend().make_gain();
        let cord = PatchCord::connect(sink.clone(), &self.ctx, None)?;
        let proxy = Arc::new(VoiceProxy::new(sink.clone(), self.queue_cap));

        let instrument_ref: NodeRef<dyn InstrumentNode> = NodeRef::new();
        let bind_target = proxy.clone();
        instrument_ref.watch(move |instrument| bind_target.bind(instrument.clone()));

        // Mounting the clone resolves the ref synchronously when the
        // template is well-formed; triggers issued before then queue.
        let blueprint = (self.template)(instrument_ref);
        let template = self
            .rack
            .mount(&blueprint, &RoutingContext::rooted(sink))?;

        debug!(sink = %proxy.id(), "voice spawned");
        self.voices.lock().push(SpawnedVoice {
            proxy: proxy.clone(),
            _cord: cord,
            template,
        });
        Ok(proxy)
    }

    /// Retire one voice: unmount its template clone and dispose the proxy
    /// (sink plus bound instrument).
    pub fn retire(&self, proxy: &Arc<VoiceProxy>) {
        let mut voices = self.voices.lock();
        if let Some(pos) = voices.iter().position(|v| Arc::ptr_eq(&v.proxy, proxy)) {
            let voice = voices.remove(pos);
            drop(voices);
            voice.template.unmount();
            voice.proxy.dispose();
            debug!(sink = %proxy.id(), "voice retired");
        }
    }

    /// Retire every live voice, most recent first.
    pub fn retire_all(&self) {
        let mut voices = std::mem::take(&mut *self.voices.lock());
        while let Some(voice) = voices.pop() {
            voice.template.unmount();
            voice.proxy.dispose();
        }
    }

    pub fn voice_count(&self) -> usize {
        self.voices.lock().len()
    }
}
