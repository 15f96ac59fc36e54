//! The audio-node capability boundary.
//!
//! The core never renders audio. It drives opaque node handles supplied by a
//! backend through the small trait surface here: plain nodes route and
//! dispose, sources additionally follow the transport, instruments
//! additionally take timed trigger calls. `patchbay-sim` provides an
//! in-memory implementation; embedders wrap their engine's node type the
//! same way.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::notes::NoteDuration;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of one backend node.
///
/// Connection bookkeeping (patch cords, bus edges) compares identities, so
/// ids must be unique per node instance for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Mint a fresh id. Backends call this once per node they create.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A concrete place audio can be plugged into: a node's main input, or one
/// of its named control inputs (e.g. a filter's `"frequency"`).
///
/// Inlets are the unit of connection identity: a patch cord re-runs its
/// connect/disconnect pair only when the resolved inlet changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Inlet {
    pub node: NodeId,
    pub port: Option<String>,
}

impl Inlet {
    /// Main audio input of `node`.
    pub fn of(node: NodeId) -> Self {
        Inlet { node, port: None }
    }

    /// Named control input of `node`.
    pub fn control(node: NodeId, port: impl Into<String>) -> Self {
        Inlet {
            node,
            port: Some(port.into()),
        }
    }
}

impl fmt::Display for Inlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.port {
            Some(port) => write!(f, "{}.{}", self.node, port),
            None => write!(f, "{}", self.node),
        }
    }
}

/// Opaque handle to one backend DSP unit.
///
/// Constructor parameters are fixed before the handle reaches the core and
/// immutable afterwards. The core calls `connect`/`disconnect` in matched
/// pairs while the owning declaration is mounted, `disconnect_all` plus
/// `dispose` at teardown, and never touches the handle after `dispose`.
pub trait AudioNode: Send + Sync {
    fn id(&self) -> NodeId;

    /// The node's main audio input, or `None` if it accepts no input
    /// (pure sources). The default suits ordinary processing nodes.
    fn inlet(&self) -> Option<Inlet> {
        Some(Inlet::of(self.id()))
    }

    /// A named control input, or `None` if the node has no such control.
    fn control_inlet(&self, name: &str) -> Option<Inlet> {
        let _ = name;
        None
    }

    /// Route this node's output into `target`.
    fn connect(&self, target: &Inlet);

    /// Remove a route previously made with `connect`.
    fn disconnect(&self, target: &Inlet);

    /// Remove every outgoing route at once.
    fn disconnect_all(&self);

    /// Release backend resources. The handle is never used afterwards.
    fn dispose(&self);
}

/// Shared node handle, the currency of routing contexts and patch cords.
pub type SharedNode = Arc<dyn AudioNode>;

/// A node whose playback follows the transport rather than wall clock.
///
/// The lifecycle manager calls `sync()` then `start(0.0)` when the
/// declaration mounts and `unsync()` then `stop()` when it unmounts.
pub trait SourceNode: AudioNode {
    fn start(&self, time: f64);
    fn stop(&self);
    fn sync(&self);
    fn unsync(&self);
}

/// A node that plays timed notes.
///
/// `velocity` is `None` when the caller has no opinion; backends apply
/// their own default. Times are transport seconds.
pub trait InstrumentNode: AudioNode {
    fn trigger_attack(&self, note: &str, time: f64, velocity: Option<f32>);
    fn trigger_release(&self, time: f64);
    fn trigger_attack_release(
        &self,
        note: &str,
        duration: NoteDuration,
        time: f64,
        velocity: Option<f32>,
    );
    fn sync(&self);
    fn unsync(&self);
}

/// The backend collaborator: supplies the global destination and the two
/// utility node kinds the core mounts on its own behalf (channel strips for
/// bus endpoints, gains for voice-proxy sinks).
pub trait AudioBackend: Send + Sync {
    /// The global output. Root routing contexts target this node.
    fn destination(&self) -> SharedNode;

    /// A fresh pass-through channel strip.
    fn make_channel(&self) -> SharedNode;

    /// A fresh unity gain.
    fn make_gain(&self) -> SharedNode;
}

type Watcher<T> = Box<dyn Fn(&Arc<T>) + Send + Sync>;

struct NodeRefInner<T: ?Sized> {
    slot: Mutex<Option<Arc<T>>>,
    watchers: Mutex<Vec<Watcher<T>>>,
}

/// Forwarded reference to a node that does not exist yet.
///
/// A declaration site can hand a `NodeRef` to the mounting machinery; once
/// the node is created the ref binds and every watcher fires. The voice
/// proxy uses the instrument-typed form to learn when its template clone
/// has materialized.
///
/// # Example
///
/// ```ignore
/// let seen = NodeRef::new();
/// let bp = Blueprint::node(factory).node_ref(seen.clone());
/// let mounted = rack.mount(&bp, &ctx)?;
/// assert!(seen.is_bound());
/// ```
pub struct NodeRef<T: ?Sized = dyn AudioNode> {
    inner: Arc<NodeRefInner<T>>,
}

impl<T: ?Sized> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        NodeRef {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> Default for NodeRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> NodeRef<T> {
    pub fn new() -> Self {
        NodeRef {
            inner: Arc::new(NodeRefInner {
                slot: Mutex::new(None),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A ref with one watcher pre-installed.
    pub fn on_bind(f: impl Fn(&Arc<T>) + Send + Sync + 'static) -> Self {
        let r = Self::new();
        r.watch(f);
        r
    }

    /// Register a watcher. Fires immediately if the ref is already bound.
    pub fn watch(&self, f: impl Fn(&Arc<T>) + Send + Sync + 'static) {
        let bound = self.inner.slot.lock().clone();
        if let Some(node) = bound {
            f(&node);
        }
        self.inner.watchers.lock().push(Box::new(f));
    }

    /// Bind the materialized node and notify watchers, in registration
    /// order. Called by the mounting machinery when the node is created.
    pub fn bind(&self, node: Arc<T>) {
        *self.inner.slot.lock() = Some(node.clone());
        for watcher in self.inner.watchers.lock().iter() {
            watcher(&node);
        }
    }

    /// Drop the binding (the owning declaration unmounted). Watchers stay
    /// registered for a potential rebind.
    pub fn clear(&self) {
        *self.inner.slot.lock() = None;
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.slot.lock().clone()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.slot.lock().is_some()
    }
}
