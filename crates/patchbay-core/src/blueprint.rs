//! Blueprints: the declarative side of the system.
//!
//! A blueprint is a value describing a subtree of audio declarations; the
//! rack turns it into live nodes and connections. Factories are the
//! parameter snapshot: the closure captures whatever parameters the
//! author wrote, is invoked exactly once at first mount, and is never
//! re-read on re-declaration. Intentional non-reactivity: audio nodes are
//! expensive to reconstruct.

use std::sync::Arc;

use crate::node::{InstrumentNode, NodeRef, SharedNode, SourceNode};
use crate::notes::NoteDuration;
use crate::pattern::PatternSpec;
use crate::voice::VoiceSpawner;

/// Creates the backend node for a plain declaration.
pub type NodeFactory = Arc<dyn Fn() -> SharedNode + Send + Sync>;

/// Creates a transport-following source node.
pub type SourceFactory = Arc<dyn Fn() -> Arc<dyn SourceNode> + Send + Sync>;

/// Creates an instrument node.
pub type InstrumentFactory = Arc<dyn Fn() -> Arc<dyn InstrumentNode> + Send + Sync>;

/// Builds one voice-template clone. The spawner passes the ref whose bind
/// fulfils the voice proxy; the returned tree's root must be an instrument
/// declaration carrying that ref and marked [`Blueprint::detached`].
pub type VoiceTemplate = Arc<dyn Fn(NodeRef<dyn InstrumentNode>) -> Blueprint + Send + Sync>;

#[derive(Clone)]
pub(crate) enum BlueprintKind {
    Node {
        factory: NodeFactory,
        port: Option<String>,
        node_ref: Option<NodeRef>,
        detached: bool,
    },
    Source {
        factory: SourceFactory,
        port: Option<String>,
        node_ref: Option<NodeRef<dyn SourceNode>>,
    },
    Instrument {
        factory: InstrumentFactory,
        topic: Option<String>,
        duration: Option<NoteDuration>,
        velocity: Option<f32>,
        synced: bool,
        port: Option<String>,
        instrument_ref: Option<NodeRef<dyn InstrumentNode>>,
        detached: bool,
    },
    Channel {
        send: Option<String>,
        receive: Option<String>,
    },
    Pattern {
        spec: PatternSpec,
    },
    PolyVoices {
        template: VoiceTemplate,
        pool_ref: Option<NodeRef<VoiceSpawner>>,
    },
    Group,
}

/// One declaration and its children.
///
/// # Example
///
/// ```ignore
/// let patch = Blueprint::node(move || rig.reverb(5.0))
///     .child(Blueprint::instrument(move || rig.mono_synth())
///         .topic("bassline")
///         .duration("8n"));
/// ```
#[derive(Clone)]
pub struct Blueprint {
    pub(crate) kind: BlueprintKind,
    pub(crate) children: Vec<Blueprint>,
}

impl Blueprint {
    fn with_kind(kind: BlueprintKind) -> Self {
        Blueprint {
            kind,
            children: Vec::new(),
        }
    }

    /// A plain processing node. Connects to the ambient target at mount and
    /// becomes the target for its own children.
    pub fn node<F>(factory: F) -> Self
    where
        F: Fn() -> SharedNode + Send + Sync + 'static,
    {
        Self::with_kind(BlueprintKind::Node {
            factory: Arc::new(factory),
            port: None,
            node_ref: None,
            detached: false,
        })
    }

    /// A source node: additionally synced to the transport and started at
    /// position zero while mounted.
    pub fn source<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn SourceNode> + Send + Sync + 'static,
    {
        Self::with_kind(BlueprintKind::Source {
            factory: Arc::new(factory),
            port: None,
            node_ref: None,
        })
    }

    /// An instrument node, optionally subscribed to a note topic. Synced to
    /// the transport by default; opt out with [`Blueprint::unsynced`].
    pub fn instrument<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn InstrumentNode> + Send + Sync + 'static,
    {
        Self::with_kind(BlueprintKind::Instrument {
            factory: Arc::new(factory),
            topic: None,
            duration: None,
            velocity: None,
            synced: true,
            port: None,
            instrument_ref: None,
            detached: false,
        })
    }

    /// A channel strip. Without `send`, connects to the ambient target like
    /// any node; with it, routes to the named bus instead.
    pub fn channel() -> Self {
        Self::with_kind(BlueprintKind::Channel {
            send: None,
            receive: None,
        })
    }

    /// A pattern player producing notes on the pattern's topic.
    pub fn pattern(spec: PatternSpec) -> Self {
        Self::with_kind(BlueprintKind::Pattern { spec })
    }

    /// A polyphonic voice pool. Access the spawner through
    /// [`Blueprint::pool_ref`].
    pub fn poly_voices<F>(template: F) -> Self
    where
        F: Fn(NodeRef<dyn InstrumentNode>) -> Blueprint + Send + Sync + 'static,
    {
        Self::with_kind(BlueprintKind::PolyVoices {
            template: Arc::new(template),
            pool_ref: None,
        })
    }

    /// A transparent grouping: no node of its own, children inherit the
    /// ambient target.
    pub fn group() -> Self {
        Self::with_kind(BlueprintKind::Group)
    }

    /// Connect to a named control input of the ambient target instead of
    /// its main input (e.g. an LFO onto a filter's `"frequency"`).
    /// Captured at mount; changing it requires remounting.
    pub fn port(mut self, name: impl Into<String>) -> Self {
        match &mut self.kind {
            BlueprintKind::Node { port, .. }
            | BlueprintKind::Source { port, .. }
            | BlueprintKind::Instrument { port, .. } => *port = Some(name.into()),
            _ => {}
        }
        self
    }

    /// Skip the hierarchical connection; the owner wires the node itself.
    /// Voice templates use this on their root instrument.
    pub fn detached(mut self) -> Self {
        match &mut self.kind {
            BlueprintKind::Node { detached, .. }
            | BlueprintKind::Instrument { detached, .. } => *detached = true,
            _ => {}
        }
        self
    }

    /// Forward the created node through a ref once it materializes.
    pub fn node_ref(mut self, r: NodeRef) -> Self {
        if let BlueprintKind::Node { node_ref, .. } = &mut self.kind {
            *node_ref = Some(r);
        }
        self
    }

    pub fn source_ref(mut self, r: NodeRef<dyn SourceNode>) -> Self {
        if let BlueprintKind::Source { node_ref, .. } = &mut self.kind {
            *node_ref = Some(r);
        }
        self
    }

    pub fn instrument_ref(mut self, r: NodeRef<dyn InstrumentNode>) -> Self {
        if let BlueprintKind::Instrument { instrument_ref, .. } = &mut self.kind {
            *instrument_ref = Some(r);
        }
        self
    }

    /// Note topic this instrument consumes. Fixed at mount; a changed topic
    /// on re-declaration is ignored.
    pub fn topic(mut self, t: impl Into<String>) -> Self {
        if let BlueprintKind::Instrument { topic, .. } = &mut self.kind {
            *topic = Some(t.into());
        }
        self
    }

    /// Default note duration, live across re-declaration.
    pub fn duration(mut self, d: impl Into<NoteDuration>) -> Self {
        if let BlueprintKind::Instrument { duration, .. } = &mut self.kind {
            *duration = Some(d.into());
        }
        self
    }

    /// Default note velocity, live across re-declaration.
    pub fn velocity(mut self, v: f32) -> Self {
        if let BlueprintKind::Instrument { velocity, .. } = &mut self.kind {
            *velocity = Some(v);
        }
        self
    }

    /// Leave the instrument on wall-clock time instead of syncing it to the
    /// transport at mount.
    pub fn unsynced(mut self) -> Self {
        if let BlueprintKind::Instrument { synced, .. } = &mut self.kind {
            *synced = false;
        }
        self
    }

    /// Route this channel's output onto the named bus.
    pub fn send(mut self, label: impl Into<String>) -> Self {
        if let BlueprintKind::Channel { send, .. } = &mut self.kind {
            *send = Some(label.into());
        }
        self
    }

    /// Additionally receive audio from the named bus.
    pub fn receive(mut self, label: impl Into<String>) -> Self {
        if let BlueprintKind::Channel { receive, .. } = &mut self.kind {
            *receive = Some(label.into());
        }
        self
    }

    pub fn pool_ref(mut self, r: NodeRef<VoiceSpawner>) -> Self {
        if let BlueprintKind::PolyVoices { pool_ref, .. } = &mut self.kind {
            *pool_ref = Some(r);
        }
        self
    }

    /// Append one child declaration.
    pub fn child(mut self, child: Blueprint) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children.
    pub fn children(mut self, children: impl IntoIterator<Item = Blueprint>) -> Self {
        self.children.extend(children);
        self
    }

    /// Name of the declaration kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            BlueprintKind::Node { .. } => "node",
            BlueprintKind::Source { .. } => "source",
            BlueprintKind::Instrument { .. } => "instrument",
            BlueprintKind::Channel { .. } => "channel",
            BlueprintKind::Pattern { .. } => "pattern",
            BlueprintKind::PolyVoices { .. } => "poly-voices",
            BlueprintKind::Group => "group",
        }
    }
}

impl std::fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint")
            .field("kind", &self.kind_name())
            .field("children", &self.children)
            .finish()
    }
}
