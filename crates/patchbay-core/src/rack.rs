//! The rack: turns blueprints into live nodes and keeps them alive for
//! exactly as long as they stay declared.
//!
//! Mounting is strictly ordered: a parent's routing target is established
//! before its children connect, and teardown runs children-first in
//! reverse. Re-applying a changed blueprint reconciles positionally: a
//! surviving declaration keeps its node (the factory is never re-invoked),
//! live props update in place, and a kind mismatch replaces the whole
//! subtree.

use std::sync::Arc;
use tracing::debug;

use crate::blueprint::{Blueprint, BlueprintKind};
use crate::bus::BusRegistry;
use crate::channel::Channel;
use crate::config::PatchbayConfig;
use crate::context::RoutingContext;
use crate::instrument::{InstrumentBinding, NoteDefaults};
use crate::node::{AudioBackend, InstrumentNode, NodeRef, SharedNode, SourceNode};
use crate::notes::NoteBus;
use crate::patch::PatchCord;
use crate::pattern::PatternPlayer;
use crate::voice::VoiceSpawner;
use crate::Result;

struct RackInner {
    backend: Arc<dyn AudioBackend>,
    transport: crate::transport::SharedTransport,
    notes: NoteBus,
    buses: BusRegistry,
    config: PatchbayConfig,
}

/// The service bundle every mount operation draws on. Clones share it;
/// voice spawners carry one to mount template clones later.
#[derive(Clone)]
pub struct Rack {
    inner: Arc<RackInner>,
}

impl Rack {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        transport: crate::transport::SharedTransport,
        notes: NoteBus,
        buses: BusRegistry,
        config: PatchbayConfig,
    ) -> Self {
        Rack {
            inner: Arc::new(RackInner {
                backend,
                transport,
                notes,
                buses,
                config,
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.inner.backend
    }

    pub fn transport(&self) -> &crate::transport::SharedTransport {
        &self.inner.transport
    }

    pub fn notes(&self) -> &NoteBus {
        &self.inner.notes
    }

    pub fn buses(&self) -> &BusRegistry {
        &self.inner.buses
    }

    pub fn config(&self) -> &PatchbayConfig {
        &self.inner.config
    }

    /// Mount a blueprint tree under `ctx`. Parents connect before children;
    /// a failure anywhere tears the partial subtree back down before
    /// reporting.
    pub fn mount(&self, blueprint: &Blueprint, ctx: &RoutingContext) -> Result<MountedRack> {
        let root = self.mount_instance(blueprint, ctx)?;
        Ok(MountedRack { root: Some(root) })
    }

    /// Reconcile a mounted tree against a new blueprint.
    pub fn update(
        &self,
        mounted: &mut MountedRack,
        blueprint: &Blueprint,
        ctx: &RoutingContext,
    ) -> Result<()> {
        match mounted.root.as_mut() {
            Some(root) => self.update_instance(root, blueprint, ctx),
            None => {
                mounted.root = Some(self.mount_instance(blueprint, ctx)?);
                Ok(())
            }
        }
    }

    fn mount_instance(&self, bp: &Blueprint, ctx: &RoutingContext) -> Result<MountedInstance> {
        let (payload, child_ctx) = self.mount_payload(bp, ctx)?;
        debug!(kind = bp.kind_name(), "declaration mounted");

        let mut instance = MountedInstance {
            payload,
            children: Vec::new(),
        };
        for child in &bp.children {
            match self.mount_instance(child, &child_ctx) {
                Ok(mounted) => instance.children.push(mounted),
                Err(e) => {
                    instance.unmount();
                    return Err(e);
                }
            }
        }
        Ok(instance)
    }

    fn mount_payload(
        &self,
        bp: &Blueprint,
        ctx: &RoutingContext,
    ) -> Result<(Payload, RoutingContext)> {
        match &bp.kind {
            BlueprintKind::Node {
                factory,
                port,
                node_ref,
                detached,
            } => {
                let node = factory();
                let cord = if *detached {
                    None
                } else {
                    match PatchCord::connect(node.clone(), ctx, port.as_deref()) {
                        Ok(cord) => Some(cord),
                        Err(e) => {
                            node.dispose();
                            return Err(e);
                        }
                    }
                };
                if let Some(r) = node_ref {
                    r.bind(node.clone());
                }
                let child_ctx = ctx.scoped(node.clone());
                Ok((
                    Payload::Node {
                        node,
                        cord,
                        node_ref: node_ref.clone(),
                    },
                    child_ctx,
                ))
            }
            BlueprintKind::Source {
                factory,
                port,
                node_ref,
            } => {
                let node = factory();
                let shared: SharedNode = node.clone();
                let cord = match PatchCord::connect(shared.clone(), ctx, port.as_deref()) {
                    Ok(cord) => cord,
                    Err(e) => {
                        node.dispose();
                        return Err(e);
                    }
                };
                // Bind playback to transport position, then schedule from
                // its beginning.
                node.sync();
                node.start(0.0);
                if let Some(r) = node_ref {
                    r.bind(node.clone());
                }
                let child_ctx = ctx.scoped(shared);
                Ok((
                    Payload::Source {
                        node,
                        cord: Some(cord),
                        node_ref: node_ref.clone(),
                    },
                    child_ctx,
                ))
            }
            BlueprintKind::Instrument {
                factory,
                topic,
                duration,
                velocity,
                synced,
                port,
                instrument_ref,
                detached,
            } => {
                let instrument = factory();
                let shared: SharedNode = instrument.clone();
                let cord = if *detached {
                    None
                } else {
                    match PatchCord::connect(shared.clone(), ctx, port.as_deref()) {
                        Ok(cord) => Some(cord),
                        Err(e) => {
                            instrument.dispose();
                            return Err(e);
                        }
                    }
                };
                let defaults = NoteDefaults::new(duration.clone(), *velocity);
                let binding = InstrumentBinding::mount(
                    instrument.clone(),
                    &self.inner.notes,
                    topic.as_deref(),
                    defaults,
                    *synced,
                    self.inner.config.fallback_duration,
                );
                if let Some(r) = instrument_ref {
                    r.bind(instrument);
                }
                let child_ctx = ctx.scoped(shared);
                Ok((
                    Payload::Instrument {
                        binding,
                        cord,
                        instrument_ref: instrument_ref.clone(),
                    },
                    child_ctx,
                ))
            }
            BlueprintKind::Channel { send, receive } => {
                let node = self.inner.backend.make_channel();
                let channel = Arc::new(Channel::new(node.clone(), self.inner.buses.clone()));
                // Sending replaces the hierarchical output.
                let cord = match send {
                    Some(label) => {
                        channel.send(label);
                        None
                    }
                    None => match PatchCord::connect(node.clone(), ctx, None) {
                        Ok(cord) => Some(cord),
                        Err(e) => {
                            channel.dispose();
                            return Err(e);
                        }
                    },
                };
                if let Some(label) = receive {
                    channel.receive(label);
                }
                let child_ctx = ctx.scoped(node);
                Ok((
                    Payload::Channel {
                        channel,
                        cord,
                        declared_send: send.clone(),
                        declared_receive: receive.clone(),
                    },
                    child_ctx,
                ))
            }
            BlueprintKind::Pattern { spec } => {
                let player =
                    PatternPlayer::mount(spec, self.inner.transport.clone(), &self.inner.notes);
                Ok((Payload::Pattern { player }, ctx.clone()))
            }
            BlueprintKind::PolyVoices { template, pool_ref } => {
                let spawner = Arc::new(VoiceSpawner::new(
                    self.clone(),
                    ctx.clone(),
                    template.clone(),
                    self.inner.config.voice_queue_cap,
                ));
                if let Some(r) = pool_ref {
                    r.bind(spawner.clone());
                }
                Ok((
                    Payload::PolyVoices {
                        spawner,
                        pool_ref: pool_ref.clone(),
                    },
                    ctx.clone(),
                ))
            }
            BlueprintKind::Group => Ok((Payload::Group, ctx.clone())),
        }
    }

    fn update_instance(
        &self,
        instance: &mut MountedInstance,
        bp: &Blueprint,
        ctx: &RoutingContext,
    ) -> Result<()> {
        if !instance.payload.matches(&bp.kind) {
            // Kind changed at this position: replace the whole subtree.
            // The old one releases its resources (bus slots included)
            // before the new one claims anything.
            let old = std::mem::replace(
                instance,
                MountedInstance {
                    payload: Payload::Group,
                    children: Vec::new(),
                },
            );
            old.unmount();
            *instance = self.mount_instance(bp, ctx)?;
            return Ok(());
        }

        let child_ctx = self.update_payload(&mut instance.payload, &bp.kind, ctx)?;

        let keep = instance.children.len().min(bp.children.len());
        for (child, child_bp) in instance.children[..keep]
            .iter_mut()
            .zip(&bp.children[..keep])
        {
            self.update_instance(child, child_bp, &child_ctx)?;
        }
        // Surplus mounted children unmount last-first.
        while instance.children.len() > bp.children.len() {
            if let Some(child) = instance.children.pop() {
                child.unmount();
            }
        }
        for child_bp in &bp.children[keep..] {
            instance
                .children
                .push(self.mount_instance(child_bp, &child_ctx)?);
        }
        Ok(())
    }

    fn update_payload(
        &self,
        payload: &mut Payload,
        kind: &BlueprintKind,
        ctx: &RoutingContext,
    ) -> Result<RoutingContext> {
        match (payload, kind) {
            (Payload::Node { node, cord, .. }, BlueprintKind::Node { .. }) => {
                // Factory, port and ref are all fixed at mount; only the
                // ambient target can move.
                if let Some(cord) = cord {
                    cord.retarget(ctx)?;
                }
                Ok(ctx.scoped(node.clone()))
            }
            (Payload::Source { node, cord, .. }, BlueprintKind::Source { .. }) => {
                if let Some(cord) = cord {
                    cord.retarget(ctx)?;
                }
                let shared: SharedNode = node.clone();
                Ok(ctx.scoped(shared))
            }
            (
                Payload::Instrument { binding, cord, .. },
                BlueprintKind::Instrument {
                    duration, velocity, ..
                },
            ) => {
                // Topic and synced mode stay as mounted; duration and
                // velocity are live props.
                binding.defaults().set(duration.clone(), *velocity);
                if let Some(cord) = cord {
                    cord.retarget(ctx)?;
                }
                let shared: SharedNode = binding.instrument().clone();
                Ok(ctx.scoped(shared))
            }
            (
                Payload::Channel {
                    channel,
                    cord,
                    declared_send,
                    declared_receive,
                },
                BlueprintKind::Channel { send, receive },
            ) => {
                if send != declared_send {
                    if declared_send.is_some() {
                        channel.unbind_send();
                    }
                    if let Some(label) = send {
                        // Hierarchical output gives way to the bus. Once a
                        // send happened it never comes back, even if the
                        // send itself goes away again.
                        cord.take();
                        channel.send(label);
                    }
                    *declared_send = send.clone();
                }
                if receive != declared_receive {
                    if declared_receive.is_some() {
                        channel.unbind_receive();
                    }
                    if let Some(label) = receive {
                        channel.receive(label);
                    }
                    *declared_receive = receive.clone();
                }
                if let Some(cord) = cord {
                    cord.retarget(ctx)?;
                }
                Ok(ctx.scoped(channel.node().clone()))
            }
            (Payload::Pattern { .. }, BlueprintKind::Pattern { .. }) => {
                // Step data is captured at mount, like node params.
                Ok(ctx.clone())
            }
            (Payload::PolyVoices { .. }, BlueprintKind::PolyVoices { .. }) => Ok(ctx.clone()),
            (Payload::Group, BlueprintKind::Group) => Ok(ctx.clone()),
            // matches() rules this out.
            _ => Ok(ctx.clone()),
        }
    }
}

enum Payload {
    Node {
        node: SharedNode,
        cord: Option<PatchCord>,
        node_ref: Option<NodeRef>,
    },
    Source {
        node: Arc<dyn SourceNode>,
        cord: Option<PatchCord>,
        node_ref: Option<NodeRef<dyn SourceNode>>,
    },
    Instrument {
        binding: InstrumentBinding,
        cord: Option<PatchCord>,
        instrument_ref: Option<NodeRef<dyn InstrumentNode>>,
    },
    Channel {
        channel: Arc<Channel>,
        cord: Option<PatchCord>,
        declared_send: Option<String>,
        declared_receive: Option<String>,
    },
    Pattern {
        player: PatternPlayer,
    },
    PolyVoices {
        spawner: Arc<VoiceSpawner>,
        pool_ref: Option<NodeRef<VoiceSpawner>>,
    },
    Group,
}

impl Payload {
    fn matches(&self, kind: &BlueprintKind) -> bool {
        matches!(
            (self, kind),
            (Payload::Node { .. }, BlueprintKind::Node { .. })
                | (Payload::Source { .. }, BlueprintKind::Source { .. })
                | (Payload::Instrument { .. }, BlueprintKind::Instrument { .. })
                | (Payload::Channel { .. }, BlueprintKind::Channel { .. })
                | (Payload::Pattern { .. }, BlueprintKind::Pattern { .. })
                | (Payload::PolyVoices { .. }, BlueprintKind::PolyVoices { .. })
                | (Payload::Group, BlueprintKind::Group)
        )
    }

    fn unmount(self) {
        match self {
            Payload::Node {
                node,
                cord,
                node_ref,
            } => {
                drop(cord);
                if let Some(r) = node_ref {
                    r.clear();
                }
                node.disconnect_all();
                node.dispose();
            }
            Payload::Source {
                node,
                cord,
                node_ref,
            } => {
                drop(cord);
                node.unsync();
                node.stop();
                if let Some(r) = node_ref {
                    r.clear();
                }
                node.disconnect_all();
                node.dispose();
            }
            Payload::Instrument {
                binding,
                cord,
                instrument_ref,
            } => {
                drop(cord);
                let instrument = binding.instrument().clone();
                // Unsubscribes and, in synced mode, unsyncs.
                drop(binding);
                if let Some(r) = instrument_ref {
                    r.clear();
                }
                instrument.disconnect_all();
                instrument.dispose();
            }
            Payload::Channel { channel, cord, .. } => {
                drop(cord);
                channel.dispose();
            }
            Payload::Pattern { player } => drop(player),
            Payload::PolyVoices { spawner, pool_ref } => {
                if let Some(r) = pool_ref {
                    r.clear();
                }
                spawner.retire_all();
            }
            Payload::Group => {}
        }
    }
}

struct MountedInstance {
    payload: Payload,
    children: Vec<MountedInstance>,
}

impl MountedInstance {
    fn unmount(mut self) {
        while let Some(child) = self.children.pop() {
            child.unmount();
        }
        self.payload.unmount();
    }
}

/// A live tree of mounted declarations. Unmounts on drop, in
/// reverse-acquisition order.
pub struct MountedRack {
    root: Option<MountedInstance>,
}

impl MountedRack {
    /// Tear the tree down now, children before parents.
    pub fn unmount(mut self) {
        if let Some(root) = self.root.take() {
            root.unmount();
        }
    }
}

impl Drop for MountedRack {
    fn drop(&mut self) {
        if let Some(root) = self.root.take() {
            root.unmount();
        }
    }
}
