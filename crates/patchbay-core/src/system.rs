//! The system facade: one `Patchbay` owns the backend, transport, buses
//! and note bus, and gates mounting behind an explicit start.
//!
//! Audio engines commonly refuse to produce sound before a user gesture,
//! so `install` only stages a blueprint; nothing touches audio until
//! `start`, which mounts the tree with the root context bound to the
//! backend destination and starts the transport.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::blueprint::Blueprint;
use crate::bus::BusRegistry;
use crate::config::PatchbayConfig;
use crate::context::RoutingContext;
use crate::node::AudioBackend;
use crate::notes::NoteBus;
use crate::rack::{MountedRack, Rack};
use crate::transport::SharedTransport;
use crate::{Error, Result};

/// A complete orchestration system.
pub struct Patchbay {
    rack: Rack,
    staged: Mutex<Option<Blueprint>>,
    mounted: Mutex<Option<MountedRack>>,
}

impl Patchbay {
    /// Create a new system builder.
    pub fn builder() -> PatchbayBuilder {
        PatchbayBuilder::default()
    }

    /// Stage a blueprint without touching audio. Replaces any previously
    /// staged tree; a mounted tree is unaffected until `start`/`update`.
    pub fn install(&self, blueprint: Blueprint) {
        debug!(kind = blueprint.kind_name(), "blueprint installed");
        *self.staged.lock() = Some(blueprint);
    }

    /// The start gate: mount the staged tree at the destination-rooted
    /// context and start the transport. Call from the user-initiated
    /// action that unlocks the audio engine.
    pub fn start(&self) -> Result<()> {
        let mut mounted = self.mounted.lock();
        if mounted.is_some() {
            return Err(Error::AlreadyStarted);
        }
        let blueprint = self
            .staged
            .lock()
            .clone()
            .ok_or(Error::NothingInstalled)?;

        let ctx = RoutingContext::rooted(self.rack.backend().destination());
        *mounted = Some(self.rack.mount(&blueprint, &ctx)?);
        self.rack.transport().start();
        info!("patchbay started");
        Ok(())
    }

    /// Reconcile against a new blueprint. Before `start` this just
    /// replaces the staged tree; after it, surviving declarations keep
    /// their nodes and live props update in place.
    pub fn update(&self, blueprint: Blueprint) -> Result<()> {
        let mut mounted = self.mounted.lock();
        if let Some(tree) = mounted.as_mut() {
            let ctx = RoutingContext::rooted(self.rack.backend().destination());
            self.rack.update(tree, &blueprint, &ctx)?;
        }
        *self.staged.lock() = Some(blueprint);
        Ok(())
    }

    /// Unmount everything, children-first, and stop the transport. The
    /// staged blueprint survives, so a later `start` remounts it.
    pub fn stop(&self) {
        if let Some(tree) = self.mounted.lock().take() {
            tree.unmount();
            self.rack.transport().stop();
            info!("patchbay stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.mounted.lock().is_some()
    }

    /// The mount/update machinery, for advanced embedding (voice spawners
    /// hold one of these internally).
    pub fn rack(&self) -> &Rack {
        &self.rack
    }

    pub fn notes(&self) -> &NoteBus {
        self.rack.notes()
    }

    pub fn buses(&self) -> &BusRegistry {
        self.rack.buses()
    }

    pub fn transport(&self) -> &SharedTransport {
        self.rack.transport()
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        self.rack.backend()
    }

    pub fn config(&self) -> &PatchbayConfig {
        self.rack.config()
    }
}

impl Drop for Patchbay {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builder for [`Patchbay`]. Backend and transport are required; the
/// config is validated at build.
#[derive(Default)]
pub struct PatchbayBuilder {
    backend: Option<Arc<dyn AudioBackend>>,
    transport: Option<SharedTransport>,
    config: Option<PatchbayConfig>,
}

impl PatchbayBuilder {
    pub fn backend(mut self, backend: Arc<dyn AudioBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(mut self, config: PatchbayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Patchbay> {
        let backend = self
            .backend
            .ok_or_else(|| Error::InvalidConfig("no audio backend supplied".into()))?;
        let transport = self
            .transport
            .ok_or_else(|| Error::InvalidConfig("no transport supplied".into()))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let rack = Rack::new(
            backend,
            transport,
            NoteBus::new(),
            BusRegistry::new(),
            config,
        );
        Ok(Patchbay {
            rack,
            staged: Mutex::new(None),
            mounted: Mutex::new(None),
        })
    }
}
