//! PatchbayEngine facade over the routing core.

use std::sync::Arc;
use tracing::info;

use crate::core::{
    AudioBackend, Blueprint, BusRegistry, NoteBus, Patchbay, PatchbayConfig, Rack, Result,
    SharedTransport,
};

/// Main engine handle.
///
/// PatchbayEngine wraps patchbay-core's [`Patchbay`] system: a staged
/// blueprint, a mount/reconcile rack, named buses, and the note transport.
/// The engine never starts on its own: `install()` stages a patch
/// silently, and `start()` mounts it and opens the clock when the embedder
/// decides the moment has come (typically after a user gesture).
///
/// # Example
///
/// ```ignore
/// use patchbay::prelude::*;
///
/// let rig = VirtualRig::new();
/// let engine = PatchbayEngine::builder()
///     .backend(Arc::new(rig.clone()))
///     .transport(Arc::new(StepClock::new(120.0)))
///     .build()?;
///
/// engine.install(my_patch());
/// engine.start()?;
///
/// // Later: describe a different patch; the rack reconciles in place.
/// engine.update(my_patch_with_more_reverb())?;
/// ```
pub struct PatchbayEngine {
    system: Patchbay,
}

impl PatchbayEngine {
    /// Create a new engine builder
    pub fn builder() -> crate::PatchbayEngineBuilder {
        crate::PatchbayEngineBuilder::default()
    }

    /// Stage a blueprint without mounting it. Replaces any previously
    /// staged patch; if the engine is already started, prefer `update()`.
    pub fn install(&self, blueprint: Blueprint) {
        self.system.install(blueprint)
    }

    /// Mount the staged patch and start the transport.
    ///
    /// Errors with [`Error::AlreadyStarted`](crate::Error::AlreadyStarted)
    /// on a second call and
    /// [`Error::NothingInstalled`](crate::Error::NothingInstalled) when no
    /// patch has been staged.
    pub fn start(&self) -> Result<()> {
        self.system.start()?;
        info!("patchbay engine started");
        Ok(())
    }

    /// Replace the current description. Reconciles the mounted tree in
    /// place when started; otherwise just restages.
    pub fn update(&self, blueprint: Blueprint) -> Result<()> {
        self.system.update(blueprint)
    }

    /// Unmount everything and stop the transport. Idempotent.
    pub fn stop(&self) {
        self.system.stop();
        info!("patchbay engine stopped");
    }

    pub fn is_started(&self) -> bool {
        self.system.is_started()
    }

    /// The mount/reconcile machinery, for embedders driving trees directly.
    pub fn rack(&self) -> &Rack {
        self.system.rack()
    }

    /// The note event bus. Emit here to drive mounted instruments.
    pub fn notes(&self) -> &NoteBus {
        self.system.notes()
    }

    /// Named send/receive bus registry.
    pub fn buses(&self) -> &BusRegistry {
        self.system.buses()
    }

    pub fn transport(&self) -> &SharedTransport {
        self.system.transport()
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        self.system.backend()
    }

    pub fn config(&self) -> &PatchbayConfig {
        self.system.config()
    }

    /// Internal: create engine from builder
    pub(crate) fn from_system(system: Patchbay) -> Self {
        Self { system }
    }
}
