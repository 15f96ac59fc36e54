//! Builder for configuring and constructing a `PatchbayEngine`.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{AudioBackend, Patchbay, PatchbayConfig, SharedTransport};
use crate::{PatchbayEngine, Result};

/// The backend and transport collaborators are required; everything else
/// has working defaults. With the `sim` feature, `.virtual_rig(bpm)` wires
/// in the in-memory backend and step clock in one call.
///
/// # Example
///
/// ```ignore
/// use patchbay::prelude::*;
///
/// let engine = PatchbayEngine::builder()
///     .backend(Arc::new(rig))
///     .transport(Arc::new(StepClock::new(120.0)))
///     .fallback_duration(0.25)
///     .build()?;
/// ```
#[derive(Default)]
pub struct PatchbayEngineBuilder {
    backend: Option<Arc<dyn AudioBackend>>,
    transport: Option<SharedTransport>,
    fallback_duration: Option<f64>,
    voice_queue_cap: Option<usize>,
    voice_bind_timeout: Option<Duration>,
}

impl PatchbayEngineBuilder {
    pub fn backend(mut self, backend: Arc<dyn AudioBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Duration for string note events that carry none, in seconds.
    /// Default: 0.1
    pub fn fallback_duration(mut self, seconds: f64) -> Self {
        self.fallback_duration = Some(seconds);
        self
    }

    /// Trigger calls a voice proxy buffers before its instrument binds.
    /// Default: 256
    pub fn voice_queue_cap(mut self, cap: usize) -> Self {
        self.voice_queue_cap = Some(cap);
        self
    }

    /// How long `VoiceProxy::await_bound` waits. Default: 5 s
    pub fn voice_bind_timeout(mut self, timeout: Duration) -> Self {
        self.voice_bind_timeout = Some(timeout);
        self
    }

    /// Use the in-memory `VirtualRig` backend and a `StepClock` at the
    /// given tempo. Overwrites any backend/transport set earlier.
    #[cfg(feature = "sim")]
    pub fn virtual_rig(mut self, bpm: f64) -> Self {
        self.backend = Some(Arc::new(patchbay_sim::VirtualRig::new()));
        self.transport = Some(Arc::new(patchbay_sim::StepClock::new(bpm)));
        self
    }

    pub fn build(self) -> Result<PatchbayEngine> {
        let mut config = PatchbayConfig::default();
        if let Some(seconds) = self.fallback_duration {
            config.fallback_duration = seconds;
        }
        if let Some(cap) = self.voice_queue_cap {
            config.voice_queue_cap = cap;
        }
        if let Some(timeout) = self.voice_bind_timeout {
            config.voice_bind_timeout = timeout;
        }

        let mut builder = Patchbay::builder().config(config);
        if let Some(backend) = self.backend {
            builder = builder.backend(backend);
        }
        if let Some(transport) = self.transport {
            builder = builder.transport(transport);
        }

        let system = builder.build()?;
        Ok(PatchbayEngine::from_system(system))
    }
}
