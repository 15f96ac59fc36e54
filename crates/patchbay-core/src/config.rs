//! System configuration.

use crate::{Error, Result};
use std::time::Duration;

/// Configuration for a patchbay system.
#[derive(Debug, Clone)]
pub struct PatchbayConfig {
    /// Duration used for string note events when neither the event nor the
    /// adapter carries one, in seconds.
    pub fallback_duration: f64,

    /// Maximum trigger calls a voice proxy buffers while its binding is
    /// still pending. Overflow drops the call and logs an error.
    pub voice_queue_cap: usize,

    /// How long `VoiceProxy::await_bound` waits before reporting failure.
    pub voice_bind_timeout: Duration,
}

impl Default for PatchbayConfig {
    fn default() -> Self {
        Self {
            fallback_duration: 0.1,
            voice_queue_cap: 256,
            voice_bind_timeout: Duration::from_secs(5),
        }
    }
}

impl PatchbayConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fallback_duration.is_finite() || self.fallback_duration <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "fallback_duration {} must be positive and finite",
                self.fallback_duration
            )));
        }
        if self.voice_queue_cap == 0 {
            return Err(Error::InvalidConfig(
                "voice_queue_cap must be at least 1".into(),
            ));
        }
        if self.voice_bind_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "voice_bind_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
