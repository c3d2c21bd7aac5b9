//! Output context.
//!
//! An [`OutputContext`] describes where rendered audio goes and carries
//! the shared state that outlives any one track: the output volume, the
//! running/suspended flag, and the one-chain-per-context claim. The cpal
//! stream itself is not held here; it is created on the render worker
//! thread because streams must stay on the thread that built them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};
use parking_lot::Mutex;
use sonic_core::{Error, Result};
use tracing::info;

use crate::devices::{detect_connectivity, Connectivity};

/// Sample rate used when no real device is bound.
const DETACHED_SAMPLE_RATE: u32 = 48_000;

/// Whether the context is delivering audio or has been put to sleep by
/// the host (autoplay policy, app background, device sleep).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
}

/// Where rendered blocks end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBackend {
    /// The host's default output device, opened by the render worker.
    DefaultDevice,
    /// No device; blocks are rendered and discarded at real-time pace.
    Detached,
}

/// Shared output-side state. Always used behind an [`Arc`]; the render
/// worker, the orchestrator, and the UI thread all hold clones.
#[derive(Debug)]
pub struct OutputContext {
    name: String,
    backend: OutputBackend,
    sample_rate: u32,
    state: Mutex<ContextState>,
    volume: Mutex<f32>,
    chain_claimed: AtomicBool,
}

impl OutputContext {
    /// Open the default output device and capture its configuration.
    pub fn open_default() -> Result<Arc<Self>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DeviceUnavailable("no default output device".into()))?;
        let name = device
            .name()
            .map_err(|e| Error::DeviceUnavailable(format!("device name unavailable: {e}")))?;
        let config = device
            .default_output_config()
            .map_err(|e| Error::DeviceUnavailable(format!("no output config: {e}")))?;

        let sample_rate = config.sample_rate().0;
        info!(device = %name, sample_rate, "output context opened");

        Ok(Arc::new(Self {
            name,
            backend: OutputBackend::DefaultDevice,
            sample_rate,
            state: Mutex::new(ContextState::Running),
            volume: Mutex::new(1.0),
            chain_claimed: AtomicBool::new(false),
        }))
    }

    /// A context with no device behind it. Used by tests and by hosts
    /// that only want the chain's analysis output.
    pub fn detached(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            backend: OutputBackend::Detached,
            sample_rate: DETACHED_SAMPLE_RATE,
            state: Mutex::new(ContextState::Running),
            volume: Mutex::new(1.0),
            chain_claimed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn backend(&self) -> OutputBackend {
        self.backend
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn connectivity(&self) -> Connectivity {
        detect_connectivity(&self.name)
    }

    pub fn state(&self) -> ContextState {
        *self.state.lock()
    }

    pub fn suspend(&self) {
        *self.state.lock() = ContextState::Suspended;
    }

    /// Wake a suspended context. Playback intents must call this before
    /// rendering resumes; a suspended context renders nothing.
    pub fn resume(&self) {
        *self.state.lock() = ContextState::Running;
    }

    /// Output volume in `0.0..=1.0`. Applied after the chain, so the
    /// spectrum feed sees pre-volume samples.
    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 1.0);
    }

    /// Claim the single signal chain slot for this context.
    pub fn try_claim_chain(&self) -> Result<()> {
        if self.chain_claimed.swap(true, Ordering::AcqRel) {
            return Err(Error::ChainAlreadyBuilt(self.name.clone()));
        }
        Ok(())
    }

    /// Release the chain slot on teardown so a new chain may be built.
    pub fn release_chain(&self) {
        self.chain_claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_second_chain_claim_is_rejected() {
        let ctx = OutputContext::detached("test");
        assert!(ctx.try_claim_chain().is_ok());
        let err = ctx.try_claim_chain().unwrap_err();
        assert!(matches!(err, Error::ChainAlreadyBuilt(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_release_allows_rebuild() {
        let ctx = OutputContext::detached("test");
        ctx.try_claim_chain().unwrap();
        ctx.release_chain();
        assert!(ctx.try_claim_chain().is_ok());
    }

    #[test]
    fn test_volume_is_clamped() {
        let ctx = OutputContext::detached("test");
        ctx.set_volume(1.7);
        assert!((ctx.volume() - 1.0).abs() < f32::EPSILON);
        ctx.set_volume(-0.2);
        assert!(ctx.volume().abs() < f32::EPSILON);
    }

    #[test]
    fn test_suspend_and_resume() {
        let ctx = OutputContext::detached("test");
        assert_eq!(ctx.state(), ContextState::Running);
        ctx.suspend();
        assert_eq!(ctx.state(), ContextState::Suspended);
        ctx.resume();
        assert_eq!(ctx.state(), ContextState::Running);
    }

    #[test]
    fn test_detached_context_reports_wired_heuristics() {
        let ctx = OutputContext::detached("AirPods Max");
        assert_eq!(ctx.connectivity(), Connectivity::Wireless);
    }
}
