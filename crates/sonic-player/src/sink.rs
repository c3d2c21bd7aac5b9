//! The seam between the session state machine and real audio.

use sonic_audio::{SignalChain, SourceStream};
use sonic_core::{Result, Track};

/// Produces a decoded stream for a track. Decoding itself is the host's
/// concern; the orchestrator only needs something that yields frames.
pub type SourceFactory = Box<dyn Fn(&Track) -> Result<Box<dyn SourceStream>> + Send>;

/// What the session needs from the audio layer. Mocked in tests so the
/// state machine is exercised without a device.
pub trait PlaybackSink {
    /// Bind the sink's input to a track, replacing any previous binding.
    fn bind_track(&mut self, track: &Track) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Rewind the bound input to the beginning (repeat-one).
    fn seek_start(&mut self);
}

/// [`PlaybackSink`] over a live [`SignalChain`].
pub struct ChainSink {
    chain: SignalChain,
    make_source: SourceFactory,
}

impl ChainSink {
    pub fn new(chain: SignalChain, make_source: SourceFactory) -> Self {
        Self { chain, make_source }
    }

    /// Position of the bound track in seconds of rendered output.
    pub fn position_secs(&self) -> f64 {
        self.chain.position_secs()
    }

    pub fn chain(&self) -> &SignalChain {
        &self.chain
    }
}

impl PlaybackSink for ChainSink {
    fn bind_track(&mut self, track: &Track) -> Result<()> {
        let source = (self.make_source)(track)?;
        self.chain.attach_source(source);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.chain.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.chain.pause();
    }

    fn seek_start(&mut self) {
        self.chain.seek_start();
    }
}
