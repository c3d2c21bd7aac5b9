//! Audio source abstraction.
//!
//! Decoding compressed formats is delegated to the host platform; the
//! chain only sees already-decoded interleaved stereo f32 frames behind
//! this trait. Rebinding the chain's input on track change swaps the
//! boxed source as a whole.

/// A decoded audio stream feeding the signal chain.
///
/// Implementations are owned by the render worker once attached; the
/// previous source is dropped (disconnected) before the new one binds.
pub trait SourceStream: Send {
    /// Fill `out` with interleaved stereo samples. Returns the number of
    /// samples written; 0 signals end of stream.
    fn read(&mut self, out: &mut [f32]) -> usize;

    /// Seek back to the start of the stream (repeat-one support).
    fn seek_start(&mut self);
}

/// Endless silence. Used while no track is bound.
#[derive(Debug, Default)]
pub struct SilenceSource;

impl SourceStream for SilenceSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        out.len()
    }

    fn seek_start(&mut self) {}
}

/// A generated sine tone, useful for the demo shell and for exercising
/// the chain without a host decoder.
#[derive(Debug)]
pub struct SineSource {
    frequency: f32,
    sample_rate: f32,
    amplitude: f32,
    phase: f32,
}

impl SineSource {
    pub const fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            frequency,
            sample_rate,
            amplitude: 0.5,
            phase: 0.0,
        }
    }
}

impl SourceStream for SineSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let step = std::f32::consts::TAU * self.frequency / self.sample_rate;
        for frame in out.chunks_exact_mut(2) {
            let sample = self.phase.sin() * self.amplitude;
            frame[0] = sample;
            frame[1] = sample;
            self.phase = (self.phase + step) % std::f32::consts::TAU;
        }
        out.len()
    }

    fn seek_start(&mut self) {
        self.phase = 0.0;
    }
}
