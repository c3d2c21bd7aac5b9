//! Spectrum feed.
//!
//! A light tap at the end of the signal chain keeps the most recent
//! render output; a display-cadence worker turns it into magnitude bins
//! and the bar vectors the visualizers draw. The feed never touches the
//! render thread's timing: the tap write is a short lock over a small
//! copy, and all FFT work happens on the feed's own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use tracing::debug;

/// Analysis window, in samples. Matches the chain's analyser size.
pub const FFT_SIZE: usize = 512;
/// Usable magnitude bins per analysis pass.
pub const BIN_COUNT: usize = FFT_SIZE / 2;
/// How often the feed recomputes, roughly display refresh.
const FEED_INTERVAL: Duration = Duration::from_millis(16);

/// Temporal smoothing applied to successive magnitude frames.
const SMOOTHING: f32 = 0.8;
/// Decibel range mapped onto the 0..=100 bin scale.
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

#[derive(Debug)]
struct TapInner {
    ring: Mutex<[f32; FFT_SIZE]>,
    write_pos: Mutex<usize>,
    attached: AtomicBool,
}

/// Shared sample tap written by the render worker.
///
/// Holds the last [`FFT_SIZE`] mono samples of processed output. Cheap to
/// clone; all clones observe the same ring.
#[derive(Debug, Clone)]
pub struct SpectrumTap {
    inner: Arc<TapInner>,
}

impl Default for SpectrumTap {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumTap {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TapInner {
                ring: Mutex::new([0.0; FFT_SIZE]),
                write_pos: Mutex::new(0),
                attached: AtomicBool::new(false),
            }),
        }
    }

    /// Mark the tap as bound to a live chain. While detached, writes are
    /// dropped and readers keep seeing the last captured window.
    pub fn attach(&self) {
        self.inner.attached.store(true, Ordering::Release);
    }

    pub fn detach(&self) {
        self.inner.attached.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::Acquire)
    }

    /// Fold an interleaved stereo block into the mono ring. Called from
    /// the render worker after the chain has processed the block.
    pub fn push(&self, interleaved: &[f32]) {
        if !self.is_attached() {
            return;
        }
        let mut ring = self.inner.ring.lock();
        let mut pos = self.inner.write_pos.lock();
        for frame in interleaved.chunks_exact(2) {
            ring[*pos] = (frame[0] + frame[1]) / 2.0;
            *pos = (*pos + 1) % FFT_SIZE;
        }
    }

    /// Copy the latest window out in chronological order.
    pub fn snapshot(&self, out: &mut [f32; FFT_SIZE]) {
        let ring = self.inner.ring.lock();
        let pos = *self.inner.write_pos.lock();
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = ring[(pos + i) % FFT_SIZE];
        }
    }
}

/// Windowed FFT plus the level scaling the visualizers expect.
///
/// Magnitudes are smoothed across frames and mapped from the
/// [`MIN_DB`]..[`MAX_DB`] range onto 0..=100, so silent input decays to
/// zero instead of snapping.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    window: [f32; FFT_SIZE],
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: [f32; BIN_COUNT],
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(FFT_SIZE);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        let mut window = [0.0; FFT_SIZE];
        for (i, w) in window.iter_mut().enumerate() {
            // Hann window
            let x = std::f32::consts::TAU * i as f32 / FFT_SIZE as f32;
            *w = 0.5 * (1.0 - x.cos());
        }

        Self {
            fft,
            window,
            input,
            output,
            scratch,
            smoothed: [0.0; BIN_COUNT],
        }
    }

    /// Produce the current level bins (0..=100) for one window.
    pub fn analyze(&mut self, samples: &[f32; FFT_SIZE]) -> [f32; BIN_COUNT] {
        for (slot, (sample, w)) in self.input.iter_mut().zip(samples.iter().zip(self.window)) {
            *slot = sample * w;
        }

        if self
            .fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .is_err()
        {
            // Length mismatches cannot happen with planner-made buffers
            return [0.0; BIN_COUNT];
        }

        let mut bins = [0.0; BIN_COUNT];
        let scale = 2.0 / FFT_SIZE as f32;
        for (i, bin) in bins.iter_mut().enumerate() {
            let magnitude = self.output[i].norm() * scale;
            self.smoothed[i] = SMOOTHING * self.smoothed[i] + (1.0 - SMOOTHING) * magnitude;

            let db = 20.0 * self.smoothed[i].max(1e-10).log10();
            let normalized = (db - MIN_DB) / (MAX_DB - MIN_DB);
            *bin = normalized.clamp(0.0, 1.0) * 100.0;
        }
        bins
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse level bins into `bar_count` bars, preserving the 0..=100
/// scale.
///
/// Each bar is the plain average of its slice of bins. The same routine
/// serves both bar arities in use; callers pick the count.
pub fn downsample_bars(bins: &[f32], bar_count: usize) -> Vec<f32> {
    if bar_count == 0 || bins.is_empty() {
        return vec![0.0; bar_count];
    }
    let chunk = (bins.len() / bar_count).max(1);
    (0..bar_count)
        .map(|bar| {
            let start = (bar * chunk).min(bins.len() - 1);
            let end = ((bar + 1) * chunk).min(bins.len());
            let sum: f32 = bins[start..end].iter().sum();
            sum / (end - start) as f32
        })
        .collect()
}

/// Display-cadence spectrum worker.
///
/// Recomputes bins from the tap roughly every 16 ms and retains the
/// latest frame; readers always get the last computed bins even when the
/// chain has gone quiet or the tap is detached.
pub struct SpectrumFeed {
    latest: Arc<Mutex<[f32; BIN_COUNT]>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SpectrumFeed {
    pub fn start(tap: SpectrumTap) -> Self {
        let latest = Arc::new(Mutex::new([0.0; BIN_COUNT]));
        let running = Arc::new(AtomicBool::new(true));

        let worker_latest = Arc::clone(&latest);
        let worker_running = Arc::clone(&running);
        let worker = std::thread::Builder::new()
            .name("spectrum-feed".into())
            .spawn(move || {
                let mut analyzer = SpectrumAnalyzer::new();
                let mut window = [0.0; FFT_SIZE];
                while worker_running.load(Ordering::Acquire) {
                    if tap.is_attached() {
                        tap.snapshot(&mut window);
                        let bins = analyzer.analyze(&window);
                        *worker_latest.lock() = bins;
                    }
                    std::thread::sleep(FEED_INTERVAL);
                }
                debug!("spectrum feed stopped");
            })
            .ok();

        Self {
            latest,
            running,
            worker,
        }
    }

    /// Latest raw bins on the 0..=100 scale.
    pub fn bins(&self) -> [f32; BIN_COUNT] {
        *self.latest.lock()
    }

    /// Latest frame folded into `bar_count` bars, same scale.
    pub fn bars(&self, bar_count: usize) -> Vec<f32> {
        downsample_bars(&self.bins(), bar_count)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SpectrumFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_averages_pairs() {
        let bins = [0.0, 100.0, 0.0, 100.0];
        let bars = downsample_bars(&bins, 2);
        assert_eq!(bars, vec![50.0, 50.0]);
    }

    #[test]
    fn test_downsample_bar_arities() {
        let bins = vec![42.0; BIN_COUNT];
        assert_eq!(downsample_bars(&bins, 32).len(), 32);
        assert_eq!(downsample_bars(&bins, 13).len(), 13);
        assert!((downsample_bars(&bins, 13)[0] - 42.0).abs() < 1e-4);
    }

    #[test]
    fn test_downsample_empty_bins() {
        assert_eq!(downsample_bars(&[], 4), vec![0.0; 4]);
    }

    #[test]
    fn test_detached_tap_drops_writes() {
        let tap = SpectrumTap::new();
        tap.push(&[1.0; 64]);
        let mut window = [0.5; FFT_SIZE];
        tap.snapshot(&mut window);
        assert!(window.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_tap_keeps_last_window_after_detach() {
        let tap = SpectrumTap::new();
        tap.attach();
        tap.push(&[0.25; FFT_SIZE * 2]);
        tap.detach();
        tap.push(&[0.0; FFT_SIZE * 2]);

        let mut window = [0.0; FFT_SIZE];
        tap.snapshot(&mut window);
        assert!(window.iter().all(|s| (*s - 0.25).abs() < f32::EPSILON));
    }

    #[test]
    fn test_analyzer_peaks_near_tone_bin() {
        let mut analyzer = SpectrumAnalyzer::new();
        // 48 kHz sample rate, bin width 93.75 Hz; put a tone in bin 32
        let mut window = [0.0; FFT_SIZE];
        for (i, s) in window.iter_mut().enumerate() {
            *s = (std::f32::consts::TAU * 32.0 * i as f32 / FFT_SIZE as f32).sin();
        }
        let mut bins = [0.0; BIN_COUNT];
        for _ in 0..50 {
            bins = analyzer.analyze(&window);
        }

        let peak = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        assert!((30..=34).contains(&peak), "peak bin {peak} not near 32");
        assert!(bins[peak] > bins[100]);
    }

    #[test]
    fn test_silence_decays_to_floor() {
        let mut analyzer = SpectrumAnalyzer::new();
        let window = [0.0; FFT_SIZE];
        let mut bins = [100.0; BIN_COUNT];
        for _ in 0..200 {
            bins = analyzer.analyze(&window);
        }
        assert!(bins.iter().all(|b| *b == 0.0));
    }
}
