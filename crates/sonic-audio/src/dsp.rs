//! The signal chain's render core.
//!
//! Fixed topology, source to sink, never reordered:
//! preamp gain → balance/pan → loudness low shelf → loudness high shelf →
//! EQ band₁..₇ → dynamics compressor → post gain. The spectrum tap hangs
//! off the processed output (see [`crate::spectrum`]); the output stage
//! itself lives in [`crate::chain`].
//!
//! `ChainDsp` is a pure block processor: it owns every piece of live DSP
//! state and is only ever touched from the render worker thread. Control
//! threads communicate through [`crate::chain::ChainCommand`] instead of
//! mutating this struct directly.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, Hertz, Type, Q_BUTTERWORTH_F32};
use sonic_core::{ChainParams, Error, Result, BAND_COUNT, BAND_FREQUENCIES};

use crate::smooth::{db_to_linear, Smoothed, FAST_TAU, SLOW_TAU};

/// Low loudness shelf corner, in Hz.
const LOUDNESS_LOW_HZ: f32 = 100.0;
/// High loudness shelf corner, in Hz.
const LOUDNESS_HIGH_HZ: f32 = 10_000.0;
/// Q of the peaking EQ bands.
const BAND_Q: f32 = 1.2;
/// Gain delta (dB) below which filter coefficients are not recomputed.
const RECALC_THRESHOLD_DB: f32 = 0.05;

/// DSEE adds a fixed treble shelf to simulate restored high frequencies.
const DSEE_TREBLE_DB: f32 = 4.0;
/// Output volume below which Smart Loudness starts compensating.
const LOUDNESS_VOLUME_KNEE: f32 = 0.8;
const LOUDNESS_MAX_BASS_DB: f32 = 8.0;
const LOUDNESS_MAX_TREBLE_DB: f32 = 3.0;

/// Shelf gains derived from the two enhancement toggles and the current
/// output volume. DSEE and Smart Loudness contributions are summed.
pub fn enhancement_shelf_gains(dsee: bool, smart_loudness: bool, output_volume: f32) -> (f32, f32) {
    let mut bass = 0.0;
    let mut treble = 0.0;

    if dsee {
        treble += DSEE_TREBLE_DB;
    }

    if smart_loudness && output_volume < LOUDNESS_VOLUME_KNEE {
        let factor = (LOUDNESS_VOLUME_KNEE - output_volume) / LOUDNESS_VOLUME_KNEE;
        bass += factor * LOUDNESS_MAX_BASS_DB;
        treble += factor * LOUDNESS_MAX_TREBLE_DB;
    }

    (bass, treble)
}

/// What a gain-bearing biquad stage filters.
#[derive(Debug, Clone, Copy)]
enum FilterKind {
    LowShelf,
    HighShelf,
    Peaking,
}

impl FilterKind {
    const fn as_type(self, gain_db: f32) -> Type<f32> {
        match self {
            Self::LowShelf => Type::LowShelf(gain_db),
            Self::HighShelf => Type::HighShelf(gain_db),
            Self::Peaking => Type::PeakingEQ(gain_db),
        }
    }
}

/// One biquad stage applied to both channels, with a smoothed gain.
struct StereoFilter {
    kind: FilterKind,
    frequency: f32,
    q: f32,
    sample_rate: f32,
    gain_db: Smoothed,
    applied_db: f32,
    left: DirectForm2Transposed<f32>,
    right: DirectForm2Transposed<f32>,
}

impl StereoFilter {
    fn new(kind: FilterKind, frequency: f32, q: f32, sample_rate: f32, tau: f32) -> Result<Self> {
        let coefficients = Self::coefficients(kind, frequency, q, sample_rate, 0.0)?;
        Ok(Self {
            kind,
            frequency,
            q,
            sample_rate,
            gain_db: Smoothed::new(0.0, tau),
            applied_db: 0.0,
            left: DirectForm2Transposed::<f32>::new(coefficients),
            right: DirectForm2Transposed::<f32>::new(coefficients),
        })
    }

    fn coefficients(
        kind: FilterKind,
        frequency: f32,
        q: f32,
        sample_rate: f32,
        gain_db: f32,
    ) -> Result<Coefficients<f32>> {
        let fs = Hertz::<f32>::from_hz(sample_rate)
            .map_err(|e| Error::Internal(format!("invalid sample rate {sample_rate}: {e:?}")))?;
        let f0 = Hertz::<f32>::from_hz(frequency)
            .map_err(|e| Error::Internal(format!("invalid frequency {frequency}: {e:?}")))?;
        Coefficients::<f32>::from_params(kind.as_type(gain_db), fs, f0, q)
            .map_err(|e| Error::Internal(format!("filter design failed: {e:?}")))
    }

    /// Advance the gain ramp and refresh coefficients when it has moved
    /// far enough to matter audibly.
    fn step(&mut self, dt: f32) {
        let db = self.gain_db.step(dt);
        if (db - self.applied_db).abs() > RECALC_THRESHOLD_DB {
            if let Ok(coefficients) =
                Self::coefficients(self.kind, self.frequency, self.q, self.sample_rate, db)
            {
                self.left.update_coefficients(coefficients);
                self.right.update_coefficients(coefficients);
                self.applied_db = db;
            }
        }
    }

    fn run(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.left.run(left), self.right.run(right))
    }
}

/// Feed-forward dynamics compressor with a soft knee.
///
/// Constants match the original chain: threshold −20 dB, ratio 12,
/// knee 30 dB, with a fast attack and a relaxed release.
struct Compressor {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope_db: f32,
}

impl Compressor {
    fn new(sample_rate: f32) -> Self {
        let attack_secs = 0.003;
        let release_secs = 0.25;
        Self {
            threshold_db: -20.0,
            ratio: 12.0,
            knee_db: 30.0,
            attack_coeff: (-1.0 / (attack_secs * sample_rate)).exp(),
            release_coeff: (-1.0 / (release_secs * sample_rate)).exp(),
            envelope_db: -120.0,
        }
    }

    /// Gain (dB) the compressor applies at a given input level (dB).
    fn computed_gain_db(&self, level_db: f32) -> f32 {
        let half_knee = self.knee_db / 2.0;
        if level_db <= self.threshold_db - half_knee {
            0.0
        } else if level_db >= self.threshold_db + half_knee {
            (self.threshold_db + (level_db - self.threshold_db) / self.ratio) - level_db
        } else {
            // Quadratic interpolation inside the knee
            let over = level_db - (self.threshold_db - half_knee);
            (1.0 / self.ratio - 1.0) * over * over / (2.0 * self.knee_db)
        }
    }

    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let peak = left.abs().max(right.abs()).max(1e-6);
        let level_db = 20.0 * peak.log10();

        let coeff = if level_db > self.envelope_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope_db = level_db + coeff * (self.envelope_db - level_db);

        let gain = db_to_linear(self.computed_gain_db(self.envelope_db));
        (left * gain, right * gain)
    }
}

/// All render-side state of the signal chain, in stage order.
pub struct ChainDsp {
    sample_rate: f32,
    preamp: Smoothed,
    pan: Smoothed,
    loudness_low: StereoFilter,
    loudness_high: StereoFilter,
    bands: Vec<StereoFilter>,
    compressor: Compressor,
    post_gain: Smoothed,
}

impl ChainDsp {
    pub fn new(sample_rate: f32) -> Result<Self> {
        let loudness_low = StereoFilter::new(
            FilterKind::LowShelf,
            LOUDNESS_LOW_HZ,
            Q_BUTTERWORTH_F32,
            sample_rate,
            SLOW_TAU,
        )?;
        let loudness_high = StereoFilter::new(
            FilterKind::HighShelf,
            LOUDNESS_HIGH_HZ,
            Q_BUTTERWORTH_F32,
            sample_rate,
            SLOW_TAU,
        )?;

        let mut bands = Vec::with_capacity(BAND_COUNT);
        for frequency in BAND_FREQUENCIES {
            bands.push(StereoFilter::new(
                FilterKind::Peaking,
                frequency,
                BAND_Q,
                sample_rate,
                FAST_TAU,
            )?);
        }

        Ok(Self {
            sample_rate,
            preamp: Smoothed::new(1.0, FAST_TAU),
            pan: Smoothed::new(0.0, FAST_TAU),
            loudness_low,
            loudness_high,
            bands,
            compressor: Compressor::new(sample_rate),
            post_gain: Smoothed::new(1.0, FAST_TAU),
        })
    }

    /// Snap every stage to a parameter set without ramping. Used when the
    /// chain first comes up; later edits arrive as ramped targets.
    pub fn apply(&mut self, params: &ChainParams) {
        self.preamp.snap(db_to_linear(params.preamp_db));
        self.pan.snap(params.balance);
        for (band, db) in self.bands.iter_mut().zip(params.bands_db) {
            band.gain_db.snap(db);
        }
    }

    pub fn set_preamp_db(&mut self, db: f32) {
        self.preamp.set_target(db_to_linear(db));
    }

    pub fn set_balance(&mut self, value: f32) {
        self.pan.set_target(value.clamp(-1.0, 1.0));
    }

    pub fn set_band_db(&mut self, index: usize, db: f32) {
        if let Some(band) = self.bands.get_mut(index) {
            band.gain_db.set_target(db);
        }
    }

    pub fn set_shelf_gains(&mut self, bass_db: f32, treble_db: f32) {
        self.loudness_low.gain_db.set_target(bass_db);
        self.loudness_high.gain_db.set_target(treble_db);
    }

    /// Current linear preamp gain (after ramping).
    pub const fn preamp_gain(&self) -> f32 {
        self.preamp.current()
    }

    /// Process one block of interleaved stereo samples in place.
    pub fn process_block(&mut self, buf: &mut [f32]) {
        let frames = buf.len() / 2;
        if frames == 0 {
            return;
        }
        let dt = frames as f32 / self.sample_rate;

        let preamp = self.preamp.step(dt);
        let pan = self.pan.step(dt);
        let post = self.post_gain.step(dt);
        self.loudness_low.step(dt);
        self.loudness_high.step(dt);
        for band in &mut self.bands {
            band.step(dt);
        }

        // Equal-power pan, unity at center
        let pan_x = (pan + 1.0) / 2.0 * std::f32::consts::FRAC_PI_2;
        let pan_left = pan_x.cos() * std::f32::consts::SQRT_2;
        let pan_right = pan_x.sin() * std::f32::consts::SQRT_2;

        for frame in buf.chunks_exact_mut(2) {
            let mut left = frame[0] * preamp * pan_left;
            let mut right = frame[1] * preamp * pan_right;

            (left, right) = self.loudness_low.run(left, right);
            (left, right) = self.loudness_high.run(left, right);
            for band in &mut self.bands {
                (left, right) = band.run(left, right);
            }
            (left, right) = self.compressor.process(left, right);

            frame[0] = left * post;
            frame[1] = right * post;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use sonic_core::CLEAR_AUDIO_CURVE;

    fn settled_peak(dsp: &mut ChainDsp, amplitude: f32) -> f32 {
        let mut peak = 0.0f32;
        for _ in 0..200 {
            let mut block: Vec<f32> = (0..512)
                .map(|i| {
                    let t = i as f32 / 48_000.0;
                    (std::f32::consts::TAU * 1000.0 * t).sin() * amplitude
                })
                .collect();
            dsp.process_block(&mut block);
            peak = block.iter().fold(0.0, |acc, s| acc.max(s.abs()));
        }
        peak
    }

    #[test]
    fn test_preamp_raises_level() {
        let mut flat = ChainDsp::new(48_000.0).unwrap();
        let baseline = settled_peak(&mut flat, 0.01);

        let mut boosted = ChainDsp::new(48_000.0).unwrap();
        boosted.set_preamp_db(6.0);
        let boosted_peak = settled_peak(&mut boosted, 0.01);

        assert!(boosted_peak > baseline * 1.5);
    }

    #[test]
    fn test_hard_left_pan_silences_right() {
        let mut dsp = ChainDsp::new(48_000.0).unwrap();
        let mut params = ChainParams::default();
        params.set_balance(-1.0);
        dsp.apply(&params);

        let mut block = vec![0.05f32; 1024];
        for _ in 0..20 {
            dsp.process_block(&mut block);
            block.fill(0.05);
        }
        dsp.process_block(&mut block);
        let right_peak = block
            .chunks_exact(2)
            .fold(0.0f32, |acc, frame| acc.max(frame[1].abs()));
        assert!(right_peak < 1e-4);
    }

    #[test]
    fn test_enhancement_gains_dsee_only() {
        let (bass, treble) = enhancement_shelf_gains(true, false, 1.0);
        assert!((bass - 0.0).abs() < f32::EPSILON);
        assert!((treble - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_enhancement_gains_smart_loudness_scales_with_volume() {
        // At volume 0.4 the factor is (0.8 - 0.4) / 0.8 = 0.5
        let (bass, treble) = enhancement_shelf_gains(false, true, 0.4);
        assert!((bass - 4.0).abs() < 1e-5);
        assert!((treble - 1.5).abs() < 1e-5);

        // Above the knee there is no compensation
        let (bass, treble) = enhancement_shelf_gains(false, true, 0.9);
        assert!(bass.abs() < f32::EPSILON && treble.abs() < f32::EPSILON);

        // Contributions sum with DSEE
        let (_, treble) = enhancement_shelf_gains(true, true, 0.4);
        assert!((treble - 5.5).abs() < 1e-5);
    }

    #[test]
    fn test_compressor_unity_below_knee() {
        let comp = Compressor::new(48_000.0);
        assert!(comp.computed_gain_db(-60.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_compressor_ratio_above_knee() {
        let comp = Compressor::new(48_000.0);
        // At 0 dB input, 20 dB over threshold: output should sit near
        // threshold + 20/12, i.e. roughly 18.3 dB of reduction.
        let gain = comp.computed_gain_db(0.0);
        assert!((gain + 18.33).abs() < 0.1);
    }

    #[test]
    fn test_clear_audio_curve_reaches_bands() {
        let mut dsp = ChainDsp::new(48_000.0).unwrap();
        for (i, db) in CLEAR_AUDIO_CURVE.iter().enumerate() {
            dsp.set_band_db(i, *db);
        }
        assert!((dsp.bands[0].gain_db.target() - 5.0).abs() < f32::EPSILON);
        assert!((dsp.bands[3].gain_db.target() - 0.0).abs() < f32::EPSILON);
    }
}
