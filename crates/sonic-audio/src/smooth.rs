//! Smoothed parameter values.
//!
//! Every audible parameter in the chain moves toward its target with an
//! exponential time constant instead of stepping, so slider drags and
//! enhancement toggles never click. This is the discrete equivalent of a
//! continuous `setTargetAtTime` ramp: each render block advances the
//! value by `1 − e^(−dt/τ)` of the remaining distance.

/// Time constant used for direct user edits (preamp, balance, EQ bands).
pub const FAST_TAU: f32 = 0.1;

/// Slower constant for the loudness shelves, which react to ambient
/// volume changes rather than slider positions.
pub const SLOW_TAU: f32 = 0.3;

/// A parameter that ramps toward its target with a fixed time constant.
#[derive(Debug, Clone, Copy)]
pub struct Smoothed {
    current: f32,
    target: f32,
    tau: f32,
}

impl Smoothed {
    pub const fn new(value: f32, tau: f32) -> Self {
        Self {
            current: value,
            target: value,
            tau,
        }
    }

    /// Set a new target. Setting the same target twice is idempotent:
    /// the ramp converges to the same place with no drift.
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump straight to a value, bypassing the ramp (used at construction
    /// and after source rebinds where there is nothing to glide from).
    pub fn snap(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    /// Advance the ramp by `dt` seconds and return the new value.
    pub fn step(&mut self, dt: f32) -> f32 {
        let remaining = self.target - self.current;
        if remaining.abs() < 1e-6 {
            self.current = self.target;
        } else {
            self.current += remaining * (1.0 - (-dt / self.tau).exp());
        }
        self.current
    }

    pub const fn current(&self) -> f32 {
        self.current
    }

    pub const fn target(&self) -> f32 {
        self.target
    }
}

/// Convert a decibel value to a linear gain factor.
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ramp_converges() {
        let mut gain = Smoothed::new(1.0, FAST_TAU);
        gain.set_target(2.0);
        for _ in 0..1000 {
            gain.step(0.01);
        }
        assert!((gain.current() - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_snap_bypasses_ramp() {
        let mut gain = Smoothed::new(0.0, FAST_TAU);
        gain.snap(0.5);
        assert!((gain.current() - 0.5).abs() < f32::EPSILON);
        assert!((gain.target() - 0.5).abs() < f32::EPSILON);
    }

    proptest! {
        // Repeated identical setters converge to the same linear gain
        // with no double-ramp drift.
        #[test]
        fn prop_repeated_target_is_idempotent(db in -12.0f32..=12.0) {
            let expected = db_to_linear(db);

            let mut once = Smoothed::new(1.0, FAST_TAU);
            once.set_target(expected);

            let mut twice = Smoothed::new(1.0, FAST_TAU);
            twice.set_target(expected);
            twice.set_target(expected);

            for _ in 0..500 {
                once.step(0.02);
                twice.step(0.02);
            }

            prop_assert!((once.current() - twice.current()).abs() < 1e-6);
            prop_assert!((once.current() - expected).abs() < 1e-3);
        }
    }
}
