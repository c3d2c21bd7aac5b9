//! Signal chain parameter set.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of parametric equalizer bands.
pub const BAND_COUNT: usize = 7;

/// Fixed center frequencies of the equalizer bands, in Hz.
pub const BAND_FREQUENCIES: [f32; BAND_COUNT] =
    [60.0, 150.0, 400.0, 1000.0, 2400.0, 6000.0, 15000.0];

/// The fixed "vibrant" V-shape curve applied by ClearAudio+.
pub const CLEAR_AUDIO_CURVE: [f32; BAND_COUNT] = [5.0, 3.0, 1.0, 0.0, 2.0, 4.0, 5.0];

const PREAMP_RANGE_DB: f32 = 12.0;
const BAND_RANGE_DB: f32 = 10.0;

/// User-facing parameter set of the signal chain.
///
/// ClearAudio+ and the manual equalizer share the band vector: enabling
/// ClearAudio+ overwrites it with [`CLEAR_AUDIO_CURVE`], while manual band
/// edits remain allowed and relabel the preset "Custom". The two are not
/// mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainParams {
    /// Preamp gain in dB, clamped to −12..+12.
    pub preamp_db: f32,
    /// Stereo balance, −1 (left) to +1 (right).
    pub balance: f32,
    /// Stereo width, 0 (mono) to 2 (wide). Reserved: not wired to an
    /// active processing stage.
    pub stereo_width: f32,
    /// Per-band gains in dB, clamped to −10..+10.
    pub bands_db: [f32; BAND_COUNT],
    /// Named preset label shown in the equalizer.
    pub preset: String,
    /// Treble-restoration enhancement (DSEE).
    pub dsee: bool,
    /// Auto-EQ enhancement (ClearAudio+).
    pub clear_audio: bool,
    /// Loudness compensation at low output volumes.
    pub smart_loudness: bool,
    /// Band vector and label as they were before ClearAudio+ was enabled,
    /// restored on toggle-off.
    #[serde(skip)]
    manual_backup: Option<([f32; BAND_COUNT], String)>,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            preamp_db: 0.0,
            balance: 0.0,
            stereo_width: 1.0,
            bands_db: [0.0; BAND_COUNT],
            preset: "Flat".to_string(),
            dsee: false,
            clear_audio: false,
            smart_loudness: false,
            manual_backup: None,
        }
    }
}

impl ChainParams {
    pub fn set_preamp(&mut self, db: f32) {
        self.preamp_db = db.clamp(-PREAMP_RANGE_DB, PREAMP_RANGE_DB);
    }

    pub fn set_balance(&mut self, value: f32) {
        self.balance = value.clamp(-1.0, 1.0);
    }

    pub fn set_stereo_width(&mut self, value: f32) {
        self.stereo_width = value.clamp(0.0, 2.0);
    }

    /// Edit one band. Allowed while ClearAudio+ is active; any manual edit
    /// relabels the preset "Custom".
    pub fn set_band(&mut self, index: usize, db: f32) -> Result<()> {
        let band = self
            .bands_db
            .get_mut(index)
            .ok_or_else(|| Error::InvalidArgument(format!("band index {index} out of range")))?;
        *band = db.clamp(-BAND_RANGE_DB, BAND_RANGE_DB);
        self.preset = "Custom".to_string();
        Ok(())
    }

    /// Replace the whole band vector with a named preset.
    pub fn set_preset(&mut self, name: impl Into<String>, bands: [f32; BAND_COUNT]) {
        self.bands_db = bands.map(|db| db.clamp(-BAND_RANGE_DB, BAND_RANGE_DB));
        self.preset = name.into();
    }

    /// Toggle ClearAudio+. Enabling saves the current band vector and
    /// applies the fixed curve; disabling restores what was saved.
    pub fn set_clear_audio(&mut self, enabled: bool) {
        if enabled == self.clear_audio {
            return;
        }
        if enabled {
            self.manual_backup = Some((self.bands_db, self.preset.clone()));
            self.bands_db = CLEAR_AUDIO_CURVE;
            self.preset = "ClearAudio+".to_string();
        } else if let Some((bands, preset)) = self.manual_backup.take() {
            self.bands_db = bands;
            self.preset = preset;
        }
        self.clear_audio = enabled;
    }
}
