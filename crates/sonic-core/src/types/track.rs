//! Track type and audio quality classification.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mood::{Mood, MoodPalette};

/// A single track in the library (or a transient queue clone of one).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    /// Unique identifier. Queue clones get a fresh one.
    pub id: Uuid,
    /// Track title.
    pub title: String,
    /// Artist name.
    pub artist: String,
    /// Album name (if known).
    pub album: Option<String>,
    /// Duration in seconds, 0.0 until probed.
    pub duration: f64,
    /// Decoded-format descriptor from the metadata probe.
    pub format: FormatInfo,
    /// Quality tier derived from the format descriptor.
    pub quality: AudioQuality,
    /// Mood tag, computed lazily on first become-current.
    pub mood: Option<Mood>,
    /// 2-color palette derived deterministically with the mood.
    pub palette: Option<MoodPalette>,
    /// Liked flag.
    #[serde(default)]
    pub is_liked: bool,
    /// Marks an ephemeral queue insertion, excluded from library listings
    /// and never persisted.
    #[serde(default)]
    pub is_queue_item: bool,
}

impl Track {
    /// Create a new library track from probed metadata.
    pub fn new(title: impl Into<String>, artist: impl Into<String>, format: FormatInfo) -> Self {
        let quality = AudioQuality::classify(&format);
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration: 0.0,
            format,
            quality,
            mood: None,
            palette: None,
            is_liked: false,
            is_queue_item: false,
        }
    }

    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    /// Clone this track as a transient queue item with a fresh identity.
    ///
    /// The original library entry is left untouched; the clone is marked
    /// so library views can exclude it and `clear_queue` can find it.
    pub fn clone_for_queue(&self) -> Self {
        let mut clone = self.clone();
        clone.id = Uuid::new_v4();
        clone.is_queue_item = true;
        clone
    }

    /// Key under which this track's timed-text document is stored.
    pub fn lyrics_key(&self) -> String {
        format!("{}::{}", self.title, self.artist)
    }
}

/// Technical audio properties extracted by the metadata probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormatInfo {
    /// Container format, e.g. "flac", "mp3", "dsf".
    pub container: String,
    /// Codec name if the probe reported one.
    pub codec: Option<String>,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Bit depth (bits per sample).
    pub bit_depth: Option<u32>,
    /// Bitrate in bits per second.
    pub bitrate: Option<u32>,
}

impl FormatInfo {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }
}

/// Quality tier of a track, classified from its format descriptor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum AudioQuality {
    Dsd,
    HiRes,
    Lossless,
    Hq,
    Standard,
    /// Fallback when the metadata probe failed; never fails an import.
    #[default]
    Unknown,
}

/// DSD streams carry sample rates of 2.8224 MHz and up.
const DSD_MIN_SAMPLE_RATE: u32 = 2_822_400;

impl AudioQuality {
    /// Classify a format descriptor into a quality tier.
    ///
    /// Precedence: DSD, then the lossless PCM family (Hi-Res when above
    /// 48 kHz or 16-bit), then lossy by bitrate.
    pub fn classify(format: &FormatInfo) -> Self {
        let container = format.container.to_lowercase();

        if container.contains("dsf")
            || container.contains("dff")
            || format.sample_rate.is_some_and(|sr| sr >= DSD_MIN_SAMPLE_RATE)
        {
            return Self::Dsd;
        }

        let lossless = ["flac", "wav", "alac", "aiff", "ape", "wv"]
            .iter()
            .any(|fmt| container.contains(fmt))
            // ALAC frequently ships in an m4a container
            || (container.contains("m4a") && format.bit_depth.is_some_and(|b| b > 16));

        if lossless {
            if format.sample_rate.is_some_and(|sr| sr > 48_000)
                || format.bit_depth.is_some_and(|b| b > 16)
            {
                return Self::HiRes;
            }
            return Self::Lossless;
        }

        if format.bitrate.is_some_and(|br| br >= 256_000) {
            return Self::Hq;
        }

        Self::Standard
    }

    /// Human-readable tier label.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Dsd => "DSD",
            Self::HiRes => "Hi-Res Audio",
            Self::Lossless => "Lossless",
            Self::Hq => "HQ",
            Self::Standard => "Standard",
            Self::Unknown => "Unknown Quality",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(container: &str, sr: Option<u32>, depth: Option<u32>, br: Option<u32>) -> FormatInfo {
        FormatInfo {
            container: container.to_string(),
            codec: None,
            sample_rate: sr,
            bit_depth: depth,
            bitrate: br,
        }
    }

    #[test]
    fn test_classify_dsd() {
        assert_eq!(
            AudioQuality::classify(&format("dsf", None, None, None)),
            AudioQuality::Dsd
        );
        assert_eq!(
            AudioQuality::classify(&format("raw", Some(2_822_400), None, None)),
            AudioQuality::Dsd
        );
    }

    #[test]
    fn test_classify_lossless_family() {
        assert_eq!(
            AudioQuality::classify(&format("flac", Some(44_100), Some(16), None)),
            AudioQuality::Lossless
        );
        assert_eq!(
            AudioQuality::classify(&format("flac", Some(96_000), Some(24), None)),
            AudioQuality::HiRes
        );
        // ALAC in m4a is only lossless when the bit depth says so
        assert_eq!(
            AudioQuality::classify(&format("m4a", Some(48_000), Some(24), None)),
            AudioQuality::HiRes
        );
    }

    #[test]
    fn test_classify_lossy() {
        assert_eq!(
            AudioQuality::classify(&format("mp3", Some(44_100), None, Some(320_000))),
            AudioQuality::Hq
        );
        assert_eq!(
            AudioQuality::classify(&format("mp3", Some(44_100), None, Some(128_000))),
            AudioQuality::Standard
        );
    }

    #[test]
    fn test_probe_failure_degrades_to_unknown() {
        // A track built without a probe keeps the Unknown default
        let track = Track {
            quality: AudioQuality::default(),
            ..Track::new("Untitled", "Unknown Artist", FormatInfo::default())
        };
        assert_eq!(track.quality.label(), "Unknown Quality");
    }

    #[test]
    fn test_clone_for_queue_is_fresh_identity() {
        let track = Track::new("Song", "Artist", FormatInfo::new("flac"));
        let clone = track.clone_for_queue();
        assert_ne!(clone.id, track.id);
        assert!(clone.is_queue_item);
        assert!(!track.is_queue_item);
        assert_eq!(clone.title, track.title);
    }

    #[test]
    fn test_lyrics_key() {
        let track = Track::new("Night Drive", "Neon Artist", FormatInfo::new("mp3"));
        assert_eq!(track.lyrics_key(), "Night Drive::Neon Artist");
    }
}
