//! Shared data model for Sonic Stream.

pub mod chain;
pub mod mood;
pub mod session;
pub mod track;

pub use chain::{ChainParams, BAND_COUNT, BAND_FREQUENCIES, CLEAR_AUDIO_CURVE};
pub use mood::{Mood, MoodPalette};
pub use session::{PlaybackStatus, SessionSnapshot};
pub use track::{AudioQuality, FormatInfo, Track};
pub use uuid::Uuid;
