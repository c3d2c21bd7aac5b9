//! Error types for Sonic Stream.

use thiserror::Error;

/// Result type alias using Sonic Stream's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Sonic Stream.
#[derive(Error, Debug)]
pub enum Error {
    // Device / construction errors
    #[error("No output device available: {0}")]
    DeviceUnavailable(String),

    #[error("Signal chain already built for output context '{0}'")]
    ChainAlreadyBuilt(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    // Transient playback errors
    #[error("Play rejected by device policy: {0}")]
    PlayRejected(String),

    #[error("Audio decode error: {0}")]
    Decode(String),

    // Timed-text errors
    #[error("Failed to parse timed text: {0}")]
    LyricsParse(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error is fatal to the audio engine.
    ///
    /// A missing audio subsystem cannot be retried into existence; these
    /// are surfaced once and never retried.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_) | Self::ChainAlreadyBuilt(_))
    }

    /// Returns true if this error is transient and a later explicit user
    /// action may succeed naturally (no automatic retry loop).
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PlayRejected(_) | Self::Decode(_) | Self::AudioOutput(_)
        )
    }
}
