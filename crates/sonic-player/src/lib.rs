//! # sonic-player
//!
//! Playback orchestration for Sonic Stream: the session state machine
//! (current track, transport status, discovery mode, repeat-one), queue
//! semantics, and mood assignment. The session drives audio through the
//! [`PlaybackSink`] seam; [`ChainSink`] adapts a live
//! [`sonic_audio::SignalChain`] to it.

pub mod mood;
pub mod session;
pub mod sink;

pub use mood::classify;
pub use session::PlayerSession;
pub use sink::{ChainSink, PlaybackSink, SourceFactory};
