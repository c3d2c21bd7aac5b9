//! # sonic-core
//!
//! Core types, traits, and error handling for the Sonic Stream offline
//! music player.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
