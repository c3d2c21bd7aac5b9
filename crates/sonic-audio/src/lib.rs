//! # sonic-audio
//!
//! Real-time audio processing for Sonic Stream: the per-track signal
//! chain (gain staging, balance, loudness shelves, 7-band parametric EQ,
//! dynamics) and the display-cadence spectrum feed.
//!
//! Audio flows one way: source → signal chain → output device. Control
//! flows one way too: parameter setters hand smoothed targets to the
//! render worker over a channel; the worker owns all live DSP state.

pub mod chain;
pub mod context;
pub mod devices;
pub mod dsp;
pub mod smooth;
pub mod source;
pub mod spectrum;

pub use chain::{ChainCommand, ChainEvent, SignalChain};
pub use context::{ContextState, OutputContext};
pub use devices::{detect_connectivity, list_output_devices, Connectivity, DeviceInfo};
pub use dsp::{enhancement_shelf_gains, ChainDsp};
pub use source::{SilenceSource, SineSource, SourceStream};
pub use spectrum::{downsample_bars, SpectrumFeed, SpectrumTap};
