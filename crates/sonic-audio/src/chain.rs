//! Signal chain engine.
//!
//! [`SignalChain::build`] claims its [`OutputContext`], spawns the render
//! worker, and hands back a control handle. The worker owns everything
//! live: the source, the [`ChainDsp`] state, and (for a real device) the
//! cpal stream, which must be created and dropped on the thread that
//! renders into it. Control threads only ever send [`ChainCommand`]s.
//!
//! Rendered blocks travel to the device callback over a small bounded
//! channel; the blocking send is what paces the worker against the
//! device clock. In detached mode the worker paces itself instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use sonic_core::{ChainParams, Error, Result};
use tracing::{debug, info, warn};

use crate::context::{ContextState, OutputBackend, OutputContext};
use crate::dsp::ChainDsp;
use crate::source::SourceStream;
use crate::spectrum::SpectrumTap;

/// Frames rendered per block.
const BLOCK_FRAMES: usize = 512;
/// Blocks buffered ahead of the device callback.
const BLOCK_QUEUE_DEPTH: usize = 4;
/// How long the worker waits for a command while idle.
const IDLE_POLL: Duration = Duration::from_millis(20);

/// Control messages accepted by the render worker.
pub enum ChainCommand {
    /// Bind a new input. The previous source is dropped first; playback
    /// position resets to zero.
    AttachSource(Box<dyn SourceStream>),
    Play,
    Pause,
    SeekStart,
    SetPreamp(f32),
    SetBalance(f32),
    SetBand { index: usize, db: f32 },
    SetShelves { bass_db: f32, treble_db: f32 },
    Apply(ChainParams),
    Shutdown,
}

/// Notifications emitted by the render worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEvent {
    /// The bound source ran out of samples.
    TrackEnded,
}

/// Control handle for a running signal chain.
#[derive(Debug)]
pub struct SignalChain {
    commands: Sender<ChainCommand>,
    events: Receiver<ChainEvent>,
    tap: SpectrumTap,
    context: Arc<OutputContext>,
    position_frames: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl SignalChain {
    /// Build the chain for a context. Fails with
    /// [`Error::ChainAlreadyBuilt`] if the context already has one.
    pub fn build(context: Arc<OutputContext>, params: ChainParams) -> Result<Self> {
        context.try_claim_chain()?;

        let (commands, command_rx) = unbounded();
        let (event_tx, events) = unbounded();
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let tap = SpectrumTap::new();
        let position_frames = Arc::new(AtomicU64::new(0));

        let worker_ctx = Arc::clone(&context);
        let worker_tap = tap.clone();
        let worker_pos = Arc::clone(&position_frames);
        let worker = std::thread::Builder::new()
            .name("signal-chain".into())
            .spawn(move || {
                Worker::run(
                    worker_ctx,
                    params,
                    command_rx,
                    event_tx,
                    worker_tap,
                    worker_pos,
                    &ready_tx,
                );
            })
            .map_err(|e| {
                context.release_chain();
                Error::Internal(format!("cannot spawn render worker: {e}"))
            })?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                context.release_chain();
                return Err(e);
            }
            Err(_) => {
                context.release_chain();
                return Err(Error::AudioOutput("render worker did not start".into()));
            }
        }

        tap.attach();
        info!(device = context.name(), "signal chain built");

        Ok(Self {
            commands,
            events,
            tap,
            context,
            position_frames,
            worker: Some(worker),
        })
    }

    /// Commands sent after teardown are dropped, not errors.
    fn send(&self, command: ChainCommand) {
        if self.commands.send(command).is_err() {
            debug!("chain command ignored after teardown");
        }
    }

    pub fn attach_source(&self, source: Box<dyn SourceStream>) {
        self.send(ChainCommand::AttachSource(source));
    }

    /// Start rendering. Wakes a suspended context first; play intent
    /// implies resume.
    pub fn play(&self) {
        if self.context.state() == ContextState::Suspended {
            self.context.resume();
        }
        self.send(ChainCommand::Play);
    }

    pub fn pause(&self) {
        self.send(ChainCommand::Pause);
    }

    pub fn seek_start(&self) {
        self.send(ChainCommand::SeekStart);
    }

    pub fn set_preamp_db(&self, db: f32) {
        self.send(ChainCommand::SetPreamp(db));
    }

    pub fn set_balance(&self, value: f32) {
        self.send(ChainCommand::SetBalance(value));
    }

    pub fn set_band_db(&self, index: usize, db: f32) {
        self.send(ChainCommand::SetBand { index, db });
    }

    pub fn set_shelf_gains(&self, bass_db: f32, treble_db: f32) {
        self.send(ChainCommand::SetShelves { bass_db, treble_db });
    }

    /// Recompute the loudness shelves from the enhancement toggles and
    /// the current output volume.
    pub fn set_enhancements(&self, dsee: bool, smart_loudness: bool, output_volume: f32) {
        let (bass_db, treble_db) =
            crate::dsp::enhancement_shelf_gains(dsee, smart_loudness, output_volume);
        self.set_shelf_gains(bass_db, treble_db);
    }

    pub fn apply_params(&self, params: ChainParams) {
        self.send(ChainCommand::Apply(params));
    }

    /// The tap feeding the spectrum worker.
    pub fn tap(&self) -> SpectrumTap {
        self.tap.clone()
    }

    /// Next pending event, if any.
    pub fn try_event(&self) -> Option<ChainEvent> {
        self.events.try_recv().ok()
    }

    pub fn events(&self) -> &Receiver<ChainEvent> {
        &self.events
    }

    /// Playback position of the bound source, in seconds of rendered
    /// output.
    pub fn position_secs(&self) -> f64 {
        let frames = self.position_frames.load(Ordering::Acquire);
        f64::from(u32::try_from(frames).unwrap_or(u32::MAX))
            / f64::from(self.context.sample_rate())
    }

    /// Tear the chain down and release the context's chain slot.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.commands.send(ChainCommand::Shutdown);
            let _ = worker.join();
            self.tap.detach();
            self.context.release_chain();
            info!(device = self.context.name(), "signal chain torn down");
        }
    }
}

impl Drop for SignalChain {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Render-thread state.
struct Worker {
    context: Arc<OutputContext>,
    dsp: ChainDsp,
    source: Option<Box<dyn SourceStream>>,
    playing: bool,
    tap: SpectrumTap,
    position_frames: Arc<AtomicU64>,
    events: Sender<ChainEvent>,
    block_tx: Option<Sender<Vec<f32>>>,
}

impl Worker {
    fn run(
        context: Arc<OutputContext>,
        params: ChainParams,
        commands: Receiver<ChainCommand>,
        events: Sender<ChainEvent>,
        tap: SpectrumTap,
        position_frames: Arc<AtomicU64>,
        ready: &Sender<Result<()>>,
    ) {
        let mut dsp = match ChainDsp::new(context.sample_rate() as f32) {
            Ok(dsp) => dsp,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        dsp.apply(&params);

        // The stream must be created here so it lives and dies with the
        // render thread.
        let (block_tx, stream) = match context.backend() {
            OutputBackend::DefaultDevice => match open_stream() {
                Ok((tx, stream)) => (Some(tx), Some(stream)),
                Err(e) => {
                    let _ = ready.send(Err(e));
                    return;
                }
            },
            OutputBackend::Detached => (None, None),
        };
        let _ = ready.send(Ok(()));

        let mut worker = Self {
            context,
            dsp,
            source: None,
            playing: false,
            tap,
            position_frames,
            events,
            block_tx,
        };

        loop {
            let rendering = worker.playing
                && worker.source.is_some()
                && worker.context.state() == ContextState::Running;
            let timeout = if rendering { Duration::ZERO } else { IDLE_POLL };

            match commands.recv_timeout(timeout) {
                Ok(ChainCommand::Shutdown) => break,
                Ok(command) => {
                    worker.handle(command);
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            if rendering {
                worker.render_block();
            }
        }

        drop(stream);
        debug!("render worker exited");
    }

    fn handle(&mut self, command: ChainCommand) {
        match command {
            ChainCommand::AttachSource(source) => {
                // Drop the old source before binding the new one; the
                // fresh source waits for an explicit play intent
                self.source = None;
                self.source = Some(source);
                self.playing = false;
                self.position_frames.store(0, Ordering::Release);
            }
            ChainCommand::Play => {
                if self.source.is_some() {
                    self.playing = true;
                } else {
                    warn!("play requested with no source bound");
                }
            }
            ChainCommand::Pause => self.playing = false,
            ChainCommand::SeekStart => {
                if let Some(source) = self.source.as_mut() {
                    source.seek_start();
                }
                self.position_frames.store(0, Ordering::Release);
            }
            ChainCommand::SetPreamp(db) => self.dsp.set_preamp_db(db),
            ChainCommand::SetBalance(value) => self.dsp.set_balance(value),
            ChainCommand::SetBand { index, db } => self.dsp.set_band_db(index, db),
            ChainCommand::SetShelves { bass_db, treble_db } => {
                self.dsp.set_shelf_gains(bass_db, treble_db);
            }
            ChainCommand::Apply(params) => self.dsp.apply(&params),
            ChainCommand::Shutdown => {}
        }
    }

    fn render_block(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };

        let mut block = vec![0.0f32; BLOCK_FRAMES * 2];
        let n = source.read(&mut block);
        if n == 0 {
            self.playing = false;
            let _ = self.events.send(ChainEvent::TrackEnded);
            return;
        }
        block.truncate(n);

        self.dsp.process_block(&mut block);
        self.tap.push(&block);
        self.position_frames
            .fetch_add((n / 2) as u64, Ordering::AcqRel);

        let volume = self.context.volume();
        if (volume - 1.0).abs() > f32::EPSILON {
            for sample in &mut block {
                *sample *= volume;
            }
        }

        match &self.block_tx {
            Some(tx) => {
                // The bounded send paces rendering against the device
                // clock; the timeout keeps shutdown reachable if the
                // device stops draining
                let _ = tx.send_timeout(block, Duration::from_millis(250));
            }
            None => {
                let secs = (n / 2) as f32 / self.context.sample_rate() as f32;
                std::thread::sleep(Duration::from_secs_f32(secs));
            }
        }
    }
}

/// Open the default output device and wire its callback to a block
/// channel. Returns the producer side and the live stream.
fn open_stream() -> Result<(Sender<Vec<f32>>, cpal::Stream)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::DeviceUnavailable("no default output device".into()))?;
    let config = device
        .default_output_config()
        .map_err(|e| Error::DeviceUnavailable(format!("no output config: {e}")))?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(Error::AudioOutput(format!(
            "unsupported sample format {:?}",
            config.sample_format()
        )));
    }
    if config.channels() != 2 {
        return Err(Error::AudioOutput(format!(
            "expected stereo output, device has {} channels",
            config.channels()
        )));
    }

    let (block_tx, block_rx) = bounded::<Vec<f32>>(BLOCK_QUEUE_DEPTH);

    let mut carry: Vec<f32> = Vec::new();
    let mut carry_pos = 0usize;
    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut filled = 0;
                while filled < data.len() {
                    if carry_pos >= carry.len() {
                        match block_rx.try_recv() {
                            Ok(block) => {
                                carry = block;
                                carry_pos = 0;
                            }
                            Err(_) => {
                                // Underrun or pause: emit silence
                                data[filled..].fill(0.0);
                                return;
                            }
                        }
                    }
                    let take = (carry.len() - carry_pos).min(data.len() - filled);
                    data[filled..filled + take]
                        .copy_from_slice(&carry[carry_pos..carry_pos + take]);
                    carry_pos += take;
                    filled += take;
                }
            },
            |e| warn!("output stream error: {e}"),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("cannot build output stream: {e}")))?;
    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("cannot start output stream: {e}")))?;

    Ok((block_tx, stream))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::source::{SineSource, SourceStream};

    /// A source that ends after a fixed number of frames.
    struct FiniteSource {
        frames_left: usize,
    }

    impl SourceStream for FiniteSource {
        fn read(&mut self, out: &mut [f32]) -> usize {
            let frames = (out.len() / 2).min(self.frames_left);
            self.frames_left -= frames;
            let samples = frames * 2;
            out[..samples].fill(0.1);
            samples
        }

        fn seek_start(&mut self) {}
    }

    #[test]
    fn test_one_chain_per_context() {
        let ctx = OutputContext::detached("test");
        let _chain = SignalChain::build(Arc::clone(&ctx), ChainParams::default()).unwrap();
        let err = SignalChain::build(Arc::clone(&ctx), ChainParams::default()).unwrap_err();
        assert!(matches!(err, Error::ChainAlreadyBuilt(_)));
    }

    #[test]
    fn test_shutdown_releases_context() {
        let ctx = OutputContext::detached("test");
        let mut chain = SignalChain::build(Arc::clone(&ctx), ChainParams::default()).unwrap();
        chain.shutdown();
        assert!(SignalChain::build(ctx, ChainParams::default()).is_ok());
    }

    #[test]
    fn test_play_advances_position_and_pause_holds_it() {
        let ctx = OutputContext::detached("test");
        let chain = SignalChain::build(ctx, ChainParams::default()).unwrap();
        chain.attach_source(Box::new(SineSource::new(440.0, 48_000.0)));
        chain.play();
        std::thread::sleep(Duration::from_millis(150));
        let playing_pos = chain.position_secs();
        assert!(playing_pos > 0.0);

        chain.pause();
        std::thread::sleep(Duration::from_millis(50));
        let paused_pos = chain.position_secs();
        std::thread::sleep(Duration::from_millis(100));
        assert!((chain.position_secs() - paused_pos).abs() < 0.05);
        assert!(paused_pos >= playing_pos);
    }

    #[test]
    fn test_finite_source_emits_track_ended() {
        let ctx = OutputContext::detached("test");
        let chain = SignalChain::build(ctx, ChainParams::default()).unwrap();
        chain.attach_source(Box::new(FiniteSource { frames_left: 2048 }));
        chain.play();
        let event = chain.events().recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, ChainEvent::TrackEnded);
    }

    #[test]
    fn test_rebind_resets_position() {
        let ctx = OutputContext::detached("test");
        let chain = SignalChain::build(ctx, ChainParams::default()).unwrap();
        chain.attach_source(Box::new(SineSource::new(440.0, 48_000.0)));
        chain.play();
        std::thread::sleep(Duration::from_millis(100));
        chain.attach_source(Box::new(SineSource::new(220.0, 48_000.0)));
        std::thread::sleep(Duration::from_millis(30));
        // New source starts paused at zero until the next play intent
        assert!(chain.position_secs() < 0.05);
    }

    #[test]
    fn test_setters_after_shutdown_are_noops() {
        let ctx = OutputContext::detached("test");
        let mut chain = SignalChain::build(ctx, ChainParams::default()).unwrap();
        chain.shutdown();
        chain.set_preamp_db(6.0);
        chain.set_band_db(3, -2.0);
        chain.play();
    }

    #[test]
    fn test_suspended_context_does_not_render() {
        let ctx = OutputContext::detached("test");
        let chain = SignalChain::build(Arc::clone(&ctx), ChainParams::default()).unwrap();
        chain.attach_source(Box::new(SineSource::new(440.0, 48_000.0)));
        ctx.suspend();
        let _ = chain.commands.send(ChainCommand::Play);
        std::thread::sleep(Duration::from_millis(100));
        assert!(chain.position_secs() < 0.01);

        // play() resumes the context, after which rendering proceeds
        chain.play();
        std::thread::sleep(Duration::from_millis(100));
        assert!(chain.position_secs() > 0.0);
    }
}
