//! The playback session state machine.
//!
//! One [`PlayerSession`] owns the ordered track list, the current index,
//! and the transport status, and is the only writer of any of them.
//! Audio effects go through the [`PlaybackSink`]; everything else is
//! plain bookkeeping, which is what makes the machine testable with a
//! mock sink.

use sonic_core::{
    AudioQuality, Error, PlaybackStatus, Result, SessionSnapshot, Track, Uuid,
};
use tracing::{debug, info};

use crate::mood;
use crate::sink::PlaybackSink;

/// Knuth's MMIX multiplier; the same generator the shuffle logic has
/// always used, kept seedable so discovery order is reproducible.
const LCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;
const LCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

pub struct PlayerSession<S: PlaybackSink> {
    sink: S,
    tracks: Vec<Track>,
    current: Option<usize>,
    status: PlaybackStatus,
    position: f64,
    discovery: bool,
    repeat_one: bool,
    rng_state: u64,
}

impl<S: PlaybackSink> PlayerSession<S> {
    pub fn new(sink: S, tracks: Vec<Track>) -> Self {
        Self::with_seed(sink, tracks, 0x5eed_051c)
    }

    /// Session with a fixed discovery seed.
    pub fn with_seed(sink: S, tracks: Vec<Track>, seed: u64) -> Self {
        Self {
            sink,
            tracks,
            current: None,
            status: PlaybackStatus::Stopped,
            position: 0.0,
            discovery: false,
            repeat_one: false,
            rng_state: seed,
        }
    }

    // ---- transport -----------------------------------------------------

    /// Start or resume playback. With no current track, playback starts
    /// at the top of the list; with no tracks at all the intent is
    /// rejected.
    pub fn play(&mut self) -> Result<()> {
        if self.current.is_none() {
            if self.tracks.is_empty() {
                return Err(Error::PlayRejected("no tracks loaded".into()));
            }
            self.set_current(0)?;
        }
        self.sink.play()?;
        self.status = PlaybackStatus::Playing;
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.status == PlaybackStatus::Playing {
            self.sink.pause();
            self.status = PlaybackStatus::Paused;
        }
    }

    /// Jump to a specific track and start playing it from the top.
    pub fn select_track(&mut self, index: usize) -> Result<()> {
        self.set_current(index)?;
        self.sink.play()?;
        self.status = PlaybackStatus::Playing;
        Ok(())
    }

    /// Next track, or on end-of-track. With repeat-one active the
    /// current track restarts in place and the index never moves.
    pub fn advance(&mut self) -> Result<()> {
        if self.repeat_one && self.current.is_some() {
            self.sink.seek_start();
            self.position = 0.0;
            if self.status == PlaybackStatus::Playing {
                self.sink.play()?;
            }
            return Ok(());
        }
        if self.tracks.is_empty() {
            return Ok(());
        }

        let old = self.current;
        let naive = old.map_or(0, |i| (i + 1) % self.tracks.len());

        // Discovery never overrides an explicitly queued track
        let next = if self.discovery && !self.tracks[naive].is_queue_item {
            self.pick_discovery_index().unwrap_or(naive)
        } else {
            naive
        };
        self.set_current(next)?;

        // Queue items are consumed once advanced away from
        if let Some(old_index) = old {
            if old_index != next && self.tracks[old_index].is_queue_item {
                debug!(index = old_index, "consuming queue item");
                self.tracks.remove(old_index);
                if let Some(c) = self.current {
                    if old_index < c {
                        self.current = Some(c - 1);
                    }
                }
            }
        }
        Ok(())
    }

    /// Previous track; clamps at the first track instead of wrapping.
    pub fn previous(&mut self) -> Result<()> {
        if self.tracks.is_empty() {
            return Ok(());
        }
        let target = self.current.map_or(0, |i| i.saturating_sub(1));
        self.set_current(target)
    }

    // ---- queue ---------------------------------------------------------

    /// Insert a play-next clone of a track right after the current one.
    /// The library entry itself is untouched.
    pub fn enqueue_next(&mut self, track: &Track) {
        let clone = track.clone_for_queue();
        let at = self.current.map_or(0, |i| i + 1).min(self.tracks.len());
        info!(title = %clone.title, at, "queued next");
        self.tracks.insert(at, clone);
    }

    /// Remove the entry at `index`, preserving the current track's
    /// logical position. Removing the current entry itself moves on to
    /// whatever slid into its slot.
    pub fn dequeue(&mut self, index: usize) -> Result<Track> {
        if index >= self.tracks.len() {
            return Err(Error::InvalidArgument(format!(
                "dequeue index {index} out of range"
            )));
        }
        let removed = self.tracks.remove(index);
        match self.current {
            Some(c) if index < c => self.current = Some(c - 1),
            Some(c) if index == c => {
                if self.tracks.is_empty() {
                    self.stop();
                } else {
                    self.set_current(c.min(self.tracks.len() - 1))?;
                }
            }
            _ => {}
        }
        Ok(removed)
    }

    /// Drop every transient queue entry in one pass, wherever it sits.
    pub fn clear_queue(&mut self) {
        let current_id = self.current.map(|i| self.tracks[i].id);
        self.tracks.retain(|t| !t.is_queue_item);
        if let Some(id) = current_id {
            match self.tracks.iter().position(|t| t.id == id) {
                Some(pos) => self.current = Some(pos),
                // The playing track was itself a queue item
                None => self.stop(),
            }
        }
    }

    // ---- modes ---------------------------------------------------------

    pub fn set_discovery(&mut self, enabled: bool) {
        self.discovery = enabled;
    }

    pub fn set_repeat_one(&mut self, enabled: bool) {
        self.repeat_one = enabled;
    }

    // ---- library -------------------------------------------------------

    /// Library view: every persistent entry, queue clones excluded.
    pub fn library(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| !t.is_queue_item)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn with_quality(&self, quality: AudioQuality) -> Vec<&Track> {
        self.library().filter(|t| t.quality == quality).collect()
    }

    pub fn toggle_liked(&mut self, id: Uuid) -> Result<bool> {
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown track {id}")))?;
        track.is_liked = !track.is_liked;
        Ok(track.is_liked)
    }

    // ---- observation ---------------------------------------------------

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.map(|i| &self.tracks[i])
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    /// Fold in the latest playback position reported by the audio layer.
    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_index: self.current,
            status: self.status,
            position: self.position,
            duration: self.current.map_or(0.0, |i| self.tracks[i].duration),
            discovery: self.discovery,
            repeat_one: self.repeat_one,
        }
    }

    // ---- internals -----------------------------------------------------

    fn stop(&mut self) {
        self.sink.pause();
        self.current = None;
        self.position = 0.0;
        self.status = PlaybackStatus::Stopped;
    }

    /// Make `index` current: assign its mood if missing, rebind the
    /// sink, and keep playing if the session was playing.
    fn set_current(&mut self, index: usize) -> Result<()> {
        if index >= self.tracks.len() {
            return Err(Error::InvalidArgument(format!(
                "track index {index} out of range"
            )));
        }

        if self.tracks[index].mood.is_none() {
            let track = &mut self.tracks[index];
            let mood = mood::classify(&track.title, &track.artist);
            track.mood = Some(mood);
            track.palette = Some(mood.palette());
            debug!(title = %track.title, mood = mood.label(), "mood assigned");
        }

        self.current = Some(index);
        self.position = 0.0;
        let track = self.tracks[index].clone();
        self.sink.bind_track(&track)?;
        if self.status == PlaybackStatus::Playing {
            self.sink.play()?;
        }
        Ok(())
    }

    /// Uniform pick among non-queue tracks, excluding the current one
    /// whenever more than one candidate exists.
    fn pick_discovery_index(&mut self) -> Option<usize> {
        let candidates: Vec<usize> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(i, t)| !t.is_queue_item && (Some(*i) != self.current || self.non_queue_count() == 1))
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        self.rng_state = self
            .rng_state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        let pick = (self.rng_state >> 33) as usize % candidates.len();
        Some(candidates[pick])
    }

    fn non_queue_count(&self) -> usize {
        self.tracks.iter().filter(|t| !t.is_queue_item).count()
    }
}
