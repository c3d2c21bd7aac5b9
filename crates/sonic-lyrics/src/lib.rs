//! Lyric parsing and playback synchronization for Sonic Stream.
//!
//! LRC text goes in through [`parse_lrc`]; playback position goes into a
//! [`LyricCursor`] at whatever cadence the caller polls, and line-change
//! events come out edge-triggered so the display layer never re-renders
//! a line it is already showing.

mod parser;

pub use parser::parse_lrc;

use serde::{Deserialize, Serialize};

/// How far a timestamp may drift from a fixed grid before the grid
/// heuristic stops matching, in seconds.
const FAKE_GRID_TOLERANCE: f64 = 0.1;

/// Minimum line count before the fixed-grid heuristic applies. Short
/// songs can legitimately have evenly spaced lines.
const FAKE_GRID_MIN_LINES: usize = 5;

/// A single display line with its start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// Start time in seconds. Meaningless when the document is unsynced.
    pub time: f64,
    /// The line text. Instrumental gaps carry an ellipsis placeholder.
    pub text: String,
}

/// A parsed lyric document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsDoc {
    pub lines: Vec<LyricLine>,
    /// Whether line times are trustworthy. Unsynced documents display as
    /// static text and never produce cursor events.
    pub synced: bool,
}

impl LyricsDoc {
    /// Index of the line active at `position` seconds: the last line
    /// whose start time has been reached. `None` before the first line
    /// and for unsynced documents.
    pub fn active_index(&self, position: f64) -> Option<usize> {
        if !self.synced {
            return None;
        }
        self.lines
            .iter()
            .rposition(|line| line.time <= position)
    }

    /// Plain text with no timing, one line per entry.
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Detect timestamps fabricated on a fixed grid and demote the
    /// document to unsynced.
    ///
    /// Some legacy exports stamped every line at exactly 3 or 4 second
    /// intervals to fake synchronization. When more than
    /// [`FAKE_GRID_MIN_LINES`] lines all sit within
    /// [`FAKE_GRID_TOLERANCE`] of such a grid, the times carry no real
    /// information and highlighting from them would mislead.
    pub fn repair_fake_timestamps(&mut self) {
        if !self.synced || self.lines.len() <= FAKE_GRID_MIN_LINES {
            return;
        }
        let on_grid = |step: f64| {
            self.lines
                .iter()
                .enumerate()
                .all(|(i, line)| (line.time - i as f64 * step).abs() <= FAKE_GRID_TOLERANCE)
        };
        if on_grid(3.0) || on_grid(4.0) {
            tracing::debug!(
                lines = self.lines.len(),
                "fixed-grid timestamps detected, demoting to unsynced"
            );
            self.synced = false;
        }
    }
}

/// Edge-triggered tracker of the active lyric line.
///
/// Feed it the playback position at any cadence; it reports an index
/// only on the poll where the active line actually changes.
#[derive(Debug, Default)]
pub struct LyricCursor {
    last: Option<usize>,
}

impl LyricCursor {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Advance to `position`. Returns the newly active line index on the
    /// poll where it changes; `None` while the line is unchanged or no
    /// line is active yet.
    pub fn poll(&mut self, doc: &LyricsDoc, position: f64) -> Option<usize> {
        let active = doc.active_index(position);
        if active == self.last {
            return None;
        }
        self.last = active;
        active
    }

    /// Forget the tracked line, e.g. after a seek or track change.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(times: &[f64]) -> LyricsDoc {
        LyricsDoc {
            lines: times
                .iter()
                .enumerate()
                .map(|(i, t)| LyricLine {
                    time: *t,
                    text: format!("line {i}"),
                })
                .collect(),
            synced: true,
        }
    }

    #[test]
    fn test_active_index_picks_last_reached_line() {
        let doc = doc(&[0.0, 2.0, 5.0]);
        assert_eq!(doc.active_index(1.0), Some(0));
        assert_eq!(doc.active_index(2.0), Some(1));
        assert_eq!(doc.active_index(4.9), Some(1));
        assert_eq!(doc.active_index(5.0), Some(2));
        assert_eq!(doc.active_index(60.0), Some(2));
    }

    #[test]
    fn test_no_active_line_before_first_timestamp() {
        let doc = doc(&[1.5, 3.0]);
        assert_eq!(doc.active_index(0.0), None);
        assert_eq!(doc.active_index(1.4), None);
    }

    #[test]
    fn test_unsynced_doc_never_activates() {
        let mut d = doc(&[0.0, 2.0]);
        d.synced = false;
        assert_eq!(d.active_index(10.0), None);
    }

    #[test]
    fn test_cursor_fires_only_on_change() {
        let doc = doc(&[0.0, 2.0, 5.0]);
        let mut cursor = LyricCursor::new();
        assert_eq!(cursor.poll(&doc, 0.5), Some(0));
        assert_eq!(cursor.poll(&doc, 1.0), None);
        assert_eq!(cursor.poll(&doc, 1.9), None);
        assert_eq!(cursor.poll(&doc, 2.1), Some(1));
        assert_eq!(cursor.poll(&doc, 2.2), None);
        assert_eq!(cursor.poll(&doc, 5.0), Some(2));
    }

    #[test]
    fn test_cursor_follows_backwards_seek() {
        let doc = doc(&[0.0, 2.0, 5.0]);
        let mut cursor = LyricCursor::new();
        assert_eq!(cursor.poll(&doc, 6.0), Some(2));
        assert_eq!(cursor.poll(&doc, 0.5), Some(0));
    }

    #[test]
    fn test_cursor_reset() {
        let doc = doc(&[0.0, 2.0]);
        let mut cursor = LyricCursor::new();
        assert_eq!(cursor.poll(&doc, 3.0), Some(1));
        cursor.reset();
        assert_eq!(cursor.poll(&doc, 3.0), Some(1));
    }

    #[test]
    fn test_three_second_grid_is_demoted() {
        let mut d = doc(&[0.0, 3.0, 6.0, 9.0, 12.0, 15.0]);
        d.repair_fake_timestamps();
        assert!(!d.synced);
    }

    #[test]
    fn test_four_second_grid_is_demoted() {
        let mut d = doc(&[0.0, 4.05, 7.98, 12.0, 16.02, 20.0, 24.0]);
        d.repair_fake_timestamps();
        assert!(!d.synced);
    }

    #[test]
    fn test_real_timestamps_survive_repair() {
        let mut d = doc(&[0.0, 2.8, 6.1, 9.3, 11.0, 16.4, 19.9]);
        d.repair_fake_timestamps();
        assert!(d.synced);
    }

    #[test]
    fn test_short_docs_are_never_demoted() {
        let mut d = doc(&[0.0, 3.0, 6.0]);
        d.repair_fake_timestamps();
        assert!(d.synced);
    }
}
