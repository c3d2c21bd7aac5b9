//! LRC parser for lyrics.

use sonic_core::Error;
use tracing::debug;

use crate::{LyricLine, LyricsDoc};

/// Parse LRC text into a [`LyricsDoc`].
///
/// Lines may carry several timestamp tags (`[01:02.34][01:40.00]chorus`),
/// in which case the text repeats at each time. Lines with no usable
/// tags are dropped when the document is synced; when no line in the
/// whole input carries a timestamp the document falls back to unsynced
/// plain text. Input with nothing displayable at all is rejected.
pub fn parse_lrc(input: &str) -> Result<LyricsDoc, Error> {
    if input.trim().is_empty() {
        return Err(Error::LyricsParse("empty lyrics input".into()));
    }

    let mut timed = Vec::new();
    let mut plain = Vec::new();

    for raw in input.lines() {
        let (times, rest) = strip_tags(raw.trim());
        let text = rest.trim();

        if times.is_empty() {
            // Kept only if the whole document turns out unsynced.
            // Metadata-only lines ([ar:...], [ti:...]) leave no text.
            if !text.is_empty() {
                plain.push(text.to_string());
            }
            continue;
        }

        // Empty text under a timestamp marks an instrumental gap
        let display = if text.is_empty() { "…" } else { text };
        for time in times {
            timed.push(LyricLine {
                time,
                text: display.to_string(),
            });
        }
    }

    if timed.is_empty() {
        if plain.is_empty() {
            return Err(Error::LyricsParse("no displayable lyric lines".into()));
        }
        debug!(lines = plain.len(), "no timestamps found, unsynced lyrics");
        return Ok(LyricsDoc {
            lines: plain
                .into_iter()
                .map(|text| LyricLine { time: 0.0, text })
                .collect(),
            synced: false,
        });
    }

    timed.sort_by(|a, b| a.time.total_cmp(&b.time));
    let mut doc = LyricsDoc {
        lines: timed,
        synced: true,
    };
    doc.repair_fake_timestamps();
    Ok(doc)
}

/// Peel leading `[...]` tags off a line, collecting the ones that parse
/// as timestamps. Returns the times and the remaining text.
fn strip_tags(mut line: &str) -> (Vec<f64>, &str) {
    let mut times = Vec::new();
    while let Some(rest) = line.strip_prefix('[') {
        let Some(close) = rest.find(']') else { break };
        let inner = &rest[..close];
        if let Some(time) = parse_timestamp(inner) {
            times.push(time);
        }
        line = &rest[close + 1..];
    }
    (times, line)
}

/// Parse a tag body like `01:23`, `1:23.45` or `01:23:456` into seconds.
///
/// Minutes take one to three digits, seconds one or two, and the
/// optional fraction (after `.` or `:`) one to three, scaled by its
/// digit count.
fn parse_timestamp(inner: &str) -> Option<f64> {
    let (minutes_str, rest) = inner.split_once(':')?;
    if minutes_str.is_empty()
        || minutes_str.len() > 3
        || !minutes_str.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let minutes: f64 = minutes_str.parse().ok()?;

    let (seconds_str, fraction_str) = match rest.split_once(['.', ':']) {
        Some((s, f)) => (s, Some(f)),
        None => (rest, None),
    };
    if seconds_str.is_empty()
        || seconds_str.len() > 2
        || !seconds_str.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let seconds: f64 = seconds_str.parse().ok()?;

    let fraction = match fraction_str {
        None => 0.0,
        Some(f) => {
            if f.is_empty() || f.len() > 3 || !f.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let value: f64 = f.parse().ok()?;
            value / 10f64.powi(f.len() as i32)
        }
    };

    Some(minutes * 60.0 + seconds + fraction)
}
