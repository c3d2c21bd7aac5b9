//! Mood classification.
//!
//! A track's mood drives its display palette. Classification is a
//! linear scan over ordered keyword sets; the scan order is a documented
//! contract, not an accident. Chill precedes Energetic so titles like
//! "Chill Beats" read as Chill even though "beat" is an Energetic
//! keyword. Titles matching nothing fall back to a stable hash of the
//! title so repeated loads agree without persisting anything.

use sonic_core::Mood;

/// Keyword sets scanned in order against lowercased `title artist`
/// text. First matching set wins.
const MOOD_KEYWORDS: &[(Mood, &[&str])] = &[
    (
        Mood::Chill,
        &[
            "chill", "relax", "sleep", "ocean", "blue", "soft", "mellow", "ambient", "lof",
            "rain",
        ],
    ),
    (
        Mood::Energetic,
        &[
            "fast", "energetic", "party", "dance", "workout", "power", "heavy", "rock", "beat",
            "drum",
        ],
    ),
    (
        Mood::Focus,
        &[
            "focus", "study", "work", "zen", "calm", "piano", "instrumental", "brain",
        ],
    ),
    (
        Mood::Romantic,
        &[
            "love", "romantic", "darling", "heart", "kiss", "sweet", "valentin", "pink", "rose",
        ],
    ),
    (
        Mood::Sad,
        &["sad", "lonely", "dark", "pain", "cry", "tears", "broken", "grey"],
    ),
];

/// Classify a track by its title and artist text.
pub fn classify(title: &str, artist: &str) -> Mood {
    let text = format!("{title} {artist}").to_lowercase();
    for (mood, keywords) in MOOD_KEYWORDS {
        if keywords.iter().any(|kw| text.contains(kw)) {
            return *mood;
        }
    }
    title_hash_mood(title)
}

/// Polynomial rolling hash of the title (multiplier 31, signed 32-bit
/// accumulate over UTF-16 code units), folded onto the canonical mood
/// list.
fn title_hash_mood(title: &str) -> Mood {
    let mut hash: i32 = 0;
    for unit in title.encode_utf16() {
        hash = i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    Mood::ALL[hash.unsigned_abs() as usize % Mood::ALL.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chill_wins_over_energetic() {
        // "beat" is an Energetic keyword, but Chill is scanned first
        assert_eq!(classify("Late Night Chill Beats", "Anyone"), Mood::Chill);
    }

    #[test]
    fn test_keyword_match_per_mood() {
        assert_eq!(classify("Workout Mix", ""), Mood::Energetic);
        assert_eq!(classify("Deep Focus", ""), Mood::Focus);
        assert_eq!(classify("My Valentine", ""), Mood::Romantic);
        assert_eq!(classify("Broken Mirrors", ""), Mood::Sad);
    }

    #[test]
    fn test_artist_text_participates() {
        assert_eq!(classify("Untitled 7", "Piano Ensemble"), Mood::Focus);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert_eq!(classify("OCEAN WAVES", ""), Mood::Chill);
    }

    #[test]
    fn test_hash_fallback_is_stable() {
        let first = classify("xqjv", "unmatched");
        let second = classify("xqjv", "unmatched");
        assert_eq!(first, second);
    }

    #[test]
    fn test_hash_fallback_known_value() {
        // "xyz": 120, then 121 + 120*31 = 3841, then 122 + 3841*31 = 119193;
        // 119193 % 5 == 3 selects the fourth canonical mood
        assert_eq!(title_hash_mood("xyz"), Mood::ALL[3]);
    }
}
