//! Mood tags and their fixed display palettes.

use serde::{Deserialize, Serialize};

/// Mood tag assigned to a track when it first becomes current.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Mood {
    Energetic,
    Chill,
    Focus,
    Romantic,
    Sad,
}

/// 2-color palette shown behind a playing track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoodPalette {
    pub primary: String,
    pub secondary: String,
}

impl MoodPalette {
    fn new(primary: &str, secondary: &str) -> Self {
        Self {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        }
    }
}

impl Mood {
    /// All moods in their canonical order, used by the hash fallback.
    /// Keyword scan precedence is a separate, documented contract.
    pub const ALL: [Self; 5] = [
        Self::Energetic,
        Self::Chill,
        Self::Focus,
        Self::Romantic,
        Self::Sad,
    ];

    /// The fixed palette for this mood. Deterministic so repeated loads of
    /// the same title render identically without persistence.
    pub fn palette(&self) -> MoodPalette {
        match self {
            Self::Energetic => MoodPalette::new("#ec5b13", "#ef4444"),
            Self::Chill => MoodPalette::new("#1e3a8a", "#3b82f6"),
            Self::Focus => MoodPalette::new("#065f46", "#10b981"),
            Self::Romantic => MoodPalette::new("#be123c", "#fb7185"),
            Self::Sad => MoodPalette::new("#334155", "#475569"),
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Energetic => "Energetic",
            Self::Chill => "Chill",
            Self::Focus => "Focus",
            Self::Romantic => "Romantic",
            Self::Sad => "Sad",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_stable() {
        assert_eq!(Mood::Chill.palette(), Mood::Chill.palette());
        assert_eq!(Mood::Energetic.palette().primary, "#ec5b13");
    }

    #[test]
    fn test_canonical_order() {
        assert_eq!(Mood::ALL[0], Mood::Energetic);
        assert_eq!(Mood::ALL[4], Mood::Sad);
    }
}
