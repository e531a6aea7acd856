use serde::{Deserialize, Serialize};

/// A phonics difficulty level, 1 through 5.
///
/// Serialized as its bare number, which is how the remote generator both
/// receives and returns levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    One = 1,
    Two,
    Three,
    Four,
    Five,
}

impl Level {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// One step harder, clamped at 5.
    pub fn harder(self) -> Level {
        Level::try_from(self.number() + 1).unwrap_or(Level::Five)
    }

    /// One step easier, clamped at 1.
    pub fn easier(self) -> Level {
        Level::try_from(self.number().saturating_sub(1)).unwrap_or(Level::One)
    }

    /// The level a placement-test question at `test_index` probes.
    pub fn for_test_index(test_index: u32) -> Level {
        Level::try_from((test_index + 1).min(5) as u8).unwrap_or(Level::Five)
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Level::One),
            2 => Ok(Level::Two),
            3 => Ok(Level::Three),
            4 => Ok(Level::Four),
            5 => Ok(Level::Five),
            other => Err(format!("level out of range: {other}")),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.number()
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Level {}", self.number())
    }
}

/// Static catalog entry describing one level on the menu.
#[derive(Debug, Clone, Copy)]
pub struct LevelInfo {
    pub id: Level,
    pub title: &'static str,
    pub description: &'static str,
    pub example: &'static str,
}

pub const LEVELS: [LevelInfo; 5] = [
    LevelInfo {
        id: Level::One,
        title: "Basic Foundations",
        description: "All 26 Alphabet sounds.",
        example: "a, b, c, d...",
    },
    LevelInfo {
        id: Level::Two,
        title: "The Glue",
        description: "Word Families (at, ip, en, og, un).",
        example: "-at, -ip, -en...",
    },
    LevelInfo {
        id: Level::Three,
        title: "The Builders",
        description: "CVC Words (Consonant-Vowel-Consonant).",
        example: "c-at, s-ip, m-ap...",
    },
    LevelInfo {
        id: Level::Four,
        title: "The Sound Mixers",
        description: "Blends & Digraphs.",
        example: "sh, ch, th, st, br, fl...",
    },
    LevelInfo {
        id: Level::Five,
        title: "Vowel Teams & Sentences",
        description: "Advanced sounds and short sentences.",
        example: "ee, oa, ai + sentences...",
    },
];
