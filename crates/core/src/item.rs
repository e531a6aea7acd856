use crate::level::Level;
use serde::{Deserialize, Serialize};

/// One generated phonics target, produced wholesale by the remote generator.
///
/// The wire format uses camelCase field names (`readingGuide`, `phonemeGuides`,
/// ...); every field is required. `phonemes` and `phoneme_guides` are
/// index-aligned: guide `i` explains phoneme `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonicsItem {
    pub word: String,
    pub reading_guide: String,
    pub phonemes: Vec<String>,
    pub phoneme_guides: Vec<String>,
    pub audio_cue: String,
    pub visual_reward: String,
    pub congratulation: String,
}

impl PhonicsItem {
    /// Whether the per-phoneme guides line up with the phoneme list.
    pub fn guides_aligned(&self) -> bool {
        self.phonemes.len() == self.phoneme_guides.len()
    }
}

/// A minimal placement-test question: the test path does not get the full
/// item shape from the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestQuestion {
    pub word: String,
    pub guide: String,
    pub level: Level,
}

impl TestQuestion {
    /// Projects the question into the full item shape the views render.
    ///
    /// Per-phoneme guides are fabricated locally as simple echoes of each
    /// character; the short test flow never asks the remote service for them.
    pub fn into_item(self) -> PhonicsItem {
        let phonemes: Vec<String> = self.word.chars().map(|c| c.to_string()).collect();
        let phoneme_guides = phonemes.iter().map(|p| format!("Sound: {p}")).collect();
        PhonicsItem {
            word: self.word,
            reading_guide: self.guide,
            phonemes,
            phoneme_guides,
            audio_cue: "Say it clearly and slowly.".to_string(),
            visual_reward: String::new(),
            congratulation: "Good test!".to_string(),
        }
    }
}
