use crate::generator::{GeneratorError, PhonicsGenerator, Voice};
use crate::item::{PhonicsItem, TestQuestion};
use crate::level::Level;
use async_trait::async_trait;
use base64::Engine;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A simulated `PhonicsGenerator`.
///
/// This implementation makes no API calls. It serves plausible, hard-coded
/// items, a synthesized tone instead of speech, and a single-pixel reward
/// image, so the runtime and playback path can be exercised without a
/// `GEMINI_API_KEY`.
pub struct SimulatedGenerator {
    served: AtomicUsize,
}

/// 1x1 transparent PNG.
const PIXEL_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Word bank keyed by level, cycled through as items are requested.
const WORD_BANK: [&[(&str, &str)]; 5] = [
    &[("s", "/s/"), ("m", "/m/"), ("t", "/t/")],
    &[("at", "/æt/"), ("ip", "/ɪp/"), ("og", "/ɒg/")],
    &[("cat", "/kæt/"), ("sip", "/sɪp/"), ("map", "/mæp/")],
    &[("ship", "/ʃɪp/"), ("chat", "/tʃæt/"), ("stop", "/stɒp/")],
    &[("rain", "/reɪn/"), ("boat", "/bəʊt/"), ("see", "/siː/")],
];

impl SimulatedGenerator {
    pub fn new() -> Self {
        Self {
            served: AtomicUsize::new(0),
        }
    }

    fn pick(&self, level: Level, excluded_words: &[String]) -> (&'static str, &'static str) {
        let bank = WORD_BANK[(level.number() - 1) as usize];
        let start = self.served.fetch_add(1, Ordering::Relaxed);
        // Respect the exclusion list best-effort, like the remote prompt does.
        for offset in 0..bank.len() {
            let (word, guide) = bank[(start + offset) % bank.len()];
            if !excluded_words.iter().any(|w| w == word) {
                return (word, guide);
            }
        }
        bank[start % bank.len()]
    }
}

impl Default for SimulatedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhonicsGenerator for SimulatedGenerator {
    async fn next_item(
        &self,
        level: Level,
        excluded_words: &[String],
    ) -> Result<PhonicsItem, GeneratorError> {
        let (word, guide) = self.pick(level, excluded_words);
        let phonemes: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        let phoneme_guides = phonemes
            .iter()
            .map(|p| format!("/{p}/ as in {p}..."))
            .collect();
        Ok(PhonicsItem {
            word: word.to_string(),
            reading_guide: guide.to_string(),
            phonemes,
            phoneme_guides,
            audio_cue: format!("[Slow Robot Voice] Slide your finger: {word}"),
            visual_reward: format!("a tiny robot doing a happy dance spelling {word}"),
            congratulation: "WOOHOO! You read it!".to_string(),
        })
    }

    async fn speech(&self, text: &str, _voice: Voice) -> Result<String, GeneratorError> {
        // A short 440 Hz tone at the speech sample rate, one blip per word.
        let blips = text.split_whitespace().count().max(1).min(3);
        let samples_per_blip = 24_000 / 5;
        let mut pcm = Vec::with_capacity(blips * samples_per_blip * 2);
        for blip in 0..blips {
            for n in 0..samples_per_blip {
                let t = n as f32 / 24_000.0;
                let fade = 1.0 - n as f32 / samples_per_blip as f32;
                let amp = (t * 440.0 * (blip + 1) as f32 * std::f32::consts::TAU).sin() * fade;
                let sample = (amp * 0.4 * i16::MAX as f32) as i16;
                pcm.extend_from_slice(&sample.to_le_bytes());
            }
        }
        Ok(base64::engine::general_purpose::STANDARD.encode(pcm))
    }

    async fn reward_image(&self, _description: &str) -> Result<String, GeneratorError> {
        Ok(format!("data:image/png;base64,{PIXEL_PNG_BASE64}"))
    }

    async fn test_question(&self, test_index: u32) -> Result<TestQuestion, GeneratorError> {
        let level = Level::for_test_index(test_index);
        let (word, guide) = self.pick(level, &[]);
        Ok(TestQuestion {
            word: word.to_string(),
            guide: guide.to_string(),
            level,
        })
    }
}
