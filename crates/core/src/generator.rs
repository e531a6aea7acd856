use crate::item::{PhonicsItem, TestQuestion};
use crate::level::Level;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The persona prompt sent with every content-generation call.
const SYSTEM_INSTRUCTION: &str = r#"
You are the "Phonics Adventure Engine", a high-energy, fun synthetic phonics teacher for a 4-year-old boy.
Your mission is to guide him and his parent through phonics learning.

RULES:
1. NEVER show a picture of the target word first.
2. Provide a "Reading Guide" in slashes like /kæt/ for the parent.
3. Use [Audio Cues] to tell the parent how to voice the characters (e.g. [Squeaky Voice], [Giant Voice]).
4. Describe a funny "Visual Reward" after the child succeeds.
5. Focus on Synthetic Phonics: individual sounds blending together.
6. Use "Finger Slide" instructions: letter -> letter -> letter.

When asked for a new phonics item for a level, return JSON format.
"#;

/// The prebuilt TTS voices the app speaks with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voice {
    /// Phoneme and reading-guide playback.
    Kore,
    /// Reward announcements.
    Puck,
    /// Parent audio cues.
    Charon,
}

impl Voice {
    pub fn name(self) -> &'static str {
        match self {
            Voice::Kore => "Kore",
            Voice::Puck => "Puck",
            Voice::Charon => "Charon",
        }
    }
}

/// Failures a remote call can produce. None of these are retried; the caller
/// clears its loading state, logs, and stays where it was.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("response is missing {0}")]
    MissingPart(&'static str),
    #[error("no audio data returned")]
    NoAudio,
    #[error("no image generated")]
    NoImage,
    #[error("phoneme guides misaligned: {phonemes} phonemes, {guides} guides")]
    GuideMismatch { phonemes: usize, guides: usize },
}

// The `PhonicsGenerator` trait is the seam between the session/runtime logic
// and the hosted model API. The runtime only ever sees this abstraction, so
// tests can swap in `mockall`'s generated mock and the binary can swap in the
// offline `SimulatedGenerator` without touching any control flow.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait PhonicsGenerator: Send + Sync {
    /// Generates the next phonics target for a level, best-effort avoiding
    /// the excluded words.
    async fn next_item(
        &self,
        level: Level,
        excluded_words: &[String],
    ) -> Result<PhonicsItem, GeneratorError>;

    /// Synthesizes speech for `text`, returning the base64 audio payload
    /// (raw 16-bit little-endian PCM, mono, 24 kHz).
    async fn speech(&self, text: &str, voice: Voice) -> Result<String, GeneratorError>;

    /// Generates a reward illustration, returned as a `data:image/png;base64,`
    /// URI ready for display.
    async fn reward_image(&self, description: &str) -> Result<String, GeneratorError>;

    /// Generates a single placement-test question for the given test index.
    async fn test_question(&self, test_index: u32) -> Result<TestQuestion, GeneratorError>;
}

/// Which remote models the generator calls for each operation.
#[derive(Debug, Clone)]
pub struct GeminiModels {
    pub item: String,
    pub tts: String,
    pub image: String,
}

impl Default for GeminiModels {
    fn default() -> Self {
        Self {
            item: "gemini-3-flash-preview".to_string(),
            tts: "gemini-2.5-flash-preview-tts".to_string(),
            image: "gemini-2.5-flash-image".to_string(),
        }
    }
}

pub struct GeminiGenerator {
    client: Client,
    api_key: SecretString,
    models: GeminiModels,
}

// --- Wire shapes of the generateContent response ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[allow(dead_code)]
    mime_type: String,
    data: String,
}

impl GenerateContentResponse {
    /// The first text part of the first candidate.
    fn first_text(&self) -> Result<&str, GeneratorError> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.iter().find_map(|p| p.text.as_deref()))
            .ok_or(GeneratorError::MissingPart("a text part"))
    }

    /// The first inline-data part across all candidates, if any.
    fn first_inline_data(&self) -> Option<&InlineData> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .find_map(|p| p.inline_data.as_ref())
    }
}

impl GeminiGenerator {
    pub fn new(api_key: SecretString, models: GeminiModels) -> Self {
        Self {
            client: Client::new(),
            api_key,
            models,
        }
    }

    async fn generate(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<GenerateContentResponse, GeneratorError> {
        let url = format!("{API_BASE_URL}/models/{model}:generateContent");
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateContentResponse>()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl PhonicsGenerator for GeminiGenerator {
    async fn next_item(
        &self,
        level: Level,
        excluded_words: &[String],
    ) -> Result<PhonicsItem, GeneratorError> {
        let prompt = format!(
            "Generate a new phonics target for {level}.\n\
             Avoid these previous words: {}.\n\
             Level details:\n\
             Level 1: Single letter sounds.\n\
             Level 2: Word families like -at, -ip.\n\
             Level 3: CVC words.\n\
             Level 4: Blends/Digraphs.\n\
             Level 5: Vowel teams/sentences.\n\n\
             Return a JSON object with:\n\
             - word (the target word or sound)\n\
             - readingGuide (the whole word e.g. /kæt/)\n\
             - phonemes (array of sounds, e.g. [\"c\", \"a\", \"t\"])\n\
             - phonemeGuides (array of strings, one for each phoneme, e.g. [\"/k/ as in kite\", \"/æ/ as in apple\", \"/t/ as in tiger\"])\n\
             - audioCue (instructions for the parent, e.g. \"Say it like a sneaky mouse: /s/ /s/ /s/\")\n\
             - visualReward (description of a funny thing that happens)\n\
             - congratulation (energetic praise)",
            excluded_words.join(", "),
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "word": { "type": "STRING" },
                        "readingGuide": { "type": "STRING" },
                        "phonemes": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "phonemeGuides": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "audioCue": { "type": "STRING" },
                        "visualReward": { "type": "STRING" },
                        "congratulation": { "type": "STRING" },
                    },
                    "required": [
                        "word", "readingGuide", "phonemes", "phonemeGuides",
                        "audioCue", "visualReward", "congratulation",
                    ],
                },
            },
        });

        let resp = self.generate(&self.models.item, body).await?;
        let item: PhonicsItem = serde_json::from_str(resp.first_text()?.trim())?;
        if !item.guides_aligned() {
            return Err(GeneratorError::GuideMismatch {
                phonemes: item.phonemes.len(),
                guides: item.phoneme_guides.len(),
            });
        }
        Ok(item)
    }

    async fn speech(&self, text: &str, voice: Voice) -> Result<String, GeneratorError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice.name() },
                    },
                },
            },
        });

        let resp = self.generate(&self.models.tts, body).await?;
        let audio = resp.first_inline_data().ok_or(GeneratorError::NoAudio)?;
        Ok(audio.data.clone())
    }

    async fn reward_image(&self, description: &str) -> Result<String, GeneratorError> {
        let prompt = format!(
            "A vibrant, fun, high-energy, kid-friendly 3D cartoon illustration of: {description}. \
             White background, professional character design, bright colors."
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let resp = self.generate(&self.models.image, body).await?;
        let image = resp.first_inline_data().ok_or(GeneratorError::NoImage)?;
        Ok(format!("data:image/png;base64,{}", image.data))
    }

    async fn test_question(&self, test_index: u32) -> Result<TestQuestion, GeneratorError> {
        let target = Level::for_test_index(test_index);
        let prompt = format!(
            "Generate a single word or sound to test if a child is at {target}.\n\
             Return JSON: {{ \"word\": \"string\", \"guide\": \"/string/\", \"level\": number }}"
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "generationConfig": { "responseMimeType": "application/json" },
        });

        let resp = self.generate(&self.models.item, body).await?;
        let question: TestQuestion = serde_json::from_str(resp.first_text()?.trim())?;
        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::env;

    #[test]
    fn response_parsing_finds_the_first_text_part() {
        let json = r#"{
            "candidates": [{
                "content": { "parts": [
                    { "text": "{\"word\":\"cat\"}" }
                ]}
            }]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_text().unwrap(), r#"{"word":"cat"}"#);
    }

    #[test]
    fn response_without_candidates_is_a_missing_part() {
        let resp: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            resp.first_text(),
            Err(GeneratorError::MissingPart(_))
        ));
        assert!(resp.first_inline_data().is_none());
    }

    #[test]
    fn inline_data_is_found_across_candidates() {
        let json = r#"{
            "candidates": [
                { "content": { "parts": [{ "text": "here it comes" }] } },
                { "content": { "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": "aGk=" } }
                ]}}
            ]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_inline_data().unwrap().data, "aGk=");
    }

    #[test]
    fn guide_mismatch_is_rejected_at_parse_time() {
        // Mirrors the check next_item applies after deserializing.
        let item: PhonicsItem = serde_json::from_str(
            r#"{
                "word": "cat",
                "readingGuide": "/kæt/",
                "phonemes": ["c", "a", "t"],
                "phonemeGuides": ["/k/ as in kite"],
                "audioCue": "x",
                "visualReward": "y",
                "congratulation": "z"
            }"#,
        )
        .unwrap();
        assert!(!item.guides_aligned());
    }

    // Live integration test against the real API. Ignored by default so
    // `cargo test` runs without a key; run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn live_next_item_returns_an_aligned_item() {
        dotenvy::dotenv_override().ok();
        let api_key = env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY not set");
        let generator =
            GeminiGenerator::new(SecretString::from(api_key), GeminiModels::default());

        let item = generator
            .next_item(Level::Three, &["cat".to_string()])
            .await
            .expect("next_item failed");
        assert!(item.guides_aligned());
        assert!(!item.word.is_empty());
        assert_ne!(item.word, "cat");
    }

    // Live integration test. See the note on `live_next_item_returns_an_aligned_item`.
    #[tokio::test]
    #[ignore]
    async fn live_speech_returns_audio_payload() {
        dotenvy::dotenv_override().ok();
        let api_key = env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY not set");
        let generator =
            GeminiGenerator::new(SecretString::from(api_key), GeminiModels::default());

        let base64_audio = generator
            .speech("mmm", Voice::Kore)
            .await
            .expect("speech failed");
        assert!(!base64_audio.is_empty());
    }
}
