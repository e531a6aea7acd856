//! Application Configuration Module
//!
//! Centralizes the configuration for the phonics service. Settings are
//! loaded from environment variables into a single struct that is passed
//! throughout the application.

use phonics_core::generator::GeminiModels;
use secrecy::SecretString;
use std::env;
use tracing::Level;

// --- Application Constants ---

/// The size of each audio chunk for the audio output stream.
pub const OUTPUT_CHUNK_SIZE: usize = 1024;
/// Seconds of decoded speech the output ring buffer can hold. A whole
/// utterance is queued at once, so this must cover the longest payload the
/// generator plausibly returns.
pub const OUTPUT_BUFFER_SECS: usize = 60;

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorProvider {
    Gemini,
    Simulated,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<SecretString>,
    pub models: GeminiModels,
    pub log_level: Level,
    pub provider: GeneratorProvider,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `PHONICS_PROVIDER`: The generator backend to use. Can be "gemini" or "simulated". Defaults to "gemini".
    // *   `GEMINI_API_KEY`: Your secret key for the Gemini API. Required if provider is "gemini".
    // *   `PHONICS_ITEM_MODEL`: (Optional) Overrides the word-generation model.
    // *   `PHONICS_TTS_MODEL`: (Optional) Overrides the speech-synthesis model.
    // *   `PHONICS_IMAGE_MODEL`: (Optional) Overrides the reward-image model.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO". Can be "TRACE", "DEBUG", "INFO", "WARN", or "ERROR".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();

        let provider_str = env::var("PHONICS_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "simulated" => GeneratorProvider::Simulated,
            // Default to Gemini for "gemini" or any other value
            _ => GeneratorProvider::Gemini,
        };

        let gemini_api_key = env::var("GEMINI_API_KEY").ok().map(SecretString::from);

        let mut models = GeminiModels::default();
        if let Ok(model) = env::var("PHONICS_ITEM_MODEL") {
            models.item = model;
        }
        if let Ok(model) = env::var("PHONICS_TTS_MODEL") {
            models.tts = model;
        }
        if let Ok(model) = env::var("PHONICS_IMAGE_MODEL") {
            models.image = model;
        }

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        let config = Self {
            gemini_api_key,
            models,
            log_level,
            provider,
        };

        // Validate that the required API key is present for the selected provider.
        if config.provider == GeneratorProvider::Gemini && config.gemini_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "GEMINI_API_KEY must be set for gemini provider".to_string(),
            ));
        }

        Ok(config)
    }
}
