mod config;
mod playback;
mod views;

use crate::config::{Config, GeneratorProvider};
use crate::playback::{Playback, PlaybackEvent};
use anyhow::{Context, Result};
use base64::Engine;
use clap::Parser;
use phonics_core::generator::GeminiGenerator;
use phonics_core::{Command, GameEvent, GameState, Phase, PhonicsGenerator, RewardImage, SimulatedGenerator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Everything the main loop can receive: typed lines, playback edges, and
/// the completions of spawned generator calls.
pub enum Input {
    Line(String),
    Playback(PlaybackEvent),
    Game(GameEvent),
    /// Base64 PCM16 speech audio, ready for the output buffer.
    SpeechAudio(String),
}

#[derive(Parser)]
#[command(name = "phonics", version)]
struct Cli {
    /// Output device to play speech through (defaults to the system device)
    #[arg(long)]
    output_device: Option<String>,
    /// List available output devices and exit
    #[arg(long)]
    list_outputs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting phonics service...");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    if args.list_outputs {
        println!("{}", phonics_native_utils::device::get_available_outputs()?);
        return Ok(());
    }

    // --- 4. Initialize the Generator ---
    let generator: Arc<dyn PhonicsGenerator> = match config.provider {
        GeneratorProvider::Gemini => {
            let api_key = config
                .gemini_api_key
                .clone()
                .context("GEMINI_API_KEY missing for gemini provider")?;
            Arc::new(GeminiGenerator::new(api_key, config.models.clone()))
        }
        GeneratorProvider::Simulated => Arc::new(SimulatedGenerator::new()),
    };

    // --- 5. Application Setup ---
    let (input_tx, mut input_rx) = tokio::sync::mpsc::channel::<Input>(1024);

    // Typed commands arrive on stdin, one per line.
    let line_tx = input_tx.clone();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(Input::Line(line)).await.is_err() {
                break;
            }
        }
    });

    // Silence edges from the output callback feed back into the main loop.
    let (playback_tx, mut playback_rx) = tokio::sync::mpsc::channel::<PlaybackEvent>(64);
    let playback_forward = input_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = playback_rx.recv().await {
            if playback_forward.send(Input::Playback(event)).await.is_err() {
                break;
            }
        }
    });

    // The cpal stream is not Send, so playback stays in this task.
    let output = phonics_native_utils::device::get_or_default_output(args.output_device)
        .context("Failed to get audio output device")?;
    let mut playback = Playback::new(output, playback_tx)?;

    let mut state = GameState::new();
    println!("{}", views::render(&state));

    // --- 6. Main Loop ---
    loop {
        tokio::select! {
            input = input_rx.recv() => {
                let Some(input) = input else { break };
                match input {
                    Input::Line(line) => {
                        let line = line.trim().to_lowercase();
                        if line.is_empty() {
                            continue;
                        }
                        if line == "quit" || line == "exit" {
                            break;
                        }
                        match intent(&line, &state) {
                            Some(event) => {
                                handle_event(event, &mut state, &mut playback, &generator, &input_tx);
                            }
                            None => {
                                println!("Unknown command: {line:?}. Try: level N, tap N, sound, read, next, cue, guide, parent, test, hard, right, easy, menu, quit");
                                continue;
                            }
                        }
                    }
                    Input::Playback(PlaybackEvent::Started) => {
                        handle_event(GameEvent::SpeechStarted, &mut state, &mut playback, &generator, &input_tx);
                    }
                    Input::Playback(PlaybackEvent::Finished) => {
                        handle_event(GameEvent::SpeechFinished, &mut state, &mut playback, &generator, &input_tx);
                    }
                    Input::Game(event) => {
                        handle_event(event, &mut state, &mut playback, &generator, &input_tx);
                    }
                    Input::SpeechAudio(payload) => {
                        if let Err(e) = playback.resume() {
                            tracing::error!("Failed to resume output stream: {:?}", e);
                        }
                        // Nothing queued means no silence edge will ever
                        // fire, so the speaking flag must be cleared here.
                        if playback.push_base64(&payload) == 0 {
                            tracing::warn!("speech payload produced no samples");
                            handle_event(GameEvent::SpeechFinished, &mut state, &mut playback, &generator, &input_tx);
                        } else {
                            continue;
                        }
                    }
                }
                println!("{}", views::render(&state));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down...");
                break;
            }
        }
    }
    tracing::info!("Shutting down...");
    Ok(())
}

/// Runs one event through the reducer and executes the commands it returns,
/// spawning remote calls whose completions come back as further events.
fn handle_event(
    event: GameEvent,
    state: &mut GameState,
    playback: &mut Playback,
    generator: &Arc<dyn PhonicsGenerator>,
    input_tx: &tokio::sync::mpsc::Sender<Input>,
) {
    let image_resolved = matches!(&event, GameEvent::RewardImageReady { .. });
    let commands = state.apply(event);

    // A freshly resolved reward picture is persisted so the parent can open
    // it outside the terminal. Stale responses never reach the Ready state.
    if image_resolved {
        if let Phase::Reward {
            image: RewardImage::Ready(data_uri),
        } = &state.phase
        {
            match save_reward_image(data_uri) {
                Ok(path) => tracing::info!("Reward image saved to {}", path.display()),
                Err(e) => tracing::warn!("Failed to save reward image: {:?}", e),
            }
        }
    }

    for command in commands {
        match command {
            Command::Speak { text, voice } => {
                if let Err(e) = playback.resume() {
                    tracing::error!("Failed to resume output stream: {:?}", e);
                }
                let generator = generator.clone();
                let tx = input_tx.clone();
                tokio::spawn(async move {
                    match generator.speech(&text, voice).await {
                        Ok(payload) => {
                            let _ = tx.send(Input::SpeechAudio(payload)).await;
                        }
                        Err(e) => {
                            tracing::error!("Speech error: {:?}", e);
                            let _ = tx.send(Input::Game(GameEvent::SpeechFinished)).await;
                        }
                    }
                });
            }
            Command::FetchItem {
                token,
                level,
                exclude,
            } => {
                let generator = generator.clone();
                let tx = input_tx.clone();
                tokio::spawn(async move {
                    let event = match generator.next_item(level, &exclude).await {
                        Ok(item) => GameEvent::ItemReady { token, item },
                        Err(e) => {
                            tracing::error!("Item generation error: {:?}", e);
                            GameEvent::ItemFailed { token }
                        }
                    };
                    let _ = tx.send(Input::Game(event)).await;
                });
            }
            Command::FetchTestQuestion { token, index } => {
                let generator = generator.clone();
                let tx = input_tx.clone();
                tokio::spawn(async move {
                    let event = match generator.test_question(index).await {
                        Ok(question) => GameEvent::TestReady { token, question },
                        Err(e) => {
                            tracing::error!("Test question error: {:?}", e);
                            GameEvent::TestFailed { token }
                        }
                    };
                    let _ = tx.send(Input::Game(event)).await;
                });
            }
            Command::FetchRewardImage { token, description } => {
                let generator = generator.clone();
                let tx = input_tx.clone();
                tokio::spawn(async move {
                    let event = match generator.reward_image(&description).await {
                        Ok(data_uri) => GameEvent::RewardImageReady { token, data_uri },
                        Err(e) => {
                            tracing::error!("Image generation error: {:?}", e);
                            GameEvent::RewardImageFailed { token }
                        }
                    };
                    let _ = tx.send(Input::Game(event)).await;
                });
            }
        }
    }
}

/// Maps one typed line to a game event. Returns None for unrecognized input.
fn intent(line: &str, state: &GameState) -> Option<GameEvent> {
    if let Some(rest) = line.strip_prefix("level ") {
        let n: u8 = rest.trim().parse().ok()?;
        let level = phonics_core::Level::try_from(n).ok()?;
        return Some(GameEvent::SelectLevel(level));
    }
    if let Some(rest) = line.strip_prefix("tap ") {
        let n: usize = rest.trim().parse().ok()?;
        // Phonemes are numbered from 1 on screen.
        return Some(GameEvent::TapPhoneme(n.checked_sub(1)?));
    }
    match line {
        "sound" => Some(GameEvent::PlayNextPhoneme),
        "read" => Some(GameEvent::RevealReward),
        "guide" => Some(GameEvent::PlayReadingGuide),
        "next" => Some(GameEvent::NextItem),
        "menu" => Some(GameEvent::BackToMenu),
        "test" => Some(GameEvent::StartQuickTest),
        "cue" => Some(GameEvent::PlayCue),
        "parent" => Some(GameEvent::SetParentPanel(!state.panel_open)),
        // The placement verdicts from the parent hand control back to the
        // levels, nudged down, kept, or nudged up.
        "hard" => Some(GameEvent::SelectLevel(state.level.easier())),
        "right" => Some(GameEvent::SelectLevel(state.level)),
        "easy" => Some(GameEvent::SelectLevel(state.level.harder())),
        _ => None,
    }
}

/// Writes the decoded reward picture next to the other temp files and
/// returns its path.
fn save_reward_image(data_uri: &str) -> Result<PathBuf> {
    let payload = data_uri
        .split_once("base64,")
        .map(|(_, rest)| rest)
        .context("reward image is not a base64 data URI")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("reward image payload is not valid base64")?;
    let path = std::env::temp_dir().join("phonics-reward.png");
    std::fs::write(&path, bytes).context("failed to write reward image")?;
    Ok(path)
}
