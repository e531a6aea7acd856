//! Terminal rendering for each phase of the game.
//!
//! Every function here is a pure projection of the session state into a
//! string, so the whole presentation layer can be unit tested without an
//! audio device or a network connection.

use phonics_core::{GameState, LEVELS, Phase, PhonicsItem, RewardImage};

/// Renders the full screen for the current phase.
pub fn render(state: &GameState) -> String {
    let body = match &state.phase {
        Phase::Intro => render_intro(),
        Phase::Menu => render_menu(),
        Phase::LoadingItem { .. } | Phase::LoadingTest { .. } => render_loading(),
        Phase::Decoding => match &state.current {
            Some(item) => render_decoding(state, item),
            None => render_loading(),
        },
        Phase::Testing => match &state.current {
            Some(item) => render_testing(state, item),
            None => render_loading(),
        },
        Phase::Reward { image } => match &state.current {
            Some(item) => render_reward(item, image),
            None => render_menu(),
        },
    };

    let mut screen = format!("=== Phonics | {} ===\n\n{body}", state.level);
    if state.speaking {
        screen.push_str("\n\n  (speaking...)");
    }
    screen
}

fn render_intro() -> String {
    [
        "Ready?",
        "Let's find the best level for your adventure!",
        "",
        "  [test]   Quick Test     - I'm not sure where to start!",
        "  [menu]   Pick a Level   - I want to choose my level!",
    ]
    .join("\n")
}

fn render_menu() -> String {
    let mut lines = vec!["Adventure Levels".to_string(), String::new()];
    for info in LEVELS {
        lines.push(format!(
            "  [level {}] {}: {} ({})",
            info.id.number(),
            info.title,
            info.description,
            info.example
        ));
    }
    lines.join("\n")
}

fn render_loading() -> String {
    "Powering up...".to_string()
}

fn render_decoding(state: &GameState, item: &PhonicsItem) -> String {
    let mut lines = vec![
        letter_card(item, state.active_phoneme),
        String::new(),
        "Tap the blue button to hear each sound. Then \"glue\" them together!".to_string(),
        String::new(),
        "  [sound]  hear the next sound    [tap N]  hear sound N".to_string(),
        "  [read]   READ IT!               [next]   next word".to_string(),
        "  [parent] parent's secret guide  [menu]   back to the menu".to_string(),
    ];
    if state.panel_open {
        lines.push(String::new());
        lines.push(parent_panel(item));
    }
    lines.join("\n")
}

fn render_testing(state: &GameState, item: &PhonicsItem) -> String {
    [
        "Check your skills!".to_string(),
        String::new(),
        letter_card(item, state.active_phoneme),
        String::new(),
        format!("Parent: Can they decode this? ({})", item.reading_guide),
        String::new(),
        "  [hard]   Too Hard    [right]  Just Right    [easy]   Too Easy".to_string(),
        "  [guide]  hear the word".to_string(),
    ]
    .join("\n")
}

fn render_reward(item: &PhonicsItem, image: &RewardImage) -> String {
    let picture = match image {
        RewardImage::Pending(_) => "Creating your reward...".to_string(),
        RewardImage::Ready(_) => "Your reward picture is here! *".to_string(),
        RewardImage::Unavailable => "The picture got lost, but you still did it!".to_string(),
    };
    [
        item.congratulation.clone(),
        String::new(),
        picture,
        format!("\"{}\"", item.visual_reward),
        String::new(),
        "  [next]   NEXT ADVENTURE!    [menu]   back to the menu".to_string(),
    ]
    .join("\n")
}

/// The big word card: one slot per phoneme, the active one bracketed with
/// its guide bubble underneath.
fn letter_card(item: &PhonicsItem, active: Option<usize>) -> String {
    let slots: Vec<String> = item
        .phonemes
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            if active == Some(idx) {
                format!("[{p}]")
            } else {
                format!(" {p} ")
            }
        })
        .collect();

    let mut card = format!("   {}", slots.join("  "));
    match active {
        Some(idx) => {
            if let Some(guide) = item.phoneme_guides.get(idx) {
                card.push_str(&format!("\n       ^ {guide}"));
            }
            card.push_str("\n\nRepeat the sound!");
        }
        None => card.push_str("\n\nTap the blue button!"),
    }
    card
}

fn parent_panel(item: &PhonicsItem) -> String {
    [
        "Parent's Secret Guide".to_string(),
        format!("  Word Sound:        {}", item.reading_guide),
        format!("  Voice Instruction: \"{}\"", item.audio_cue),
        format!("  Victory Speech:    {}", item.congratulation),
        "  [cue] play the voice instruction  [parent] close".to_string(),
    ]
    .join("\n")
}
