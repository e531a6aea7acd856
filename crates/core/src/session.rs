use crate::generator::Voice;
use crate::item::{PhonicsItem, TestQuestion};
use crate::level::Level;

/// Identifies one outstanding remote call. A completion carrying a token that
/// no longer matches the one recorded in the phase is stale and is discarded,
/// so a rapid double-tap cannot race two responses into the same slot.
pub type RequestToken = u64;

/// The reward illustration slot inside the reward phase.
#[derive(Debug, Clone, PartialEq)]
pub enum RewardImage {
    Pending(RequestToken),
    Ready(String),
    Unavailable,
}

/// The UI phase as a tagged union: a loading state always carries the token
/// of the call it is waiting for, and the reward image can only exist while
/// the phase is `Reward`.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Intro,
    Menu,
    LoadingItem {
        token: RequestToken,
        /// Append the current item to history when the new one arrives.
        advance: bool,
    },
    Decoding,
    LoadingTest {
        token: RequestToken,
    },
    Testing,
    Reward {
        image: RewardImage,
    },
}

/// Side effects the reducer asks the runtime to perform.
///
/// This enum decouples the session's decision-making from the runtime's
/// execution: the reducer stays a pure function of (state, event) and the
/// runtime spawns the remote calls, feeding completions back as events.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    FetchItem {
        token: RequestToken,
        level: Level,
        exclude: Vec<String>,
    },
    FetchTestQuestion {
        token: RequestToken,
        index: u32,
    },
    FetchRewardImage {
        token: RequestToken,
        description: String,
    },
    Speak {
        text: String,
        voice: Voice,
    },
}

/// Everything that can happen to a session: user intents and the completions
/// of the remote calls those intents started.
#[derive(Debug, Clone)]
pub enum GameEvent {
    SelectLevel(Level),
    NextItem,
    RevealReward,
    BackToMenu,
    StartQuickTest,
    TapPhoneme(usize),
    /// The big sound button: taps the phoneme after the active one, wrapping.
    PlayNextPhoneme,
    PlayCue,
    PlayReadingGuide,
    SetParentPanel(bool),
    ItemReady {
        token: RequestToken,
        item: PhonicsItem,
    },
    ItemFailed {
        token: RequestToken,
    },
    TestReady {
        token: RequestToken,
        question: TestQuestion,
    },
    TestFailed {
        token: RequestToken,
    },
    RewardImageReady {
        token: RequestToken,
        data_uri: String,
    },
    RewardImageFailed {
        token: RequestToken,
    },
    SpeechStarted,
    SpeechFinished,
}

/// The whole session: one of these per process, owned by the event loop.
#[derive(Debug)]
pub struct GameState {
    pub level: Level,
    pub phase: Phase,
    pub history: Vec<PhonicsItem>,
    pub current: Option<PhonicsItem>,
    pub active_phoneme: Option<usize>,
    pub speaking: bool,
    pub panel_open: bool,
    pub test_phase: u32,
    next_token: RequestToken,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            level: Level::One,
            phase: Phase::Intro,
            history: Vec::new(),
            current: None,
            active_phoneme: None,
            speaking: false,
            panel_open: false,
            test_phase: 0,
            next_token: 0,
        }
    }

    fn take_token(&mut self) -> RequestToken {
        self.next_token += 1;
        self.next_token
    }

    fn words_seen(&self) -> Vec<String> {
        self.history.iter().map(|item| item.word.clone()).collect()
    }

    /// Applies one event, returning the side effects the runtime should run.
    /// Pure apart from the trace lines: no I/O, no clocks, no randomness.
    pub fn apply(&mut self, event: GameEvent) -> Vec<Command> {
        match event {
            GameEvent::SelectLevel(level) => {
                self.level = level;
                self.active_phoneme = None;
                let token = self.take_token();
                let exclude = self.words_seen();
                self.phase = Phase::LoadingItem {
                    token,
                    advance: false,
                };
                vec![Command::FetchItem {
                    token,
                    level,
                    exclude,
                }]
            }
            GameEvent::NextItem => {
                if !matches!(self.phase, Phase::Decoding | Phase::Reward { .. }) {
                    tracing::debug!("next-item ignored outside decoding/reward");
                    return vec![];
                }
                self.active_phoneme = None;
                let token = self.take_token();
                let mut exclude = self.words_seen();
                if let Some(current) = &self.current {
                    exclude.push(current.word.clone());
                }
                self.phase = Phase::LoadingItem {
                    token,
                    advance: true,
                };
                vec![Command::FetchItem {
                    token,
                    level: self.level,
                    exclude,
                }]
            }
            GameEvent::RevealReward => {
                // No current item means nothing to reward: no speech call, no
                // image call, no phase change.
                let Some(item) = &self.current else {
                    tracing::debug!("reward reveal ignored with no current item");
                    return vec![];
                };
                let description = item.visual_reward.clone();
                let token = self.take_token();
                self.phase = Phase::Reward {
                    image: RewardImage::Pending(token),
                };
                self.speaking = true;
                vec![
                    Command::Speak {
                        text: format!("Great job! Look! {description}"),
                        voice: Voice::Puck,
                    },
                    Command::FetchRewardImage { token, description },
                ]
            }
            GameEvent::BackToMenu => {
                self.phase = Phase::Menu;
                self.panel_open = false;
                vec![]
            }
            GameEvent::StartQuickTest => {
                self.test_phase = 0;
                let token = self.take_token();
                self.phase = Phase::LoadingTest { token };
                vec![Command::FetchTestQuestion { token, index: 0 }]
            }
            GameEvent::TapPhoneme(index) => self.tap_phoneme(index),
            GameEvent::PlayNextPhoneme => {
                let Some(item) = &self.current else {
                    return vec![];
                };
                let next = match self.active_phoneme {
                    Some(i) if i + 1 < item.phonemes.len() => i + 1,
                    Some(_) => 0,
                    None => 0,
                };
                self.tap_phoneme(next)
            }
            GameEvent::PlayCue => {
                // The parent panel disables its play action while speech is
                // already in flight.
                let Some(item) = &self.current else {
                    return vec![];
                };
                if self.speaking {
                    return vec![];
                }
                self.speaking = true;
                vec![Command::Speak {
                    text: item.audio_cue.clone(),
                    voice: Voice::Charon,
                }]
            }
            GameEvent::PlayReadingGuide => {
                let Some(item) = &self.current else {
                    return vec![];
                };
                self.speaking = true;
                vec![Command::Speak {
                    text: item.reading_guide.clone(),
                    voice: Voice::Kore,
                }]
            }
            GameEvent::SetParentPanel(open) => {
                self.panel_open = open;
                vec![]
            }
            GameEvent::ItemReady { token, item } => {
                match self.phase {
                    Phase::LoadingItem { token: want, advance } if want == token => {
                        if advance {
                            if let Some(previous) = self.current.take() {
                                self.history.push(previous);
                            }
                        }
                        self.current = Some(item);
                        self.active_phoneme = None;
                        self.phase = Phase::Decoding;
                    }
                    _ => tracing::debug!(token, "discarding stale item response"),
                }
                vec![]
            }
            GameEvent::ItemFailed { token } => {
                match self.phase {
                    Phase::LoadingItem { token: want, .. } if want == token => {
                        // Loading cleared; previous item preserved, no partial
                        // state installed.
                        self.phase = if self.current.is_some() {
                            Phase::Decoding
                        } else {
                            Phase::Menu
                        };
                    }
                    _ => tracing::debug!(token, "discarding stale item failure"),
                }
                vec![]
            }
            GameEvent::TestReady { token, question } => {
                match self.phase {
                    Phase::LoadingTest { token: want } if want == token => {
                        self.current = Some(question.into_item());
                        self.active_phoneme = None;
                        self.phase = Phase::Testing;
                    }
                    _ => tracing::debug!(token, "discarding stale test response"),
                }
                vec![]
            }
            GameEvent::TestFailed { token } => {
                match self.phase {
                    Phase::LoadingTest { token: want } if want == token => {
                        self.phase = Phase::Intro;
                    }
                    _ => tracing::debug!(token, "discarding stale test failure"),
                }
                vec![]
            }
            GameEvent::RewardImageReady { token, data_uri } => {
                if self.reward_pending(token) {
                    self.phase = Phase::Reward {
                        image: RewardImage::Ready(data_uri),
                    };
                } else {
                    tracing::debug!(token, "discarding stale reward image");
                }
                vec![]
            }
            GameEvent::RewardImageFailed { token } => {
                if self.reward_pending(token) {
                    self.phase = Phase::Reward {
                        image: RewardImage::Unavailable,
                    };
                } else {
                    tracing::debug!(token, "discarding stale reward failure");
                }
                vec![]
            }
            GameEvent::SpeechStarted => {
                self.speaking = true;
                vec![]
            }
            GameEvent::SpeechFinished => {
                self.speaking = false;
                vec![]
            }
        }
    }

    fn reward_pending(&self, token: RequestToken) -> bool {
        matches!(
            &self.phase,
            Phase::Reward {
                image: RewardImage::Pending(want)
            } if *want == token
        )
    }

    fn tap_phoneme(&mut self, index: usize) -> Vec<Command> {
        let Some(item) = &self.current else {
            return vec![];
        };
        let Some(phoneme) = item.phonemes.get(index) else {
            tracing::debug!(index, "phoneme tap out of range");
            return vec![];
        };
        self.active_phoneme = Some(index);
        self.speaking = true;
        vec![Command::Speak {
            text: phoneme.clone(),
            voice: Voice::Kore,
        }]
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{MockPhonicsGenerator, PhonicsGenerator};

    fn item(word: &str) -> PhonicsItem {
        let phonemes: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        let phoneme_guides = phonemes.iter().map(|p| format!("/{p}/")).collect();
        PhonicsItem {
            word: word.to_string(),
            reading_guide: format!("/{word}/"),
            phonemes,
            phoneme_guides,
            audio_cue: "Squeaky voice!".to_string(),
            visual_reward: "a juggling penguin".to_string(),
            congratulation: "HUZZAH!".to_string(),
        }
    }

    fn fetch_token(commands: &[Command]) -> RequestToken {
        commands
            .iter()
            .find_map(|c| match c {
                Command::FetchItem { token, .. } => Some(*token),
                Command::FetchTestQuestion { token, .. } => Some(*token),
                Command::FetchRewardImage { token, .. } => Some(*token),
                Command::Speak { .. } => None,
            })
            .expect("no fetch command issued")
    }

    #[test]
    fn select_level_loads_and_installs_an_item() {
        let mut state = GameState::new();
        let commands = state.apply(GameEvent::SelectLevel(Level::Three));
        let token = fetch_token(&commands);
        assert!(matches!(state.phase, Phase::LoadingItem { advance: false, .. }));
        assert_eq!(
            commands,
            vec![Command::FetchItem {
                token,
                level: Level::Three,
                exclude: vec![],
            }]
        );

        assert!(state.apply(GameEvent::ItemReady { token, item: item("cat") }).is_empty());
        assert_eq!(state.phase, Phase::Decoding);
        assert_eq!(state.current.as_ref().unwrap().word, "cat");
        assert_eq!(state.active_phoneme, None);
        assert!(state.history.is_empty());
    }

    #[test]
    fn advance_appends_current_to_history_and_excludes_it() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Three)));
        state.apply(GameEvent::ItemReady { token, item: item("cat") });

        let commands = state.apply(GameEvent::NextItem);
        let token = fetch_token(&commands);
        match &commands[0] {
            Command::FetchItem { exclude, .. } => {
                assert_eq!(exclude, &vec!["cat".to_string()]);
            }
            other => panic!("expected FetchItem, got {other:?}"),
        }

        state.apply(GameEvent::ItemReady { token, item: item("sip") });
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].word, "cat");
        assert_eq!(state.current.as_ref().unwrap().word, "sip");
    }

    #[test]
    fn item_failure_restores_previous_phase_and_item() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Two)));
        state.apply(GameEvent::ItemReady { token, item: item("at") });

        let token = fetch_token(&state.apply(GameEvent::NextItem));
        assert!(state.apply(GameEvent::ItemFailed { token }).is_empty());
        assert_eq!(state.phase, Phase::Decoding);
        assert_eq!(state.current.as_ref().unwrap().word, "at");
        assert!(state.history.is_empty());
    }

    #[test]
    fn item_failure_with_nothing_installed_falls_back_to_menu() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::SelectLevel(Level::One)));
        state.apply(GameEvent::ItemFailed { token });
        assert_eq!(state.phase, Phase::Menu);
        assert!(state.current.is_none());
    }

    #[test]
    fn stale_item_response_is_discarded() {
        let mut state = GameState::new();
        let first = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Three)));
        // The user re-taps before the first call resolves.
        let second = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Three)));
        assert_ne!(first, second);

        // The slower first response loses.
        state.apply(GameEvent::ItemReady { token: second, item: item("sip") });
        state.apply(GameEvent::ItemReady { token: first, item: item("cat") });
        assert_eq!(state.current.as_ref().unwrap().word, "sip");
        assert_eq!(state.phase, Phase::Decoding);
    }

    #[test]
    fn tapping_a_phoneme_sets_exactly_that_index_and_speaks_it() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Three)));
        state.apply(GameEvent::ItemReady { token, item: item("cat") });

        let commands = state.apply(GameEvent::TapPhoneme(1));
        assert_eq!(state.active_phoneme, Some(1));
        assert!(state.speaking);
        assert_eq!(
            commands,
            vec![Command::Speak {
                text: "a".to_string(),
                voice: Voice::Kore,
            }]
        );

        // Out of range taps change nothing.
        assert!(state.apply(GameEvent::TapPhoneme(7)).is_empty());
        assert_eq!(state.active_phoneme, Some(1));
    }

    #[test]
    fn sound_button_wraps_through_the_phonemes() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Three)));
        state.apply(GameEvent::ItemReady { token, item: item("cat") });

        state.apply(GameEvent::PlayNextPhoneme);
        assert_eq!(state.active_phoneme, Some(0));
        state.apply(GameEvent::PlayNextPhoneme);
        state.apply(GameEvent::PlayNextPhoneme);
        assert_eq!(state.active_phoneme, Some(2));
        state.apply(GameEvent::PlayNextPhoneme);
        assert_eq!(state.active_phoneme, Some(0));
    }

    #[test]
    fn reward_reveal_without_an_item_is_a_no_op() {
        let mut state = GameState::new();
        state.apply(GameEvent::BackToMenu);
        let commands = state.apply(GameEvent::RevealReward);
        assert!(commands.is_empty());
        assert_eq!(state.phase, Phase::Menu);
    }

    #[test]
    fn reward_flow_speaks_then_resolves_the_image() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Three)));
        state.apply(GameEvent::ItemReady { token, item: item("cat") });

        let commands = state.apply(GameEvent::RevealReward);
        assert_eq!(commands.len(), 2);
        assert!(matches!(
            &commands[0],
            Command::Speak { text, voice: Voice::Puck }
                if text == "Great job! Look! a juggling penguin"
        ));
        let token = fetch_token(&commands);
        assert!(matches!(
            state.phase,
            Phase::Reward { image: RewardImage::Pending(_) }
        ));

        state.apply(GameEvent::RewardImageReady {
            token,
            data_uri: "data:image/png;base64,xyz".to_string(),
        });
        assert_eq!(
            state.phase,
            Phase::Reward {
                image: RewardImage::Ready("data:image/png;base64,xyz".to_string())
            }
        );
    }

    #[test]
    fn reward_image_failure_clears_the_pending_slot() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Three)));
        state.apply(GameEvent::ItemReady { token, item: item("cat") });
        let token = fetch_token(&state.apply(GameEvent::RevealReward));

        state.apply(GameEvent::RewardImageFailed { token });
        assert_eq!(
            state.phase,
            Phase::Reward {
                image: RewardImage::Unavailable
            }
        );
    }

    #[test]
    fn back_to_menu_discards_the_reward_and_closes_the_panel() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Three)));
        state.apply(GameEvent::ItemReady { token, item: item("cat") });
        state.apply(GameEvent::SetParentPanel(true));
        let token = fetch_token(&state.apply(GameEvent::RevealReward));
        state.apply(GameEvent::RewardImageReady {
            token,
            data_uri: "data:image/png;base64,xyz".to_string(),
        });

        state.apply(GameEvent::BackToMenu);
        assert_eq!(state.phase, Phase::Menu);
        assert!(!state.panel_open);
        // The item itself survives; only the reward reference is discarded.
        assert!(state.current.is_some());
    }

    #[test]
    fn quick_test_projects_the_question_with_echo_guides() {
        let mut state = GameState::new();
        let commands = state.apply(GameEvent::StartQuickTest);
        let token = fetch_token(&commands);
        assert_eq!(
            commands,
            vec![Command::FetchTestQuestion { token, index: 0 }]
        );
        assert_eq!(state.test_phase, 0);

        state.apply(GameEvent::TestReady {
            token,
            question: TestQuestion {
                word: "map".to_string(),
                guide: "/mæp/".to_string(),
                level: Level::Three,
            },
        });
        assert_eq!(state.phase, Phase::Testing);
        let current = state.current.as_ref().unwrap();
        assert_eq!(current.phonemes, vec!["m", "a", "p"]);
        assert_eq!(current.phoneme_guides[2], "Sound: p");
    }

    #[test]
    fn test_failure_returns_to_intro() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::StartQuickTest));
        state.apply(GameEvent::TestFailed { token });
        assert_eq!(state.phase, Phase::Intro);
    }

    #[test]
    fn cue_playback_is_suppressed_while_speaking() {
        let mut state = GameState::new();
        let token = fetch_token(&state.apply(GameEvent::SelectLevel(Level::Three)));
        state.apply(GameEvent::ItemReady { token, item: item("cat") });

        assert_eq!(state.apply(GameEvent::PlayCue).len(), 1);
        assert!(state.speaking);
        // Second press while still speaking does nothing.
        assert!(state.apply(GameEvent::PlayCue).is_empty());

        state.apply(GameEvent::SpeechFinished);
        assert!(!state.speaking);
        assert_eq!(state.apply(GameEvent::PlayCue).len(), 1);
    }

    // Drives the reducer against the mocked generator the way the runtime
    // does: apply an intent, execute the fetch, feed the completion back.
    #[tokio::test]
    async fn full_round_from_level_pick_to_reward() {
        let mut mock = MockPhonicsGenerator::new();
        mock.expect_next_item()
            .returning(|_, _| Box::pin(async move { Ok(item_for_mock()) }))
            .once();
        mock.expect_reward_image()
            .returning(|_| {
                Box::pin(async move { Ok("data:image/png;base64,abc".to_string()) })
            })
            .once();

        let mut state = GameState::new();

        // Level pick -> fetch -> decoding.
        let commands = state.apply(GameEvent::SelectLevel(Level::Three));
        let Command::FetchItem { token, level, exclude } = commands[0].clone() else {
            panic!("expected FetchItem");
        };
        let fetched = mock.next_item(level, &exclude).await.unwrap();
        state.apply(GameEvent::ItemReady { token, item: fetched });
        assert_eq!(state.phase, Phase::Decoding);
        assert_eq!(state.current.as_ref().unwrap().phonemes.len(), 3);

        // Tap phoneme 0 -> one speech command with that phoneme's text.
        let commands = state.apply(GameEvent::TapPhoneme(0));
        assert_eq!(
            commands,
            vec![Command::Speak { text: "c".to_string(), voice: Voice::Kore }]
        );
        assert_eq!(state.active_phoneme, Some(0));

        // "Read it" -> reward phase, speech + image fetch.
        let commands = state.apply(GameEvent::RevealReward);
        let Command::FetchRewardImage { token, description } = commands[1].clone() else {
            panic!("expected FetchRewardImage");
        };
        let uri = mock.reward_image(&description).await.unwrap();
        state.apply(GameEvent::RewardImageReady { token, data_uri: uri });
        assert_eq!(
            state.phase,
            Phase::Reward {
                image: RewardImage::Ready("data:image/png;base64,abc".to_string())
            }
        );
    }

    fn item_for_mock() -> PhonicsItem {
        PhonicsItem {
            word: "cat".to_string(),
            reading_guide: "/kæt/".to_string(),
            phonemes: vec!["c".into(), "a".into(), "t".into()],
            phoneme_guides: vec!["/k/".into(), "/æ/".into(), "/t/".into()],
            audio_cue: "Sneaky mouse voice".to_string(),
            visual_reward: "a cat surfing a rainbow".to_string(),
            congratulation: "HUZZAH!".to_string(),
        }
    }
}
