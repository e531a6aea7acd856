pub mod generator;
pub mod item;
pub mod level;
pub mod session;
pub mod simulated;

pub use generator::{GeneratorError, PhonicsGenerator, Voice};
pub use item::{PhonicsItem, TestQuestion};
pub use level::{LEVELS, Level, LevelInfo};
pub use session::{Command, GameEvent, GameState, Phase, RequestToken, RewardImage};
pub use simulated::SimulatedGenerator;
