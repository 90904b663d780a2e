pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{JsonFileStore, MemoryStore};
pub use config::script::{EventScript, ScriptStep};
pub use config::toml_config::SessionConfig;
pub use core::{command::Command, engine::SessionEngine, engine::Transition};
pub use domain::model::{Court, Participant, ParticipantId, Session, SessionId, SessionRules};
pub use utils::error::{AppError, EngineError, Result};
