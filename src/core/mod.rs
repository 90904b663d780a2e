pub mod command;
pub mod engine;
pub mod numbering;
pub mod promotion;
pub mod query;
pub mod queue;
pub mod session;
pub mod slots;

pub use crate::domain::model::{Court, Match, Participant, ParticipantId, Queue, Session, TeamSlot};
pub use crate::domain::ports::SessionStore;
pub use crate::utils::error::{EngineError, EngineResult, Result};
