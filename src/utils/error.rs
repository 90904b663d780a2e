use crate::domain::model::{CourtId, MatchId, ParticipantId, SessionId};
use std::fmt;
use thiserror::Error;

/// 參與者目前所在的位置，用於重複指派的錯誤訊息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Court(CourtId),
    Queue,
    Roster,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Court(id) => write!(f, "court {}", id),
            Placement::Queue => write!(f, "the queue"),
            Placement::Roster => write!(f, "the roster"),
        }
    }
}

/// 無法升級場地的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReadyReason {
    Incomplete { participants: usize, slots: usize },
    CourtAlreadyActive { number: u32 },
    NoCurrentMatch,
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReadyReason::Incomplete {
                participants,
                slots,
            } => write!(
                f,
                "match has {} participants in {} team slots, needs 4 in 2",
                participants, slots
            ),
            NotReadyReason::CourtAlreadyActive { number } => {
                write!(f, "court is already active as number {}", number)
            }
            NotReadyReason::NoCurrentMatch => write!(f, "court has no current match"),
        }
    }
}

/// 引擎層的可恢復錯誤，由呼叫端決定是否顯示給使用者
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Match {match_id} already has two full team slots")]
    SlotsFull { match_id: MatchId },

    #[error("Court {court_id} is not ready for promotion: {reason}")]
    MatchNotReady {
        court_id: CourtId,
        reason: NotReadyReason,
    },

    #[error("Participant {participant_id} not found")]
    ParticipantNotFound { participant_id: ParticipantId },

    #[error("Index {index} out of range for queue of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Participant {participant_id} is already in {placement}")]
    DuplicateAssignment {
        participant_id: ParticipantId,
        placement: Placement,
    },

    #[error("Participant {participant_id} is not registered in this session")]
    UnknownParticipant { participant_id: ParticipantId },

    #[error("Participant {participant_id} is seated on court {court_id}")]
    ParticipantSeated {
        participant_id: ParticipantId,
        court_id: CourtId,
    },

    #[error("Court {court_id} not found")]
    CourtNotFound { court_id: CourtId },

    #[error("Court {number} is not taking players until it is cleared back to staging")]
    CourtNotAccepting { court_id: CourtId, number: u32 },

    #[error("No staging court has room for another participant")]
    NoOpenCourt,

    #[error("Court {court_id} has no current match")]
    NoCurrentMatch { court_id: CourtId },

    #[error("Session {session_id} has ended")]
    SessionEnded { session_id: SessionId },

    #[error("Stale snapshot: expected revision {expected}, session is at {actual}")]
    StaleSnapshot { expected: u64, actual: u64 },

    #[error("Nothing to undo")]
    NothingToUndo,
}

/// 內部不變量被破壞，代表程式錯誤而非使用者操作錯誤
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvariantViolation(pub String);

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Engine rejected operation: {0}")]
    Engine(#[from] EngineError),

    #[error("Session invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Persistence error: {message}")]
    PersistenceError { message: String },

    #[error("Script error at event #{index}: {message}")]
    ScriptError { index: usize, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Engine,
    Configuration,
    Persistence,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Engine(_) => ErrorCategory::Engine,
            AppError::Invariant(_) => ErrorCategory::System,
            AppError::TomlError(_)
            | AppError::ConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::MissingConfigError { .. }
            | AppError::ScriptError { .. } => ErrorCategory::Configuration,
            AppError::PersistenceError { .. } | AppError::SerializationError(_) => {
                ErrorCategory::Persistence
            }
            AppError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 引擎錯誤都是本地可恢復的 (例如重複點擊)
            AppError::Engine(_) => ErrorSeverity::Low,
            AppError::PersistenceError { .. } => ErrorSeverity::Medium,
            AppError::TomlError(_)
            | AppError::ConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::MissingConfigError { .. }
            | AppError::ScriptError { .. }
            | AppError::SerializationError(_) => ErrorSeverity::High,
            AppError::Invariant(_) | AppError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            AppError::Engine(EngineError::StaleSnapshot { .. }) => {
                "Reload the latest session snapshot and retry the action".to_string()
            }
            AppError::Engine(EngineError::SlotsFull { .. })
            | AppError::Engine(EngineError::NoOpenCourt)
            | AppError::Engine(EngineError::CourtNotAccepting { .. }) => {
                "Add a staging court or wait for a match to end".to_string()
            }
            AppError::Engine(_) => "Check the court and queue state, then retry".to_string(),
            AppError::Invariant(_) => {
                "Restore the last persisted session; this is a bug worth reporting".to_string()
            }
            AppError::PersistenceError { .. } => {
                "The local change was rolled back; retry once storage is reachable".to_string()
            }
            AppError::SerializationError(_) => {
                "Inspect the stored session file for corruption".to_string()
            }
            AppError::TomlError(_)
            | AppError::ConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::MissingConfigError { .. } => {
                "Fix the session configuration file and run again".to_string()
            }
            AppError::ScriptError { .. } => {
                "Check participant ids and court indexes in the event script".to_string()
            }
            AppError::IoError(_) => "Check file paths and permissions".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::Engine(e) => format!("Action not applied: {}", e),
            AppError::PersistenceError { .. } => {
                "Could not save the session; your last action was undone".to_string()
            }
            AppError::MissingConfigError { field } => {
                format!("Configuration is missing '{}'", field)
            }
            AppError::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration value '{}' is invalid: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;
