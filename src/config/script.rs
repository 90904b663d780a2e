use crate::config::toml_config::{substitute_env_vars, RosterEntry};
use crate::core::command::Command;
use crate::domain::model::{CourtId, Session, Sex};
use crate::utils::error::{AppError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 事件腳本：依序重播的主持人操作
///
/// ```toml
/// [[events]]
/// op = "assign"
/// court_index = 0
/// participant = "ana"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventScript {
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
}

/// 場地以畫面上的順序 (`court_index`, 從 0 開始) 指定，參與者以 id 指定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptEvent {
    Join {
        id: Option<String>,
        name: String,
        sex: Option<Sex>,
        level: Option<String>,
        rank: Option<u32>,
    },
    Leave {
        participant: String,
    },
    Select {
        participant: String,
    },
    Assign {
        court_index: usize,
        participant: String,
    },
    Pull {
        court_index: usize,
        participant: String,
    },
    Reorder {
        from: usize,
        to: usize,
    },
    AddStagingCourt,
    AddActiveCourt,
    Promote {
        court_index: usize,
    },
    Demote {
        court_index: usize,
    },
    EndMatch {
        court_index: usize,
        #[serde(default)]
        scores: Option<[u32; 2]>,
    },
    EndSession,
    Undo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Apply(Command),
    Undo,
}

fn join_entry(
    id: &Option<String>,
    name: &str,
    sex: Option<Sex>,
    level: &Option<String>,
    rank: Option<u32>,
) -> RosterEntry {
    RosterEntry {
        id: id.clone(),
        name: name.to_string(),
        sex,
        level: level.clone(),
        rank,
        games_played: None,
    }
}

impl ScriptEvent {
    fn roster_entry(&self) -> Option<RosterEntry> {
        match self {
            ScriptEvent::Join {
                id,
                name,
                sex,
                level,
                rank,
            } => Some(join_entry(id, name, *sex, level, *rank)),
            _ => None,
        }
    }

    /// 對照目前場次，把畫面位置換成實際的場地 id
    pub fn resolve(&self, index: usize, session: &Session) -> Result<ScriptStep> {
        let court = |court_index: usize| -> Result<CourtId> {
            session
                .court_at(court_index)
                .map(|court| court.id)
                .ok_or_else(|| AppError::ScriptError {
                    index,
                    message: format!(
                        "court_index {} out of range ({} courts)",
                        court_index,
                        session.court_count()
                    ),
                })
        };

        let command = match self {
            ScriptEvent::Join {
                id,
                name,
                sex,
                level,
                rank,
            } => Command::Join {
                participant: join_entry(id, name, *sex, level, *rank).to_participant(),
            },
            ScriptEvent::Leave { participant } => Command::Leave {
                participant_id: participant.as_str().into(),
            },
            ScriptEvent::Select { participant } => Command::Select {
                participant_id: participant.as_str().into(),
            },
            ScriptEvent::Assign {
                court_index,
                participant,
            } => Command::Assign {
                court_id: court(*court_index)?,
                participant_id: participant.as_str().into(),
            },
            ScriptEvent::Pull {
                court_index,
                participant,
            } => Command::Pull {
                court_id: court(*court_index)?,
                participant_id: participant.as_str().into(),
            },
            ScriptEvent::Reorder { from, to } => Command::Reorder {
                from: *from,
                to: *to,
            },
            ScriptEvent::AddStagingCourt => Command::AddStagingCourt,
            ScriptEvent::AddActiveCourt => Command::AddActiveCourt,
            ScriptEvent::Promote { court_index } => Command::Promote {
                court_id: court(*court_index)?,
            },
            ScriptEvent::Demote { court_index } => Command::Demote {
                court_id: court(*court_index)?,
            },
            ScriptEvent::EndMatch {
                court_index,
                scores,
            } => Command::EndMatch {
                court_id: court(*court_index)?,
                scores: *scores,
            },
            ScriptEvent::EndSession => Command::EndSession,
            ScriptEvent::Undo => return Ok(ScriptStep::Undo),
        };

        Ok(ScriptStep::Apply(command))
    }
}

impl EventScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Validate for EventScript {
    fn validate(&self) -> Result<()> {
        for (index, event) in self.events.iter().enumerate() {
            if let Some(entry) = event.roster_entry() {
                entry
                    .validate_entry(&format!("events[{}]", index))
                    .map_err(|e| AppError::ScriptError {
                        index,
                        message: e.to_string(),
                    })?;
            }
        }
        Ok(())
    }
}
