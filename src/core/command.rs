use crate::domain::model::{CourtId, Participant, ParticipantId, Session};
use crate::utils::error::EngineResult;
use serde::{Deserialize, Serialize};

/// 來自介面的事件，每個事件對應一個 Session 操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Join {
        participant: Participant,
    },
    Leave {
        participant_id: ParticipantId,
    },
    /// 點選佇列中的參與者
    Select {
        participant_id: ParticipantId,
    },
    Assign {
        court_id: CourtId,
        participant_id: ParticipantId,
    },
    Pull {
        court_id: CourtId,
        participant_id: ParticipantId,
    },
    Reorder {
        from: usize,
        to: usize,
    },
    AddStagingCourt,
    AddActiveCourt,
    Promote {
        court_id: CourtId,
    },
    Demote {
        court_id: CourtId,
    },
    EndMatch {
        court_id: CourtId,
        #[serde(default)]
        scores: Option<[u32; 2]>,
    },
    EndSession,
}

impl Command {
    pub fn apply(&self, session: &Session) -> EngineResult<Session> {
        match self {
            Command::Join { participant } => session.join(participant.clone()),
            Command::Leave { participant_id } => session.leave(participant_id),
            Command::Select { participant_id } => session.select(participant_id),
            Command::Assign {
                court_id,
                participant_id,
            } => session.assign(*court_id, participant_id),
            Command::Pull {
                court_id,
                participant_id,
            } => session.pull(*court_id, participant_id),
            Command::Reorder { from, to } => session.reorder(*from, *to),
            Command::AddStagingCourt => session.add_staging_court(),
            Command::AddActiveCourt => session.add_active_court(),
            Command::Promote { court_id } => session.promote(*court_id),
            Command::Demote { court_id } => session.demote(*court_id),
            Command::EndMatch { court_id, scores } => session.end_match(*court_id, *scores),
            Command::EndSession => session.end_session(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Join { .. } => "join",
            Command::Leave { .. } => "leave",
            Command::Select { .. } => "select",
            Command::Assign { .. } => "assign",
            Command::Pull { .. } => "pull",
            Command::Reorder { .. } => "reorder",
            Command::AddStagingCourt => "add_staging_court",
            Command::AddActiveCourt => "add_active_court",
            Command::Promote { .. } => "promote",
            Command::Demote { .. } => "demote",
            Command::EndMatch { .. } => "end_match",
            Command::EndSession => "end_session",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SessionRules;

    #[test]
    fn test_command_wire_format() {
        let court_id = CourtId::new();
        let command: Command = serde_json::from_value(serde_json::json!({
            "op": "pull",
            "court_id": court_id,
            "participant_id": "p-7",
        }))
        .unwrap();

        assert_eq!(
            command,
            Command::Pull {
                court_id,
                participant_id: "p-7".into(),
            }
        );
        assert_eq!(command.name(), "pull");

        let end: Command = serde_json::from_value(serde_json::json!({
            "op": "end_match",
            "court_id": court_id,
        }))
        .unwrap();
        assert_eq!(
            end,
            Command::EndMatch {
                court_id,
                scores: None
            }
        );
    }

    #[test]
    fn test_apply_delegates_to_session() {
        let session = Session::with_courts(SessionRules::default(), 1, 0);
        let joined = Command::Join {
            participant: Participant::new("a", "Ana"),
        }
        .apply(&session)
        .unwrap();

        assert_eq!(joined.queue().len(), 1);
        assert!(session.queue().is_empty());
    }
}
