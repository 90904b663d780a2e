// Read-only helpers for the presentation layer.

use crate::core::numbering;
use crate::domain::model::{Court, Participant, ParticipantId, Session};
use serde::{Deserialize, Serialize};

/// How a court should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtMode {
    /// 預備場地，可以加入或移除球員
    PreGame,
    /// 有號碼且有進行中的比賽
    InGame,
    /// 有號碼但只剩已結束的比賽
    PostGame,
}

pub fn is_participant_in_court(court: &Court, participant: &Participant) -> bool {
    court
        .current_match()
        .is_some_and(|m| m.contains(&participant.id))
}

pub fn is_participant_in_session(participant_id: &ParticipantId, session: &Session) -> bool {
    session.participant(participant_id).is_some()
}

pub fn next_missing_court_number(numbers: &[u32]) -> u32 {
    numbering::next_number(numbers.iter().copied())
}

/// 依佇列順序列出等候中的參與者
pub fn waiting_participants(session: &Session) -> Vec<&Participant> {
    session
        .queue()
        .iter()
        .filter_map(|id| session.participant(id))
        .collect()
}

pub fn court_mode(court: &Court) -> CourtMode {
    match (court.is_active(), court.current_match()) {
        (false, _) => CourtMode::PreGame,
        (true, Some(_)) => CourtMode::InGame,
        (true, None) => CourtMode::PostGame,
    }
}
