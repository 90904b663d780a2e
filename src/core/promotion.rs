use crate::core::{numbering, queue, slots};
use crate::domain::model::{Court, CourtId, ParticipantId, Session};
use crate::utils::error::{EngineError, EngineResult, NotReadyReason};
use chrono::Utc;

/// 將滿員的預備場地升級為有號碼的場地
///
/// Returns the promoted court and the number it consumed. The match must hold
/// two full team slots and the court must still be staging.
pub fn promote(court: &Court, active_numbers: &[u32]) -> EngineResult<(Court, u32)> {
    let not_ready = |reason: NotReadyReason| EngineError::MatchNotReady {
        court_id: court.id,
        reason,
    };

    if let Some(number) = court.number {
        return Err(not_ready(NotReadyReason::CourtAlreadyActive { number }));
    }

    let current = court
        .current_match()
        .ok_or_else(|| not_ready(NotReadyReason::NoCurrentMatch))?;
    if !current.is_full() {
        return Err(not_ready(NotReadyReason::Incomplete {
            participants: current.participant_count(),
            slots: current.slots.len(),
        }));
    }

    let number = numbering::next_number(active_numbers.iter().copied());

    let mut next = court.clone();
    next.number = Some(number);
    if let Some(current) = next.current_match_mut() {
        current.started_at = Some(Utc::now());
    }

    tracing::debug!("Promoted court {} to number {}", court.id, number);
    Ok((next, number))
}

/// 清除場地號碼，讓號碼回到可用池
pub fn demote(court: &Court) -> Court {
    let mut next = court.clone();
    let freed = next.number.take();
    if let Some(current) = next.current_match_mut() {
        current.started_at = None;
    }

    if let Some(number) = freed {
        tracing::debug!("Demoted court {} (freed number {})", court.id, number);
    }
    next
}

/// 從場地拉出參與者並放回佇列尾端
pub fn pull_participant(
    session: &Session,
    court_id: CourtId,
    participant_id: &ParticipantId,
) -> EngineResult<Session> {
    let court = session
        .courts
        .get(&court_id)
        .ok_or(EngineError::CourtNotFound { court_id })?;

    let (mut released, freed) = slots::release(court, participant_id)?;
    if session.rules.demote_on_vacancy && released.is_active() {
        released = demote(&released);
    }
    let queue = queue::insert(&session.queue, freed, None)?;

    let mut next = session.clone();
    next.courts.insert(court_id, released);
    next.queue = queue;
    Ok(next)
}
