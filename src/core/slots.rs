use crate::domain::model::{
    Court, Match, ParticipantId, TeamSlot, MATCH_CAPACITY, SLOTS_PER_MATCH,
};
use crate::utils::error::{EngineError, EngineResult, Placement};

/// 將參與者放入場地目前比賽的隊伍
///
/// Fills the first team slot with room, opening a second slot only when every
/// existing slot is full. A match with two full slots rejects further
/// assignments with `SlotsFull`; the input court is never modified.
///
/// A numbered court only takes players into a match that already started, so
/// a vacancy left by a pull can be refilled but a new match cannot be built there.
pub fn assign(court: &Court, participant_id: &ParticipantId) -> EngineResult<Court> {
    if let Some(number) = court.number {
        if !court.current_match().is_some_and(|m| m.started_at.is_some()) {
            return Err(EngineError::CourtNotAccepting {
                court_id: court.id,
                number,
            });
        }
    }

    let mut next = court.clone();

    let match_idx = match next.current_match_index() {
        Some(idx) => idx,
        None => {
            next.matches.push(Match::new());
            next.matches.len() - 1
        }
    };
    let current = &mut next.matches[match_idx];

    if current.contains(participant_id) {
        return Err(EngineError::DuplicateAssignment {
            participant_id: participant_id.clone(),
            placement: Placement::Court(court.id),
        });
    }

    if current.participant_count() >= MATCH_CAPACITY {
        return Err(EngineError::SlotsFull {
            match_id: current.id,
        });
    }

    let slot_idx = match current.slots.iter().position(|slot| !slot.is_full()) {
        Some(idx) => idx,
        None if current.slots.len() < SLOTS_PER_MATCH => {
            current.slots.push(TeamSlot::new());
            current.slots.len() - 1
        }
        None => {
            return Err(EngineError::SlotsFull {
                match_id: current.id,
            })
        }
    };

    current.slots[slot_idx]
        .participants
        .push(participant_id.clone());

    tracing::debug!(
        "Seated {} on court {} (slot {}, {} of {})",
        participant_id,
        court.id,
        slot_idx,
        current.participant_count(),
        MATCH_CAPACITY
    );

    Ok(next)
}

/// 從目前比賽移除參與者，空的隊伍保留以維持計分用的 id
pub fn release(
    court: &Court,
    participant_id: &ParticipantId,
) -> EngineResult<(Court, ParticipantId)> {
    let mut next = court.clone();

    let not_found = || EngineError::ParticipantNotFound {
        participant_id: participant_id.clone(),
    };

    let current = next.current_match_mut().ok_or_else(not_found)?;
    let slot = current
        .slots
        .iter_mut()
        .find(|slot| slot.contains(participant_id))
        .ok_or_else(not_found)?;

    slot.participants.retain(|id| id != participant_id);

    tracing::debug!("Released {} from court {}", participant_id, court.id);

    Ok((next, participant_id.clone()))
}

/// 場地目前的比賽是否還能再加人
pub fn has_room(court: &Court) -> bool {
    court
        .current_match()
        .map_or(true, |m| m.participant_count() < MATCH_CAPACITY)
}
