use crate::core::{numbering, promotion, queue, slots};
use crate::domain::model::{
    Court, CourtId, Participant, ParticipantId, Queue, Session, SessionId, SessionRules,
    SlotResult, MATCH_CAPACITY, SLOTS_PER_MATCH, SLOT_CAPACITY,
};
use crate::utils::error::{EngineError, EngineResult, InvariantViolation, Placement};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Session aggregate: every mutation takes a snapshot and returns a new one.
impl Session {
    pub fn new(rules: SessionRules) -> Self {
        Self {
            id: SessionId::new(),
            ended: false,
            revision: 0,
            rules,
            roster: BTreeMap::new(),
            queue: Queue::new(),
            courts: BTreeMap::new(),
            court_order: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// 開場時建立預備場地與編號 1..=active 的場地
    pub fn with_courts(rules: SessionRules, staging: usize, active: usize) -> Self {
        let mut session = Self::new(rules);
        let active = u32::try_from(active).unwrap_or(u32::MAX);
        let courts = (0..staging)
            .map(|_| Court::staging())
            .chain((1..=active).map(Court::active));
        for court in courts {
            session.court_order.push(court.id);
            session.courts.insert(court.id, court);
        }
        session
    }

    /// 加入場次並排到佇列尾端
    pub fn join(&self, participant: Participant) -> EngineResult<Session> {
        self.ensure_open()?;
        if self.roster.contains_key(&participant.id) {
            return Err(EngineError::DuplicateAssignment {
                participant_id: participant.id,
                placement: Placement::Roster,
            });
        }

        let mut next = self.clone();
        next.queue = queue::insert(&self.queue, participant.id.clone(), None)?;
        tracing::debug!("{} ({}) joined the queue", participant.name, participant.id);
        next.roster.insert(participant.id.clone(), participant);
        Ok(self.commit(next))
    }

    /// 離開場次；已經在場上的人必須先被拉出
    pub fn leave(&self, participant_id: &ParticipantId) -> EngineResult<Session> {
        self.ensure_open()?;
        self.ensure_registered(participant_id)?;
        if let Some(court_id) = self.seated_court(participant_id) {
            return Err(EngineError::ParticipantSeated {
                participant_id: participant_id.clone(),
                court_id,
            });
        }

        let mut next = self.clone();
        next.queue = queue::remove(&self.queue, participant_id)?;
        next.roster.remove(participant_id);
        Ok(self.commit(next))
    }

    pub fn assign(&self, court_id: CourtId, participant_id: &ParticipantId) -> EngineResult<Session> {
        self.ensure_open()?;
        self.ensure_registered(participant_id)?;
        let court = self.find_court(court_id)?;

        // 必須在修改前檢查，確保同一人不會同時出現在兩場比賽
        if let Some(seated) = self.seated_court(participant_id) {
            return Err(EngineError::DuplicateAssignment {
                participant_id: participant_id.clone(),
                placement: Placement::Court(seated),
            });
        }

        let updated = slots::assign(court, participant_id)?;
        let mut next = self.clone();
        next.queue = queue::remove(&self.queue, participant_id)?;
        next.courts.insert(court_id, updated);
        Ok(self.commit(next))
    }

    /// 點選佇列中的參與者：放進第一個還有空位的預備場地
    pub fn select(&self, participant_id: &ParticipantId) -> EngineResult<Session> {
        self.ensure_open()?;
        self.ensure_registered(participant_id)?;

        let target = self
            .courts()
            .find(|court| court.is_staging() && slots::has_room(court))
            .map(|court| court.id)
            .ok_or(EngineError::NoOpenCourt)?;

        self.assign(target, participant_id)
    }

    pub fn pull(&self, court_id: CourtId, participant_id: &ParticipantId) -> EngineResult<Session> {
        self.ensure_open()?;
        let next = promotion::pull_participant(self, court_id, participant_id)?;
        Ok(self.commit(next))
    }

    pub fn reorder(&self, from: usize, to: usize) -> EngineResult<Session> {
        self.ensure_open()?;
        let mut next = self.clone();
        next.queue = queue::reorder(&self.queue, from, to)?;
        Ok(self.commit(next))
    }

    pub fn add_staging_court(&self) -> EngineResult<Session> {
        self.ensure_open()?;
        let mut next = self.clone();
        next.push_court(Court::staging());
        Ok(self.commit(next))
    }

    /// 新增一個實體場地，號碼取最小的空缺
    pub fn add_active_court(&self) -> EngineResult<Session> {
        self.ensure_open()?;
        let number = numbering::next_number(self.active_numbers());
        let mut next = self.clone();
        next.push_court(Court::active(number));
        tracing::debug!("Added active court {}", number);
        Ok(self.commit(next))
    }

    pub fn promote(&self, court_id: CourtId) -> EngineResult<Session> {
        self.ensure_open()?;
        let court = self.find_court(court_id)?;
        let (promoted, number) = promotion::promote(court, &self.active_numbers())?;

        let mut next = self.clone();
        next.courts.insert(court_id, promoted);
        if self.rules.keep_staging_court && !next.courts().any(Court::is_staging) {
            next.push_court(Court::staging());
        }

        tracing::info!("Court {} is now playing as number {}", court_id, number);
        Ok(self.commit(next))
    }

    /// 清除場地號碼；對預備場地是冪等操作
    pub fn demote(&self, court_id: CourtId) -> EngineResult<Session> {
        self.ensure_open()?;
        let court = self.find_court(court_id)?;

        let mut next = self.clone();
        next.courts.insert(court_id, promotion::demote(court));
        Ok(self.commit(next))
    }

    /// 結束場地目前的比賽，球員回到佇列尾端
    ///
    /// `scores` are recorded per team slot in slot order; the higher score wins
    /// and a tie records no result.
    pub fn end_match(&self, court_id: CourtId, scores: Option<[u32; 2]>) -> EngineResult<Session> {
        self.ensure_open()?;
        let mut next = self.clone();
        next.close_current_match(court_id, scores)?;
        Ok(self.commit(next))
    }

    /// 結束整個場次：所有進行中的比賽結束，所有人回到佇列
    pub fn end_session(&self) -> EngineResult<Session> {
        self.ensure_open()?;
        let mut next = self.clone();
        let open_courts: Vec<CourtId> = self
            .courts()
            .filter(|court| court.current_match().is_some())
            .map(|court| court.id)
            .collect();
        for court_id in open_courts {
            next.close_current_match(court_id, None)?;
        }
        next.ended = true;

        tracing::info!("Session {} ended", self.id);
        Ok(self.commit(next))
    }

    /// 檢查所有不變量
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let violation = |msg: String| Err(InvariantViolation(msg));

        if self.court_order.len() != self.courts.len()
            || self.court_order.iter().any(|id| !self.courts.contains_key(id))
        {
            return violation("court order does not match court map".to_string());
        }

        let mut seated: HashMap<&ParticipantId, CourtId> = HashMap::new();
        let mut numbers = HashSet::new();

        for court in self.courts() {
            if let Some(number) = court.number {
                if number == 0 || !numbers.insert(number) {
                    return violation(format!("court number {} is not unique and positive", number));
                }
            }
            if court.matches.iter().filter(|m| !m.ended).count() > 1 {
                return violation(format!("court {} has more than one current match", court.id));
            }
            if court.is_active() && court.current_match().is_some_and(|m| m.started_at.is_none()) {
                return violation(format!("court {} holds a match that never started", court.id));
            }

            for m in &court.matches {
                if m.slots.len() > SLOTS_PER_MATCH {
                    return violation(format!("match {} has {} team slots", m.id, m.slots.len()));
                }
                if let Some(slot) = m.slots.iter().find(|s| s.len() > SLOT_CAPACITY) {
                    return violation(format!("team slot {} holds {} participants", slot.id, slot.len()));
                }
            }

            if let Some(current) = court.current_match() {
                if current.participant_count() > MATCH_CAPACITY {
                    return violation(format!("match {} is over capacity", current.id));
                }
                for participant_id in current.participants() {
                    if let Some(other) = seated.insert(participant_id, court.id) {
                        return violation(format!(
                            "participant {} is seated on courts {} and {}",
                            participant_id, other, court.id
                        ));
                    }
                }
            }
        }

        let mut queued = HashSet::new();
        for participant_id in self.queue.iter() {
            if !queued.insert(participant_id) {
                return violation(format!("participant {} is queued twice", participant_id));
            }
            if seated.contains_key(participant_id) {
                return violation(format!("participant {} is both queued and seated", participant_id));
            }
        }

        for participant_id in self.roster.keys() {
            if !queued.contains(participant_id) && !seated.contains_key(participant_id) {
                return violation(format!("participant {} is neither queued nor seated", participant_id));
            }
        }
        if let Some(stray) = queued
            .iter()
            .copied()
            .chain(seated.keys().copied())
            .find(|id| !self.roster.contains_key(*id))
        {
            return violation(format!("participant {} is not in the roster", stray));
        }

        Ok(())
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.ended {
            return Err(EngineError::SessionEnded {
                session_id: self.id,
            });
        }
        Ok(())
    }

    fn ensure_registered(&self, participant_id: &ParticipantId) -> EngineResult<()> {
        if !self.roster.contains_key(participant_id) {
            return Err(EngineError::UnknownParticipant {
                participant_id: participant_id.clone(),
            });
        }
        Ok(())
    }

    fn find_court(&self, court_id: CourtId) -> EngineResult<&Court> {
        self.courts
            .get(&court_id)
            .ok_or(EngineError::CourtNotFound { court_id })
    }

    fn push_court(&mut self, court: Court) {
        self.court_order.push(court.id);
        self.courts.insert(court.id, court);
    }

    fn close_current_match(&mut self, court_id: CourtId, scores: Option<[u32; 2]>) -> EngineResult<()> {
        let mut court = self.find_court(court_id)?.clone();
        let current = court
            .current_match_mut()
            .ok_or(EngineError::NoCurrentMatch { court_id })?;

        if let Some(scores) = scores {
            for (slot, (own, other)) in current
                .slots
                .iter_mut()
                .zip([(scores[0], scores[1]), (scores[1], scores[0])])
            {
                slot.score = Some(own);
                slot.result = match own.cmp(&other) {
                    std::cmp::Ordering::Greater => Some(SlotResult::Win),
                    std::cmp::Ordering::Less => Some(SlotResult::Loss),
                    std::cmp::Ordering::Equal => None,
                };
            }
        }
        current.ended = true;

        let played = current.started_at.is_some();
        let freed: Vec<ParticipantId> = current.participants().cloned().collect();

        if self.rules.demote_on_end && court.is_active() {
            court = promotion::demote(&court);
        }
        self.courts.insert(court_id, court);

        for participant_id in freed {
            if played {
                if let Some(participant) = self.roster.get_mut(&participant_id) {
                    participant.games_played += 1;
                }
            }
            self.queue = queue::insert(&self.queue, participant_id, None)?;
        }
        Ok(())
    }

    /// 產生下一個版本，開發模式下檢查不變量
    fn commit(&self, mut next: Session) -> Session {
        next.revision = self.revision + 1;

        #[cfg(debug_assertions)]
        {
            if let Err(violation) = next
                .check_invariants()
                .and_then(|_| ended_matches_preserved(self, &next))
            {
                panic!("session invariant violated: {}", violation);
            }
        }

        next
    }
}

/// 已結束的比賽不得被修改
///
/// Every ended match in `before` must appear unchanged, in place, in `after`.
pub fn ended_matches_preserved(before: &Session, after: &Session) -> Result<(), InvariantViolation> {
    for court in before.courts.values() {
        let Some(updated) = after.courts.get(&court.id) else {
            return Err(InvariantViolation(format!("court {} disappeared", court.id)));
        };
        for ended in court.matches.iter().filter(|m| m.ended) {
            if !updated.matches.contains(ended) {
                return Err(InvariantViolation(format!("ended match {} was modified", ended.id)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MatchState;

    fn pid(id: &str) -> ParticipantId {
        ParticipantId::from(id)
    }

    fn session_with(ids: &[&str]) -> Session {
        ids.iter().fold(
            Session::with_courts(SessionRules::default(), 1, 0),
            |s, id| s.join(Participant::new(*id, id.to_uppercase())).unwrap(),
        )
    }

    fn staging_id(session: &Session) -> CourtId {
        session.courts().find(|c| c.is_staging()).unwrap().id
    }

    fn seat_four(session: &Session) -> Session {
        ["a", "b", "c", "d"]
            .iter()
            .fold(session.clone(), |s, id| s.select(&pid(id)).unwrap())
    }

    #[test]
    fn test_join_appends_to_queue() {
        let session = session_with(&["a", "b"]);
        assert_eq!(session.queue().0, vec![pid("a"), pid("b")]);
        assert_eq!(session.revision(), 2);

        let err = session.join(Participant::new("a", "again")).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DuplicateAssignment {
                placement: Placement::Roster,
                ..
            }
        ));
    }

    #[test]
    fn test_assign_moves_from_queue_to_court() {
        let session = session_with(&["a", "b"]);
        let court_id = staging_id(&session);
        let next = session.assign(court_id, &pid("a")).unwrap();

        assert_eq!(next.queue().0, vec![pid("b")]);
        assert_eq!(next.seated_court(&pid("a")), Some(court_id));
        // 原本的快照保持不變
        assert_eq!(session.queue().0, vec![pid("a"), pid("b")]);
    }

    #[test]
    fn test_assign_rejects_participant_seated_elsewhere() {
        let session = session_with(&["a"]).add_staging_court().unwrap();
        let first = session.court_at(0).unwrap().id;
        let second = session.court_at(1).unwrap().id;

        let seated = session.assign(first, &pid("a")).unwrap();
        let err = seated.assign(second, &pid("a")).unwrap_err();
        assert_eq!(
            err,
            EngineError::DuplicateAssignment {
                participant_id: pid("a"),
                placement: Placement::Court(first),
            }
        );
    }

    #[test]
    fn test_assign_unknown_participant_and_court() {
        let session = session_with(&["a"]);
        assert!(matches!(
            session.assign(staging_id(&session), &pid("z")),
            Err(EngineError::UnknownParticipant { .. })
        ));
        assert!(matches!(
            session.assign(CourtId::new(), &pid("a")),
            Err(EngineError::CourtNotFound { .. })
        ));
    }

    #[test]
    fn test_select_moves_on_to_next_staging_court() {
        let session = session_with(&["a", "b", "c", "d", "e"])
            .add_staging_court()
            .unwrap();
        let full = seat_four(&session);
        let next = full.select(&pid("e")).unwrap();

        assert_eq!(next.seated_court(&pid("e")), Some(session.court_at(1).unwrap().id));
    }

    #[test]
    fn test_select_without_room() {
        let session = seat_four(&session_with(&["a", "b", "c", "d", "e"]));
        assert_eq!(session.select(&pid("e")).unwrap_err(), EngineError::NoOpenCourt);
    }

    #[test]
    fn test_promote_keeps_a_staging_court_available() {
        let session = seat_four(&session_with(&["a", "b", "c", "d"]));
        let court_id = staging_id(&session);
        let next = session.promote(court_id).unwrap();

        assert_eq!(next.court(&court_id).unwrap().number, Some(1));
        assert_eq!(next.court_count(), 2);
        assert!(next.court_at(1).unwrap().is_staging());
    }

    #[test]
    fn test_promote_without_keep_staging_rule() {
        let rules = SessionRules {
            keep_staging_court: false,
            ..SessionRules::default()
        };
        let session = ["a", "b", "c", "d"].iter().fold(
            Session::with_courts(rules, 1, 0),
            |s, id| s.join(Participant::new(*id, *id)).unwrap(),
        );
        let session = seat_four(&session);
        let next = session.promote(staging_id(&session)).unwrap();
        assert_eq!(next.court_count(), 1);
    }

    #[test]
    fn test_pull_from_active_court_keeps_number() {
        let session = seat_four(&session_with(&["a", "b", "c", "d"]));
        let court_id = staging_id(&session);
        let active = session.promote(court_id).unwrap();
        let pulled = active.pull(court_id, &pid("c")).unwrap();

        let court = pulled.court(&court_id).unwrap();
        assert_eq!(court.number, Some(1));
        assert_eq!(court.current_match().unwrap().state(), MatchState::Open);
        assert_eq!(pulled.queue().0, vec![pid("c")]);

        let refilled = pulled.assign(court_id, &pid("c")).unwrap();
        let current = refilled.court(&court_id).unwrap().current_match().unwrap();
        assert_eq!(current.state(), MatchState::Active);
    }

    #[test]
    fn test_pull_demotes_when_rule_enabled() {
        let rules = SessionRules {
            demote_on_vacancy: true,
            ..SessionRules::default()
        };
        let session = ["a", "b", "c", "d"].iter().fold(
            Session::with_courts(rules, 1, 0),
            |s, id| s.join(Participant::new(*id, *id)).unwrap(),
        );
        let session = seat_four(&session);
        let court_id = staging_id(&session);
        let pulled = session
            .promote(court_id)
            .unwrap()
            .pull(court_id, &pid("a"))
            .unwrap();

        let court = pulled.court(&court_id).unwrap();
        assert!(court.is_staging());
        assert!(court.current_match().unwrap().started_at.is_none());
    }

    #[test]
    fn test_end_match_records_scores_and_requeues() {
        let session = seat_four(&session_with(&["a", "b", "c", "d", "e"]));
        let court_id = staging_id(&session);
        let ended = session
            .promote(court_id)
            .unwrap()
            .end_match(court_id, Some([21, 17]))
            .unwrap();

        let court = ended.court(&court_id).unwrap();
        assert!(court.is_staging());
        assert!(court.current_match().is_none());
        let finished = &court.matches[0];
        assert_eq!(finished.slots[0].result, Some(SlotResult::Win));
        assert_eq!(finished.slots[1].result, Some(SlotResult::Loss));
        assert_eq!(finished.slots[1].score, Some(17));

        assert_eq!(
            ended.queue().0,
            vec![pid("e"), pid("a"), pid("b"), pid("c"), pid("d")]
        );
        assert_eq!(ended.participant(&pid("a")).unwrap().games_played, 1);
        assert_eq!(ended.participant(&pid("e")).unwrap().games_played, 0);
    }

    #[test]
    fn test_end_unstarted_match_does_not_count_games() {
        let session = seat_four(&session_with(&["a", "b", "c", "d"]));
        let ended = session.end_match(staging_id(&session), None).unwrap();
        assert_eq!(ended.participant(&pid("a")).unwrap().games_played, 0);
        assert_eq!(ended.queue().len(), 4);
    }

    #[test]
    fn test_end_match_without_current_match() {
        let session = session_with(&["a"]);
        let court_id = staging_id(&session);
        assert_eq!(
            session.end_match(court_id, None).unwrap_err(),
            EngineError::NoCurrentMatch { court_id }
        );
    }

    #[test]
    fn test_end_session_requeues_everyone_and_locks() {
        let session = seat_four(&session_with(&["a", "b", "c", "d", "e"]));
        let ended = session.end_session().unwrap();

        assert!(ended.is_ended());
        assert_eq!(ended.queue().len(), 5);
        assert!(matches!(
            ended.reorder(0, 1),
            Err(EngineError::SessionEnded { .. })
        ));
    }

    #[test]
    fn test_leave_rejects_seated_participant() {
        let session = seat_four(&session_with(&["a", "b", "c", "d", "e"]));
        assert!(matches!(
            session.leave(&pid("a")),
            Err(EngineError::ParticipantSeated { .. })
        ));

        let left = session.leave(&pid("e")).unwrap();
        assert!(left.queue().is_empty());
        assert!(left.participant(&pid("e")).is_none());
    }

    #[test]
    fn test_add_active_court_reuses_freed_number() {
        let session = Session::with_courts(SessionRules::default(), 0, 3);
        let second = session.court_at(1).unwrap().id;
        let session = session.demote(second).unwrap();
        let session = session.add_active_court().unwrap();

        assert_eq!(session.court_at(3).unwrap().number, Some(2));
    }

    #[test]
    fn test_check_invariants_detects_unstarted_match_on_numbered_court() {
        let mut session = seat_four(&session_with(&["a", "b", "c", "d"]));
        let court_id = staging_id(&session);
        if let Some(court) = session.courts.get_mut(&court_id) {
            court.number = Some(1);
        }
        assert!(session.check_invariants().is_err());
    }

    #[test]
    fn test_check_invariants_detects_double_seating() {
        let mut session = seat_four(&session_with(&["a", "b", "c", "d"]));
        session.queue.0.push(pid("a"));
        assert!(session.check_invariants().is_err());
    }
}
