use crate::core::command::Command;
use crate::domain::model::{CourtId, Session, SessionId};
use crate::domain::ports::SessionStore;
use crate::utils::error::{AppError, EngineError, Result};
use std::collections::VecDeque;

const DEFAULT_HISTORY_LIMIT: usize = 64;

/// 一次成功操作前後的快照
#[derive(Debug, Clone)]
pub struct Transition {
    pub before: Session,
    pub after: Session,
    pub changed_courts: Vec<CourtId>,
}

/// 單一寫入者的 Session 引擎
///
/// Applies commands to the current snapshot, pushes the affected records to
/// the store and only then replaces the snapshot. A rejected push leaves the
/// previous snapshot in place.
pub struct SessionEngine<S: SessionStore> {
    store: S,
    current: Session,
    history: VecDeque<Session>,
    history_limit: usize,
}

impl<S: SessionStore> SessionEngine<S> {
    pub fn new(store: S, session: Session) -> Self {
        Self {
            store,
            current: session,
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// 從持久化服務載入既有的場次
    pub async fn open(store: S, session_id: SessionId) -> Result<Self> {
        let session = store
            .load_session(session_id)
            .await?
            .ok_or_else(|| AppError::PersistenceError {
                message: format!("session {} not found", session_id),
            })?;
        session.check_invariants()?;
        Ok(Self::new(store, session))
    }

    /// 建立新場次並寫入一次完整快照
    pub async fn create(store: S, session: Session) -> Result<Self> {
        store.save_session(&session).await?;
        for court in session.courts() {
            store.upsert_court(session.id(), court).await?;
        }
        Ok(Self::new(store, session))
    }

    pub fn session(&self) -> &Session {
        &self.current
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub async fn dispatch(&mut self, command: Command) -> Result<Transition> {
        let next = match command.apply(&self.current) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!("Command '{}' rejected: {}", command.name(), e);
                return Err(e.into());
            }
        };

        let transition = self.persist(next).await?;
        tracing::info!(
            "Applied '{}' (revision {}, {} court(s) updated)",
            command.name(),
            transition.after.revision(),
            transition.changed_courts.len()
        );
        Ok(transition)
    }

    /// 只在呼叫端看到的版本仍是最新時才套用
    pub async fn dispatch_at(&mut self, expected_revision: u64, command: Command) -> Result<Transition> {
        let actual = self.current.revision();
        if expected_revision != actual {
            tracing::warn!(
                "Command '{}' computed against revision {}, session is at {}",
                command.name(),
                expected_revision,
                actual
            );
            return Err(EngineError::StaleSnapshot {
                expected: expected_revision,
                actual,
            }
            .into());
        }
        self.dispatch(command).await
    }

    /// 回復到上一個快照並同步到持久化服務
    pub async fn undo(&mut self) -> Result<Transition> {
        let Some(previous) = self.history.pop_back() else {
            return Err(EngineError::NothingToUndo.into());
        };

        let mut restored = previous.clone();
        restored.revision = self.current.revision + 1;

        match self.push(&self.current, restored).await {
            Ok((after, changed_courts)) => {
                let before = std::mem::replace(&mut self.current, after.clone());
                tracing::info!("Undo restored revision {}", previous.revision());
                Ok(Transition {
                    before,
                    after,
                    changed_courts,
                })
            }
            Err(e) => {
                self.history.push_back(previous);
                Err(e)
            }
        }
    }

    async fn persist(&mut self, next: Session) -> Result<Transition> {
        let (after, changed_courts) = self.push(&self.current, next).await?;

        let before = std::mem::replace(&mut self.current, after.clone());
        self.history.push_back(before.clone());
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }

        Ok(Transition {
            before,
            after,
            changed_courts,
        })
    }

    /// 推送變動：每個變動的場地一次 upsert，再儲存場次
    async fn push(&self, before: &Session, mut next: Session) -> Result<(Session, Vec<CourtId>)> {
        let changed: Vec<CourtId> = next
            .courts()
            .filter(|court| before.court(&court.id) != Some(*court))
            .map(|court| court.id)
            .collect();

        let mut pushed = Vec::with_capacity(changed.len());
        for court_id in &changed {
            let Some(court) = next.court(court_id) else {
                continue;
            };
            match self.store.upsert_court(next.id(), court).await {
                Ok(stored) => {
                    if &stored != court {
                        tracing::warn!("Store returned a different version of court {}", court_id);
                    }
                    next.courts.insert(*court_id, stored);
                    pushed.push(*court_id);
                }
                Err(e) => {
                    self.compensate(before, &pushed).await;
                    tracing::warn!("Persisting court {} failed, rolling back: {}", court_id, e);
                    return Err(e);
                }
            }
        }

        if let Err(violation) = next.check_invariants() {
            self.compensate(before, &pushed).await;
            return Err(violation.into());
        }

        // 每次提交都寫入場次，讓儲存的 revision 與場地清單保持最新
        if let Err(e) = self.store.save_session(&next).await {
            self.compensate(before, &pushed).await;
            tracing::warn!("Persisting session {} failed, rolling back: {}", next.id(), e);
            return Err(e);
        }

        Ok((next, changed))
    }

    /// 盡力把已經寫入的場地恢復成操作前的版本
    async fn compensate(&self, before: &Session, pushed: &[CourtId]) {
        for court_id in pushed {
            let Some(court) = before.court(court_id) else {
                continue;
            };
            if let Err(e) = self.store.upsert_court(before.id(), court).await {
                tracing::warn!("Could not restore court {} after failure: {}", court_id, e);
            }
        }
    }
}
