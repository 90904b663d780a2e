use crate::domain::model::{Court, Session, SessionId};
use crate::domain::ports::SessionStore;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

const SESSION_FILE: &str = "session.json";
const COURTS_DIR: &str = "courts";

/// 本地 JSON 檔案儲存，每個場次一個目錄
///
/// ```text
/// <base>/<session-id>/session.json
/// <base>/<session-id>/courts/<court-id>.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn session_dir(&self, session_id: SessionId) -> PathBuf {
        self.base_path.join(session_id.to_string())
    }

    fn court_path(&self, session_id: SessionId, court: &Court) -> PathBuf {
        self.session_dir(session_id)
            .join(COURTS_DIR)
            .join(format!("{}.json", court.id))
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn upsert_court(&self, session_id: SessionId, court: &Court) -> Result<Court> {
        let path = self.court_path(session_id, court);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, serde_json::to_vec_pretty(court)?).await?;

        // 讀回寫入的內容作為權威版本
        let stored = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&stored)?)
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let dir = self.session_dir(session.id());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(SESSION_FILE), serde_json::to_vec_pretty(session)?).await?;
        tracing::debug!("Saved session {} to {}", session.id(), dir.display());
        Ok(())
    }

    async fn load_session(&self, session_id: SessionId) -> Result<Option<Session>> {
        let dir = self.session_dir(session_id);
        let session_path = dir.join(SESSION_FILE);
        if !tokio::fs::try_exists(&session_path).await? {
            return Ok(None);
        }

        let mut session: Session = serde_json::from_slice(&tokio::fs::read(&session_path).await?)?;

        let courts_dir = dir.join(COURTS_DIR);
        if tokio::fs::try_exists(&courts_dir).await? {
            let mut entries = tokio::fs::read_dir(&courts_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                let court: Court = serde_json::from_slice(&tokio::fs::read(entry.path()).await?)?;
                // session.json 決定有哪些場地，殘留的場地檔不載入
                if !session.court_order.contains(&court.id) {
                    tracing::debug!("Skipping stale court file {}", entry.path().display());
                    continue;
                }
                session.courts.insert(court.id, court);
            }
        }

        Ok(Some(session))
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    failing: AtomicBool,
    court_upserts: AtomicUsize,
    session_saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模擬後端拒絕寫入
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn court_upserts(&self) -> usize {
        self.court_upserts.load(Ordering::SeqCst)
    }

    pub fn session_saves(&self) -> usize {
        self.session_saves.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::PersistenceError {
                message: "store is rejecting writes".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn upsert_court(&self, session_id: SessionId, court: &Court) -> Result<Court> {
        self.check_available()?;
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::PersistenceError {
                message: format!("unknown session {}", session_id),
            })?;

        session.courts.insert(court.id, court.clone());
        self.court_upserts.fetch_add(1, Ordering::SeqCst);
        Ok(court.clone())
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        self.check_available()?;
        self.sessions.lock().await.insert(session.id(), session.clone());
        self.session_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_session(&self, session_id: SessionId) -> Result<Option<Session>> {
        let Some(mut session) = self.sessions.lock().await.get(&session_id).cloned() else {
            return Ok(None);
        };
        let order = session.court_order.clone();
        session.courts.retain(|court_id, _| order.contains(court_id));
        Ok(Some(session))
    }
}
