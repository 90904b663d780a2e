use crate::domain::model::{Court, Session, SessionId};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 持久化服務介面：接收序列化後的紀錄並回傳權威版本
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert one court together with its matches; returns the stored version.
    async fn upsert_court(&self, session_id: SessionId, court: &Court) -> Result<Court>;

    /// Save queue, roster and session-level flags.
    async fn save_session(&self, session: &Session) -> Result<()>;

    async fn load_session(&self, session_id: SessionId) -> Result<Option<Session>>;
}
