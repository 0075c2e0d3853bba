pub mod yaml_store;

use crate::model::Session;

/// Durable backing of a session registry.
///
/// Implementations replace the whole record set on every save; callers
/// serialize access themselves.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_all(&self) -> anyhow::Result<Vec<Session>>;
    async fn save_all(&self, sessions: &[Session]) -> anyhow::Result<()>;
}
