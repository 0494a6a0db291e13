//! Memory persistence trait

use crate::{LongTermMemory, Result, ScoreHistoryEntry, ShortTermMemory};
use async_trait::async_trait;

/// Per-user memory storage
///
/// Writes are last-writer-wins; implementations are not expected to lock across
/// concurrent sessions of the same user.
#[async_trait]
pub trait MemoryStore: Send + Sync + 'static {
    /// Load the user's long-term memory, if one exists
    async fn load_ltm(&self, user_id: &str) -> Result<Option<LongTermMemory>>;

    /// Persist the user's long-term memory
    async fn save_ltm(&self, user_id: &str, ltm: &LongTermMemory) -> Result<()>;

    /// Load non-expired short-term memories, most recently updated first, at most 30
    async fn load_stm(&self, user_id: &str) -> Result<Vec<ShortTermMemory>>;

    /// Replace the user's short-term memories
    async fn save_stm(&self, user_id: &str, stm: &[ShortTermMemory]) -> Result<()>;

    /// Load score history, newest first
    async fn load_score_history(&self, user_id: &str) -> Result<Vec<ScoreHistoryEntry>>;

    /// Replace the user's score history
    async fn save_score_history(&self, user_id: &str, history: &[ScoreHistoryEntry])
        -> Result<()>;
}
