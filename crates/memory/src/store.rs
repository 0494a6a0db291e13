//! In-process memory store

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use speech_coach_core::{
    LongTermMemory, MemoryStore, Result, ScoreHistoryEntry, ShortTermMemory,
};

use crate::stm::STM_CAP;

/// `MemoryStore` kept in process memory
///
/// Used by the CLI and tests. Each write replaces the user's previous value.
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    ltm: DashMap<String, LongTermMemory>,
    stm: DashMap<String, Vec<ShortTermMemory>>,
    history: DashMap<String, Vec<ScoreHistoryEntry>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn load_ltm(&self, user_id: &str) -> Result<Option<LongTermMemory>> {
        Ok(self.ltm.get(user_id).map(|entry| entry.clone()))
    }

    async fn save_ltm(&self, user_id: &str, ltm: &LongTermMemory) -> Result<()> {
        self.ltm.insert(user_id.to_string(), ltm.clone());
        Ok(())
    }

    async fn load_stm(&self, user_id: &str) -> Result<Vec<ShortTermMemory>> {
        let now = Utc::now();
        let mut records: Vec<ShortTermMemory> = self
            .stm
            .get(user_id)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|s| !s.is_expired_at(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records.truncate(STM_CAP);
        Ok(records)
    }

    async fn save_stm(&self, user_id: &str, stm: &[ShortTermMemory]) -> Result<()> {
        self.stm.insert(user_id.to_string(), stm.to_vec());
        Ok(())
    }

    async fn load_score_history(&self, user_id: &str) -> Result<Vec<ScoreHistoryEntry>> {
        Ok(self
            .history
            .get(user_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn save_score_history(
        &self,
        user_id: &str,
        history: &[ScoreHistoryEntry],
    ) -> Result<()> {
        self.history.insert(user_id.to_string(), history.to_vec());
        Ok(())
    }
}
