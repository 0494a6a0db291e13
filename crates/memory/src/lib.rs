//! Dual memory engine for the speech coach
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐      promotion       ┌──────────────────────────┐
//! │   Short-term Memory (STM)    │  mention_count >= 5  │  Long-term Memory (LTM)  │
//! │  per (type, sub-key), TTL    │ ───────────────────► │  profile, goals, traits  │
//! │  capped at 30, expiring      │  importance hi/med   │  versioned, cached 24h   │
//! └──────────────────────────────┘                      └──────────────────────────┘
//!                 │                                                  │
//!                 └──────────────► MemoryPromptContext ◄─────────────┘
//!                                 (rendered into prompts)
//! ```
//!
//! - [`merge_ltm`] / [`promote_to_ltm`]: versioned LTM updates
//! - [`merge_stm`]: keyed STM merge with expiry, ranking and cap
//! - [`merge_score_history`] / [`dedupe_suggestions`]: bounded history reducers
//! - [`LtmCache`]: per-user LTM cache with a freshness window
//! - [`InMemoryMemoryStore`]: `MemoryStore` backed by `DashMap`

pub mod cache;
pub mod history;
pub mod ltm;
pub mod prompt;
pub mod stm;
pub mod store;

pub use cache::LtmCache;
pub use history::{dedupe_suggestions, merge_score_history};
pub use ltm::{merge_ltm, promote_to_ltm};
pub use prompt::MemoryPromptContext;
pub use stm::{
    improvement_stm, merge_stm, merge_stm_at, session_insight_stm, should_promote,
    speech_pattern_stm,
};
pub use store::InMemoryMemoryStore;

use serde::{Deserialize, Serialize};

/// Memory limits and windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// LTM cache freshness window
    pub ltm_cache_hours: i64,
    /// Maximum STM records kept per user
    pub stm_cap: usize,
    /// Maximum score history entries kept per user
    pub score_history_cap: usize,
    /// Mentions required before an STM is promoted
    pub promotion_threshold: u32,
    /// TTL for speech patterns when extraction gives none
    pub default_stm_ttl_days: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ltm_cache_hours: 24,
            stm_cap: stm::STM_CAP,
            score_history_cap: history::SCORE_HISTORY_CAP,
            promotion_threshold: stm::PROMOTION_THRESHOLD,
            default_stm_ttl_days: stm::DEFAULT_TTL_DAYS,
        }
    }
}
