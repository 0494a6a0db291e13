//! Short-term memory constructors and merge

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use speech_coach_core::{
    round_to, Grade, Importance, ImprovementProgress, MemoryType, PatternTrend, SessionInsight,
    Severity, ShortTermMemory, SpeechPattern, StmPayload,
};

/// Maximum STM records kept per user
pub const STM_CAP: usize = 30;
/// Mentions required before promotion
pub const PROMOTION_THRESHOLD: u32 = 5;
/// Speech pattern TTL when none is given
pub const DEFAULT_TTL_DAYS: u32 = 14;

const MIN_TTL_DAYS: u32 = 7;
const MAX_TTL_DAYS: u32 = 30;
const INSIGHT_TTL_DAYS: u32 = 7;

// =============================================================================
// Constructors
// =============================================================================

/// Speech pattern observed in a session; importance follows severity
pub fn speech_pattern_stm(
    user_id: &str,
    session_id: &str,
    pattern_type: &str,
    description: &str,
    severity: Severity,
    numeric_value: Option<f64>,
    ttl_days: Option<u32>,
) -> ShortTermMemory {
    let ttl = ttl_days
        .unwrap_or(DEFAULT_TTL_DAYS)
        .clamp(MIN_TTL_DAYS, MAX_TTL_DAYS);

    let payload = StmPayload::SpeechPattern(SpeechPattern {
        pattern_type: pattern_type.to_string(),
        description: description.to_string(),
        severity,
        occurrence_count: 1,
        trend: PatternTrend::Stable,
        numeric_value,
    });

    ShortTermMemory::new(
        user_id,
        MemoryType::SpeechPattern,
        payload,
        severity.into(),
        Some(ttl),
    )
    .with_source_session(session_id)
}

/// Grade movement in one category; never expires
pub fn improvement_stm(
    user_id: &str,
    session_id: &str,
    category: &str,
    initial: Grade,
    current: Grade,
) -> ShortTermMemory {
    let initial_value = initial.numeric();
    let improvement_rate = if initial_value > 0.0 {
        round_to((current.numeric() - initial_value) / initial_value * 100.0, 1)
    } else {
        0.0
    };

    let payload = StmPayload::Improvement(ImprovementProgress {
        category: category.to_string(),
        initial_score: initial,
        current_score: current,
        best_score: initial.max(current),
        improvement_rate,
        sessions_measured: 1,
    });

    ShortTermMemory::new(
        user_id,
        MemoryType::ImprovementProgress,
        payload,
        Importance::Medium,
        None,
    )
    .with_source_session(session_id)
}

/// One-line session summary, kept for a week
pub fn session_insight_stm(user_id: &str, session_id: &str, summary: &str) -> ShortTermMemory {
    let payload = StmPayload::SessionInsight(SessionInsight {
        summary: summary.to_string(),
    });

    ShortTermMemory::new(
        user_id,
        MemoryType::SessionInsight,
        payload,
        Importance::Low,
        Some(INSIGHT_TTL_DAYS),
    )
    .with_source_session(session_id)
}

// =============================================================================
// Merge
// =============================================================================

/// Merge incoming STMs into the stored set at the current time with the default cap
pub fn merge_stm(
    existing: Vec<ShortTermMemory>,
    incoming: Vec<ShortTermMemory>,
) -> Vec<ShortTermMemory> {
    merge_stm_at(existing, incoming, Utc::now(), STM_CAP)
}

/// Merge incoming STMs into the stored set
///
/// Expired records are dropped. Records are keyed by `(memory_type, sub_key)`;
/// a matching incoming record overwrites the stored one but keeps its id and
/// creation time, and bumps the mention count. The result is ordered by
/// importance, then mention count, and truncated to `cap`.
pub fn merge_stm_at(
    existing: Vec<ShortTermMemory>,
    incoming: Vec<ShortTermMemory>,
    now: DateTime<Utc>,
    cap: usize,
) -> Vec<ShortTermMemory> {
    let mut merged: Vec<ShortTermMemory> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<(MemoryType, String), usize> = HashMap::new();

    for stm in existing.into_iter().filter(|s| !s.is_expired_at(now)) {
        let key = (stm.memory_type, stm.sub_key().to_string());
        match index.get(&key) {
            // duplicate keys already in storage collapse to the first
            Some(_) => continue,
            None => {
                index.insert(key, merged.len());
                merged.push(stm);
            }
        }
    }

    for mut stm in incoming {
        let key = (stm.memory_type, stm.sub_key().to_string());
        match index.get(&key) {
            Some(&pos) => {
                let previous = &merged[pos];
                stm.id = previous.id.clone();
                stm.created_at = previous.created_at;
                stm.mention_count = previous.mention_count + 1;
                stm.updated_at = now;
                merged[pos] = stm;
            }
            None => {
                stm.mention_count = 1;
                index.insert(key, merged.len());
                merged.push(stm);
            }
        }
    }

    merged.sort_by(|a, b| {
        a.importance
            .cmp(&b.importance)
            .then_with(|| b.mention_count.cmp(&a.mention_count))
    });
    merged.truncate(cap);
    merged
}

/// Repeated, non-trivial observations graduate to LTM
///
/// `threshold` is the mention count required, [`PROMOTION_THRESHOLD`] by default.
pub fn should_promote(stm: &ShortTermMemory, threshold: u32) -> bool {
    stm.mention_count >= threshold
        && matches!(stm.importance, Importance::High | Importance::Medium)
}
