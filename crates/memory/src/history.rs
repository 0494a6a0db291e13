//! Bounded reducers for score history and suggestions

use std::collections::HashMap;

use speech_coach_core::{ScoreHistoryEntry, Suggestion};

/// Score history entries kept per user
pub const SCORE_HISTORY_CAP: usize = 10;
/// Suggestions kept per session
pub const SUGGESTION_CAP: usize = 5;

/// Fold new entries into the history: one per session, newest first, capped
pub fn merge_score_history(
    existing: Vec<ScoreHistoryEntry>,
    incoming: Vec<ScoreHistoryEntry>,
) -> Vec<ScoreHistoryEntry> {
    let mut by_session: HashMap<String, ScoreHistoryEntry> = HashMap::new();

    for entry in existing.into_iter().chain(incoming) {
        match by_session.get(&entry.session_id) {
            Some(current) if current.timestamp > entry.timestamp => {}
            _ => {
                by_session.insert(entry.session_id.clone(), entry);
            }
        }
    }

    let mut merged: Vec<_> = by_session.into_values().collect();
    merged.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    merged.truncate(SCORE_HISTORY_CAP);
    merged
}

/// One suggestion per category, later wins; highest priority first, capped
pub fn dedupe_suggestions(
    existing: Vec<Suggestion>,
    incoming: Vec<Suggestion>,
) -> Vec<Suggestion> {
    let mut merged: Vec<Suggestion> = Vec::new();

    for suggestion in existing.into_iter().chain(incoming) {
        match merged.iter_mut().find(|s| s.category == suggestion.category) {
            Some(slot) => *slot = suggestion,
            None => merged.push(suggestion),
        }
    }

    merged.sort_by_key(|s| s.priority);
    merged.truncate(SUGGESTION_CAP);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use speech_coach_core::default_scores;

    fn entry(session_id: &str, minutes_ago: i64) -> ScoreHistoryEntry {
        ScoreHistoryEntry {
            session_id: session_id.to_string(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            scores: default_scores(),
            metrics: None,
        }
    }

    #[test]
    fn test_history_dedupes_by_session() {
        let old = entry("s1", 30);
        let newer = entry("s1", 5);
        let newer_ts = newer.timestamp;

        let merged = merge_score_history(vec![old], vec![newer, entry("s2", 10)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].session_id, "s1");
        assert_eq!(merged[0].timestamp, newer_ts);
        assert_eq!(merged[1].session_id, "s2");
    }

    #[test]
    fn test_history_keeps_newest_ten() {
        let existing: Vec<_> = (0..8).map(|i| entry(&format!("old{}", i), 100 + i)).collect();
        let incoming: Vec<_> = (0..5).map(|i| entry(&format!("new{}", i), i)).collect();

        let merged = merge_score_history(existing, incoming);
        assert_eq!(merged.len(), SCORE_HISTORY_CAP);
        assert_eq!(merged[0].session_id, "new0");
        assert!(merged.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert!(!merged.iter().any(|e| e.session_id == "old7"));
    }

    #[test]
    fn test_suggestions_later_wins_per_category() {
        let existing = vec![
            Suggestion::new(2, "pace", "천천히 말하세요"),
            Suggestion::new(1, "filler", "'음'을 줄이세요"),
        ];
        let incoming = vec![Suggestion::new(3, "pace", "문장 사이에 쉼을 두세요")];

        let merged = dedupe_suggestions(existing, incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].category, "filler");
        assert_eq!(merged[1].suggestion, "문장 사이에 쉼을 두세요");
    }

    #[test]
    fn test_suggestions_capped_at_five() {
        let incoming: Vec<_> = (0..8)
            .rev()
            .map(|i| Suggestion::new(i, format!("c{}", i), "s"))
            .collect();
        let merged = dedupe_suggestions(Vec::new(), incoming);
        assert_eq!(merged.len(), SUGGESTION_CAP);
        let priorities: Vec<u32> = merged.iter().map(|s| s.priority).collect();
        assert_eq!(priorities, vec![0, 1, 2, 3, 4]);
    }
}
