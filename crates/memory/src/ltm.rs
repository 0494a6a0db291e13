//! Long-term memory merge and promotion

use chrono::Utc;
use speech_coach_core::{
    CareerContext, ConfirmedTrait, FeedbackPreference, GoalContext, LongTermMemory, LtmUpdate,
    PatternTrend, Severity, ShortTermMemory, TraitType, UserProfile,
};

fn overlay<T: Clone>(target: &mut Option<T>, incoming: &Option<T>) {
    if incoming.is_some() {
        target.clone_from(incoming);
    }
}

fn overlay_list(target: &mut Vec<String>, incoming: &[String]) {
    if !incoming.is_empty() {
        *target = incoming.to_vec();
    }
}

fn merge_profile(target: &mut UserProfile, incoming: &UserProfile) {
    overlay(&mut target.name, &incoming.name);
    overlay(&mut target.occupation, &incoming.occupation);
    overlay(&mut target.experience_years, &incoming.experience_years);
    overlay(&mut target.industry, &incoming.industry);
    overlay(&mut target.company_type, &incoming.company_type);
}

fn merge_career(target: &mut CareerContext, incoming: &CareerContext) {
    overlay(&mut target.current_role, &incoming.current_role);
    overlay(&mut target.target_role, &incoming.target_role);
    overlay_list(&mut target.key_skills, &incoming.key_skills);
    overlay_list(&mut target.achievements, &incoming.achievements);
}

fn merge_goal(target: &mut GoalContext, incoming: &GoalContext) {
    overlay(&mut target.primary_goal, &incoming.primary_goal);
    overlay(&mut target.target_company, &incoming.target_company);
    overlay(&mut target.target_date, &incoming.target_date);
    overlay_list(&mut target.concerns, &incoming.concerns);
}

fn merge_preference(target: &mut FeedbackPreference, incoming: &FeedbackPreference) {
    overlay(&mut target.style, &incoming.style);
    overlay(&mut target.detail_level, &incoming.detail_level);
    overlay(&mut target.language, &incoming.language);
}

/// Traits are keyed by category; incoming replaces existing in place
fn merge_traits(target: &mut Vec<ConfirmedTrait>, incoming: &[ConfirmedTrait]) {
    for confirmed in incoming {
        match target.iter_mut().find(|t| t.category == confirmed.category) {
            Some(existing) => *existing = confirmed.clone(),
            None => target.push(confirmed.clone()),
        }
    }
}

/// Apply a partial update to a user's LTM
///
/// An empty update returns the existing record untouched. Otherwise each section
/// is shallow-merged, the version is bumped and `updated_at` is refreshed. With no
/// existing record the update becomes a new one at the update's version (or 1).
pub fn merge_ltm(
    existing: Option<LongTermMemory>,
    user_id: &str,
    incoming: &LtmUpdate,
) -> LongTermMemory {
    let Some(mut ltm) = existing else {
        let mut created = LongTermMemory::new(user_id);
        apply(&mut created, incoming);
        created.version = incoming.version.unwrap_or(1);
        return created;
    };

    if incoming.is_empty() {
        return ltm;
    }

    apply(&mut ltm, incoming);
    ltm.version += 1;
    ltm.updated_at = Utc::now();
    ltm
}

fn apply(ltm: &mut LongTermMemory, incoming: &LtmUpdate) {
    merge_profile(&mut ltm.profile, &incoming.profile);
    merge_career(&mut ltm.career, &incoming.career);
    merge_goal(&mut ltm.goal, &incoming.goal);
    merge_preference(&mut ltm.feedback_preference, &incoming.feedback_preference);
    merge_traits(&mut ltm.confirmed_traits, &incoming.confirmed_traits);
}

/// Copy a repeated speech pattern into LTM as a confirmed trait
///
/// Non-pattern STMs leave the record unchanged. High severity is always a
/// weakness; otherwise an improving trend is a strength.
pub fn promote_to_ltm(ltm: LongTermMemory, stm: &ShortTermMemory) -> LongTermMemory {
    let Some(pattern) = stm.speech_pattern() else {
        return ltm;
    };

    let trait_type = if pattern.severity == Severity::High {
        TraitType::Weakness
    } else if pattern.trend == PatternTrend::Improving {
        TraitType::Strength
    } else {
        TraitType::Weakness
    };

    let first_detected = ltm
        .confirmed_traits
        .iter()
        .find(|t| t.category == pattern.pattern_type)
        .map(|t| t.first_detected)
        .unwrap_or(stm.created_at);

    let confirmed = ConfirmedTrait {
        trait_type,
        category: pattern.pattern_type.clone(),
        description: pattern.description.clone(),
        confirmed_count: stm.mention_count,
        first_detected,
        last_confirmed: Utc::now(),
    };

    tracing::debug!(
        user_id = %ltm.user_id,
        category = %confirmed.category,
        trait_type = ?trait_type,
        "Promoting STM to LTM"
    );

    let user_id = ltm.user_id.clone();
    merge_ltm(Some(ltm), &user_id, &LtmUpdate::default().with_trait(confirmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stm::speech_pattern_stm;
    use chrono::Duration;
    use speech_coach_core::GoalType;

    #[test]
    fn test_empty_update_is_noop() {
        let ltm = LongTermMemory::new("u1");
        let merged = merge_ltm(Some(ltm.clone()), "u1", &LtmUpdate::default());
        assert_eq!(merged, ltm);
    }

    #[test]
    fn test_missing_record_is_created() {
        let mut update = LtmUpdate::default();
        update.profile.occupation = Some("백엔드 개발자".to_string());
        let created = merge_ltm(None, "u1", &update);
        assert_eq!(created.version, 1);
        assert_eq!(created.user_id, "u1");
        assert_eq!(created.profile.occupation.as_deref(), Some("백엔드 개발자"));

        update.version = Some(4);
        assert_eq!(merge_ltm(None, "u1", &update).version, 4);
    }

    #[test]
    fn test_shallow_merge_bumps_version() {
        let mut ltm = LongTermMemory::new("u1");
        ltm.profile.name = Some("김철수".to_string());
        ltm.career.key_skills = vec!["Rust".to_string()];
        ltm.updated_at = ltm.updated_at - Duration::hours(1);
        let before = ltm.updated_at;

        let mut update = LtmUpdate::default();
        update.profile.industry = Some("IT".to_string());
        update.goal.primary_goal = Some(GoalType::Interview);

        let merged = merge_ltm(Some(ltm), "u1", &update);
        assert_eq!(merged.version, 2);
        assert!(merged.updated_at > before);
        assert_eq!(merged.profile.name.as_deref(), Some("김철수"));
        assert_eq!(merged.profile.industry.as_deref(), Some("IT"));
        // empty incoming lists keep existing
        assert_eq!(merged.career.key_skills, vec!["Rust".to_string()]);
        assert_eq!(merged.goal.primary_goal, Some(GoalType::Interview));
    }

    #[test]
    fn test_promotion_creates_weakness_for_high_severity() {
        let ltm = LongTermMemory::new("u1");
        let mut stm = speech_pattern_stm(
            "u1",
            "s1",
            "pace",
            "말 속도가 빠른 경향",
            Severity::High,
            Some(190.0),
            None,
        );
        stm.mention_count = 5;

        let promoted = promote_to_ltm(ltm, &stm);
        assert_eq!(promoted.version, 2);
        let confirmed = &promoted.confirmed_traits[0];
        assert_eq!(confirmed.trait_type, TraitType::Weakness);
        assert_eq!(confirmed.category, "pace");
        assert_eq!(confirmed.confirmed_count, 5);
    }

    #[test]
    fn test_promotion_keeps_first_detected() {
        let ltm = LongTermMemory::new("u1");
        let mut stm = speech_pattern_stm("u1", "s1", "filler", "'어' 사용", Severity::Low, None, None);
        stm.mention_count = 5;
        let first = promote_to_ltm(ltm, &stm);
        let first_detected = first.confirmed_traits[0].first_detected;

        let mut later = speech_pattern_stm("u1", "s2", "filler", "'어' 감소", Severity::Low, None, None);
        later.mention_count = 6;
        later.created_at = later.created_at + Duration::days(3);
        if let speech_coach_core::StmPayload::SpeechPattern(p) = &mut later.payload {
            p.trend = PatternTrend::Improving;
        }

        let second = promote_to_ltm(first, &later);
        assert_eq!(second.confirmed_traits.len(), 1);
        assert_eq!(second.confirmed_traits[0].first_detected, first_detected);
        assert_eq!(second.confirmed_traits[0].trait_type, TraitType::Strength);
        assert_eq!(second.confirmed_traits[0].confirmed_count, 6);
        assert_eq!(second.version, 3);
    }

    #[test]
    fn test_non_pattern_promotion_is_noop() {
        let ltm = LongTermMemory::new("u1");
        let stm = crate::stm::session_insight_stm("u1", "s1", "첫 세션");
        assert_eq!(promote_to_ltm(ltm.clone(), &stm), ltm);
    }
}
