//! Rule-based moderation filter

use regex::Regex;
use serde::{Deserialize, Serialize};
use speech_coach_core::{Error, Result};

use super::rules::{default_rules, ModerationRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    None,
    Moderate,
    Severe,
}

/// Result of a non-fatal moderation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationOutcome {
    /// Transcript with PII masked
    pub text: String,
    pub flags: Vec<String>,
    /// Progress message for the session log
    pub message: String,
}

/// Rule-based moderation filter
pub struct ModerationFilter {
    rules: ModerationRules,
    profanity_patterns: Vec<Regex>,
    pii_patterns: Vec<CompiledPiiRule>,
}

struct CompiledPiiRule {
    pattern: Regex,
    kind: String,
    placeholder: String,
}

impl ModerationFilter {
    /// Create a filter; patterns that fail to compile are skipped
    pub fn new(rules: ModerationRules) -> Self {
        let profanity_patterns = rules
            .profanity_patterns
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){}", p)) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "Skipping invalid profanity pattern");
                    None
                }
            })
            .collect();

        let pii_patterns = rules
            .pii_rules
            .iter()
            .filter_map(|rule| match Regex::new(&rule.pattern) {
                Ok(pattern) => Some(CompiledPiiRule {
                    pattern,
                    kind: rule.kind.clone(),
                    placeholder: rule.placeholder(),
                }),
                Err(e) => {
                    tracing::warn!(
                        kind = %rule.kind,
                        pattern = %rule.pattern,
                        error = %e,
                        "Skipping invalid PII pattern"
                    );
                    None
                }
            })
            .collect();

        Self {
            rules,
            profanity_patterns,
            pii_patterns,
        }
    }

    /// Count profanity matches
    fn check_profanity(&self, text: &str) -> usize {
        self.profanity_patterns
            .iter()
            .map(|p| p.find_iter(text).count())
            .sum()
    }

    /// Mask PII in rule order; later rules see earlier masks
    fn mask_pii(&self, text: &str) -> (String, Vec<(String, usize)>) {
        let mut masked = text.to_string();
        let mut found = Vec::new();

        for rule in &self.pii_patterns {
            let count = rule.pattern.find_iter(&masked).count();
            if count > 0 {
                found.push((rule.kind.clone(), count));
                masked = rule
                    .pattern
                    .replace_all(&masked, rule.placeholder.as_str())
                    .into_owned();
            }
        }

        (masked, found)
    }

    /// Classify threats; severe keywords win over moderate ones
    pub fn threat_level(&self, text: &str) -> ThreatLevel {
        let lowered = text.to_lowercase();
        if self
            .rules
            .severe_threat_keywords
            .iter()
            .any(|k| lowered.contains(k.as_str()))
        {
            ThreatLevel::Severe
        } else if self
            .rules
            .moderate_threat_keywords
            .iter()
            .any(|k| lowered.contains(k.as_str()))
        {
            ThreatLevel::Moderate
        } else {
            ThreatLevel::None
        }
    }

    /// Moderate a transcript
    ///
    /// Profanity is flagged, PII is masked, moderate threats are flagged. A severe
    /// threat returns [`Error::Moderation`] and the transcript must not be analyzed.
    pub fn check(&self, text: &str) -> Result<ModerationOutcome> {
        let mut flags = Vec::new();

        let profanity = self.check_profanity(text);
        if profanity > 0 {
            flags.push(format!("profanity_detected:{}", profanity));
        }

        let (masked, pii_found) = self.mask_pii(text);
        for (kind, count) in pii_found {
            flags.push(format!("pii_{}:{}", kind, count));
        }

        match self.threat_level(text) {
            ThreatLevel::Severe => {
                tracing::warn!("Severe threat detected, terminating session");
                return Err(Error::Moderation(
                    "Severe threat detected. Session terminated.".to_string(),
                ));
            }
            ThreatLevel::Moderate => flags.push("threat_moderate".to_string()),
            ThreatLevel::None => {}
        }

        let message = if flags.is_empty() {
            "모더레이션 완료: 이상 없음".to_string()
        } else {
            format!("모더레이션 완료: {}개 이슈 감지", flags.len())
        };

        Ok(ModerationOutcome {
            text: masked,
            flags,
            message,
        })
    }
}

impl Default for ModerationFilter {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::rules::PiiRule;
    use speech_coach_core::ErrorCode;

    fn create_filter() -> ModerationFilter {
        ModerationFilter::default()
    }

    #[test]
    fn test_clean_text() {
        let outcome = create_filter().check("저는 팀 프로젝트를 이끌었습니다.").unwrap();
        assert!(outcome.flags.is_empty());
        assert_eq!(outcome.message, "모더레이션 완료: 이상 없음");
        assert_eq!(outcome.text, "저는 팀 프로젝트를 이끌었습니다.");
    }

    #[test]
    fn test_pii_is_masked() {
        let outcome = create_filter()
            .check("연락처는 010-1234-5678 이고 메일은 kim@example.com 입니다")
            .unwrap();
        assert!(outcome.text.contains("[MASKED_PHONE]"));
        assert!(outcome.text.contains("[MASKED_EMAIL]"));
        assert!(!outcome.text.contains("5678"));
        assert_eq!(outcome.flags, vec!["pii_phone:1", "pii_email:1"]);
        assert_eq!(outcome.message, "모더레이션 완료: 2개 이슈 감지");
    }

    #[test]
    fn test_profanity_flagged_not_masked() {
        let outcome = create_filter().check("아 씨발 진짜").unwrap();
        assert_eq!(outcome.flags, vec!["profanity_detected:1"]);
        assert!(outcome.text.contains("씨발"));
    }

    #[test]
    fn test_moderate_threat_continues() {
        let outcome = create_filter().check("상사가 협박을 했습니다").unwrap();
        assert_eq!(outcome.flags, vec!["threat_moderate"]);
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let mut rules = default_rules();
        rules.profanity_patterns.insert(0, "씨[발".to_string());
        rules.pii_rules.insert(0, PiiRule::new("broken", r"(\d{3"));
        let filter = ModerationFilter::new(rules);

        assert_eq!(filter.pii_patterns.len(), default_rules().pii_rules.len());
        assert_eq!(
            filter.profanity_patterns.len(),
            default_rules().profanity_patterns.len()
        );

        let outcome = filter.check("연락처는 010-1234-5678 입니다").unwrap();
        assert_eq!(outcome.flags, vec!["pii_phone:1"]);
    }

    #[test]
    fn test_severe_threat_is_fatal() {
        let err = create_filter().check("건물을 폭발 시키겠다").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ContentViolation);
    }
}
