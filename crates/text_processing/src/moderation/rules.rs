//! Moderation rule definitions

use serde::{Deserialize, Serialize};

/// Moderation rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRules {
    /// Profanity regexes; matches are flagged, never masked
    #[serde(default)]
    pub profanity_patterns: Vec<String>,
    /// PII rules, applied in order
    #[serde(default)]
    pub pii_rules: Vec<PiiRule>,
    /// Keywords that abort the session
    #[serde(default)]
    pub severe_threat_keywords: Vec<String>,
    /// Keywords that are flagged but allowed through
    #[serde(default)]
    pub moderate_threat_keywords: Vec<String>,
}

/// Masking rule for one kind of personal data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiRule {
    /// Short kind name used in flags (`pii_{kind}:N`)
    pub kind: String,
    /// Pattern to match (regex)
    pub pattern: String,
}

impl PiiRule {
    pub fn new(kind: &str, pattern: &str) -> Self {
        Self {
            kind: kind.to_string(),
            pattern: pattern.to_string(),
        }
    }

    /// Replacement text, e.g. `[MASKED_PHONE]`
    pub fn placeholder(&self) -> String {
        format!("[MASKED_{}]", self.kind.to_uppercase())
    }
}

/// Korean-language defaults
pub fn default_rules() -> ModerationRules {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    ModerationRules {
        profanity_patterns: strings(&[
            r"씨[발빨팔]",
            r"개[새시]끼",
            r"병[신싄]",
            r"지[랄럴]",
            r"꺼[져저]",
        ]),
        pii_rules: vec![
            PiiRule::new("phone", r"01[0-9]-?\d{4}-?\d{4}"),
            PiiRule::new("rrn", r"\d{6}-?[1-4]\d{6}"),
            PiiRule::new("account", r"\d{3,4}-?\d{2,4}-?\d{4,6}"),
            PiiRule::new("email", r"[\w.-]+@[\w.-]+\.\w+"),
        ],
        severe_threat_keywords: strings(&["죽이", "폭발", "총", "칼로", "테러"]),
        moderate_threat_keywords: strings(&["때리", "패", "협박"]),
    }
}
