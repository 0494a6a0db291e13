//! Tolerant parsing of generated responses
//!
//! Model output is free text that usually, but not always, contains a JSON
//! object. Each response kind has a [`ResponseParser`] whose `parse` is strict
//! and whose `fallback` never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use speech_coach_core::{default_scores, Grade, ScoreCategory, Scores, Severity, Suggestion};
use std::collections::HashMap;

use crate::LlmError;

const STRUCTURE_FALLBACK_CHARS: usize = 500;

/// Parser for one kind of generated response
pub trait ResponseParser: Send + Sync {
    type Output;

    /// Strict parse; errors when the expected structure is missing
    fn parse(&self, text: &str) -> Result<Self::Output, LlmError>;

    /// Best-effort value when strict parsing fails
    fn fallback(&self, text: &str) -> Self::Output;

    fn parse_or_fallback(&self, text: &str) -> Self::Output {
        match self.parse(text) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back on unparseable response");
                self.fallback(text)
            }
        }
    }
}

/// Greedy span from the first `{` to the last `}`
pub fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, LlmError> {
    let span = extract_json_span(text)
        .ok_or_else(|| LlmError::Parse("no JSON object in response".to_string()))?;
    serde_json::from_str(span).map_err(|e| LlmError::Parse(e.to_string()))
}

// =============================================================================
// Analysis
// =============================================================================

/// Generated part of an analysis; metrics come from the local tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub scores: Scores,
    pub suggestions: Vec<Suggestion>,
    pub structure_analysis: String,
    pub progressive_note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    scores: HashMap<String, serde_json::Value>,
    #[serde(default)]
    suggestions: Vec<serde_json::Value>,
    #[serde(default)]
    structure_analysis: Option<String>,
    #[serde(default)]
    progressive_note: Option<String>,
}

/// Unknown categories are ignored; missing or unreadable grades stay `B`
fn read_scores(raw: &HashMap<String, serde_json::Value>) -> Scores {
    let mut scores = default_scores();
    for (key, value) in raw {
        let Some(category) = ScoreCategory::from_key(key) else {
            continue;
        };
        if let Some(grade) = value.as_str().and_then(|s| s.trim().parse::<Grade>().ok()) {
            scores.insert(category, grade);
        }
    }
    scores
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AnalysisParser;

impl ResponseParser for AnalysisParser {
    type Output = AnalysisResponse;

    fn parse(&self, text: &str) -> Result<AnalysisResponse, LlmError> {
        let raw: RawAnalysis = parse_json(text)?;

        let mut suggestions: Vec<Suggestion> = raw
            .suggestions
            .into_iter()
            .filter_map(|v| serde_json::from_value::<Suggestion>(v).ok())
            .filter(|s| !s.suggestion.trim().is_empty())
            .collect();
        suggestions.sort_by_key(|s| s.priority);

        Ok(AnalysisResponse {
            scores: read_scores(&raw.scores),
            suggestions,
            structure_analysis: raw.structure_analysis.unwrap_or_default(),
            progressive_note: raw.progressive_note.filter(|n| !n.trim().is_empty()),
        })
    }

    fn fallback(&self, text: &str) -> AnalysisResponse {
        AnalysisResponse {
            scores: default_scores(),
            suggestions: Vec::new(),
            structure_analysis: text.chars().take(STRUCTURE_FALLBACK_CHARS).collect(),
            progressive_note: None,
        }
    }
}

// =============================================================================
// Reflection
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionOutcome {
    #[serde(default = "default_passes")]
    pub passes_review: bool,
    #[serde(default)]
    pub issues_found: Vec<String>,
    #[serde(default)]
    pub suggested_fixes: Vec<String>,
    #[serde(default)]
    pub final_script: String,
}

fn default_passes() -> bool {
    true
}

const PASS_KEYWORDS: &[&str] = &["문제 없", "통과", "적합", "양호", "passes", "good", "ok"];
const FAIL_KEYWORDS: &[&str] = &["문제", "수정 필요", "개선 필요", "issues", "problems"];

#[derive(Debug, Default, Clone, Copy)]
pub struct ReflectionParser;

impl ResponseParser for ReflectionParser {
    type Output = ReflectionOutcome;

    fn parse(&self, text: &str) -> Result<ReflectionOutcome, LlmError> {
        parse_json(text)
    }

    /// Keyword verdict: any pass marker and no failure marker
    fn fallback(&self, text: &str) -> ReflectionOutcome {
        let lowered = text.to_lowercase();
        let passes = PASS_KEYWORDS.iter().any(|k| lowered.contains(k));
        let fails = FAIL_KEYWORDS.iter().any(|k| lowered.contains(k));

        ReflectionOutcome {
            passes_review: passes && !fails,
            issues_found: Vec::new(),
            suggested_fixes: Vec::new(),
            final_script: String::new(),
        }
    }
}

// =============================================================================
// Refinement
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementOutcome {
    pub changes_summary: String,
    pub refined_script: String,
}

static SCRIPT_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)##\s*수정된\s*스크립트").unwrap());
static CHANGES_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)##\s*변경\s*사항\s*\n(.*)").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct RefinementParser;

impl ResponseParser for RefinementParser {
    type Output = RefinementOutcome;

    fn parse(&self, text: &str) -> Result<RefinementOutcome, LlmError> {
        let heading = SCRIPT_HEADING
            .find(text)
            .ok_or_else(|| LlmError::Parse("missing script heading".to_string()))?;

        let changes_part = &text[..heading.start()];
        let script_part = SCRIPT_HEADING
            .split(&text[heading.end()..])
            .next()
            .unwrap_or_default();

        let changes_summary = CHANGES_HEADING
            .captures(changes_part)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        Ok(RefinementOutcome {
            changes_summary,
            refined_script: script_part.trim().to_string(),
        })
    }

    /// Whole response is the script
    fn fallback(&self, text: &str) -> RefinementOutcome {
        RefinementOutcome {
            changes_summary: String::new(),
            refined_script: text.trim().to_string(),
        }
    }
}

// =============================================================================
// Memory extraction
// =============================================================================

/// One memory the model proposes to keep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractedMemory {
    SpeechPattern {
        #[serde(default = "general")]
        subtype: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        severity: Option<String>,
        #[serde(default)]
        numeric_value: Option<f64>,
        #[serde(default)]
        ttl_days: Option<u32>,
    },
    ImprovementProgress {
        #[serde(default = "general")]
        category: String,
        #[serde(default)]
        initial_score: Option<String>,
        #[serde(default)]
        current_score: Option<String>,
    },
    SessionInsight {
        #[serde(default)]
        content: String,
    },
    #[serde(other)]
    Unknown,
}

fn general() -> String {
    "general".to_string()
}

impl ExtractedMemory {
    pub fn severity(&self) -> Severity {
        match self {
            ExtractedMemory::SpeechPattern {
                severity: Some(s), ..
            } => Severity::parse(s),
            _ => Severity::Medium,
        }
    }

    /// Initial and current grades, `B` when absent or unreadable
    pub fn grades(&self) -> (Grade, Grade) {
        let read = |g: &Option<String>| {
            g.as_deref()
                .and_then(|s| s.trim().parse::<Grade>().ok())
                .unwrap_or_default()
        };
        match self {
            ExtractedMemory::ImprovementProgress {
                initial_score,
                current_score,
                ..
            } => (read(initial_score), read(current_score)),
            _ => (Grade::default(), Grade::default()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub should_save: bool,
    pub reasoning: String,
    pub new_memories: Vec<ExtractedMemory>,
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    should_save: bool,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    new_memories: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractionParser;

impl ResponseParser for ExtractionParser {
    type Output = ExtractionResponse;

    /// Malformed memory entries are dropped individually
    fn parse(&self, text: &str) -> Result<ExtractionResponse, LlmError> {
        let raw: RawExtraction = parse_json(text)?;
        let new_memories = raw
            .new_memories
            .into_iter()
            .filter_map(|v| serde_json::from_value::<ExtractedMemory>(v).ok())
            .filter(|m| !matches!(m, ExtractedMemory::Unknown))
            .collect();

        Ok(ExtractionResponse {
            should_save: raw.should_save,
            reasoning: raw.reasoning,
            new_memories,
        })
    }

    fn fallback(&self, _text: &str) -> ExtractionResponse {
        ExtractionResponse::default()
    }
}

// =============================================================================
// Script cleanup
// =============================================================================

static LEAD_INS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)^(Here'?s?|다음은|아래는).*?:\s*\n*").unwrap(),
        Regex::new(r"^---+\s*\n*").unwrap(),
        Regex::new(r"^\*\*.*?\*\*\s*\n*").unwrap(),
        Regex::new(r"^개선(된|한) (스크립트|버전).*?:\s*\n*").unwrap(),
    ]
});

static CLOSINGS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\n*---+\s*$").unwrap(),
        Regex::new(r"\n*\*\*.*?\*\*\s*$").unwrap(),
        Regex::new(r"\n*(이상입니다|감사합니다)\.?\s*$").unwrap(),
    ]
});

/// Strip lead-in and closing boilerplate around a generated script
///
/// Patterns are applied once each, in order, at the start and end of the text.
pub fn clean_script_output(script: &str) -> String {
    let mut result = script.trim_start().to_string();

    for pattern in LEAD_INS.iter() {
        result = pattern.replace(&result, "").into_owned();
    }
    for pattern in CLOSINGS.iter() {
        result = pattern.replace(&result, "").into_owned();
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_span_is_greedy() {
        let text = "결과: {\"a\": {\"b\": 1}} 끝 }";
        assert_eq!(extract_json_span(text), Some("{\"a\": {\"b\": 1}} 끝 }"));
        assert_eq!(extract_json_span("json 없음"), None);
        assert_eq!(extract_json_span("} {"), None);
    }

    #[test]
    fn test_analysis_parse() {
        let text = r#"분석 결과입니다:
        {
            "scores": {"logic_structure": "A", "filler_words": "C+", "tone": "A", "speaking_pace": "Z"},
            "suggestions": [
                {"priority": 2, "category": "pace", "suggestion": "천천히"},
                {"priority": 1, "category": "filler", "suggestion": "'음' 줄이기", "impact": "명료함"},
                {"category": "empty", "suggestion": ""}
            ],
            "structure_analysis": "STAR 충실"
        }"#;

        let parsed = AnalysisParser.parse(text).unwrap();
        assert_eq!(parsed.scores[&ScoreCategory::LogicStructure], Grade::A);
        assert_eq!(parsed.scores[&ScoreCategory::FillerWords], Grade::CPlus);
        assert_eq!(parsed.scores[&ScoreCategory::SpeakingPace], Grade::B);
        assert_eq!(parsed.scores.len(), 5);
        assert_eq!(parsed.suggestions.len(), 2);
        assert_eq!(parsed.suggestions[0].category, "filler");
        assert_eq!(parsed.structure_analysis, "STAR 충실");
        assert!(parsed.progressive_note.is_none());
    }

    #[test]
    fn test_analysis_fallback_keeps_prefix() {
        let text = "가".repeat(700);
        let parsed = AnalysisParser.parse_or_fallback(&text);
        assert_eq!(parsed.structure_analysis.chars().count(), 500);
        assert!(parsed.scores.values().all(|g| *g == Grade::B));
    }

    #[test]
    fn test_reflection_parse_and_fallback() {
        let parsed = ReflectionParser
            .parse(r#"{"passes_review": false, "issues_found": ["말투 변경"], "final_script": "수정본"}"#)
            .unwrap();
        assert!(!parsed.passes_review);
        assert_eq!(parsed.final_script, "수정본");

        let passes = ReflectionParser.parse_or_fallback("검토 결과 양호합니다");
        assert!(passes.passes_review);
        assert!(passes.final_script.is_empty());

        let fails = ReflectionParser.parse_or_fallback("양호하지만 문제가 있습니다");
        assert!(!fails.passes_review);
    }

    #[test]
    fn test_refinement_split() {
        let text = "## 변경 사항\n더 자신감 있게 바꿨습니다.\n\n## 수정된 스크립트\n안녕하세요, 저는...";
        let parsed = RefinementParser.parse_or_fallback(text);
        assert_eq!(parsed.changes_summary, "더 자신감 있게 바꿨습니다.");
        assert_eq!(parsed.refined_script, "안녕하세요, 저는...");

        let whole = RefinementParser.parse_or_fallback("  그냥 스크립트  ");
        assert_eq!(whole.changes_summary, "");
        assert_eq!(whole.refined_script, "그냥 스크립트");
    }

    #[test]
    fn test_extraction_parse() {
        let text = r#"```json
        {
            "should_save": true,
            "reasoning": "반복 패턴",
            "new_memories": [
                {"type": "speech_pattern", "subtype": "pace", "content": "빠름", "severity": "high", "numeric_value": 185, "ttl_days": 21},
                {"type": "improvement_progress", "category": "filler", "initial_score": "C", "current_score": "B+"},
                {"type": "speech_pattern", "numeric_value": "많음"},
                {"type": "mystery"},
                {"type": "session_insight", "content": "결론을 먼저 말함"}
            ]
        }
        ```"#;

        let parsed = ExtractionParser.parse(text).unwrap();
        assert!(parsed.should_save);
        assert_eq!(parsed.new_memories.len(), 3);
        assert_eq!(parsed.new_memories[0].severity(), Severity::High);
        assert_eq!(parsed.new_memories[1].grades(), (Grade::C, Grade::BPlus));
        assert!(matches!(
            &parsed.new_memories[2],
            ExtractedMemory::SessionInsight { content } if content == "결론을 먼저 말함"
        ));
    }

    #[test]
    fn test_extraction_defaults() {
        let parsed = ExtractionParser
            .parse(r#"{"new_memories": [{"type": "speech_pattern"}, {"type": "improvement_progress"}]}"#)
            .unwrap();
        match &parsed.new_memories[0] {
            ExtractedMemory::SpeechPattern { subtype, .. } => assert_eq!(subtype, "general"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(parsed.new_memories[0].severity(), Severity::Medium);
        assert_eq!(parsed.new_memories[1].grades(), (Grade::B, Grade::B));

        assert_eq!(ExtractionParser.parse_or_fallback("실패"), ExtractionResponse::default());
    }

    #[test]
    fn test_clean_script_output() {
        let raw = "다음은 개선된 스크립트입니다:\n\n안녕하세요. 저는 개발자입니다.\n\n---";
        assert_eq!(clean_script_output(raw), "안녕하세요. 저는 개발자입니다.");

        let raw = "**개선안**\n본문입니다.\n감사합니다.";
        assert_eq!(clean_script_output(raw), "본문입니다.");

        assert_eq!(clean_script_output("  그대로  "), "그대로");
    }
}
