//! Analysis result types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Grade;

/// Dimensions the generative analysis grades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    LogicStructure,
    FillerWords,
    SpeakingPace,
    ConfidenceTone,
    ContentSpecificity,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 5] = [
        ScoreCategory::LogicStructure,
        ScoreCategory::FillerWords,
        ScoreCategory::SpeakingPace,
        ScoreCategory::ConfidenceTone,
        ScoreCategory::ContentSpecificity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreCategory::LogicStructure => "logic_structure",
            ScoreCategory::FillerWords => "filler_words",
            ScoreCategory::SpeakingPace => "speaking_pace",
            ScoreCategory::ConfidenceTone => "confidence_tone",
            ScoreCategory::ContentSpecificity => "content_specificity",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

pub type Scores = BTreeMap<ScoreCategory, Grade>;

/// Every category at the neutral `B` grade
pub fn default_scores() -> Scores {
    ScoreCategory::ALL
        .into_iter()
        .map(|c| (c, Grade::B))
        .collect()
}

/// Objective metrics measured by the local analyzers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub words_per_minute: u32,
    pub filler_count: u32,
    pub filler_percentage: f64,
    pub total_words: u32,
    pub duration_seconds: f64,
}

/// A single prioritized improvement suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub impact: String,
}

fn default_priority() -> u32 {
    99
}

impl Suggestion {
    pub fn new(priority: u32, category: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            priority,
            category: category.into(),
            suggestion: suggestion.into(),
            impact: String::new(),
        }
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = impact.into();
        self
    }
}

/// Result of the analysis stage
///
/// Created once per session; later stages read it but never modify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub scores: Scores,
    pub metrics: AnalysisMetrics,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub structure_analysis: String,
    #[serde(default)]
    pub moderation_flags: Vec<String>,
}

impl AnalysisResult {
    /// Default-scores result used when the generated analysis is unusable
    pub fn fallback(metrics: AnalysisMetrics, structure_analysis: impl Into<String>) -> Self {
        Self {
            scores: default_scores(),
            metrics,
            suggestions: Vec::new(),
            structure_analysis: structure_analysis.into(),
            moderation_flags: Vec::new(),
        }
    }

    pub fn score(&self, category: ScoreCategory) -> Grade {
        self.scores.get(&category).copied().unwrap_or_default()
    }

    pub fn with_moderation_flags(mut self, flags: Vec<String>) -> Self {
        self.moderation_flags = flags;
        self
    }
}
