//! Category analyzers
//!
//! Four independent heuristics, each returning a 0-100 score built from weighted
//! sub-scores plus the issues and strengths that explain it:
//! - **Delivery**: pace, filler ratio, sentence completion (40/40/20)
//! - **Structure**: STAR keywords, conclusion-first, connectives (50/30/20)
//! - **Content**: numbers, examples, technical terms (40/35/25)
//! - **Persuasion**: confidence, hedging, emphasis (40/35/25)
//!
//! The structure analyzer's STAR check uses its own simpler keyword set and is
//! independent of [`crate::star`].

mod content;
mod delivery;
mod persuasion;
mod structure;

pub use content::analyze_content;
pub use delivery::analyze_delivery;
pub use persuasion::analyze_persuasion;
pub use structure::analyze_structure;

use serde::{Deserialize, Serialize};
use speech_coach_core::round_to;
use std::collections::BTreeMap;

/// Duration assumed when the caller has none
pub const DEFAULT_DURATION_SECONDS: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Delivery,
    Structure,
    Content,
    Persuasion,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Delivery,
        Category::Structure,
        Category::Content,
        Category::Persuasion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Delivery => "delivery",
            Category::Structure => "structure",
            Category::Content => "content",
            Category::Persuasion => "persuasion",
        }
    }

    /// Korean display label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Delivery => "전달력",
            Category::Structure => "구조력",
            Category::Content => "내용력",
            Category::Persuasion => "설득력",
        }
    }
}

/// Output of a single category analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub score: u32,
    pub sub_scores: BTreeMap<String, u32>,
    pub metrics: BTreeMap<String, f64>,
    pub issues: Vec<String>,
    pub strengths: Vec<String>,
}

impl CategoryResult {
    pub(crate) fn sub_score(&mut self, name: &str, score: u32) {
        self.sub_scores.insert(name.to_string(), score);
    }

    pub(crate) fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    pub(crate) fn issue(&mut self, text: impl Into<String>) {
        self.issues.push(text.into());
    }

    pub(crate) fn strength(&mut self, text: impl Into<String>) {
        self.strengths.push(text.into());
    }
}

/// Truncating weighted sum of sub-scores
pub(crate) fn weighted_total(parts: &[(u32, f64)]) -> u32 {
    let total: f64 = parts.iter().map(|(score, weight)| *score as f64 * weight).sum();
    total.max(0.0) as u32
}

/// Non-overlapping occurrences of each needle, summed
pub(crate) fn count_occurrences(haystack: &str, needles: &[&str]) -> usize {
    needles.iter().map(|n| haystack.matches(n).count()).sum()
}

/// All four category results for one transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub delivery: CategoryResult,
    pub structure: CategoryResult,
    pub content: CategoryResult,
    pub persuasion: CategoryResult,
}

impl CategoryReport {
    pub fn get(&self, category: Category) -> &CategoryResult {
        match category {
            Category::Delivery => &self.delivery,
            Category::Structure => &self.structure,
            Category::Content => &self.content,
            Category::Persuasion => &self.persuasion,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategoryResult)> {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// Run every category analyzer
pub fn analyze_all(transcript: &str, duration_seconds: Option<f64>) -> CategoryReport {
    let duration = duration_seconds.unwrap_or(DEFAULT_DURATION_SECONDS);
    CategoryReport {
        delivery: analyze_delivery(transcript, duration),
        structure: analyze_structure(transcript),
        content: analyze_content(transcript),
        persuasion: analyze_persuasion(transcript),
    }
}

/// Cross-category summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub scores: BTreeMap<Category, u32>,
    pub average_score: f64,
    pub weakest_category: (Category, u32),
    pub strongest_category: (Category, u32),
    pub total_issues: usize,
    pub total_strengths: usize,
    pub top_issues: Vec<(Category, String)>,
    pub top_strengths: Vec<(Category, String)>,
}

/// Combine a report into scores, extremes and the top feedback lines
///
/// Ties for weakest or strongest go to the earlier category.
pub fn summarize(report: &CategoryReport) -> CategorySummary {
    let mut scores = BTreeMap::new();
    let mut all_issues = Vec::new();
    let mut all_strengths = Vec::new();
    let mut weakest = (Category::Delivery, report.delivery.score);
    let mut strongest = weakest;

    for (category, result) in report.iter() {
        scores.insert(category, result.score);
        if result.score < weakest.1 {
            weakest = (category, result.score);
        }
        if result.score > strongest.1 {
            strongest = (category, result.score);
        }
        all_issues.extend(result.issues.iter().map(|i| (category, i.clone())));
        all_strengths.extend(result.strengths.iter().map(|s| (category, s.clone())));
    }

    let average = scores.values().map(|s| *s as f64).sum::<f64>() / Category::ALL.len() as f64;

    CategorySummary {
        scores,
        average_score: round_to(average, 1),
        weakest_category: weakest,
        strongest_category: strongest,
        total_issues: all_issues.len(),
        total_strengths: all_strengths.len(),
        top_issues: all_issues.into_iter().take(3).collect(),
        top_strengths: all_strengths.into_iter().take(3).collect(),
    }
}
