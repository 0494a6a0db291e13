//! Combined output of every local analyzer

use serde::{Deserialize, Serialize};
use speech_coach_core::AnalysisMetrics;

use crate::category::{analyze_all, summarize, CategoryReport, CategorySummary};
use crate::filler::{analyze_fillers, FillerAnalysis};
use crate::pace::{analyze_pace, PaceAnalysis};
use crate::star::{analyze_star, StarAnalysis};

/// Objective signals gathered before the transcript is sent for generative analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReport {
    pub pace: PaceAnalysis,
    pub fillers: FillerAnalysis,
    pub star: StarAnalysis,
    pub categories: CategoryReport,
    pub summary: CategorySummary,
}

impl ToolReport {
    /// Run pace, filler, STAR and category analyzers over one transcript
    pub fn run(transcript: &str, duration_seconds: f64) -> Self {
        let categories = analyze_all(transcript, Some(duration_seconds));
        let summary = summarize(&categories);
        Self {
            pace: analyze_pace(transcript, duration_seconds),
            fillers: analyze_fillers(transcript),
            star: analyze_star(transcript),
            categories,
            summary,
        }
    }

    /// Metrics block of the analysis result, always taken from the tools
    pub fn metrics(&self) -> AnalysisMetrics {
        AnalysisMetrics {
            words_per_minute: self.pace.words_per_minute,
            filler_count: self.fillers.filler_count,
            filler_percentage: self.fillers.filler_percentage,
            total_words: self.pace.word_count as u32,
            duration_seconds: self.pace.duration_seconds,
        }
    }
}
