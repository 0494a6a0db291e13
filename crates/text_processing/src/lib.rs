//! Transcript analyzers for the speech coach engine
//!
//! This crate turns a raw transcript into structured, quantitative signals:
//! - **Pace**: words per minute against the 120-170 WPM interview range
//! - **Fillers**: sound/word/phrase filler detection with advice
//! - **STAR**: Situation-Task-Action-Result coverage, order and composite score
//! - **Categories**: delivery, structure, content and persuasion sub-scores
//! - **Moderation**: profanity flags, PII masking and threat detection
//!
//! Every analyzer is pure and deterministic. Only moderation can fail, and only
//! on severe threats.
//!
//! # Example
//!
//! ```ignore
//! use speech_coach_text_processing::ToolReport;
//!
//! let report = ToolReport::run(transcript, 42.0);
//! println!("{} WPM, {}% fillers", report.pace.words_per_minute, report.fillers.percentage);
//! ```

pub mod category;
pub mod filler;
pub mod moderation;
pub mod pace;
pub mod report;
pub mod star;

pub use category::{
    analyze_all, analyze_content, analyze_delivery, analyze_persuasion, analyze_structure,
    summarize, Category, CategoryReport, CategoryResult, CategorySummary,
};
pub use filler::{analyze_fillers, filler_grade, FillerAnalysis, FillerAssessment, FillerFamily};
pub use moderation::{ModerationFilter, ModerationOutcome, ThreatLevel};
pub use pace::{analyze_pace, pace_grade, PaceAnalysis, PaceAssessment};
pub use report::ToolReport;
pub use star::{analyze_star, star_grade, StarAnalysis, StarAssessment, StarElement};

/// Whitespace-separated token count, the word unit every analyzer shares
pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
