//! Core traits and types for the speech coach engine
//!
//! This crate provides foundational types used across all other crates:
//! - Letter grades and the single grade/numeric table
//! - Analysis result types (scores, metrics, suggestions)
//! - Long-term and short-term memory records
//! - Error taxonomy with stable error codes
//! - Traits for pluggable collaborators (transcription, LLM, synthesis, storage)

pub mod analysis;
pub mod error;
pub mod grade;
pub mod llm_types;
pub mod memory;
pub mod rounding;
pub mod session;
pub mod traits;

pub use analysis::{
    default_scores, AnalysisMetrics, AnalysisResult, ScoreCategory, Scores, Suggestion,
};
pub use error::{Error, ErrorCode, PolicyRejection, Result};
pub use grade::Grade;
pub use llm_types::{GenerateRequest, GenerateResponse, TokenUsage};
pub use memory::{
    CareerContext, ConfirmedTrait, FeedbackPreference, GoalContext, GoalType, Importance,
    ImprovementProgress, LongTermMemory, LtmUpdate, MemoryType, PatternTrend, ScoreHistoryEntry,
    SessionInsight, Severity, ShortTermMemory, SpeechPattern, StmPayload, TraitType, UserProfile,
};
pub use rounding::{round_half_even, round_to};
pub use session::{SessionMode, VoiceSelection, VoiceType};

pub use traits::{LanguageModel, MemoryStore, SpeechSynthesizer, Transcriber, Transcription};
