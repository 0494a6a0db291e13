//! LLM integration for the speech coach
//!
//! Features:
//! - Claude Messages API backend implementing `LanguageModel`
//! - Coaching prompts (analysis, improvement, reflection, refinement, memory extraction)
//! - Tolerant response parsing with keyword and default fallbacks
//!
//! # Example
//! ```ignore
//! let backend = ClaudeBackend::new(ClaudeConfig::from_env())?;
//! let request = prompt::improvement_request(transcript, &analysis, None);
//! let script = clean_script_output(&backend.generate(request).await?.text);
//! ```

pub mod claude;
pub mod parser;
pub mod prompt;

pub use claude::{ClaudeBackend, ClaudeConfig, DEFAULT_MODEL};
pub use parser::{
    clean_script_output, extract_json_span, AnalysisParser, AnalysisResponse, ExtractedMemory,
    ExtractionParser, ExtractionResponse, ReflectionOutcome, ReflectionParser, RefinementOutcome,
    RefinementParser, ResponseParser,
};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("timeout: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for speech_coach_core::Error {
    fn from(err: LlmError) -> Self {
        speech_coach_core::Error::Llm(err.to_string())
    }
}
