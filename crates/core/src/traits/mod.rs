//! Core traits for the speech coach engine
//!
//! External collaborators implement these traits so the pipeline can:
//! - Swap backends without code changes
//! - Run against mocks in tests
//!
//! # Trait Hierarchy
//!
//! ```text
//! Speech Processing:
//!   - Transcriber: Audio → Text transcription
//!   - SpeechSynthesizer: Text → Audio synthesis
//!
//! Language Models:
//!   - LanguageModel: Single-turn text generation
//!
//! Storage:
//!   - MemoryStore: Per-user LTM/STM/score-history persistence
//! ```

mod llm;
mod speech;
mod store;

pub use llm::LanguageModel;
pub use speech::{SpeechSynthesizer, Transcriber, Transcription};
pub use store::MemoryStore;
