//! Coaching session pipeline
//!
//! Features:
//! - Sequential stage execution with per-field state reducers
//! - Quick (analyze, improve, synthesize) and deep (plus moderation and reflection) presets
//! - Korean progress messages over a broadcast channel and a per-run stream
//! - Background memory extraction through a persistence queue
//! - Bounded user-driven refinement (preview and final)
//!
//! # Example
//! ```ignore
//! let pipeline = CoachingPipeline::new(PipelineConfig::deep(), llm)
//!     .with_synthesizer(tts)
//!     .with_memory_store(store);
//! let state = pipeline
//!     .run(SessionRequest::transcript(text, 42.0).with_user("u1"))
//!     .await?;
//! println!("{}", state.improved_script.unwrap_or_default());
//! ```

pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod persistence;
pub mod refinement;
pub mod state;

pub use events::{PipelineEvent, Stage};
pub use orchestrator::{
    CoachingPipeline, PipelineConfig, SessionInput, SessionRequest, SessionStream,
    DEFAULT_FEMALE_VOICE, DEFAULT_MALE_VOICE,
};
pub use persistence::{ExtractionJob, ExtractionReport, PersistenceQueue};
pub use refinement::{RefinementPolicy, RefinementRequest, RefinementResult, RefinementStage};
pub use state::{PendingRefinement, RefinementState, SessionState, StageDelta};

use speech_coach_core::{Error, ErrorCode};
use thiserror::Error;

/// A session that terminated early
///
/// `state` keeps everything the completed stages produced.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct PipelineFailure {
    pub error: Error,
    pub state: Box<SessionState>,
}

impl PipelineFailure {
    pub fn new(error: Error, state: SessionState) -> Self {
        Self {
            error,
            state: Box::new(state),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code()
    }
}
