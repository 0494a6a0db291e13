//! Pipeline stages and the events emitted while they run

use serde::Serialize;
use speech_coach_core::ErrorCode;
use std::fmt;

/// One step of a coaching session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LoadMemory,
    Transcribe,
    Moderate,
    Analyze,
    Improve,
    Reflect,
    Synthesize,
    ExtractMemory,
    Refine,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoadMemory => "load_memory",
            Stage::Transcribe => "transcribe",
            Stage::Moderate => "moderate",
            Stage::Analyze => "analyze",
            Stage::Improve => "improve",
            Stage::Reflect => "reflect",
            Stage::Synthesize => "synthesize",
            Stage::ExtractMemory => "extract_memory",
            Stage::Refine => "refine",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage began executing
    StageStarted { session_id: String, stage: Stage },
    /// Korean progress message appended by a stage
    Progress {
        session_id: String,
        stage: Stage,
        message: String,
    },
    /// A stage finished and its delta was applied
    StageCompleted {
        session_id: String,
        stage: Stage,
        elapsed_ms: u64,
    },
    /// The session finished; background persistence may still be running
    Completed { session_id: String },
    /// The session terminated
    Failed {
        session_id: String,
        stage: Option<Stage>,
        code: ErrorCode,
        message: String,
    },
}

impl PipelineEvent {
    pub fn session_id(&self) -> &str {
        match self {
            PipelineEvent::StageStarted { session_id, .. }
            | PipelineEvent::Progress { session_id, .. }
            | PipelineEvent::StageCompleted { session_id, .. }
            | PipelineEvent::Completed { session_id }
            | PipelineEvent::Failed { session_id, .. } => session_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::Completed { .. } | PipelineEvent::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::Progress {
            session_id: "s1".to_string(),
            stage: Stage::Analyze,
            message: "AI 분석 완료".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["stage"], "analyze");
        assert_eq!(event.session_id(), "s1");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_failed_event_carries_code() {
        let event = PipelineEvent::Failed {
            session_id: "s1".to_string(),
            stage: Some(Stage::Moderate),
            code: ErrorCode::ContentViolation,
            message: ErrorCode::ContentViolation.message().to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["code"], "CONTENT_VIOLATION");
        assert!(event.is_terminal());
    }
}
