//! Error types
//!
//! Every error maps to a stable [`ErrorCode`]; callers decide on codes, never on
//! message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AudioTooShort,
    SttNoSpeech,
    SttFailed,
    ContentViolation,
    AnalysisFailed,
    TtsFailed,
    RefinementLimitExceeded,
    RefinementInvalidFeedback,
    RefinementFeedbackTooLong,
    GuestRestricted,
    SessionInvalidState,
    StorageFailed,
    InternalServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AudioTooShort => "AUDIO_TOO_SHORT",
            ErrorCode::SttNoSpeech => "STT_NO_SPEECH",
            ErrorCode::SttFailed => "STT_FAILED",
            ErrorCode::ContentViolation => "CONTENT_VIOLATION",
            ErrorCode::AnalysisFailed => "ANALYSIS_FAILED",
            ErrorCode::TtsFailed => "TTS_FAILED",
            ErrorCode::RefinementLimitExceeded => "REFINEMENT_LIMIT_EXCEEDED",
            ErrorCode::RefinementInvalidFeedback => "REFINEMENT_INVALID_FEEDBACK",
            ErrorCode::RefinementFeedbackTooLong => "REFINEMENT_FEEDBACK_TOO_LONG",
            ErrorCode::GuestRestricted => "GUEST_RESTRICTED",
            ErrorCode::SessionInvalidState => "SESSION_INVALID_STATE",
            ErrorCode::StorageFailed => "STORAGE_FAILED",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    /// User-facing message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::AudioTooShort => "5초 이상 녹음해주세요",
            ErrorCode::SttNoSpeech => "음성이 감지되지 않았습니다",
            ErrorCode::SttFailed => "음성 인식에 실패했습니다",
            ErrorCode::ContentViolation => "부적절한 내용이 감지되었습니다",
            ErrorCode::AnalysisFailed => "분석 중 오류가 발생했습니다",
            ErrorCode::TtsFailed => "음성 생성에 실패했습니다",
            ErrorCode::RefinementLimitExceeded => "재요청 횟수를 초과했습니다 (최대 2회)",
            ErrorCode::RefinementInvalidFeedback => "피드백이 너무 짧습니다 (최소 10자)",
            ErrorCode::RefinementFeedbackTooLong => "피드백이 너무 깁니다 (최대 200자)",
            ErrorCode::GuestRestricted => "회원 전용 기능입니다",
            ErrorCode::SessionInvalidState => "잘못된 세션 상태입니다",
            ErrorCode::StorageFailed => "저장 중 오류가 발생했습니다",
            ErrorCode::InternalServerError => "서버 오류가 발생했습니다",
        }
    }

    /// Policy codes are rejected before a pipeline runs; everything else comes from a stage.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            ErrorCode::RefinementLimitExceeded
                | ErrorCode::RefinementInvalidFeedback
                | ErrorCode::RefinementFeedbackTooLong
                | ErrorCode::GuestRestricted
        )
    }

    /// Codes that terminate a pipeline run
    pub fn is_fatal(&self) -> bool {
        !self.is_policy() && !matches!(self, ErrorCode::StorageFailed)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests refused by policy before any stage executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyRejection {
    RefinementLimitExceeded { used: u8, max: u8 },
    FeedbackTooShort { chars: usize, min: usize },
    FeedbackTooLong { chars: usize, max: usize },
    GuestRestricted(String),
}

impl PolicyRejection {
    pub fn code(&self) -> ErrorCode {
        match self {
            PolicyRejection::RefinementLimitExceeded { .. } => ErrorCode::RefinementLimitExceeded,
            PolicyRejection::FeedbackTooShort { .. } => ErrorCode::RefinementInvalidFeedback,
            PolicyRejection::FeedbackTooLong { .. } => ErrorCode::RefinementFeedbackTooLong,
            PolicyRejection::GuestRestricted(_) => ErrorCode::GuestRestricted,
        }
    }
}

impl fmt::Display for PolicyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyRejection::RefinementLimitExceeded { used, max } => {
                write!(f, "refinement limit reached ({used}/{max})")
            }
            PolicyRejection::FeedbackTooShort { chars, min } => {
                write!(f, "feedback too short ({chars} < {min} chars)")
            }
            PolicyRejection::FeedbackTooLong { chars, max } => {
                write!(f, "feedback too long ({chars} > {max} chars)")
            }
            PolicyRejection::GuestRestricted(feature) => {
                write!(f, "'{feature}' is not available in guest mode")
            }
        }
    }
}

/// Engine error
#[derive(Error, Debug)]
pub enum Error {
    #[error("Severe threat detected: {0}")]
    Moderation(String),

    #[error("Audio is too short ({0:.1}s). Minimum 5 seconds required.")]
    AudioTooShort(f64),

    #[error("Could not transcribe audio. Transcript is empty.")]
    EmptyTranscript,

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Rejected by policy: {0}")]
    Policy(PolicyRejection),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Moderation(_) => ErrorCode::ContentViolation,
            Error::AudioTooShort(_) => ErrorCode::AudioTooShort,
            Error::EmptyTranscript => ErrorCode::SttNoSpeech,
            Error::Transcription(_) => ErrorCode::SttFailed,
            Error::Synthesis(_) => ErrorCode::TtsFailed,
            Error::Llm(_) => ErrorCode::AnalysisFailed,
            Error::Storage(_) => ErrorCode::StorageFailed,
            Error::Policy(rejection) => rejection.code(),
            Error::InvalidState(_) => ErrorCode::SessionInvalidState,
            Error::Serialization(_) | Error::Internal(_) => ErrorCode::InternalServerError,
        }
    }

    pub fn is_policy(&self) -> bool {
        matches!(self, Error::Policy(_))
    }
}

impl From<PolicyRejection> for Error {
    fn from(rejection: PolicyRejection) -> Self {
        Error::Policy(rejection)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::Moderation("x".into()).code().as_str(), "CONTENT_VIOLATION");
        assert_eq!(Error::AudioTooShort(3.2).code(), ErrorCode::AudioTooShort);
        assert_eq!(Error::EmptyTranscript.code(), ErrorCode::SttNoSpeech);
        assert_eq!(
            serde_json::to_string(&ErrorCode::TtsFailed).unwrap(),
            "\"TTS_FAILED\""
        );
    }

    #[test]
    fn test_policy_rejections() {
        let err: Error = PolicyRejection::RefinementLimitExceeded { used: 2, max: 2 }.into();
        assert!(err.is_policy());
        assert_eq!(err.code(), ErrorCode::RefinementLimitExceeded);
        assert!(err.code().is_policy());
        assert!(!ErrorCode::TtsFailed.is_policy());
        assert!(ErrorCode::TtsFailed.is_fatal());
        assert!(!ErrorCode::StorageFailed.is_fatal());
        assert!(!ErrorCode::GuestRestricted.is_fatal());
    }

    #[test]
    fn test_audio_too_short_message() {
        let msg = Error::AudioTooShort(3.04).to_string();
        assert!(msg.contains("3.0s"));
    }
}
