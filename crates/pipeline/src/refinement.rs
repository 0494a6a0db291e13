//! User-driven refinement of the improved script
//!
//! A session may be refined at most twice. A preview regenerates the script
//! toward the user's intent without touching the counter; a final refinement
//! also synthesizes audio, bumps the counter and finalizes the session.
//! Guests may only preview.

use serde::{Deserialize, Serialize};
use speech_coach_core::{PolicyRejection, SessionMode, VoiceSelection, VoiceType};

use crate::state::SessionState;

pub const MAX_REFINEMENTS: u8 = 2;
pub const MIN_FEEDBACK_CHARS: usize = 10;
pub const MAX_FEEDBACK_CHARS: usize = 200;

/// Limits checked before any refinement stage runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementPolicy {
    pub max_refinements: u8,
    pub min_feedback_chars: usize,
    pub max_feedback_chars: usize,
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self {
            max_refinements: MAX_REFINEMENTS,
            min_feedback_chars: MIN_FEEDBACK_CHARS,
            max_feedback_chars: MAX_FEEDBACK_CHARS,
        }
    }
}

impl RefinementPolicy {
    /// Intent length, then the session counter, then guest restrictions
    pub fn check(
        &self,
        state: &SessionState,
        request: &RefinementRequest,
    ) -> Result<(), PolicyRejection> {
        let chars = request.user_intent.trim().chars().count();
        if chars < self.min_feedback_chars {
            return Err(PolicyRejection::FeedbackTooShort {
                chars,
                min: self.min_feedback_chars,
            });
        }
        if chars > self.max_feedback_chars {
            return Err(PolicyRejection::FeedbackTooLong {
                chars,
                max: self.max_feedback_chars,
            });
        }

        if state.refinement.finalized || state.refinement.count >= self.max_refinements {
            return Err(PolicyRejection::RefinementLimitExceeded {
                used: state.refinement.count,
                max: self.max_refinements,
            });
        }

        if state.is_guest() && request.stage == RefinementStage::Final {
            return Err(PolicyRejection::GuestRestricted("final_refinement".to_string()));
        }

        let voice = request.voice.as_ref().unwrap_or(&state.voice);
        check_voice(state.is_guest(), voice)
    }
}

/// Guests cannot use a cloned voice
pub fn check_voice(is_guest: bool, voice: &VoiceSelection) -> Result<(), PolicyRejection> {
    if is_guest && voice.voice_type == VoiceType::Cloned {
        return Err(PolicyRejection::GuestRestricted("voice_clone".to_string()));
    }
    Ok(())
}

/// Guests are limited to quick mode
pub fn check_mode(is_guest: bool, mode: SessionMode) -> Result<(), PolicyRejection> {
    if is_guest && mode == SessionMode::Deep {
        return Err(PolicyRejection::GuestRestricted("deep_mode".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefinementStage {
    Preview,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRequest {
    pub user_intent: String,
    pub stage: RefinementStage,
    /// Overrides the session's voice for the final synthesis
    #[serde(default)]
    pub voice: Option<VoiceSelection>,
}

impl RefinementRequest {
    pub fn preview(user_intent: impl Into<String>) -> Self {
        Self {
            user_intent: user_intent.into(),
            stage: RefinementStage::Preview,
            voice: None,
        }
    }

    pub fn finalize(user_intent: impl Into<String>) -> Self {
        Self {
            user_intent: user_intent.into(),
            stage: RefinementStage::Final,
            voice: None,
        }
    }

    pub fn with_voice(mut self, voice: VoiceSelection) -> Self {
        self.voice = Some(voice);
        self
    }
}

/// Outcome of one refinement call
#[derive(Debug, Clone, Serialize)]
pub struct RefinementResult {
    pub stage: RefinementStage,
    pub changes_summary: String,
    pub refined_script: String,
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
    pub voice_id: Option<String>,
    pub refinements_used: u8,
    pub finalized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use speech_coach_core::ErrorCode;

    fn state(user_id: Option<&str>) -> SessionState {
        SessionState::new(
            "s1",
            user_id.map(str::to_string),
            SessionMode::Quick,
            None,
            VoiceSelection::default(),
        )
    }

    #[test]
    fn test_intent_length_bounds() {
        let policy = RefinementPolicy::default();
        let member = state(Some("u1"));

        let short = policy.check(&member, &RefinementRequest::preview("짧아요"));
        assert!(matches!(short, Err(PolicyRejection::FeedbackTooShort { chars: 3, .. })));

        let long = policy.check(&member, &RefinementRequest::preview("가".repeat(201)));
        assert_eq!(long.unwrap_err().code(), ErrorCode::RefinementFeedbackTooLong);

        let exact = policy.check(&member, &RefinementRequest::preview("가".repeat(10)));
        assert!(exact.is_ok());
        let max = policy.check(&member, &RefinementRequest::preview("가".repeat(200)));
        assert!(max.is_ok());
    }

    #[test]
    fn test_counter_limits() {
        let policy = RefinementPolicy::default();
        let request = RefinementRequest::preview("좀 더 자신감 있게 바꿔주세요");

        let mut used = state(Some("u1"));
        used.refinement.count = 2;
        assert_eq!(
            policy.check(&used, &request).unwrap_err(),
            PolicyRejection::RefinementLimitExceeded { used: 2, max: 2 }
        );

        let mut finalized = state(Some("u1"));
        finalized.refinement.count = 1;
        finalized.refinement.finalized = true;
        assert!(policy.check(&finalized, &request).is_err());
    }

    #[test]
    fn test_guest_cannot_use_cloned_voice() {
        let policy = RefinementPolicy::default();
        let request = RefinementRequest::preview("좀 더 자신감 있게 바꿔주세요")
            .with_voice(VoiceSelection::cloned("clone-1"));

        assert_eq!(
            policy.check(&state(None), &request).unwrap_err(),
            PolicyRejection::GuestRestricted("voice_clone".to_string())
        );
        assert!(policy.check(&state(Some("u1")), &request).is_ok());
    }

    #[test]
    fn test_guest_limited_to_preview() {
        let policy = RefinementPolicy::default();
        let intent = "좀 더 자신감 있게 바꿔주세요";

        assert!(policy.check(&state(None), &RefinementRequest::preview(intent)).is_ok());

        let rejection = policy
            .check(&state(None), &RefinementRequest::finalize(intent))
            .unwrap_err();
        assert_eq!(
            rejection,
            PolicyRejection::GuestRestricted("final_refinement".to_string())
        );
        assert_eq!(rejection.code(), ErrorCode::GuestRestricted);
        assert!(policy
            .check(&state(Some("u1")), &RefinementRequest::finalize(intent))
            .is_ok());
    }

    #[test]
    fn test_guest_limited_to_quick_mode() {
        assert!(check_mode(true, SessionMode::Quick).is_ok());
        assert!(check_mode(false, SessionMode::Deep).is_ok());
        assert_eq!(
            check_mode(true, SessionMode::Deep).unwrap_err(),
            PolicyRejection::GuestRestricted("deep_mode".to_string())
        );
    }
}
