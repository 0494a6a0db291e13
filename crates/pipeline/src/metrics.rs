//! Session counters
//!
//! Recorded through the `metrics` facade; nothing is exported unless the host
//! installs a recorder.

use speech_coach_core::{ErrorCode, SessionMode};

use crate::events::Stage;

pub const SESSIONS_TOTAL: &str = "speech_coach_sessions_total";
pub const STAGE_FAILURES_TOTAL: &str = "speech_coach_stage_failures_total";
pub const REFINEMENTS_TOTAL: &str = "speech_coach_refinements_total";

pub fn record_session(mode: SessionMode) {
    let mode = match mode {
        SessionMode::Quick => "quick",
        SessionMode::Deep => "deep",
    };
    metrics::counter!(SESSIONS_TOTAL, "mode" => mode).increment(1);
}

pub fn record_stage_failure(stage: Option<Stage>, code: ErrorCode) {
    let stage = stage.map(|s| s.as_str()).unwrap_or("policy");
    metrics::counter!(STAGE_FAILURES_TOTAL, "stage" => stage, "code" => code.as_str()).increment(1);
}

pub fn record_refinement(finalized: bool) {
    let kind = if finalized { "final" } else { "preview" };
    metrics::counter!(REFINEMENTS_TOTAL, "stage" => kind).increment(1);
}
