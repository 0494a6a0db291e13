//! Speaking pace analysis
//!
//! Korean words are counted on whitespace. The interview target range is
//! 120-170 WPM.

use serde::{Deserialize, Serialize};
use speech_coach_core::{round_half_even, round_to, Grade};

use crate::word_count;

const TARGET_MIN: u32 = 120;
const TARGET_MAX: u32 = 170;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceAssessment {
    TooFast,
    Optimal,
    TooSlow,
}

impl PaceAssessment {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaceAssessment::TooFast => "too_fast",
            PaceAssessment::Optimal => "optimal",
            PaceAssessment::TooSlow => "too_slow",
        }
    }
}

/// Pace measurement for one transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaceAnalysis {
    pub words_per_minute: u32,
    pub word_count: usize,
    pub duration_seconds: f64,
    pub assessment: PaceAssessment,
    pub target_range: String,
    pub deviation: String,
    pub recommendation: String,
}

/// Measure words per minute
///
/// A non-positive duration is treated as one second, so this never fails.
pub fn analyze_pace(transcript: &str, duration_seconds: f64) -> PaceAnalysis {
    let words = word_count(transcript);
    let duration = if duration_seconds <= 0.0 || !duration_seconds.is_finite() {
        1.0
    } else {
        duration_seconds
    };

    let wpm = round_half_even(words as f64 / duration * 60.0).max(0.0) as u32;
    let (assessment, recommendation) = evaluate(wpm);

    PaceAnalysis {
        words_per_minute: wpm,
        word_count: words,
        duration_seconds: round_to(duration, 1),
        assessment,
        target_range: format!("{}-{} WPM", TARGET_MIN, TARGET_MAX),
        deviation: deviation(wpm),
        recommendation: recommendation.to_string(),
    }
}

fn evaluate(wpm: u32) -> (PaceAssessment, &'static str) {
    if wpm > 180 {
        (
            PaceAssessment::TooFast,
            "말 속도가 매우 빠릅니다. 중요한 포인트에서 의도적으로 멈추고, 핵심 단어를 강조하며 말해보세요.",
        )
    } else if wpm > TARGET_MAX {
        (
            PaceAssessment::TooFast,
            "약간 빠른 편입니다. 숫자나 핵심 성과를 말할 때 조금 더 천천히 말하면 청취자가 이해하기 쉬워집니다.",
        )
    } else if wpm >= TARGET_MIN {
        (
            PaceAssessment::Optimal,
            "적절한 말 속도입니다. 이 페이스를 유지하세요.",
        )
    } else if wpm >= 100 {
        (
            PaceAssessment::TooSlow,
            "약간 느린 편입니다. 자신감 있게 조금 더 빠르게 말해보세요.",
        )
    } else {
        (
            PaceAssessment::TooSlow,
            "말 속도가 많이 느립니다. 답변 내용을 더 연습하고 자신감 있게 말해보세요.",
        )
    }
}

fn deviation(wpm: u32) -> String {
    if wpm > TARGET_MAX {
        let pct = round_half_even((wpm - TARGET_MAX) as f64 / TARGET_MAX as f64 * 100.0);
        format!("{}% 빠름", pct as i64)
    } else if wpm < TARGET_MIN {
        let pct = round_half_even((TARGET_MIN - wpm) as f64 / TARGET_MIN as f64 * 100.0);
        format!("{}% 느림", pct as i64)
    } else {
        "적정 범위".to_string()
    }
}

/// WPM -> grade
///
/// Wider than the assessment bands on purpose; pace, filler and STAR grades each
/// keep their own table.
pub fn pace_grade(wpm: u32) -> Grade {
    match wpm {
        130..=160 => Grade::A,
        120..=170 => Grade::BPlus,
        110..=180 => Grade::B,
        100..=190 => Grade::CPlus,
        90..=200 => Grade::C,
        _ => Grade::D,
    }
}
