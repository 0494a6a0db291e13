//! Delivery: pace, filler ratio and sentence completion

use once_cell::sync::Lazy;
use regex::Regex;
use speech_coach_core::round_to;

use super::{weighted_total, CategoryResult};
use crate::word_count;

static FILLER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"(?i)\b어+\b").unwrap(),
    Regex::new(r"(?i)\b음+\b").unwrap(),
    Regex::new(r"(?i)\b그+\b").unwrap(),
    Regex::new(r"(?i)\b저+\b").unwrap(),
    Regex::new(r"(?i)\b뭐+\b").unwrap(),
    Regex::new(r"(?i)\b이제\b").unwrap(),
    Regex::new(r"(?i)\b약간\b").unwrap(),
    Regex::new(r"(?i)\b좀\b").unwrap(),
    Regex::new(r"(?i)\b그러니까\b").unwrap(),
    Regex::new(r"(?i)\b아니\b").unwrap(),
    Regex::new(r"(?i)\b근데\b").unwrap(),
]);

pub(crate) static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?。]").unwrap());

// Connective endings that leave a sentence hanging
const INCOMPLETE_ENDINGS: [char; 4] = ['는', '고', '면', '서'];

/// Score delivery from the transcript and its spoken duration
pub fn analyze_delivery(transcript: &str, duration_seconds: f64) -> CategoryResult {
    let mut result = CategoryResult::default();

    // pace
    let words = word_count(transcript);
    let minutes = if duration_seconds > 0.0 {
        duration_seconds / 60.0
    } else {
        1.0
    };
    let wpm = (words as f64 / minutes) as u32;

    let pace_score = match wpm {
        120..=170 => {
            result.strength(format!("말 속도 적정 ({} WPM)", wpm));
            100
        }
        100..=119 => {
            result.issue(format!("말 속도 약간 느림 ({} WPM, 목표: 120-170)", wpm));
            75
        }
        171..=200 => {
            result.issue(format!("말 속도 약간 빠름 ({} WPM, 목표: 120-170)", wpm));
            75
        }
        80..=99 => {
            result.issue(format!("말 속도 느림 ({} WPM)", wpm));
            50
        }
        201..=230 => {
            result.issue(format!("말 속도 빠름 ({} WPM)", wpm));
            50
        }
        _ => {
            result.issue(format!("말 속도 조절 필요 ({} WPM)", wpm));
            25
        }
    };
    result.sub_score("pace", pace_score);

    // fillers
    let filler_count: usize = FILLER_PATTERNS
        .iter()
        .map(|p| p.find_iter(transcript).count())
        .sum();
    let filler_percentage = if words > 0 {
        filler_count as f64 / words as f64 * 100.0
    } else {
        0.0
    };

    let filler_score = if filler_percentage <= 3.0 {
        result.strength(format!("필러워드 적음 ({:.1}%)", filler_percentage));
        100
    } else if filler_percentage <= 5.0 {
        result.issue(format!("필러워드 약간 많음 ({:.1}%, 목표: 3% 이하)", filler_percentage));
        75
    } else if filler_percentage <= 8.0 {
        result.issue(format!("필러워드 많음 ({:.1}%)", filler_percentage));
        50
    } else {
        result.issue(format!("필러워드 매우 많음 ({:.1}%)", filler_percentage));
        25
    };
    result.sub_score("fillers", filler_score);

    // sentence completion
    let sentences: Vec<&str> = SENTENCE_SPLIT
        .split(transcript)
        .map(str::trim)
        .filter(|s| s.chars().count() > 10)
        .collect();

    let sentence_score = if sentences.is_empty() {
        50
    } else {
        let incomplete = sentences
            .iter()
            .filter(|s| s.ends_with(&INCOMPLETE_ENDINGS[..]))
            .count();
        let ratio = incomplete as f64 / sentences.len() as f64;
        if ratio <= 0.1 {
            result.strength("문장 완결성 좋음");
            100
        } else if ratio <= 0.2 {
            75
        } else if ratio <= 0.3 {
            result.issue("문장이 완결되지 않는 경우가 있음");
            50
        } else {
            result.issue("문장 완결성 부족");
            25
        }
    };
    result.sub_score("sentence_completion", sentence_score);

    result.metric("wpm", wpm as f64);
    result.metric("filler_count", filler_count as f64);
    result.metric("filler_percentage", round_to(filler_percentage, 1));
    result.metric("word_count", words as f64);

    result.score = weighted_total(&[(pace_score, 0.4), (filler_score, 0.4), (sentence_score, 0.2)]);
    result
}
