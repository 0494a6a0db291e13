//! Persuasion: confident phrasing, hedging, emphasis

use super::{count_occurrences, weighted_total, CategoryResult};

const CONFIDENCE_MARKERS: [&str; 11] = [
    "확신", "자신있", "잘 할 수 있", "능력", "성공적", "효과적", "입증", "검증", "했습니다", "달성했",
    "이뤘",
];

const HEDGING_MARKERS: [&str; 12] = [
    "잘 모르", "부족", "미흡", "아직", "것 같", "일 수도", "할지도", "그냥", "별로", "사실", "죄송",
    "실례",
];

const EMPHASIS_MARKERS: [&str; 11] = [
    "특히", "가장", "핵심", "중요", "반드시", "꼭", "확실히", "분명히", "최고", "최선", "유일",
];

/// Score persuasiveness
pub fn analyze_persuasion(transcript: &str) -> CategoryResult {
    let mut result = CategoryResult::default();
    let lowered = transcript.to_lowercase();

    let confident = count_occurrences(&lowered, &CONFIDENCE_MARKERS);
    let confidence_score = match confident {
        0 => {
            result.issue("자신감 있는 표현 부족");
            40
        }
        1 => 60,
        2 => 80,
        _ => {
            result.strength("자신감 있는 표현");
            100
        }
    };
    result.sub_score("confidence", confidence_score);

    let hedges = count_occurrences(&lowered, &HEDGING_MARKERS);
    let hedging_score = match hedges {
        0 => {
            result.strength("불필요한 겸양 없음");
            100
        }
        1 => 80,
        2 => {
            result.issue(format!("불필요한 겸양 표현 감지 ({}회)", hedges));
            60
        }
        n => {
            result.issue(format!("겸양 표현 많음 ({}회) - 자신감 있게!", n));
            40
        }
    };
    result.sub_score("hedging", hedging_score);
    result.metric("hedge_count", hedges as f64);

    let emphasis = count_occurrences(&lowered, &EMPHASIS_MARKERS);
    let emphasis_score = match emphasis {
        0 => {
            result.issue("강조 표현 부족 (핵심을 강조하면 좋음)");
            50
        }
        1 => 70,
        n => {
            result.strength(format!("강조 표현 적절히 사용 ({}개)", n));
            100
        }
    };
    result.sub_score("emphasis", emphasis_score);

    result.score = weighted_total(&[(confidence_score, 0.4), (hedging_score, 0.35), (emphasis_score, 0.25)]);
    result
}
