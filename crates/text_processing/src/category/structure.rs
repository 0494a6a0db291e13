//! Structure: STAR keyword coverage, conclusion-first opening, connectives

use once_cell::sync::Lazy;
use regex::Regex;

use super::delivery::SENTENCE_SPLIT;
use super::{count_occurrences, weighted_total, CategoryResult};

const STAR_KEYWORDS: [(&str, &[&str]); 4] = [
    (
        "SITUATION",
        &["당시", "그때", "상황", "배경", "처음", "시작", "있었는데", "있었습니다", "에서"],
    ),
    (
        "TASK",
        &["목표", "해야", "필요", "과제", "문제", "요구", "역할", "담당", "맡"],
    ),
    (
        "ACTION",
        &["했습니다", "진행", "수행", "실행", "구현", "개발", "해서", "하여", "통해", "적용"],
    ),
    (
        "RESULT",
        &["결과", "성과", "달성", "개선", "향상", "증가", "감소", "%", "퍼센트", "배", "만큼"],
    ),
];

static CONCLUSION_FIRST: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"^저는").unwrap(),
    Regex::new(r"^결론").unwrap(),
    Regex::new(r"^핵심").unwrap(),
    Regex::new(r"^요약하면").unwrap(),
    Regex::new(r"^말씀드리면").unwrap(),
    Regex::new(r"입니다$").unwrap(),
    Regex::new(r"습니다$").unwrap(),
    Regex::new(r"였습니다$").unwrap(),
]);

const CONNECTIVES: [&str; 12] = [
    "따라서", "그래서", "결과적으로", "그러므로", "왜냐하면", "때문에", "덕분에", "첫째", "둘째",
    "마지막으로", "또한", "그리고",
];

/// Score logical structure
pub fn analyze_structure(transcript: &str) -> CategoryResult {
    let mut result = CategoryResult::default();
    let lowered = transcript.to_lowercase();

    // STAR coverage
    let missing: Vec<&str> = STAR_KEYWORDS
        .iter()
        .filter(|(_, keywords)| !keywords.iter().any(|k| lowered.contains(k)))
        .map(|(name, _)| *name)
        .collect();
    let found = STAR_KEYWORDS.len() - missing.len();
    let star_score = (found as f64 / 4.0 * 100.0) as u32;

    if missing.is_empty() {
        result.strength("STAR 구조 완벽히 갖춤");
    } else {
        result.issue(format!("STAR 구조 부족: {} 없음", missing.join(", ")));
    }
    result.sub_score("star", star_score);
    result.metric("star_elements_found", found as f64);

    // conclusion first
    let opening = SENTENCE_SPLIT
        .split(transcript)
        .take(2)
        .collect::<Vec<_>>()
        .join(" ");
    let conclusion_score = if CONCLUSION_FIRST.iter().any(|p| p.is_match(&opening)) {
        result.strength("두괄식 표현 사용");
        100
    } else {
        result.issue("두괄식 표현 부족 (결론을 먼저 말하면 좋음)");
        50
    };
    result.sub_score("conclusion_first", conclusion_score);

    // connectives
    let connectives = count_occurrences(&lowered, &CONNECTIVES);
    let connective_score = match connectives {
        0 => {
            result.issue("논리적 연결어 없음");
            25
        }
        1 => {
            result.issue("논리적 연결어 부족");
            50
        }
        2 => 75,
        n => {
            result.strength(format!("논리적 연결어 잘 사용 ({}개)", n));
            100
        }
    };
    result.sub_score("connectives", connective_score);
    result.metric("connective_count", connectives as f64);

    result.score = weighted_total(&[(star_score, 0.5), (conclusion_score, 0.3), (connective_score, 0.2)]);
    result
}
