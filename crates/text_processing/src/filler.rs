//! Filler word detection
//!
//! Three pattern families are scanned in order (sound, word, phrase). Matches are
//! collected family by family, pattern by pattern.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use speech_coach_core::{round_to, Grade};
use std::collections::BTreeMap;

use crate::word_count;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillerFamily {
    Sound,
    Word,
    Phrase,
}

impl FillerFamily {
    pub const ALL: [FillerFamily; 3] = [FillerFamily::Sound, FillerFamily::Word, FillerFamily::Phrase];

    fn advice(&self) -> &'static str {
        match self {
            FillerFamily::Sound => "'어...', '음...' 대신 잠시 멈춤(pause)을 사용해보세요.",
            FillerFamily::Word => "'그', '뭐' 같은 습관적 단어를 의식하고 줄여보세요.",
            FillerFamily::Phrase => "시간 벌기용 표현 대신 핵심을 바로 말해보세요.",
        }
    }
}

// Hesitation sounds
static SOUND_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"(?i)\b어+[\.…~]*\b").unwrap(),
    Regex::new(r"(?i)\b음+[\.…~]*\b").unwrap(),
    Regex::new(r"(?i)\b아+[\.…~]*\b").unwrap(),
    Regex::new(r"(?i)\b에+[\.…~]*\b").unwrap(),
]);

// Habitual standalone words
static WORD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"(?i)\b그+\b").unwrap(),
    Regex::new(r"(?i)\b저+\b").unwrap(),
    Regex::new(r"(?i)\b뭐+\b").unwrap(),
    Regex::new(r"(?i)\b이제\b").unwrap(),
    Regex::new(r"(?i)\b약간\b").unwrap(),
    Regex::new(r"(?i)\b좀\b").unwrap(),
]);

// Time-buying phrases
static PHRASE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"(?i)그러니까").unwrap(),
    Regex::new(r"(?i)말하자면").unwrap(),
    Regex::new(r"(?i)어떻게 보면").unwrap(),
    Regex::new(r"(?i)솔직히").unwrap(),
    Regex::new(r"(?i)사실").unwrap(),
]);

fn patterns(family: FillerFamily) -> &'static [Regex] {
    match family {
        FillerFamily::Sound => &SOUND_PATTERNS,
        FillerFamily::Word => &WORD_PATTERNS,
        FillerFamily::Phrase => &PHRASE_PATTERNS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillerAssessment {
    Excellent,
    Acceptable,
    Excessive,
    Severe,
}

impl FillerAssessment {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillerAssessment::Excellent => "excellent",
            FillerAssessment::Acceptable => "acceptable",
            FillerAssessment::Excessive => "excessive",
            FillerAssessment::Severe => "severe",
        }
    }
}

/// Filler usage for one transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillerAnalysis {
    pub filler_count: u32,
    pub filler_percentage: f64,
    pub total_words: usize,
    /// Families with at least one match
    pub fillers_by_type: BTreeMap<FillerFamily, usize>,
    /// First 10 matches in family/pattern order
    pub fillers_detected: Vec<String>,
    /// Up to 5 distinct fillers, most frequent first
    pub most_common_fillers: Vec<(String, usize)>,
    pub assessment: FillerAssessment,
    pub recommendation: String,
}

impl FillerAnalysis {
    fn empty() -> Self {
        Self {
            filler_count: 0,
            filler_percentage: 0.0,
            total_words: 0,
            fillers_by_type: BTreeMap::new(),
            fillers_detected: Vec::new(),
            most_common_fillers: Vec::new(),
            assessment: FillerAssessment::Excellent,
            recommendation: "분석할 텍스트가 없습니다.".to_string(),
        }
    }

    /// Family with the most matches; ties go to the earlier family
    pub fn dominant_family(&self) -> Option<FillerFamily> {
        let mut dominant: Option<(FillerFamily, usize)> = None;
        for family in FillerFamily::ALL {
            if let Some(&count) = self.fillers_by_type.get(&family) {
                if dominant.map_or(true, |(_, best)| count > best) {
                    dominant = Some((family, count));
                }
            }
        }
        dominant.map(|(family, _)| family)
    }
}

/// Detect filler words
pub fn analyze_fillers(transcript: &str) -> FillerAnalysis {
    let total_words = word_count(transcript);
    if total_words == 0 {
        return FillerAnalysis::empty();
    }

    let mut all_fillers: Vec<String> = Vec::new();
    let mut by_family = BTreeMap::new();

    for family in FillerFamily::ALL {
        let before = all_fillers.len();
        for pattern in patterns(family) {
            all_fillers.extend(pattern.find_iter(transcript).map(|m| m.as_str().to_string()));
        }
        let found = all_fillers.len() - before;
        if found > 0 {
            by_family.insert(family, found);
        }
    }

    let filler_count = all_fillers.len();
    let filler_percentage = round_to(filler_count as f64 / total_words as f64 * 100.0, 1);

    let mut analysis = FillerAnalysis {
        filler_count: filler_count as u32,
        filler_percentage,
        total_words,
        fillers_by_type: by_family,
        fillers_detected: all_fillers.iter().take(10).cloned().collect(),
        most_common_fillers: most_common(&all_fillers, 5),
        assessment: FillerAssessment::Excellent,
        recommendation: String::new(),
    };

    let (assessment, recommendation) = evaluate(filler_percentage, analysis.dominant_family());
    analysis.assessment = assessment;
    analysis.recommendation = recommendation;
    analysis
}

fn most_common(items: &[String], limit: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| seen == item) {
            Some((_, n)) => *n += 1,
            None => counts.push((item.clone(), 1)),
        }
    }
    // stable: ties keep first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts
}

fn evaluate(percentage: f64, dominant: Option<FillerFamily>) -> (FillerAssessment, String) {
    let with_advice = |base: &str| match dominant {
        Some(family) => format!("{} {}", base, family.advice()),
        None => base.to_string(),
    };

    if percentage <= 2.0 {
        (FillerAssessment::Excellent, "필러워드 사용이 매우 적습니다.".to_string())
    } else if percentage <= 4.0 {
        (FillerAssessment::Acceptable, with_advice("필러워드 사용이 허용 범위 내입니다."))
    } else if percentage <= 6.0 {
        (FillerAssessment::Excessive, with_advice("필러워드가 다소 많습니다."))
    } else {
        (
            FillerAssessment::Severe,
            "필러워드가 매우 많습니다. '어...' 대신 의도적인 멈춤을 사용해보세요.".to_string(),
        )
    }
}

/// Filler percentage -> grade (stricter than the assessment buckets)
pub fn filler_grade(percentage: f64) -> Grade {
    if percentage <= 1.0 {
        Grade::A
    } else if percentage <= 2.0 {
        Grade::BPlus
    } else if percentage <= 3.0 {
        Grade::B
    } else if percentage <= 4.0 {
        Grade::CPlus
    } else if percentage <= 5.0 {
        Grade::C
    } else {
        Grade::D
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_transcript() {
        let result = analyze_fillers("");
        assert_eq!(result.filler_count, 0);
        assert_eq!(result.filler_percentage, 0.0);
        assert_eq!(result.assessment, FillerAssessment::Excellent);
        assert_eq!(result.recommendation, "분석할 텍스트가 없습니다.");
    }

    #[test]
    fn test_sound_fillers_acceptable() {
        let text = format!("{}{}", "음 ".repeat(3), "단어 ".repeat(97));
        let result = analyze_fillers(&text);
        assert_eq!(result.filler_count, 3);
        assert_eq!(result.filler_percentage, 3.0);
        assert_eq!(result.assessment, FillerAssessment::Acceptable);
        assert_eq!(result.dominant_family(), Some(FillerFamily::Sound));
        assert!(result.recommendation.contains("잠시 멈춤"));
        assert_eq!(result.most_common_fillers, vec![("음".to_string(), 3)]);
    }

    #[test]
    fn test_words_inside_longer_tokens_are_ignored() {
        let result = analyze_fillers("그래서 저희 팀은 이제품을 출시했습니다");
        assert_eq!(result.filler_count, 0);
    }

    #[test]
    fn test_phrase_fillers_match_anywhere() {
        let result = analyze_fillers("사실은 솔직히 말하자면 괜찮았습니다");
        assert_eq!(result.fillers_by_type.get(&FillerFamily::Phrase), Some(&3));
        assert_eq!(result.fillers_by_type.get(&FillerFamily::Sound), None);
    }

    #[test]
    fn test_severe_bucket() {
        let result = analyze_fillers("어 음 그 저 일 이 삼 사 오 육");
        assert_eq!(result.filler_percentage, 40.0);
        assert_eq!(result.assessment, FillerAssessment::Severe);
        assert_eq!(result.fillers_detected, vec!["어", "음", "그", "저"]);
    }

    #[test]
    fn test_dominant_tie_prefers_sound() {
        let mut text = "어 그 ".to_string();
        text.push_str(&"단어 ".repeat(48));
        let result = analyze_fillers(&text);
        assert_eq!(result.filler_percentage, 4.0);
        assert_eq!(result.dominant_family(), Some(FillerFamily::Sound));
    }

    #[test]
    fn test_most_common_keeps_first_seen_order() {
        let items: Vec<String> = ["그", "음", "음", "그", "뭐"].iter().map(|s| s.to_string()).collect();
        let common = most_common(&items, 5);
        assert_eq!(common[0], ("그".to_string(), 2));
        assert_eq!(common[1], ("음".to_string(), 2));
        assert_eq!(common[2], ("뭐".to_string(), 1));
    }

    #[test]
    fn test_grade_table() {
        assert_eq!(filler_grade(0.5), Grade::A);
        assert_eq!(filler_grade(3.0), Grade::B);
        assert_eq!(filler_grade(5.1), Grade::D);
    }
}
