//! STAR structure analysis (Situation, Task, Action, Result)
//!
//! Each element is scored by how many distinct indicator strings appear: keywords
//! are substring matches on the lowercased transcript, patterns are regexes on the
//! original text. Action and Result carry more weight than Situation and Task.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use speech_coach_core::{round_half_even, Grade};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarElement {
    Situation,
    Task,
    Action,
    Result,
}

impl StarElement {
    /// Ideal order
    pub const ALL: [StarElement; 4] = [
        StarElement::Situation,
        StarElement::Task,
        StarElement::Action,
        StarElement::Result,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StarElement::Situation => "situation",
            StarElement::Task => "task",
            StarElement::Action => "action",
            StarElement::Result => "result",
        }
    }

    fn ideal_index(&self) -> usize {
        *self as usize
    }

    fn weight(&self) -> f64 {
        match self {
            StarElement::Situation | StarElement::Task => 1.0,
            StarElement::Action | StarElement::Result => 1.5,
        }
    }

    fn indicators(&self) -> &'static Indicators {
        match self {
            StarElement::Situation => &SITUATION,
            StarElement::Task => &TASK,
            StarElement::Action => &ACTION,
            StarElement::Result => &RESULT,
        }
    }
}

struct Indicators {
    keywords: &'static [&'static str],
    patterns: Vec<Regex>,
}

const TOTAL_WEIGHT: f64 = 5.0;

static SITUATION: Lazy<Indicators> = Lazy::new(|| Indicators {
    keywords: &[
        "상황", "당시", "그때", "배경", "환경", "팀에서", "회사에서", "프로젝트", "시작", "처음",
        "년", "월",
    ],
    patterns: vec![
        Regex::new(r"(?i)\d{4}년").unwrap(),
        Regex::new(r"(?i)당시[에는]*").unwrap(),
        Regex::new(r"(?i)[에서|에] 근무").unwrap(),
        Regex::new(r"(?i)팀[에서]*").unwrap(),
    ],
});

static TASK: Lazy<Indicators> = Lazy::new(|| Indicators {
    keywords: &[
        "목표", "해야", "과제", "문제", "이슈", "필요", "요구", "기대", "달성", "책임", "담당", "맡아",
    ],
    patterns: vec![
        Regex::new(r"(?i)해야\s*(했|할)").unwrap(),
        Regex::new(r"(?i)필요[가|했]").unwrap(),
        Regex::new(r"(?i)목표[는|가]").unwrap(),
    ],
});

static ACTION: Lazy<Indicators> = Lazy::new(|| Indicators {
    keywords: &[
        "그래서", "저는", "했습니다", "진행", "수행", "실행", "개발", "설계", "구현", "분석", "제안",
        "주도", "협업", "조율", "해결", "적용",
    ],
    patterns: vec![
        Regex::new(r"(?i)제가\s*(직접|먼저)").unwrap(),
        Regex::new(r"(?i)[을|를]\s*했습니다").unwrap(),
        Regex::new(r"(?i)[을|를]\s*진행").unwrap(),
    ],
});

static RESULT: Lazy<Indicators> = Lazy::new(|| Indicators {
    keywords: &[
        "결과", "성과", "달성", "개선", "향상", "증가", "감소", "절감", "단축", "완료", "성공",
    ],
    patterns: vec![
        Regex::new(r"(?i)\d+%").unwrap(),
        Regex::new(r"(?i)\d+[배|건|개|명|원|달러]").unwrap(),
        Regex::new(r"(?i)결과[적으로|는]").unwrap(),
        Regex::new(r"(?i)성과[는|가]").unwrap(),
    ],
});

// Quantified outcome anywhere in the answer
static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[%배건개명원달러]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarAssessment {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl StarAssessment {
    fn from_score(score: u32) -> Self {
        match score {
            80.. => StarAssessment::Excellent,
            60..=79 => StarAssessment::Good,
            40..=59 => StarAssessment::Fair,
            _ => StarAssessment::NeedsImprovement,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StarAssessment::Excellent => "excellent",
            StarAssessment::Good => "good",
            StarAssessment::Fair => "fair",
            StarAssessment::NeedsImprovement => "needs_improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAnalysis {
    pub is_natural: bool,
    pub actual_order: Vec<StarElement>,
    pub note: String,
}

/// STAR coverage for one transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarAnalysis {
    pub elements_found: BTreeMap<StarElement, bool>,
    pub element_scores: BTreeMap<StarElement, u32>,
    pub structure_score: u32,
    pub missing_elements: Vec<StarElement>,
    pub order_analysis: OrderAnalysis,
    pub has_numbers: bool,
    pub recommendation: String,
    pub assessment: StarAssessment,
}

impl StarAnalysis {
    pub fn is_found(&self, element: StarElement) -> bool {
        self.elements_found.get(&element).copied().unwrap_or(false)
    }
}

struct ElementMatch {
    score: u32,
    position: Option<usize>,
}

/// Keywords and patterns both run on the lowercased text so positions share one scale
fn analyze_element(lowered: &str, indicators: &Indicators) -> ElementMatch {
    let mut found: Vec<&str> = Vec::new();
    let mut position: Option<usize> = None;

    for keyword in indicators.keywords {
        if let Some(pos) = lowered.find(keyword) {
            found.push(keyword);
            position = Some(position.map_or(pos, |p| p.min(pos)));
        }
    }

    for pattern in &indicators.patterns {
        for m in pattern.find_iter(lowered) {
            if !found.contains(&m.as_str()) {
                found.push(m.as_str());
            }
            position = Some(position.map_or(m.start(), |p| p.min(m.start())));
        }
    }

    let score = match found.len() {
        0 => 0,
        1 => 40,
        2 => 60,
        3 | 4 => 80,
        _ => 100,
    };

    ElementMatch { score, position }
}

fn analyze_order(positions: &[(StarElement, usize)]) -> OrderAnalysis {
    if positions.len() < 2 {
        return OrderAnalysis {
            is_natural: true,
            actual_order: Vec::new(),
            note: "순서 분석에 충분한 요소가 없습니다.".to_string(),
        };
    }

    let mut sorted = positions.to_vec();
    sorted.sort_by_key(|(_, pos)| *pos);
    let actual_order: Vec<StarElement> = sorted.into_iter().map(|(e, _)| e).collect();

    let is_natural = actual_order
        .windows(2)
        .all(|pair| pair[0].ideal_index() <= pair[1].ideal_index());

    OrderAnalysis {
        is_natural,
        actual_order,
        note: if is_natural {
            "순서가 자연스럽습니다."
        } else {
            "STAR 순서를 조정해보세요."
        }
        .to_string(),
    }
}

fn recommendation(found: &BTreeMap<StarElement, bool>, has_numbers: bool, natural: bool) -> String {
    let missing = |e: StarElement| !found.get(&e).copied().unwrap_or(false);
    let mut parts: Vec<&str> = Vec::new();

    if missing(StarElement::Situation) {
        parts.push("상황(Situation) 설명을 추가하세요. '당시 어떤 상황이었는지' 배경을 먼저 말해주세요.");
    }
    if missing(StarElement::Task) {
        parts.push("과제(Task)를 명확히 하세요. '무엇을 해야 했는지' 목표를 언급해주세요.");
    }
    if missing(StarElement::Action) {
        parts.push("행동(Action)을 구체적으로 설명하세요. '제가 어떻게 했는지'를 자세히 말해주세요.");
    }
    if missing(StarElement::Result) {
        parts.push("결과(Result)를 추가하세요. 어떤 성과를 얻었는지 말해주세요.");
    } else if !has_numbers {
        parts.push("결과에 숫자를 추가하세요. '30% 개선', '2주 단축' 같은 구체적인 수치가 설득력을 높입니다.");
    }
    if !natural {
        parts.push("STAR 순서를 조정해보세요. 상황 → 과제 → 행동 → 결과 순서가 가장 자연스럽습니다.");
    }

    if parts.is_empty() {
        "STAR 구조가 잘 갖춰져 있습니다. 이 구조를 유지하세요.".to_string()
    } else {
        parts.join(" ")
    }
}

/// Analyze STAR coverage, order and composite score
pub fn analyze_star(transcript: &str) -> StarAnalysis {
    let lowered = transcript.to_lowercase();

    let mut elements_found = BTreeMap::new();
    let mut element_scores = BTreeMap::new();
    let mut positions = Vec::new();

    for element in StarElement::ALL {
        let matched = analyze_element(&lowered, element.indicators());
        elements_found.insert(element, matched.score > 30);
        element_scores.insert(element, matched.score);
        if let Some(pos) = matched.position {
            positions.push((element, pos));
        }
    }

    let mut weighted = StarElement::ALL
        .iter()
        .map(|e| element_scores[e] as f64 * e.weight())
        .sum::<f64>()
        / TOTAL_WEIGHT;

    let has_numbers = NUMBER_PATTERN.is_match(transcript);
    if has_numbers {
        weighted = (weighted + 10.0).min(100.0);
    }

    let order_analysis = analyze_order(&positions);
    if order_analysis.is_natural {
        weighted = (weighted + 5.0).min(100.0);
    }

    let structure_score = round_half_even(weighted) as u32;
    let missing_elements = StarElement::ALL
        .into_iter()
        .filter(|e| !elements_found[e])
        .collect();

    StarAnalysis {
        recommendation: recommendation(&elements_found, has_numbers, order_analysis.is_natural),
        elements_found,
        element_scores,
        structure_score,
        missing_elements,
        order_analysis,
        has_numbers,
        assessment: StarAssessment::from_score(structure_score),
    }
}

/// STAR composite -> grade
///
/// Independent of the pace and filler tables.
pub fn star_grade(score: u32) -> Grade {
    match score {
        85.. => Grade::A,
        75..=84 => Grade::BPlus,
        65..=74 => Grade::B,
        55..=64 => Grade::CPlus,
        45..=54 => Grade::C,
        _ => Grade::D,
    }
}
