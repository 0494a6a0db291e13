//! Content: quantified claims, concrete examples, domain vocabulary

use once_cell::sync::Lazy;
use regex::Regex;

use super::{count_occurrences, weighted_total, CategoryResult};

static NUMBER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"\d+%").unwrap(),
    Regex::new(r"\d+퍼센트").unwrap(),
    Regex::new(r"\d+배").unwrap(),
    Regex::new(r"\d+만").unwrap(),
    Regex::new(r"\d+억").unwrap(),
    Regex::new(r"\d+명").unwrap(),
    Regex::new(r"\d+개").unwrap(),
    Regex::new(r"\d+건").unwrap(),
    Regex::new(r"\d+초").unwrap(),
    Regex::new(r"\d+분").unwrap(),
    Regex::new(r"\d+시간").unwrap(),
    Regex::new(r"\d+일").unwrap(),
    Regex::new(r"\d+주").unwrap(),
    Regex::new(r"\d+개월").unwrap(),
]);

const EXAMPLE_MARKERS: [&str; 11] = [
    "예를 들어", "예를 들면", "예시로", "실제로", "구체적으로", "프로젝트", "경험", "사례", "a회사",
    "b팀", "당시",
];

const TECH_TERMS: [&str; 25] = [
    "python", "java", "javascript", "react", "node", "sql", "database", "api", "서버", "클라이언트",
    "애자일", "스크럼", "칸반", "ci/cd", "devops", "git", "docker", "aws", "gcp", "azure", "kpi",
    "roi", "매출", "비용", "효율",
];

/// Score content specificity
pub fn analyze_content(transcript: &str) -> CategoryResult {
    let mut result = CategoryResult::default();
    let lowered = transcript.to_lowercase();

    // numbers
    let mentions: Vec<&str> = NUMBER_PATTERNS
        .iter()
        .flat_map(|p| p.find_iter(transcript).map(|m| m.as_str()))
        .collect();
    let number_score = match mentions.len() {
        0 => {
            result.issue("구체적 숫자 없음 (성과를 수치로 표현하면 좋음)");
            25
        }
        1 => {
            result.issue("숫자 언급 부족 (1개, 목표: 2-3개)");
            50
        }
        2 => {
            result.strength("숫자 언급 있음 (2개)");
            75
        }
        n => {
            result.strength(format!(
                "구체적 숫자 잘 사용 ({}개: {})",
                n,
                mentions[..3].join(", ")
            ));
            100
        }
    };
    result.sub_score("numbers", number_score);
    result.metric("number_count", mentions.len() as f64);

    // examples
    let examples = count_occurrences(&lowered, &EXAMPLE_MARKERS);
    let example_score = match examples {
        0 => {
            result.issue("구체적 사례 부족");
            40
        }
        1 => 70,
        _ => {
            result.strength("구체적 사례 제시");
            100
        }
    };
    result.sub_score("examples", example_score);

    // domain vocabulary
    let terms = count_occurrences(&lowered, &TECH_TERMS);
    let tech_score = match terms {
        0 => 50,
        1 | 2 => 70,
        n => {
            result.strength(format!("전문 용어 적절히 사용 ({}개)", n));
            100
        }
    };
    result.sub_score("expertise", tech_score);
    result.metric("tech_term_count", terms as f64);

    result.score = weighted_total(&[(number_score, 0.4), (example_score, 0.35), (tech_score, 0.25)]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rich_content() {
        let text = "실제로 당시 프로젝트에서 react와 AWS, Docker를 써서 \
            응답 시간을 30% 줄이고 사용자 2만 명, 매출 3배를 만들었습니다";
        let result = analyze_content(text);
        assert_eq!(result.sub_scores["numbers"], 100);
        assert_eq!(result.sub_scores["examples"], 100);
        assert_eq!(result.sub_scores["expertise"], 100);
        assert_eq!(result.score, 100);
        assert!(result.strengths[0].starts_with("구체적 숫자 잘 사용 (3개: 30%"));
    }

    #[test]
    fn test_empty_content() {
        let result = analyze_content("열심히 했습니다");
        assert_eq!(result.sub_scores["numbers"], 25);
        assert_eq!(result.sub_scores["examples"], 40);
        assert_eq!(result.sub_scores["expertise"], 50);
        assert_eq!(result.score, (25.0 * 0.4 + 40.0 * 0.35 + 50.0 * 0.25) as u32);
        assert_eq!(result.issues.len(), 2);
    }

    #[test]
    fn test_single_number() {
        let result = analyze_content("2주 걸렸습니다");
        assert_eq!(result.issues[0], "숫자 언급 부족 (1개, 목표: 2-3개)");
    }
}
