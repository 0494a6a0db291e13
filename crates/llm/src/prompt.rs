//! Coaching prompts
//!
//! System prompts and request builders for every generative stage. Builders
//! return a ready [`GenerateRequest`] with the stage's system prompt and token
//! budget attached.

use speech_coach_core::{AnalysisResult, GenerateRequest, ShortTermMemory, Suggestion};
use speech_coach_text_processing::{StarElement, ToolReport};

/// Token budget for analysis, improvement, reflection and refinement
pub const STAGE_MAX_TOKENS: u32 = 2000;
/// Token budget for memory extraction
pub const EXTRACTION_MAX_TOKENS: u32 = 1000;

const EXTRACTION_TRANSCRIPT_CHARS: usize = 500;

// =============================================================================
// System prompts
// =============================================================================

pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"당신은 10년 경력의 전문 스피치 코치입니다.
면접, 발표, 프레젠테이션 코칭 전문가로서 수천 명을 코칭한 경험이 있습니다.

## 분석 원칙

1. **객관적 데이터 기반**: 느낌보다 수치로 판단합니다
2. **실용적 조언**: 바로 적용할 수 있는 구체적인 팁을 제공합니다
3. **긍정적 톤**: 비판보다 발전 가능성에 초점을 맞춥니다
4. **우선순위**: 가장 효과적인 1-2가지 개선점에 집중합니다
5. **연속성**: 최근 연습 패턴이 주어지면, 성장한 부분은 격려하고 반복되는 약점은 우선 개선점으로 제시합니다

## 평가 기준

- 논리/구조: STAR 구조 준수, 두괄식 표현
- 필러워드: 전체의 4% 이하가 이상적
- 말 속도: 120-170 WPM이 이상적
- 자신감: 어조의 확신, 불필요한 겸양 회피
- 구체성: 숫자, 사례, 구체적 결과 포함

## 점수 체계

A: 탁월함 (거의 수정 불필요)
B+: 좋음 (미세 조정만 필요)
B: 양호 (몇 가지 개선점 있음)
C+: 보통 (명확한 개선점 있음)
C: 개선 필요 (여러 문제점 있음)
D: 많은 개선 필요"#;

pub const IMPROVEMENT_SYSTEM_PROMPT: &str = r#"당신은 스피치 작가입니다.
원본의 개성과 메시지를 살리면서, 전달력을 높이는 것이 목표입니다.

## 개선 원칙

1. **메시지 보존**: 원본이 말하고자 하는 핵심은 절대 변경하지 않습니다
2. **말투 유지**: 화자의 어휘, 표현 스타일을 최대한 유지합니다
3. **자연스러움**: 실제로 따라 말할 수 있는 자연스러운 문장을 씁니다
4. **최소 개입**: 문제가 있는 부분만 수정하고, 잘된 부분은 그대로 둡니다

## 금지 사항

- 원본에 없는 내용 추가하지 않기
- 너무 교과서적/격식체로 바꾸지 않기
- 전문 용어나 어려운 표현 넣지 않기
- 원본보다 지나치게 길어지지 않기

## 출력 형식

개선된 스크립트만 출력하세요. 설명이나 서두는 넣지 마세요."#;

pub const REFLECTION_SYSTEM_PROMPT: &str = r#"당신은 스피치 코칭 품질 검토자입니다.
개선안이 원본의 의도를 잘 살렸는지, 실제로 사용할 수 있는지 검토합니다.

## 검토 기준

1. **메시지 보존**: 원본의 핵심 메시지가 유지되었는가?
2. **개선 반영**: 분석에서 지적한 문제점이 실제로 개선되었는가?
3. **개성 유지**: 원본의 말투/스타일이 너무 많이 바뀌지 않았는가?
4. **자연스러움**: 실제로 따라 말할 수 있는 자연스러운 문장인가?

## 출력 형식 (JSON)

{
    "passes_review": true/false,
    "issues_found": ["문제점1", "문제점2"],
    "suggested_fixes": ["수정사항1"],
    "final_script": "수정된 최종 스크립트 (문제 없으면 빈 문자열)"
}"#;

pub const REFINEMENT_SYSTEM_PROMPT: &str =
    "당신은 스피치 코치입니다. 사용자의 의도를 반영하여 개선안을 수정합니다.";

// =============================================================================
// Builders
// =============================================================================

fn check(found: bool) -> &'static str {
    if found {
        "✓"
    } else {
        "✗"
    }
}

/// Top suggestions as `- [category] suggestion`, or `없음`
fn format_categorized(suggestions: &[Suggestion], limit: usize) -> String {
    if suggestions.is_empty() {
        return "없음".to_string();
    }
    suggestions
        .iter()
        .take(limit)
        .map(|s| format!("- [{}] {}", s.category, s.suggestion))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_plain(suggestions: &[Suggestion], limit: usize) -> String {
    if suggestions.is_empty() {
        return "없음".to_string();
    }
    suggestions
        .iter()
        .take(limit)
        .map(|s| format!("- {}", s.suggestion))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Analysis prompt: transcript, tool measurements and optional memory context
pub fn analysis_request(
    transcript: &str,
    report: &ToolReport,
    memory_context: Option<&str>,
) -> GenerateRequest {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("## 분석할 답변\n\n{}", transcript));

    parts.push(format!(
        "\n## 측정 데이터 (도구 분석 결과)\n\n\
         ### 말 속도\n\
         - WPM: {}\n\
         - 평가: {}\n\
         - 목표 범위: {}\n\n\
         ### 필러워드\n\
         - 개수: {}개\n\
         - 비율: {}%\n\
         - 평가: {}",
        report.pace.words_per_minute,
        report.pace.assessment.as_str(),
        report.pace.target_range,
        report.fillers.filler_count,
        report.fillers.filler_percentage,
        report.fillers.assessment.as_str(),
    ));

    parts.push(format!(
        "\n### STAR 구조\n\
         - Situation: {}\n\
         - Task: {}\n\
         - Action: {}\n\
         - Result: {}\n\
         - 숫자 포함: {}\n\
         - 구조 점수: {}/100",
        check(report.star.is_found(StarElement::Situation)),
        check(report.star.is_found(StarElement::Task)),
        check(report.star.is_found(StarElement::Action)),
        check(report.star.is_found(StarElement::Result)),
        if report.star.has_numbers { "예" } else { "아니오" },
        report.star.structure_score,
    ));

    let summary = &report.summary;
    parts.push(format!(
        "\n### 카테고리 점수\n\
         - 평균: {}/100\n\
         - 가장 약한 영역: {} ({}점)\n\
         - 가장 강한 영역: {} ({}점)",
        summary.average_score,
        summary.weakest_category.0.label(),
        summary.weakest_category.1,
        summary.strongest_category.0.label(),
        summary.strongest_category.1,
    ));

    if let Some(context) = memory_context.filter(|c| !c.trim().is_empty()) {
        parts.push(format!(
            "\n{}\n\n이 사용자에게는 위 반복 패턴에 대한 진전 여부를 확인하고, \
             격려하거나 추가 조언을 해주세요.",
            context
        ));
    }

    parts.push(
        r#"
## 요청사항

위 데이터를 바탕으로 종합 분석을 수행하고, 다음 JSON 형식으로 응답해주세요:

{
    "scores": {
        "logic_structure": "A/B+/B/C+/C/D",
        "filler_words": "...",
        "speaking_pace": "...",
        "confidence_tone": "...",
        "content_specificity": "..."
    },
    "suggestions": [
        {"priority": 1, "category": "카테고리", "suggestion": "제안", "impact": "효과"}
    ],
    "structure_analysis": "STAR 구조 분석 설명",
    "progressive_note": "이전 세션 대비 변화 (해당되는 경우)"
}"#
        .to_string(),
    );

    GenerateRequest::new(parts.join("\n"))
        .with_system(ANALYSIS_SYSTEM_PROMPT)
        .with_max_tokens(STAGE_MAX_TOKENS)
}

/// First-draft improvement prompt
pub fn improvement_request(
    transcript: &str,
    analysis: &AnalysisResult,
    question: Option<&str>,
) -> GenerateRequest {
    let mut parts: Vec<String> = Vec::new();

    if let Some(question) = question.filter(|q| !q.trim().is_empty()) {
        parts.push(format!("## 면접 질문\n{}\n", question));
    }

    parts.push(format!("## 원본 답변\n\n{}", transcript));

    if !analysis.suggestions.is_empty() {
        parts.push(format!(
            "\n## 분석에서 발견된 개선점\n\n{}",
            format_categorized(&analysis.suggestions, 3)
        ));
    }

    parts.push(
        "\n## 요청사항\n\n\
         위 분석 결과를 바탕으로 개선된 스크립트를 작성해주세요.\n\n\
         주의사항:\n\
         1. 원본의 핵심 메시지와 말투를 유지하세요\n\
         2. 위에서 지적한 문제점만 개선하세요\n\
         3. 실제로 따라 말할 수 있는 자연스러운 문장을 쓰세요\n\
         4. 설명 없이 개선된 스크립트만 출력하세요"
            .to_string(),
    );

    GenerateRequest::new(parts.join("\n"))
        .with_system(IMPROVEMENT_SYSTEM_PROMPT)
        .with_max_tokens(STAGE_MAX_TOKENS)
}

/// Self-review of a draft against the original
pub fn reflection_request(original: &str, draft: &str, analysis: &AnalysisResult) -> GenerateRequest {
    let prompt = format!(
        r#"## 원본 답변

{original}

## 생성된 개선안

{draft}

## 원래 분석에서 지적한 문제점

{issues}

## 검토 요청

위 개선안이 다음 기준을 충족하는지 검토하고, JSON으로 응답해주세요:

1. 원본의 핵심 메시지가 유지되었는가?
2. 분석에서 지적한 문제점이 실제로 개선되었는가?
3. 원본의 말투/스타일이 너무 많이 바뀌지 않았는가?
4. 실제로 따라 말할 수 있는 자연스러운 문장인가?

{{
    "passes_review": true/false,
    "issues_found": ["발견된 문제점"],
    "suggested_fixes": ["권장 수정사항"],
    "final_script": "수정된 스크립트 (문제 없으면 빈 문자열)"
}}"#,
        original = original,
        draft = draft,
        issues = format_plain(&analysis.suggestions, 5),
    );

    GenerateRequest::new(prompt)
        .with_system(REFLECTION_SYSTEM_PROMPT)
        .with_max_tokens(STAGE_MAX_TOKENS)
}

/// Regenerate the current script toward the user's stated intent
pub fn refinement_request(
    current_script: &str,
    user_intent: &str,
    analysis: Option<&AnalysisResult>,
) -> GenerateRequest {
    let issues = analysis
        .map(|a| format_plain(&a.suggestions, 3))
        .unwrap_or_else(|| "없음".to_string());

    let prompt = format!(
        "현재 개선안:\n{}\n\n\
         사용자의 추가 요청:\n{}\n\n\
         원래 분석에서 발견된 문제점:\n{}\n\n\
         위 요청을 반영하여 개선안을 수정해주세요.\n\n\
         주의사항:\n\
         1. 사용자의 의도를 정확히 반영하세요\n\
         2. 기존에 잘 개선된 부분은 유지하세요\n\
         3. 자연스럽게 말할 수 있는 문장을 유지하세요\n\n\
         응답 형식:\n\
         ## 변경 사항\n\
         (무엇을 어떻게 바꿨는지 1-2문장으로)\n\n\
         ## 수정된 스크립트\n\
         (전체 스크립트)\n",
        current_script, user_intent, issues
    );

    GenerateRequest::new(prompt)
        .with_system(REFINEMENT_SYSTEM_PROMPT)
        .with_max_tokens(STAGE_MAX_TOKENS)
}

/// Ask which observations from this session are worth remembering
pub fn extraction_request(
    transcript: &str,
    analysis: &AnalysisResult,
    existing_stm: &[ShortTermMemory],
) -> GenerateRequest {
    let excerpt: String = transcript.chars().take(EXTRACTION_TRANSCRIPT_CHARS).collect();

    let scores_text = if analysis.scores.is_empty() {
        "없음".to_string()
    } else {
        analysis
            .scores
            .iter()
            .map(|(k, v)| format!("{}: {}", k.as_str(), v))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let patterns: Vec<String> = existing_stm
        .iter()
        .take(5)
        .filter_map(|stm| {
            stm.speech_pattern().map(|p| {
                format!(
                    "- {}: {} (반복: {}회)",
                    p.pattern_type, p.description, stm.mention_count
                )
            })
        })
        .collect();
    let existing_text = if patterns.is_empty() {
        "없음".to_string()
    } else {
        patterns.join("\n")
    };

    let prompt = format!(
        r#"다음 스피치 분석 결과에서 장기적으로 기억할 가치가 있는 정보를 추출해주세요.

## 이번 세션 분석 결과

### 원본 텍스트 (일부)
{excerpt}...

### 점수
{scores}

### 측정값
- 말 속도: {wpm} WPM
- 필러워드: {filler}%

### 개선 제안
{suggestions}

## 기존 Short-term Memory
{existing}

## 추출 기준

1. **speech_pattern**: 반복되는 말하기 패턴 (필러워드 습관, 말 속도 경향 등)
2. **improvement_progress**: 이전 대비 개선/악화된 영역
3. **session_insight**: 이번 세션에서 발견된 중요 인사이트

## 제외 기준

- 일회성 실수 (패턴이 아닌 것)
- 이미 기존 STM에 있는 내용과 중복
- 너무 일반적인 내용

## 응답 형식 (JSON)

{{
    "should_save": true/false,
    "reasoning": "저장 여부 이유",
    "new_memories": [
        {{
            "type": "speech_pattern",
            "subtype": "filler/pace/structure/tone",
            "content": "설명 (1-2문장)",
            "severity": "high/medium/low",
            "numeric_value": 숫자값 (있으면),
            "ttl_days": 7-30
        }},
        {{
            "type": "improvement_progress",
            "category": "pace/filler/structure",
            "initial_score": "이전 점수",
            "current_score": "현재 점수"
        }},
        {{
            "type": "session_insight",
            "content": "인사이트 (1문장)"
        }}
    ]
}}

**중요**: 진짜 가치 있는 정보만 추출하세요. 매 세션마다 무조건 저장하는 것은 비효율적입니다."#,
        excerpt = excerpt,
        scores = scores_text,
        wpm = analysis.metrics.words_per_minute,
        filler = analysis.metrics.filler_percentage,
        suggestions = format_categorized(&analysis.suggestions, 3),
        existing = existing_text,
    );

    GenerateRequest::new(prompt).with_max_tokens(EXTRACTION_MAX_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use speech_coach_core::{
        AnalysisMetrics, Importance, MemoryType, PatternTrend, Severity, SpeechPattern, StmPayload,
    };

    fn pattern_stm(pattern_type: &str, mention_count: u32) -> ShortTermMemory {
        let payload = StmPayload::SpeechPattern(SpeechPattern {
            pattern_type: pattern_type.to_string(),
            description: "말이 빠름".to_string(),
            severity: Severity::High,
            occurrence_count: 1,
            trend: PatternTrend::Stable,
            numeric_value: None,
        });
        let mut stm = ShortTermMemory::new(
            "u1",
            MemoryType::SpeechPattern,
            payload,
            Importance::High,
            Some(14),
        );
        stm.mention_count = mention_count;
        stm
    }

    fn analysis_with_suggestions(n: u32) -> AnalysisResult {
        let mut analysis = AnalysisResult::fallback(AnalysisMetrics::default(), "");
        analysis.suggestions = (1..=n)
            .map(|i| Suggestion::new(i, format!("cat{}", i), format!("제안{}", i)))
            .collect();
        analysis
    }

    #[test]
    fn test_analysis_request_includes_measurements() {
        let transcript = "저는 프로젝트에서 매출을 20% 올렸습니다.";
        let report = ToolReport::run(transcript, 30.0);
        let request = analysis_request(transcript, &report, None);

        assert_eq!(request.system.as_deref(), Some(ANALYSIS_SYSTEM_PROMPT));
        assert_eq!(request.max_tokens, STAGE_MAX_TOKENS);
        assert!(request.prompt.starts_with("## 분석할 답변"));
        assert!(request.prompt.contains("- 숫자 포함: 예"));
        assert!(request.prompt.contains("\"logic_structure\""));
        assert!(!request.prompt.contains("진전 여부"));
    }

    #[test]
    fn test_analysis_request_with_memory() {
        let report = ToolReport::run("안녕하세요", 10.0);
        let context = "## 최근 연습 패턴\n**집중 영역**: 말이 빠름";
        let request = analysis_request("안녕하세요", &report, Some(context));
        assert!(request.prompt.contains("## 최근 연습 패턴"));
        assert!(request.prompt.contains("진전 여부"));

        let blank = analysis_request("안녕하세요", &report, Some("  "));
        assert!(!blank.prompt.contains("진전 여부"));
    }

    #[test]
    fn test_improvement_request_limits_suggestions() {
        let request = improvement_request("원본", &analysis_with_suggestions(5), Some("자기소개"));
        assert!(request.prompt.starts_with("## 면접 질문\n자기소개"));
        assert!(request.prompt.contains("- [cat3] 제안3"));
        assert!(!request.prompt.contains("제안4"));
    }

    #[test]
    fn test_reflection_request_lists_issues() {
        let request = reflection_request("원본", "초안", &analysis_with_suggestions(0));
        assert!(request.prompt.contains("## 원래 분석에서 지적한 문제점\n\n없음"));
        assert!(request.prompt.contains("\"passes_review\""));
    }

    #[test]
    fn test_extraction_request() {
        let analysis = analysis_with_suggestions(1);
        let stm = vec![pattern_stm("pace", 3)];
        let transcript = "가".repeat(800);
        let request = extraction_request(&transcript, &analysis, &stm);

        assert_eq!(request.max_tokens, EXTRACTION_MAX_TOKENS);
        assert!(request.system.is_none());
        assert!(request.prompt.contains(&format!("{}...", "가".repeat(500))));
        assert!(!request.prompt.contains(&"가".repeat(501)));
        assert!(request.prompt.contains("- pace: 말이 빠름 (반복: 3회)"));
        assert!(request.prompt.contains("logic_structure: B"));
    }

    #[test]
    fn test_extraction_request_without_memory() {
        let request = extraction_request("짧은 답변", &analysis_with_suggestions(0), &[]);
        assert!(request.prompt.contains("## 기존 Short-term Memory\n없음"));
        assert!(request.prompt.contains("### 개선 제안\n없음"));
    }
}
