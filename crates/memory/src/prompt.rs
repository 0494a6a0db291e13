//! Memory context rendered into LLM prompts

use serde::{Deserialize, Serialize};
use speech_coach_core::{Importance, LongTermMemory, ShortTermMemory, StmPayload};

const MAX_TRAITS: usize = 2;
const MAX_PATTERNS: usize = 3;
const MAX_FOCUS_AREAS: usize = 2;

/// Condensed view of a user's LTM and STM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryPromptContext {
    pub background: Option<String>,
    pub goal: Option<String>,
    pub feedback_style: Option<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recent_patterns: Vec<String>,
    pub improvement_status: Option<String>,
    pub focus_areas: Vec<String>,
}

impl MemoryPromptContext {
    /// Build from whatever memory is available; STMs are expected pre-ranked
    pub fn build(ltm: Option<&LongTermMemory>, stm: &[ShortTermMemory]) -> Self {
        let mut ctx = Self::default();

        if let Some(ltm) = ltm {
            ctx.background = background_line(ltm);
            ctx.goal = goal_line(ltm);
            ctx.feedback_style = ltm.feedback_preference.style.as_ref().map(|style| {
                format!(
                    "{} (상세도: {})",
                    style,
                    ltm.feedback_preference.detail_level()
                )
            });
            ctx.strengths = ltm
                .strengths()
                .take(MAX_TRAITS)
                .map(|t| t.description.clone())
                .collect();
            ctx.weaknesses = ltm
                .weaknesses()
                .take(MAX_TRAITS)
                .map(|t| t.description.clone())
                .collect();
        }

        ctx.recent_patterns = stm
            .iter()
            .filter_map(|s| s.speech_pattern().map(|p| (s, p)))
            .take(MAX_PATTERNS)
            .map(|(s, p)| {
                format!(
                    "{}: {} ({}회) {}",
                    p.pattern_type,
                    p.description,
                    s.mention_count,
                    p.trend.arrow()
                )
            })
            .collect();

        ctx.improvement_status = improvement_line(stm);

        ctx.focus_areas = stm
            .iter()
            .filter(|s| s.importance == Importance::High)
            .map(|s| match &s.payload {
                StmPayload::SpeechPattern(p) => p.description.clone(),
                StmPayload::Improvement(i) => i.category.clone(),
                StmPayload::SessionInsight(i) => i.summary.clone(),
            })
            .take(MAX_FOCUS_AREAS)
            .collect();

        ctx
    }

    fn has_background(&self) -> bool {
        self.background.is_some()
            || self.goal.is_some()
            || self.feedback_style.is_some()
            || !self.strengths.is_empty()
            || !self.weaknesses.is_empty()
    }

    fn has_recent(&self) -> bool {
        !self.recent_patterns.is_empty()
            || self.improvement_status.is_some()
            || !self.focus_areas.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_background() && !self.has_recent()
    }

    /// Markdown block for prompts; empty when there is nothing to say
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.has_background() {
            parts.push("## 사용자 배경".to_string());
            if let Some(background) = &self.background {
                parts.push(format!("**배경**: {}", background));
            }
            if let Some(goal) = &self.goal {
                parts.push(format!("**목표**: {}", goal));
            }
            if let Some(style) = &self.feedback_style {
                parts.push(format!("**선호 피드백 스타일**: {}", style));
            }
            if !self.strengths.is_empty() {
                parts.push(format!("**확정된 강점**: {}", self.strengths.join(", ")));
            }
            if !self.weaknesses.is_empty() {
                parts.push(format!("**확정된 개선점**: {}", self.weaknesses.join(", ")));
            }
        }

        if self.has_recent() {
            if !parts.is_empty() {
                parts.push(String::new());
            }
            parts.push("## 최근 연습 패턴".to_string());
            if !self.recent_patterns.is_empty() {
                parts.push("**반복 패턴**:".to_string());
                for pattern in &self.recent_patterns {
                    parts.push(format!("- {}", pattern));
                }
            }
            if let Some(status) = &self.improvement_status {
                parts.push(format!("**개선 현황**: {}", status));
            }
            if !self.focus_areas.is_empty() {
                parts.push(format!("**집중 영역**: {}", self.focus_areas.join(", ")));
            }
        }

        parts.join("\n")
    }
}

fn background_line(ltm: &LongTermMemory) -> Option<String> {
    let profile = &ltm.profile;
    let mut items: Vec<String> = Vec::new();

    if let Some(occupation) = &profile.occupation {
        items.push(occupation.clone());
    }
    if let Some(years) = profile.experience_years {
        items.push(format!("경력 {}년", years));
    }
    if let Some(industry) = &profile.industry {
        items.push(format!("{} 업계", industry));
    }
    match (&ltm.career.current_role, &ltm.career.target_role) {
        (Some(current), Some(target)) => items.push(format!("{} → {}", current, target)),
        (Some(current), None) => items.push(current.clone()),
        (None, Some(target)) => items.push(format!("목표 직무: {}", target)),
        (None, None) => {}
    }

    (!items.is_empty()).then(|| items.join(", "))
}

fn goal_line(ltm: &LongTermMemory) -> Option<String> {
    let goal = &ltm.goal;
    let primary = goal.primary_goal?;
    let mut line = primary.label().to_string();

    let details: Vec<&str> = [goal.target_company.as_deref(), goal.target_date.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !details.is_empty() {
        line.push_str(&format!(" ({})", details.join(", ")));
    }
    if !goal.concerns.is_empty() {
        line.push_str(&format!(" / 우려: {}", goal.concerns.join(", ")));
    }
    Some(line)
}

fn improvement_line(stm: &[ShortTermMemory]) -> Option<String> {
    let mut improving = Vec::new();
    let mut declining = Vec::new();

    for progress in stm.iter().filter_map(|s| s.improvement()) {
        if progress.current_score > progress.initial_score {
            improving.push(progress.category.as_str());
        } else if progress.current_score < progress.initial_score {
            declining.push(progress.category.as_str());
        }
    }

    let mut segments = Vec::new();
    if !improving.is_empty() {
        segments.push(format!("개선 중: {}", improving.join(", ")));
    }
    if !declining.is_empty() {
        segments.push(format!("하락: {}", declining.join(", ")));
    }
    (!segments.is_empty()).then(|| segments.join(" / "))
}
