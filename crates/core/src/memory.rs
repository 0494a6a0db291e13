//! Long-term and short-term memory records
//!
//! Pure data: the merge, promotion and expiry rules live in the memory crate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AnalysisMetrics, Grade, Scores};

// =============================================================================
// Long-term memory
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub occupation: Option<String>,
    pub experience_years: Option<u32>,
    pub industry: Option<String>,
    pub company_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CareerContext {
    pub current_role: Option<String>,
    pub target_role: Option<String>,
    #[serde(default)]
    pub key_skills: Vec<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Interview,
    Presentation,
    General,
}

impl GoalType {
    pub fn label(&self) -> &'static str {
        match self {
            GoalType::Interview => "면접 준비",
            GoalType::Presentation => "발표 준비",
            GoalType::General => "일반 스피치",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalContext {
    pub primary_goal: Option<GoalType>,
    pub target_company: Option<String>,
    pub target_date: Option<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
}

/// Feedback delivery preferences; unset fields fall back to the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPreference {
    pub style: Option<String>,
    pub detail_level: Option<String>,
    pub language: Option<String>,
}

impl FeedbackPreference {
    pub fn style(&self) -> &str {
        self.style.as_deref().unwrap_or("balanced")
    }

    pub fn detail_level(&self) -> &str {
        self.detail_level.as_deref().unwrap_or("detailed")
    }

    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or("formal")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitType {
    Strength,
    Weakness,
}

/// A strength or weakness confirmed by repeated observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedTrait {
    pub trait_type: TraitType,
    pub category: String,
    pub description: String,
    pub confirmed_count: u32,
    pub first_detected: DateTime<Utc>,
    pub last_confirmed: DateTime<Utc>,
}

/// Stable per-user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermMemory {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub career: CareerContext,
    #[serde(default)]
    pub goal: GoalContext,
    #[serde(default)]
    pub feedback_preference: FeedbackPreference,
    #[serde(default)]
    pub confirmed_traits: Vec<ConfirmedTrait>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LongTermMemory {
    /// Fresh record for a first-time user
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            profile: UserProfile::default(),
            career: CareerContext::default(),
            goal: GoalContext::default(),
            feedback_preference: FeedbackPreference::default(),
            confirmed_traits: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn strengths(&self) -> impl Iterator<Item = &ConfirmedTrait> {
        self.confirmed_traits
            .iter()
            .filter(|t| t.trait_type == TraitType::Strength)
    }

    pub fn weaknesses(&self) -> impl Iterator<Item = &ConfirmedTrait> {
        self.confirmed_traits
            .iter()
            .filter(|t| t.trait_type == TraitType::Weakness)
    }
}

/// Partial LTM update. `None` / empty fields leave the existing value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LtmUpdate {
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub career: CareerContext,
    #[serde(default)]
    pub goal: GoalContext,
    #[serde(default)]
    pub feedback_preference: FeedbackPreference,
    #[serde(default)]
    pub confirmed_traits: Vec<ConfirmedTrait>,
    pub version: Option<u32>,
}

impl LtmUpdate {
    pub fn is_empty(&self) -> bool {
        self.profile == UserProfile::default()
            && self.career == CareerContext::default()
            && self.goal == GoalContext::default()
            && self.feedback_preference == FeedbackPreference::default()
            && self.confirmed_traits.is_empty()
    }

    pub fn with_trait(mut self, confirmed: ConfirmedTrait) -> Self {
        self.confirmed_traits.push(confirmed);
        self
    }
}

// =============================================================================
// Short-term memory
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    SpeechPattern,
    ImprovementProgress,
    SessionInsight,
    RecurringIssue,
    RecentScore,
}

/// Priority of an STM record; declaration order is the sort order (high first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Severity::High,
            "low" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

impl From<Severity> for Importance {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::High => Importance::High,
            Severity::Medium => Importance::Medium,
            Severity::Low => Importance::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTrend {
    Improving,
    Stable,
    Worsening,
}

impl PatternTrend {
    pub fn arrow(&self) -> &'static str {
        match self {
            PatternTrend::Improving => "↑",
            PatternTrend::Stable => "→",
            PatternTrend::Worsening => "↓",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechPattern {
    pub pattern_type: String,
    pub description: String,
    pub severity: Severity,
    pub occurrence_count: u32,
    pub trend: PatternTrend,
    pub numeric_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementProgress {
    pub category: String,
    pub initial_score: Grade,
    pub current_score: Grade,
    pub best_score: Grade,
    pub improvement_rate: f64,
    pub sessions_measured: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInsight {
    pub summary: String,
}

/// Exactly one payload kind per STM record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StmPayload {
    SpeechPattern(SpeechPattern),
    Improvement(ImprovementProgress),
    SessionInsight(SessionInsight),
}

/// Session-scoped observation with expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermMemory {
    pub id: String,
    pub user_id: String,
    pub memory_type: MemoryType,
    pub payload: StmPayload,
    pub importance: Importance,
    pub mention_count: u32,
    pub ttl_days: u32,
    /// `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub source_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShortTermMemory {
    pub fn new(
        user_id: impl Into<String>,
        memory_type: MemoryType,
        payload: StmPayload,
        importance: Importance,
        ttl_days: Option<u32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            memory_type,
            payload,
            importance,
            mention_count: 1,
            ttl_days: ttl_days.unwrap_or(0),
            expires_at: ttl_days.map(|d| now + Duration::days(i64::from(d))),
            source_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_source_session(mut self, session_id: impl Into<String>) -> Self {
        self.source_session_id = Some(session_id.into());
        self
    }

    /// Secondary identity within a memory type
    pub fn sub_key(&self) -> &str {
        match (&self.memory_type, &self.payload) {
            (MemoryType::SpeechPattern, StmPayload::SpeechPattern(p)) => &p.pattern_type,
            (MemoryType::ImprovementProgress, StmPayload::Improvement(i)) => &i.category,
            _ => "",
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }

    pub fn speech_pattern(&self) -> Option<&SpeechPattern> {
        match &self.payload {
            StmPayload::SpeechPattern(p) => Some(p),
            _ => None,
        }
    }

    pub fn improvement(&self) -> Option<&ImprovementProgress> {
        match &self.payload {
            StmPayload::Improvement(i) => Some(i),
            _ => None,
        }
    }
}

// =============================================================================
// Score history
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub scores: Scores,
    pub metrics: Option<AnalysisMetrics>,
}
