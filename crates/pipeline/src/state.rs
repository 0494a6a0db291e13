//! Session state and stage deltas
//!
//! Stages never mutate [`SessionState`] directly. Each returns a [`StageDelta`]
//! which the orchestrator folds in with per-field reducers:
//!
//! | Field | Reducer |
//! |---|---|
//! | messages | append |
//! | short-term memories | `merge_stm` (a loaded snapshot replaces first) |
//! | suggestions | `dedupe_suggestions` |
//! | score history | `merge_score_history` |
//! | everything else | replace when present |

use serde::Serialize;
use std::mem;

use speech_coach_core::{
    AnalysisResult, LongTermMemory, ScoreHistoryEntry, SessionMode, ShortTermMemory, Suggestion,
    VoiceSelection,
};
use speech_coach_memory::{dedupe_suggestions, merge_score_history, merge_stm};
use speech_coach_text_processing::ToolReport;

use crate::events::Stage;

/// Refinement counter for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefinementState {
    pub count: u8,
    pub finalized: bool,
}

/// Preview waiting to be finalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRefinement {
    pub user_intent: String,
    pub changes_summary: String,
    pub refined_script: String,
}

/// Working record of one coaching session
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub session_id: String,
    /// `None` for guests
    pub user_id: Option<String>,
    pub mode: SessionMode,
    pub question: Option<String>,
    pub voice: VoiceSelection,

    pub transcript: String,
    pub duration_seconds: f64,
    pub moderation_flags: Vec<String>,
    pub tool_report: Option<ToolReport>,
    pub analysis: Option<AnalysisResult>,
    pub progressive_note: Option<String>,

    pub improved_script_draft: Option<String>,
    pub improved_script: Option<String>,
    pub reflection_notes: Vec<String>,
    #[serde(skip)]
    pub improved_audio: Option<Vec<u8>>,
    pub voice_id: Option<String>,

    pub long_term_memory: Option<LongTermMemory>,
    pub short_term_memories: Vec<ShortTermMemory>,
    pub memory_prompt: Option<String>,
    pub suggestions: Vec<Suggestion>,
    pub score_history: Vec<ScoreHistoryEntry>,

    pub messages: Vec<String>,
    pub completed_stages: Vec<Stage>,
    pub refinement: RefinementState,
    pub pending_refinement: Option<PendingRefinement>,
}

impl SessionState {
    pub fn new(
        session_id: impl Into<String>,
        user_id: Option<String>,
        mode: SessionMode,
        question: Option<String>,
        voice: VoiceSelection,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            mode,
            question,
            voice,
            transcript: String::new(),
            duration_seconds: 0.0,
            moderation_flags: Vec::new(),
            tool_report: None,
            analysis: None,
            progressive_note: None,
            improved_script_draft: None,
            improved_script: None,
            reflection_notes: Vec::new(),
            improved_audio: None,
            voice_id: None,
            long_term_memory: None,
            short_term_memories: Vec::new(),
            memory_prompt: None,
            suggestions: Vec::new(),
            score_history: Vec::new(),
            messages: Vec::new(),
            completed_stages: Vec::new(),
            refinement: RefinementState::default(),
            pending_refinement: None,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn has_completed(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Fold a stage's delta into the state
    pub fn apply(&mut self, stage: Stage, delta: StageDelta) {
        let StageDelta {
            transcript,
            duration_seconds,
            moderation_flags,
            tool_report,
            analysis,
            progressive_note,
            improved_script_draft,
            improved_script,
            reflection_notes,
            improved_audio,
            voice_id,
            long_term_memory,
            loaded_memories,
            short_term_memories,
            memory_prompt,
            suggestions,
            score_history,
            messages,
        } = delta;

        replace(&mut self.transcript, transcript);
        replace(&mut self.duration_seconds, duration_seconds);
        replace(&mut self.moderation_flags, moderation_flags);
        replace_some(&mut self.tool_report, tool_report);
        replace_some(&mut self.analysis, analysis);
        replace_some(&mut self.progressive_note, progressive_note);
        replace_some(&mut self.improved_script_draft, improved_script_draft);
        replace_some(&mut self.improved_script, improved_script);
        replace(&mut self.reflection_notes, reflection_notes);
        replace_some(&mut self.improved_audio, improved_audio);
        replace_some(&mut self.voice_id, voice_id);
        replace_some(&mut self.long_term_memory, long_term_memory);
        replace_some(&mut self.memory_prompt, memory_prompt);

        // snapshot from storage keeps its mention counts
        replace(&mut self.short_term_memories, loaded_memories);
        if !short_term_memories.is_empty() {
            let existing = mem::take(&mut self.short_term_memories);
            self.short_term_memories = merge_stm(existing, short_term_memories);
        }

        if !suggestions.is_empty() {
            let existing = mem::take(&mut self.suggestions);
            self.suggestions = dedupe_suggestions(existing, suggestions);
        }

        if !score_history.is_empty() {
            let existing = mem::take(&mut self.score_history);
            self.score_history = merge_score_history(existing, score_history);
        }

        self.messages.extend(messages);
        self.completed_stages.push(stage);
    }
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn replace_some<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Partial update produced by one stage
#[derive(Debug, Default)]
pub struct StageDelta {
    pub transcript: Option<String>,
    pub duration_seconds: Option<f64>,
    pub moderation_flags: Option<Vec<String>>,
    pub tool_report: Option<ToolReport>,
    pub analysis: Option<AnalysisResult>,
    pub progressive_note: Option<String>,
    pub improved_script_draft: Option<String>,
    pub improved_script: Option<String>,
    pub reflection_notes: Option<Vec<String>>,
    pub improved_audio: Option<Vec<u8>>,
    pub voice_id: Option<String>,
    pub long_term_memory: Option<LongTermMemory>,
    /// Replaces the session's STM list wholesale
    pub loaded_memories: Option<Vec<ShortTermMemory>>,
    /// Merged into the session's STM list
    pub short_term_memories: Vec<ShortTermMemory>,
    pub memory_prompt: Option<String>,
    pub suggestions: Vec<Suggestion>,
    pub score_history: Vec<ScoreHistoryEntry>,
    pub messages: Vec<String>,
}

impl StageDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>, duration_seconds: f64) -> Self {
        self.transcript = Some(transcript.into());
        self.duration_seconds = Some(duration_seconds);
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisResult) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_improved_script(mut self, script: impl Into<String>) -> Self {
        self.improved_script = Some(script.into());
        self
    }

    pub fn with_memories(mut self, memories: Vec<ShortTermMemory>) -> Self {
        self.short_term_memories = memories;
        self
    }
}
