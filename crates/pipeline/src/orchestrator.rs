//! Coaching Pipeline Orchestrator
//!
//! Runs one session as a strict sequence of stages:
//!
//! ```text
//! LoadMemory → Transcribe (audio only) → Moderate? → Analyze → Improve
//!            → Reflect? → Synthesize → (background) ExtractMemory
//! ```
//!
//! Each stage returns a [`StageDelta`] that is applied before the next one
//! starts. Progress messages are broadcast to subscribers and, for
//! [`CoachingPipeline::run_streaming`], to a per-run stream.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use speech_coach_config::Settings;
use speech_coach_core::{
    AnalysisResult, Error, LanguageModel, LongTermMemory, MemoryStore, Result, ScoreHistoryEntry,
    SessionMode, SpeechSynthesizer, Transcriber, VoiceSelection, VoiceType,
};
use speech_coach_llm::{
    clean_script_output, prompt, AnalysisParser, ReflectionParser, RefinementOutcome,
    RefinementParser, ResponseParser,
};
use speech_coach_memory::{LtmCache, MemoryConfig, MemoryPromptContext};
use speech_coach_text_processing::{ModerationFilter, ToolReport};

use crate::events::{PipelineEvent, Stage};
use crate::metrics;
use crate::persistence::{ExtractionJob, PersistenceQueue};
use crate::refinement::{self, RefinementPolicy, RefinementRequest, RefinementResult, RefinementStage};
use crate::state::{PendingRefinement, SessionState, StageDelta};
use crate::PipelineFailure;

/// Adam
pub const DEFAULT_MALE_VOICE: &str = "pNInz6obpgDQGcFmaJgB";
/// Rachel
pub const DEFAULT_FEMALE_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

const EVENT_CHANNEL_CAPACITY: usize = 1000;
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run the moderation stage before analysis
    pub include_moderation: bool,
    /// Run a self-review pass over the first draft
    pub include_reflection: bool,
    /// Duration used when the transcriber reports none
    pub default_duration_seconds: f64,
    pub min_audio_seconds: f64,
    pub language_hint: String,
    pub default_male_voice: String,
    pub default_female_voice: String,
    pub memory: MemoryConfig,
    pub refinement: RefinementPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::quick()
    }
}

impl PipelineConfig {
    /// No moderation, no reflection
    pub fn quick() -> Self {
        Self {
            include_moderation: false,
            include_reflection: false,
            default_duration_seconds: 60.0,
            min_audio_seconds: 5.0,
            language_hint: "ko".to_string(),
            default_male_voice: DEFAULT_MALE_VOICE.to_string(),
            default_female_voice: DEFAULT_FEMALE_VOICE.to_string(),
            memory: MemoryConfig::default(),
            refinement: RefinementPolicy::default(),
        }
    }

    /// Moderation and reflection
    pub fn deep() -> Self {
        Self {
            include_moderation: true,
            include_reflection: true,
            ..Self::quick()
        }
    }

    pub fn for_mode(mode: SessionMode) -> Self {
        match mode {
            SessionMode::Quick => Self::quick(),
            SessionMode::Deep => Self::deep(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            include_moderation: settings.pipeline.include_moderation,
            include_reflection: settings.pipeline.include_reflection,
            default_duration_seconds: settings.pipeline.default_duration_seconds,
            min_audio_seconds: settings.pipeline.min_audio_seconds,
            language_hint: settings.pipeline.language_hint.clone(),
            default_male_voice: settings.voices.default_male.clone(),
            default_female_voice: settings.voices.default_female.clone(),
            memory: MemoryConfig {
                ltm_cache_hours: settings.memory.ltm_cache_hours,
                stm_cap: settings.memory.stm_cap,
                score_history_cap: settings.memory.score_history_cap,
                promotion_threshold: settings.memory.promotion_threshold,
                default_stm_ttl_days: settings.memory.default_stm_ttl_days,
            },
            refinement: RefinementPolicy {
                max_refinements: settings.refinement.max_refinements,
                min_feedback_chars: settings.refinement.min_feedback_chars,
                max_feedback_chars: settings.refinement.max_feedback_chars,
            },
        }
    }
}

/// Session input: raw audio or an already recognized transcript
#[derive(Debug, Clone)]
pub enum SessionInput {
    Audio { bytes: Vec<u8> },
    Transcript { text: String, duration_seconds: f64 },
}

/// One coaching session request
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub session_id: String,
    pub user_id: Option<String>,
    pub mode: SessionMode,
    /// Interview question being answered
    pub question: Option<String>,
    pub voice: VoiceSelection,
    pub input: SessionInput,
}

impl SessionRequest {
    fn new(input: SessionInput) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            mode: SessionMode::default(),
            question: None,
            voice: VoiceSelection::default(),
            input,
        }
    }

    pub fn audio(bytes: Vec<u8>) -> Self {
        Self::new(SessionInput::Audio { bytes })
    }

    pub fn transcript(text: impl Into<String>, duration_seconds: f64) -> Self {
        Self::new(SessionInput::Transcript {
            text: text.into(),
            duration_seconds,
        })
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    pub fn with_voice(mut self, voice: VoiceSelection) -> Self {
        self.voice = voice;
        self
    }
}

/// Per-run event stream plus the handle resolving to the final state
pub struct SessionStream {
    pub events: ReceiverStream<PipelineEvent>,
    pub handle: JoinHandle<std::result::Result<SessionState, PipelineFailure>>,
}

/// Coaching pipeline
pub struct CoachingPipeline {
    config: PipelineConfig,
    llm: Arc<dyn LanguageModel>,
    transcriber: Option<Arc<dyn Transcriber>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    store: Option<Arc<dyn MemoryStore>>,
    cache: LtmCache,
    moderation: ModerationFilter,
    persistence: OnceCell<PersistenceQueue>,
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl CoachingPipeline {
    pub fn new(config: PipelineConfig, llm: Arc<dyn LanguageModel>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cache = LtmCache::new(config.memory.ltm_cache_hours);

        Self {
            config,
            llm,
            transcriber: None,
            synthesizer: None,
            store: None,
            cache,
            moderation: ModerationFilter::default(),
            persistence: OnceCell::new(),
            event_tx,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_memory_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an LTM cache with other pipelines
    pub fn with_cache(mut self, cache: LtmCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_moderation_filter(mut self, filter: ModerationFilter) -> Self {
        self.moderation = filter;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &LtmCache {
        &self.cache
    }

    /// Subscribe to events from every session run by this pipeline
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }

    /// Wait for queued memory extraction to land
    pub async fn flush_persistence(&self) {
        if let Some(queue) = self.persistence.get() {
            queue.flush().await;
        }
    }

    /// Run a full session
    pub async fn run(
        &self,
        request: SessionRequest,
    ) -> std::result::Result<SessionState, PipelineFailure> {
        self.execute(request, None).await
    }

    /// Run a session on a background task, streaming its events
    pub fn run_streaming(self: &Arc<Self>, request: SessionRequest) -> SessionStream {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(async move { pipeline.execute(request, Some(tx)).await });

        SessionStream {
            events: ReceiverStream::new(rx),
            handle,
        }
    }

    /// Revise the improved script toward the user's intent
    ///
    /// Policy rejections are returned before anything runs. A preview only
    /// records itself as pending; a final refinement finalizes the pending
    /// preview when there is one (regenerating otherwise), replaces the improved
    /// script and audio and closes the refinement loop.
    pub async fn refine(
        &self,
        state: &mut SessionState,
        request: RefinementRequest,
    ) -> Result<RefinementResult> {
        self.config.refinement.check(state, &request)?;

        let current = state
            .improved_script
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::InvalidState("no improved script to refine".to_string()))?;

        let session_id = state.session_id.clone();
        let sink = None;
        self.emit(sink, PipelineEvent::StageStarted {
            session_id: session_id.clone(),
            stage: Stage::Refine,
        })
        .await;
        let started = Instant::now();

        let pending = match request.stage {
            RefinementStage::Final => state.pending_refinement.clone(),
            RefinementStage::Preview => None,
        };
        let outcome = match pending {
            Some(pending) => {
                tracing::debug!(
                    session_id = %session_id,
                    user_intent = %pending.user_intent,
                    "Finalizing previewed refinement"
                );
                RefinementOutcome {
                    changes_summary: pending.changes_summary,
                    refined_script: pending.refined_script,
                }
            }
            None => match self.regenerate(&current, &request.user_intent, state).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.fail(sink, &session_id, Some(Stage::Refine), &e).await;
                    return Err(e);
                }
            },
        };

        let mut delta = StageDelta::new().message("개선안 수정 완료");
        let mut result = RefinementResult {
            stage: request.stage,
            changes_summary: outcome.changes_summary,
            refined_script: outcome.refined_script,
            audio: None,
            voice_id: None,
            refinements_used: state.refinement.count,
            finalized: state.refinement.finalized,
        };

        if request.stage == RefinementStage::Preview {
            state.pending_refinement = Some(PendingRefinement {
                user_intent: request.user_intent.clone(),
                changes_summary: result.changes_summary.clone(),
                refined_script: result.refined_script.clone(),
            });
        }

        if request.stage == RefinementStage::Final {
            let voice = request.voice.clone().unwrap_or_else(|| state.voice.clone());
            let voice_id = self.resolve_voice(&voice);

            if let Some(synthesizer) = &self.synthesizer {
                if !result.refined_script.trim().is_empty() {
                    let audio = match synthesize(synthesizer, &result.refined_script, &voice_id).await {
                        Ok(audio) => audio,
                        Err(e) => {
                            self.fail(sink, &session_id, Some(Stage::Refine), &e).await;
                            return Err(e);
                        }
                    };
                    delta.push_message(format!("음성 생성 완료 ({})", voice.voice_type.as_str()));
                    delta.improved_audio = Some(audio.clone());
                    result.audio = Some(audio);
                }
            }

            delta.improved_script = Some(result.refined_script.clone());
            delta.voice_id = Some(voice_id.clone());
            result.voice_id = Some(voice_id);

            state.refinement.count += 1;
            state.refinement.finalized = true;
            state.pending_refinement = None;
            result.refinements_used = state.refinement.count;
            result.finalized = true;
        }

        metrics::record_refinement(request.stage == RefinementStage::Final);
        self.finish_stage(sink, state, Stage::Refine, delta, started).await;

        tracing::info!(
            session_id = %session_id,
            stage = ?request.stage,
            refinements_used = result.refinements_used,
            "Refinement completed"
        );
        Ok(result)
    }

    // =========================================================================
    // Session execution
    // =========================================================================

    async fn execute(
        &self,
        request: SessionRequest,
        sink: Option<mpsc::Sender<PipelineEvent>>,
    ) -> std::result::Result<SessionState, PipelineFailure> {
        let sink = sink.as_ref();
        let SessionRequest {
            session_id,
            user_id,
            mode,
            question,
            voice,
            input,
        } = request;

        metrics::record_session(mode);
        let mut state = SessionState::new(session_id, user_id, mode, question, voice);
        tracing::info!(
            session_id = %state.session_id,
            guest = state.is_guest(),
            mode = ?mode,
            "Session started"
        );

        let admitted = refinement::check_mode(state.is_guest(), mode)
            .and_then(|_| refinement::check_voice(state.is_guest(), &state.voice));
        if let Err(rejection) = admitted {
            let error = Error::from(rejection);
            self.fail(sink, &state.session_id, None, &error).await;
            return Err(PipelineFailure::new(error, state));
        }

        let audio = match input {
            SessionInput::Audio { bytes } => Some(bytes),
            SessionInput::Transcript {
                text,
                duration_seconds,
            } => {
                if text.trim().is_empty() {
                    let error = Error::EmptyTranscript;
                    self.fail(sink, &state.session_id, None, &error).await;
                    return Err(PipelineFailure::new(error, state));
                }
                let duration = if duration_seconds > 0.0 {
                    duration_seconds
                } else {
                    self.config.default_duration_seconds
                };
                state.transcript = text;
                state.duration_seconds = duration;
                None
            }
        };

        for stage in self.plan(audio.is_some()) {
            self.emit(sink, PipelineEvent::StageStarted {
                session_id: state.session_id.clone(),
                stage,
            })
            .await;
            let started = Instant::now();

            match self.run_stage(stage, &state, audio.as_deref()).await {
                Ok(delta) => self.finish_stage(sink, &mut state, stage, delta, started).await,
                Err(error) => {
                    self.fail(sink, &state.session_id, Some(stage), &error).await;
                    return Err(PipelineFailure::new(error, state));
                }
            }
        }

        self.schedule_extraction(sink, &mut state).await;

        self.emit(sink, PipelineEvent::Completed {
            session_id: state.session_id.clone(),
        })
        .await;
        tracing::info!(
            session_id = %state.session_id,
            stages = state.completed_stages.len(),
            "Session completed"
        );
        Ok(state)
    }

    fn plan(&self, has_audio: bool) -> Vec<Stage> {
        let mut stages = vec![Stage::LoadMemory];
        if has_audio {
            stages.push(Stage::Transcribe);
        }
        if self.config.include_moderation {
            stages.push(Stage::Moderate);
        }
        stages.push(Stage::Analyze);
        stages.push(Stage::Improve);
        if self.config.include_reflection {
            stages.push(Stage::Reflect);
        }
        stages.push(Stage::Synthesize);
        stages
    }

    async fn run_stage(
        &self,
        stage: Stage,
        state: &SessionState,
        audio: Option<&[u8]>,
    ) -> Result<StageDelta> {
        match stage {
            Stage::LoadMemory => Ok(self.load_memory(state).await),
            Stage::Transcribe => self.transcribe(audio.unwrap_or_default()).await,
            Stage::Moderate => self.moderate(state),
            Stage::Analyze => Ok(self.analyze(state).await),
            Stage::Improve => self.improve(state).await,
            Stage::Reflect => Ok(self.reflect(state).await),
            Stage::Synthesize => self.synthesize(state).await,
            Stage::ExtractMemory | Stage::Refine => Err(Error::InvalidState(format!(
                "{} is not a session stage",
                stage
            ))),
        }
    }

    async fn finish_stage(
        &self,
        sink: Option<&mpsc::Sender<PipelineEvent>>,
        state: &mut SessionState,
        stage: Stage,
        delta: StageDelta,
        started: Instant,
    ) {
        for message in &delta.messages {
            self.emit(sink, PipelineEvent::Progress {
                session_id: state.session_id.clone(),
                stage,
                message: message.clone(),
            })
            .await;
        }
        state.apply(stage, delta);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            session_id = %state.session_id,
            stage = ?stage,
            elapsed_ms,
            "Stage completed"
        );
        self.emit(sink, PipelineEvent::StageCompleted {
            session_id: state.session_id.clone(),
            stage,
            elapsed_ms,
        })
        .await;
    }

    async fn fail(
        &self,
        sink: Option<&mpsc::Sender<PipelineEvent>>,
        session_id: &str,
        stage: Option<Stage>,
        error: &Error,
    ) {
        let code = error.code();
        metrics::record_stage_failure(stage, code);
        tracing::warn!(
            session_id = %session_id,
            stage = ?stage,
            code = %code,
            error = %error,
            "Session failed"
        );
        self.emit(sink, PipelineEvent::Failed {
            session_id: session_id.to_string(),
            stage,
            code,
            message: code.message().to_string(),
        })
        .await;
    }

    async fn emit(&self, sink: Option<&mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
        if let Some(sink) = sink {
            let _ = sink.send(event.clone()).await;
        }
        let _ = self.event_tx.send(event);
    }

    // =========================================================================
    // Stages
    // =========================================================================

    async fn load_memory(&self, state: &SessionState) -> StageDelta {
        let Some(user_id) = state.user_id.as_deref() else {
            return StageDelta::new().message("게스트 모드 - Memory 없음");
        };
        let mut delta = StageDelta::new();

        let ltm = match self.cache.get_fresh(user_id) {
            Some(ltm) => {
                delta.push_message("LTM 캐시 사용");
                Some(ltm)
            }
            None => match self.load_ltm(user_id).await {
                Ok(Some(ltm)) => {
                    delta.push_message("LTM 로드 완료");
                    self.cache.put(ltm.clone());
                    Some(ltm)
                }
                Ok(None) => {
                    delta.push_message("LTM 새로 생성");
                    let ltm = LongTermMemory::new(user_id);
                    self.cache.put(ltm.clone());
                    Some(ltm)
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "LTM load failed, continuing without");
                    None
                }
            },
        };

        let (stm, history) = match &self.store {
            Some(store) => {
                let stm = store.load_stm(user_id).await.unwrap_or_else(|e| {
                    tracing::warn!(user_id = %user_id, error = %e, "STM load failed, continuing without");
                    Vec::new()
                });
                let history = store.load_score_history(user_id).await.unwrap_or_else(|e| {
                    tracing::warn!(user_id = %user_id, error = %e, "Score history load failed");
                    Vec::new()
                });
                (stm, history)
            }
            None => (Vec::new(), Vec::new()),
        };
        delta.push_message(format!("STM {}개 로드", stm.len()));

        let context = MemoryPromptContext::build(ltm.as_ref(), &stm);
        if !context.is_empty() {
            delta.memory_prompt = Some(context.render());
            delta.push_message("Memory 프롬프트 생성 완료");
        }

        delta.long_term_memory = ltm;
        delta.loaded_memories = Some(stm);
        delta.score_history = history;
        delta
    }

    async fn load_ltm(&self, user_id: &str) -> Result<Option<LongTermMemory>> {
        match &self.store {
            Some(store) => store.load_ltm(user_id).await,
            None => Ok(None),
        }
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<StageDelta> {
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or_else(|| Error::Transcription("no transcriber configured".to_string()))?;

        let transcription = transcriber
            .transcribe(audio, &self.config.language_hint)
            .await
            .map_err(|e| match e {
                Error::AudioTooShort(_) | Error::EmptyTranscript | Error::Transcription(_) => e,
                other => Error::Transcription(other.to_string()),
            })?;

        if let Some(duration) = transcription.duration_seconds {
            if duration < self.config.min_audio_seconds {
                return Err(Error::AudioTooShort(duration));
            }
        }

        let text = transcription.text.trim().to_string();
        if text.is_empty() {
            return Err(Error::EmptyTranscript);
        }

        let duration = transcription
            .duration_seconds
            .unwrap_or(self.config.default_duration_seconds);
        let message = format!("음성 인식 완료: {}자", text.chars().count());
        Ok(StageDelta::new()
            .with_transcript(text, duration)
            .message(message))
    }

    fn moderate(&self, state: &SessionState) -> Result<StageDelta> {
        let outcome = self.moderation.check(&state.transcript)?;
        let mut delta = StageDelta::new().message(outcome.message);
        delta.transcript = Some(outcome.text);
        delta.moderation_flags = Some(outcome.flags);
        Ok(delta)
    }

    async fn analyze(&self, state: &SessionState) -> StageDelta {
        let report = ToolReport::run(&state.transcript, state.duration_seconds);
        let metrics = report.metrics();
        let request =
            prompt::analysis_request(&state.transcript, &report, state.memory_prompt.as_deref());

        let (analysis, progressive_note) = match self.llm.generate(request).await {
            Ok(response) => match AnalysisParser.parse(&response.text) {
                Ok(parsed) => (
                    AnalysisResult {
                        scores: parsed.scores,
                        metrics,
                        suggestions: parsed.suggestions,
                        structure_analysis: parsed.structure_analysis,
                        moderation_flags: Vec::new(),
                    },
                    parsed.progressive_note,
                ),
                Err(e) => {
                    tracing::warn!(session_id = %state.session_id, error = %e, "Analysis unparseable, using defaults");
                    let fallback = AnalysisParser.fallback(&response.text);
                    (
                        AnalysisResult::fallback(metrics, fallback.structure_analysis),
                        None,
                    )
                }
            },
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "Analysis request failed, using defaults");
                (AnalysisResult::fallback(metrics, String::new()), None)
            }
        };
        let analysis = analysis.with_moderation_flags(state.moderation_flags.clone());

        let entry = ScoreHistoryEntry {
            session_id: state.session_id.clone(),
            timestamp: chrono::Utc::now(),
            scores: analysis.scores.clone(),
            metrics: Some(analysis.metrics.clone()),
        };

        StageDelta {
            tool_report: Some(report),
            suggestions: analysis.suggestions.clone(),
            score_history: vec![entry],
            progressive_note,
            ..StageDelta::new().with_analysis(analysis)
        }
        .message("AI 분석 완료")
    }

    async fn improve(&self, state: &SessionState) -> Result<StageDelta> {
        let analysis = state
            .analysis
            .as_ref()
            .ok_or_else(|| Error::InvalidState("improvement requires an analysis".to_string()))?;

        let request =
            prompt::improvement_request(&state.transcript, analysis, state.question.as_deref());
        let response = self.llm.generate(request).await?;
        let draft = clean_script_output(&response.text);

        Ok(StageDelta {
            improved_script_draft: Some(draft.clone()),
            ..StageDelta::new().with_improved_script(draft)
        }
        .message("1차 개선안 생성 완료"))
    }

    async fn reflect(&self, state: &SessionState) -> StageDelta {
        let draft = state.improved_script_draft.clone().unwrap_or_default();
        let delta = StageDelta::new().message("개선안 품질 검토 완료");

        let Some(analysis) = state.analysis.as_ref() else {
            return delta;
        };

        let request = prompt::reflection_request(&state.transcript, &draft, analysis);
        let outcome = match self.llm.generate(request).await {
            Ok(response) => ReflectionParser.parse_or_fallback(&response.text),
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "Reflection failed, keeping draft");
                return delta;
            }
        };

        if outcome.passes_review || outcome.final_script.trim().is_empty() {
            return StageDelta {
                reflection_notes: Some(if outcome.passes_review {
                    Vec::new()
                } else {
                    outcome.issues_found
                }),
                ..delta
            };
        }

        StageDelta {
            reflection_notes: Some(outcome.issues_found),
            ..delta.with_improved_script(clean_script_output(&outcome.final_script))
        }
    }

    async fn synthesize(&self, state: &SessionState) -> Result<StageDelta> {
        let script = state.improved_script.as_deref().unwrap_or_default();
        let Some(synthesizer) = self.synthesizer.as_ref() else {
            tracing::debug!(session_id = %state.session_id, "No synthesizer configured");
            return Ok(StageDelta::new().message("음성 생성 스킵"));
        };
        if script.trim().is_empty() {
            return Ok(StageDelta::new().message("음성 생성 스킵"));
        }

        let voice_id = self.resolve_voice(&state.voice);
        let audio = synthesize(synthesizer, script, &voice_id).await?;

        Ok(StageDelta {
            improved_audio: Some(audio),
            voice_id: Some(voice_id),
            ..StageDelta::new()
        }
        .message(format!("음성 생성 완료 ({})", state.voice.voice_type.as_str())))
    }

    async fn schedule_extraction(
        &self,
        sink: Option<&mpsc::Sender<PipelineEvent>>,
        state: &mut SessionState,
    ) {
        let started = Instant::now();
        self.emit(sink, PipelineEvent::StageStarted {
            session_id: state.session_id.clone(),
            stage: Stage::ExtractMemory,
        })
        .await;

        let Some(user_id) = state.user_id.clone() else {
            let delta = StageDelta::new().message("게스트 모드 - Memory 저장 스킵");
            self.finish_stage(sink, state, Stage::ExtractMemory, delta, started)
                .await;
            return;
        };

        match (self.store.as_ref(), state.analysis.clone()) {
            (Some(store), Some(analysis)) => {
                let queue = self.persistence.get_or_init(|| {
                    PersistenceQueue::spawn(
                        Arc::clone(&self.llm),
                        Arc::clone(store),
                        self.cache.clone(),
                        self.config.memory.clone(),
                    )
                });

                let score_entry = state
                    .score_history
                    .iter()
                    .find(|entry| entry.session_id == state.session_id)
                    .cloned();

                queue
                    .enqueue(ExtractionJob {
                        user_id,
                        session_id: state.session_id.clone(),
                        transcript: state.transcript.clone(),
                        analysis,
                        score_entry,
                        long_term_memory: state.long_term_memory.clone(),
                    })
                    .await;
            }
            _ => {
                tracing::debug!(session_id = %state.session_id, "No memory store, extraction skipped");
            }
        }

        self.finish_stage(sink, state, Stage::ExtractMemory, StageDelta::new(), started)
            .await;
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Cloned voices use their clone id; everything else a configured default
    pub fn resolve_voice(&self, voice: &VoiceSelection) -> String {
        match (voice.voice_type, voice.clone_id.as_deref()) {
            (VoiceType::Cloned, Some(clone_id)) if !clone_id.is_empty() => clone_id.to_string(),
            (VoiceType::DefaultFemale, _) => self.config.default_female_voice.clone(),
            _ => self.config.default_male_voice.clone(),
        }
    }

    async fn regenerate(
        &self,
        current: &str,
        user_intent: &str,
        state: &SessionState,
    ) -> Result<RefinementOutcome> {
        let request = prompt::refinement_request(current, user_intent, state.analysis.as_ref());
        let response = self.llm.generate(request).await?;
        Ok(RefinementParser.parse_or_fallback(&response.text))
    }
}

async fn synthesize(
    synthesizer: &Arc<dyn SpeechSynthesizer>,
    script: &str,
    voice_id: &str,
) -> Result<Vec<u8>> {
    synthesizer
        .synthesize(script, voice_id)
        .await
        .map_err(|e| match e {
            Error::Synthesis(_) => e,
            other => Error::Synthesis(other.to_string()),
        })
}
