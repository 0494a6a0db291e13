//! Integration tests for the coaching pipeline
//!
//! Run with: cargo test -p speech-coach-pipeline --test pipeline_integration

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use speech_coach_core::{
    Error, ErrorCode, GenerateRequest, GenerateResponse, Grade, LanguageModel, MemoryStore,
    Result, ScoreCategory, SessionMode, SpeechSynthesizer, Transcriber, Transcription,
    VoiceSelection,
};
use speech_coach_llm::prompt::{
    ANALYSIS_SYSTEM_PROMPT, IMPROVEMENT_SYSTEM_PROMPT, REFINEMENT_SYSTEM_PROMPT,
    REFLECTION_SYSTEM_PROMPT,
};
use speech_coach_memory::InMemoryMemoryStore;
use speech_coach_pipeline::{
    CoachingPipeline, PipelineConfig, PipelineEvent, RefinementRequest, SessionRequest, Stage,
    DEFAULT_FEMALE_VOICE, DEFAULT_MALE_VOICE,
};

// =============================================================================
// Mocks
// =============================================================================

const ANALYSIS_RESPONSE: &str = r#"분석 결과입니다.
{
    "scores": {
        "logic_structure": "B+",
        "filler_words": "A",
        "speaking_pace": "A",
        "confidence_tone": "B",
        "content_specificity": "C+"
    },
    "suggestions": [
        {"priority": 1, "category": "구체성", "suggestion": "성과를 수치로 표현하세요", "impact": "설득력 향상"},
        {"priority": 2, "category": "구조", "suggestion": "결과를 먼저 말하세요"}
    ],
    "structure_analysis": "상황과 행동은 명확하지만 결과가 약합니다."
}"#;

const IMPROVED_SCRIPT: &str =
    "저는 5년차 백엔드 개발자입니다. 결제 시스템 응답 시간을 40% 줄인 경험이 있습니다.";

const EXTRACTION_RESPONSE: &str = r#"{
    "should_save": true,
    "reasoning": "반복되는 패턴",
    "new_memories": [
        {"type": "speech_pattern", "subtype": "specificity", "content": "수치 표현 부족", "severity": "medium"}
    ]
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Analysis,
    Improvement,
    Reflection,
    Refinement,
    Extraction,
}

/// Routes on the system prompt and records every call
struct ScriptedModel {
    calls: Mutex<Vec<Call>>,
    reflection: String,
    fail_improvement: bool,
}

impl ScriptedModel {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reflection: r#"{"passes_review": true, "issues_found": [], "final_script": ""}"#
                .to_string(),
            fail_improvement: false,
        }
    }

    fn with_reflection(mut self, reflection: &str) -> Self {
        self.reflection = reflection.to_string();
        self
    }

    fn failing_improvement(mut self) -> Self {
        self.fail_improvement = true;
        self
    }

    fn count(&self, call: Call) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let call = match request.system.as_deref() {
            Some(ANALYSIS_SYSTEM_PROMPT) => Call::Analysis,
            Some(IMPROVEMENT_SYSTEM_PROMPT) => Call::Improvement,
            Some(REFLECTION_SYSTEM_PROMPT) => Call::Reflection,
            Some(REFINEMENT_SYSTEM_PROMPT) => Call::Refinement,
            _ => Call::Extraction,
        };
        self.calls.lock().push(call);

        let text = match call {
            Call::Analysis => ANALYSIS_RESPONSE.to_string(),
            Call::Improvement if self.fail_improvement => {
                return Err(Error::Llm("upstream overloaded".to_string()))
            }
            Call::Improvement => format!("다음은 개선된 스크립트입니다:\n\n{}", IMPROVED_SCRIPT),
            Call::Reflection => self.reflection.clone(),
            Call::Refinement => {
                "## 변경 사항\n더 자신감 있는 어조로 바꿨습니다.\n\n## 수정된 스크립트\n저는 결제 시스템을 책임지는 백엔드 개발자입니다."
                    .to_string()
            }
            Call::Extraction => EXTRACTION_RESPONSE.to_string(),
        };
        Ok(GenerateResponse::text(text))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct FixedTranscriber {
    text: String,
    duration_seconds: Option<f64>,
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: &[u8], _language_hint: &str) -> Result<Transcription> {
        Ok(Transcription::new(self.text.clone(), self.duration_seconds))
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

struct RecordingSynthesizer {
    voices: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingSynthesizer {
    fn new() -> Self {
        Self {
            voices: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            voices: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        if self.fail {
            return Err(Error::Synthesis("quota exceeded".to_string()));
        }
        self.voices.lock().push(voice_id.to_string());
        Ok(text.as_bytes().to_vec())
    }

    fn model_name(&self) -> &str {
        "recording"
    }
}

fn answer() -> String {
    format!("{}{}", "음 ".repeat(3), "단어 ".repeat(97))
}

fn pipeline(config: PipelineConfig, model: Arc<ScriptedModel>) -> CoachingPipeline {
    CoachingPipeline::new(config, model).with_synthesizer(Arc::new(RecordingSynthesizer::new()))
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_quick_guest_session() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::quick(), model.clone());

    let state = pipeline
        .run(SessionRequest::transcript(answer(), 40.0).with_question("자기소개 해주세요"))
        .await
        .unwrap();

    let analysis = state.analysis.as_ref().unwrap();
    assert_eq!(analysis.metrics.words_per_minute, 150);
    assert_eq!(analysis.metrics.filler_percentage, 3.0);
    assert_eq!(analysis.score(ScoreCategory::LogicStructure), Grade::BPlus);
    assert_eq!(analysis.score(ScoreCategory::ContentSpecificity), Grade::CPlus);
    assert_eq!(state.suggestions.len(), 2);
    assert_eq!(state.suggestions[0].priority, 1);

    assert_eq!(state.improved_script.as_deref(), Some(IMPROVED_SCRIPT));
    assert_eq!(state.improved_script_draft.as_deref(), Some(IMPROVED_SCRIPT));
    assert_eq!(state.voice_id.as_deref(), Some(DEFAULT_MALE_VOICE));
    assert!(state.improved_audio.is_some());

    assert_eq!(model.count(Call::Analysis), 1);
    assert_eq!(model.count(Call::Reflection), 0);
    assert_eq!(
        state.messages,
        vec![
            "게스트 모드 - Memory 없음",
            "AI 분석 완료",
            "1차 개선안 생성 완료",
            "음성 생성 완료 (default_male)",
            "게스트 모드 - Memory 저장 스킵",
        ]
    );
    assert_eq!(
        state.completed_stages,
        vec![
            Stage::LoadMemory,
            Stage::Analyze,
            Stage::Improve,
            Stage::Synthesize,
            Stage::ExtractMemory,
        ]
    );
}

#[tokio::test]
async fn test_severe_threat_aborts_before_analysis() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::deep(), model.clone());

    let failure = pipeline
        .run(SessionRequest::transcript("저는 회사를 테러 하겠다고 말했습니다", 30.0))
        .await
        .unwrap_err();

    assert_eq!(failure.code(), ErrorCode::ContentViolation);
    assert_eq!(model.count(Call::Analysis), 0);
    assert!(failure.state.has_completed(Stage::LoadMemory));
    assert!(failure.state.analysis.is_none());
}

#[tokio::test]
async fn test_moderation_flags_reach_analysis() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::deep(), model.clone());

    let state = pipeline
        .run(SessionRequest::transcript(
            "연락처는 010-1234-5678 입니다 저는 백엔드 개발자로 일했습니다",
            20.0,
        ))
        .await
        .unwrap();

    assert!(!state.moderation_flags.is_empty());
    assert!(!state.transcript.contains("010-1234-5678"));
    assert_eq!(
        state.analysis.as_ref().unwrap().moderation_flags,
        state.moderation_flags
    );
    assert_eq!(model.count(Call::Reflection), 1);
    assert!(state.reflection_notes.is_empty());
}

#[tokio::test]
async fn test_audio_input_is_transcribed() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::quick(), model).with_transcriber(Arc::new(
        FixedTranscriber {
            text: answer(),
            duration_seconds: Some(40.0),
        },
    ));

    let state = pipeline
        .run(SessionRequest::audio(vec![0u8; 16]).with_voice(VoiceSelection::default_female()))
        .await
        .unwrap();

    assert!(state.has_completed(Stage::Transcribe));
    assert_eq!(state.duration_seconds, 40.0);
    assert!(state.messages.iter().any(|m| m.starts_with("음성 인식 완료: ")));
    assert_eq!(state.voice_id.as_deref(), Some(DEFAULT_FEMALE_VOICE));
}

#[tokio::test]
async fn test_short_audio_is_rejected() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::quick(), model.clone()).with_transcriber(Arc::new(
        FixedTranscriber {
            text: "안녕하세요".to_string(),
            duration_seconds: Some(3.0),
        },
    ));

    let failure = pipeline.run(SessionRequest::audio(vec![0u8; 16])).await.unwrap_err();

    assert_eq!(failure.code(), ErrorCode::AudioTooShort);
    assert_eq!(model.count(Call::Analysis), 0);
}

#[tokio::test]
async fn test_blank_transcription_is_rejected() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::quick(), model).with_transcriber(Arc::new(
        FixedTranscriber {
            text: "   ".to_string(),
            duration_seconds: Some(12.0),
        },
    ));

    let failure = pipeline.run(SessionRequest::audio(vec![0u8; 16])).await.unwrap_err();
    assert_eq!(failure.code(), ErrorCode::SttNoSpeech);

    let failure = pipeline
        .run(SessionRequest::transcript("  \n ", 12.0))
        .await
        .unwrap_err();
    assert_eq!(failure.code(), ErrorCode::SttNoSpeech);
}

#[tokio::test]
async fn test_improvement_failure_is_fatal() {
    let model = Arc::new(ScriptedModel::new().failing_improvement());
    let pipeline = pipeline(PipelineConfig::quick(), model);

    let failure = pipeline
        .run(SessionRequest::transcript(answer(), 40.0))
        .await
        .unwrap_err();

    assert_eq!(failure.code(), ErrorCode::AnalysisFailed);
    assert!(failure.state.analysis.is_some());
    assert!(failure.state.improved_script.is_none());
}

#[tokio::test]
async fn test_synthesis_failure_keeps_partial_state() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = CoachingPipeline::new(PipelineConfig::quick(), model)
        .with_synthesizer(Arc::new(RecordingSynthesizer::failing()));

    let failure = pipeline
        .run(SessionRequest::transcript(answer(), 40.0))
        .await
        .unwrap_err();

    assert_eq!(failure.code(), ErrorCode::TtsFailed);
    assert!(failure.state.analysis.is_some());
    assert_eq!(failure.state.improved_script.as_deref(), Some(IMPROVED_SCRIPT));
    assert!(failure.state.improved_audio.is_none());
}

#[tokio::test]
async fn test_failed_review_replaces_draft() {
    let model = Arc::new(ScriptedModel::new().with_reflection(
        r#"{"passes_review": false, "issues_found": ["수치 과장"], "suggested_fixes": [], "final_script": "저는 결제 시스템 응답 시간을 줄였습니다."}"#,
    ));
    let pipeline = pipeline(PipelineConfig::deep(), model);

    let state = pipeline
        .run(SessionRequest::transcript(answer(), 40.0))
        .await
        .unwrap();

    assert_eq!(state.improved_script_draft.as_deref(), Some(IMPROVED_SCRIPT));
    assert_eq!(
        state.improved_script.as_deref(),
        Some("저는 결제 시스템 응답 시간을 줄였습니다.")
    );
    assert_eq!(state.reflection_notes, vec!["수치 과장"]);
}

#[tokio::test]
async fn test_guest_cannot_request_cloned_voice() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::quick(), model.clone());

    let failure = pipeline
        .run(SessionRequest::transcript(answer(), 40.0).with_voice(VoiceSelection::cloned("c1")))
        .await
        .unwrap_err();

    assert_eq!(failure.code(), ErrorCode::GuestRestricted);
    assert!(failure.state.completed_stages.is_empty());
    assert_eq!(model.count(Call::Analysis), 0);
}

#[tokio::test]
async fn test_guest_cannot_run_deep_mode() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::deep(), model.clone());

    let failure = pipeline
        .run(SessionRequest::transcript(answer(), 40.0).with_mode(SessionMode::Deep))
        .await
        .unwrap_err();

    assert_eq!(failure.code(), ErrorCode::GuestRestricted);
    assert!(failure.error.to_string().contains("deep_mode"));
    assert!(failure.state.completed_stages.is_empty());
    assert!(model.calls.lock().is_empty());

    let member = pipeline
        .run(
            SessionRequest::transcript(answer(), 40.0)
                .with_mode(SessionMode::Deep)
                .with_user("u1"),
        )
        .await
        .unwrap();
    assert!(member.has_completed(Stage::Reflect));
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_streaming_events() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = Arc::new(pipeline(PipelineConfig::quick(), model));
    let mut broadcast_rx = pipeline.subscribe();

    let mut stream = pipeline.run_streaming(SessionRequest::transcript(answer(), 40.0));

    let mut events = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(2), stream.events.next())
            .await
            .expect("event stream stalled")
            .expect("stream closed before completion");
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }

    assert!(matches!(
        events.first(),
        Some(PipelineEvent::StageStarted { stage: Stage::LoadMemory, .. })
    ));
    assert!(matches!(events.last(), Some(PipelineEvent::Completed { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::Progress { stage: Stage::Analyze, message, .. } if message == "AI 분석 완료"
    )));

    let state = stream.handle.await.unwrap().unwrap();
    assert!(events.iter().all(|e| e.session_id() == state.session_id));

    let first = timeout(Duration::from_millis(500), broadcast_rx.recv())
        .await
        .expect("broadcast stalled")
        .unwrap();
    assert_eq!(first, events[0]);
}

#[tokio::test]
async fn test_failure_event_carries_code() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = Arc::new(pipeline(PipelineConfig::deep(), model));

    let mut stream = pipeline.run_streaming(SessionRequest::transcript("폭발 시키겠습니다 진심입니다", 10.0));

    let mut failed = None;
    while let Ok(Some(event)) = timeout(Duration::from_secs(2), stream.events.next()).await {
        if let PipelineEvent::Failed { code, stage, .. } = &event {
            failed = Some((*code, *stage));
        }
    }

    assert_eq!(
        failed,
        Some((ErrorCode::ContentViolation, Some(Stage::Moderate)))
    );
    assert!(stream.handle.await.unwrap().is_err());
}

// =============================================================================
// Memory
// =============================================================================

#[tokio::test]
async fn test_member_sessions_persist_memory() {
    let model = Arc::new(ScriptedModel::new());
    let store = Arc::new(InMemoryMemoryStore::new());
    let pipeline = pipeline(PipelineConfig::quick(), model.clone()).with_memory_store(store.clone());

    let first = pipeline
        .run(SessionRequest::transcript(answer(), 40.0).with_user("u1"))
        .await
        .unwrap();
    assert!(first.messages.contains(&"LTM 새로 생성".to_string()));
    assert!(first.messages.contains(&"STM 0개 로드".to_string()));
    pipeline.flush_persistence().await;

    assert_eq!(model.count(Call::Extraction), 1);
    assert_eq!(store.load_stm("u1").await.unwrap().len(), 1);
    assert_eq!(store.load_score_history("u1").await.unwrap().len(), 1);

    let second = pipeline
        .run(SessionRequest::transcript(answer(), 40.0).with_user("u1"))
        .await
        .unwrap();
    assert!(second.messages.contains(&"LTM 캐시 사용".to_string()));
    assert!(second.messages.contains(&"STM 1개 로드".to_string()));
    assert!(second.memory_prompt.is_some());
    assert_eq!(second.score_history.len(), 2);
    pipeline.flush_persistence().await;

    let stm = store.load_stm("u1").await.unwrap();
    assert_eq!(stm.len(), 1);
    assert_eq!(stm[0].mention_count, 2);
    assert_eq!(store.load_score_history("u1").await.unwrap().len(), 2);
}

// =============================================================================
// Refinement
// =============================================================================

#[tokio::test]
async fn test_refinement_preview_then_final() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::quick(), model.clone());

    let mut state = pipeline
        .run(SessionRequest::transcript(answer(), 40.0).with_user("u1"))
        .await
        .unwrap();

    let preview = pipeline
        .refine(&mut state, RefinementRequest::preview("좀 더 자신감 있는 어조로 바꿔주세요"))
        .await
        .unwrap();
    assert_eq!(preview.changes_summary, "더 자신감 있는 어조로 바꿨습니다.");
    assert!(preview.audio.is_none());
    assert_eq!(state.refinement.count, 0);
    assert_eq!(state.improved_script.as_deref(), Some(IMPROVED_SCRIPT));
    let pending = state.pending_refinement.clone().unwrap();
    assert_eq!(pending.refined_script, preview.refined_script);

    let result = pipeline
        .refine(&mut state, RefinementRequest::finalize("좀 더 자신감 있는 어조로 바꿔주세요"))
        .await
        .unwrap();
    assert!(result.finalized);
    assert_eq!(result.refinements_used, 1);
    assert!(result.audio.is_some());
    assert_eq!(
        state.improved_script.as_deref(),
        Some("저는 결제 시스템을 책임지는 백엔드 개발자입니다.")
    );
    assert_eq!(result.refined_script, pending.refined_script);
    assert!(state.pending_refinement.is_none());
    // the previewed script is finalized without regenerating
    assert_eq!(model.count(Call::Refinement), 1);

    let again = pipeline
        .refine(&mut state, RefinementRequest::preview("조금만 더 짧게 줄여주실 수 있나요"))
        .await
        .unwrap_err();
    assert_eq!(again.code(), ErrorCode::RefinementLimitExceeded);
    assert_eq!(model.count(Call::Refinement), 1);
}

#[tokio::test]
async fn test_final_refinement_without_preview_regenerates() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::quick(), model.clone());

    let mut state = pipeline
        .run(SessionRequest::transcript(answer(), 40.0).with_user("u1"))
        .await
        .unwrap();

    let result = pipeline
        .refine(&mut state, RefinementRequest::finalize("결론을 먼저 말하도록 바꿔주세요"))
        .await
        .unwrap();
    assert!(result.finalized);
    assert_eq!(model.count(Call::Refinement), 1);
    assert_eq!(
        state.improved_script.as_deref(),
        Some("저는 결제 시스템을 책임지는 백엔드 개발자입니다.")
    );
}

#[tokio::test]
async fn test_guest_refinement_is_preview_only() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::quick(), model.clone());

    let mut state = pipeline
        .run(SessionRequest::transcript(answer(), 40.0))
        .await
        .unwrap();

    let error = pipeline
        .refine(&mut state, RefinementRequest::finalize("좀 더 자신감 있는 어조로 바꿔주세요"))
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::GuestRestricted);
    assert_eq!(model.count(Call::Refinement), 0);
    assert!(!state.refinement.finalized);

    pipeline
        .refine(&mut state, RefinementRequest::preview("좀 더 자신감 있는 어조로 바꿔주세요"))
        .await
        .unwrap();
    assert_eq!(model.count(Call::Refinement), 1);
}

#[tokio::test]
async fn test_refinement_rejects_short_feedback() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(PipelineConfig::quick(), model.clone());

    let mut state = pipeline
        .run(SessionRequest::transcript(answer(), 40.0).with_mode(SessionMode::Quick))
        .await
        .unwrap();

    let error = pipeline
        .refine(&mut state, RefinementRequest::preview("짧게"))
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::RefinementInvalidFeedback);
    assert_eq!(model.count(Call::Refinement), 0);
}
