//! Background memory extraction
//!
//! After a session completes, its transcript and analysis are handed to a
//! single worker task. The worker asks the model which observations to keep,
//! merges them into the stored STMs, promotes repeated patterns to LTM and
//! writes everything back. Failures are logged and never reach the caller.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use speech_coach_core::{
    AnalysisResult, LanguageModel, LongTermMemory, MemoryStore, Result, ScoreHistoryEntry,
    ShortTermMemory,
};
use speech_coach_llm::{prompt, ExtractedMemory, ExtractionParser, ExtractionResponse, ResponseParser};
use speech_coach_memory::{
    improvement_stm, merge_score_history, merge_stm_at, promote_to_ltm, session_insight_stm,
    should_promote, speech_pattern_stm, LtmCache, MemoryConfig,
};

const QUEUE_CAPACITY: usize = 256;

/// Everything the worker needs from a finished session
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub user_id: String,
    pub session_id: String,
    pub transcript: String,
    pub analysis: AnalysisResult,
    pub score_entry: Option<ScoreHistoryEntry>,
    /// LTM as seen by the session, used when the store has none
    pub long_term_memory: Option<LongTermMemory>,
}

/// What one job wrote
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub extracted: usize,
    pub promoted: Vec<String>,
    pub ltm_updated: bool,
    pub messages: Vec<String>,
}

enum Command {
    Extract(Box<ExtractionJob>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the extraction worker
#[derive(Clone)]
pub struct PersistenceQueue {
    tx: mpsc::Sender<Command>,
}

impl PersistenceQueue {
    /// Spawn the worker on the current Tokio runtime
    pub fn spawn(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn MemoryStore>,
        cache: LtmCache,
        config: MemoryConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker = ExtractionWorker {
            llm,
            store,
            cache,
            config,
        };
        tokio::spawn(worker.run(rx));
        Self { tx }
    }

    /// Queue a job without waiting for it
    pub async fn enqueue(&self, job: ExtractionJob) {
        let session_id = job.session_id.clone();
        if self.tx.send(Command::Extract(Box::new(job))).await.is_err() {
            tracing::warn!(session_id = %session_id, "Persistence worker stopped, job dropped");
        }
    }

    /// Wait until every job queued before this call has finished
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

struct ExtractionWorker {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn MemoryStore>,
    cache: LtmCache,
    config: MemoryConfig,
}

impl ExtractionWorker {
    async fn run(self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Extract(job) => match self.process(&job).await {
                    Ok(report) => {
                        for message in &report.messages {
                            tracing::info!(
                                user_id = %job.user_id,
                                session_id = %job.session_id,
                                "{}",
                                message
                            );
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            user_id = %job.user_id,
                            session_id = %job.session_id,
                            error = %e,
                            "Memory extraction failed"
                        );
                    }
                },
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        tracing::debug!("Persistence worker stopped");
    }

    async fn process(&self, job: &ExtractionJob) -> Result<ExtractionReport> {
        let mut report = ExtractionReport::default();
        let existing = self.store.load_stm(&job.user_id).await?;

        let extraction = self.extract(job, &existing).await;
        let incoming: Vec<ShortTermMemory> = extraction
            .new_memories
            .iter()
            .filter_map(|memory| self.build_stm(job, memory))
            .collect();

        report.extracted = incoming.len();
        if !incoming.is_empty() {
            report.messages.push(format!("STM {}개 추출", incoming.len()));
        }

        let merged = merge_stm_at(existing, incoming, Utc::now(), self.config.stm_cap);

        let mut ltm = match self.store.load_ltm(&job.user_id).await? {
            Some(ltm) => ltm,
            None => job
                .long_term_memory
                .clone()
                .unwrap_or_else(|| LongTermMemory::new(&job.user_id)),
        };
        let version_before = ltm.version;

        let threshold = self.config.promotion_threshold;
        for stm in merged.iter().filter(|stm| should_promote(stm, threshold)) {
            let Some(pattern) = stm.speech_pattern() else {
                continue;
            };
            report.promoted.push(pattern.pattern_type.clone());
            report
                .messages
                .push(format!("STM 승격: {}", pattern.pattern_type));
            ltm = promote_to_ltm(ltm, stm);
        }

        self.store.save_stm(&job.user_id, &merged).await?;

        if ltm.version != version_before {
            self.store.save_ltm(&job.user_id, &ltm).await?;
            report.ltm_updated = true;
            report.messages.push("LTM 업데이트 완료".to_string());
        }
        self.cache.put(ltm);

        if let Some(entry) = job.score_entry.clone() {
            let history = self.store.load_score_history(&job.user_id).await?;
            let history = merge_score_history(history, vec![entry]);
            self.store
                .save_score_history(&job.user_id, &history)
                .await?;
        }

        if report.messages.is_empty() {
            report.messages.push("Memory 추출 완료".to_string());
        }
        Ok(report)
    }

    async fn extract(&self, job: &ExtractionJob, existing: &[ShortTermMemory]) -> ExtractionResponse {
        let request = prompt::extraction_request(&job.transcript, &job.analysis, existing);
        match self.llm.generate(request).await {
            Ok(response) => ExtractionParser.parse_or_fallback(&response.text),
            Err(e) => {
                tracing::warn!(session_id = %job.session_id, error = %e, "Extraction request failed");
                ExtractionResponse::default()
            }
        }
    }

    fn build_stm(&self, job: &ExtractionJob, memory: &ExtractedMemory) -> Option<ShortTermMemory> {
        match memory {
            ExtractedMemory::SpeechPattern {
                subtype,
                content,
                numeric_value,
                ttl_days,
                ..
            } => Some(speech_pattern_stm(
                &job.user_id,
                &job.session_id,
                subtype,
                content,
                memory.severity(),
                *numeric_value,
                Some(ttl_days.unwrap_or(self.config.default_stm_ttl_days)),
            )),
            ExtractedMemory::ImprovementProgress { category, .. } => {
                let (initial, current) = memory.grades();
                Some(improvement_stm(
                    &job.user_id,
                    &job.session_id,
                    category,
                    initial,
                    current,
                ))
            }
            ExtractedMemory::SessionInsight { content } if !content.trim().is_empty() => Some(
                session_insight_stm(&job.user_id, &job.session_id, content),
            ),
            _ => None,
        }
    }
}
