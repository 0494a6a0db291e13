//! Speech coach command-line entry point
//!
//! ```text
//! speech-coach analyze <transcript-file> [duration-seconds]
//! speech-coach coach <transcript-file> [duration-seconds] [--deep] [--user <id>]
//! ```
//!
//! `analyze` runs the local analyzers and moderation only. `coach` runs the
//! full pipeline against Claude (`ANTHROPIC_API_KEY`) without speech synthesis.
//! Deep mode is for members only, so `--deep` needs `--user`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use speech_coach_config::{load_settings, LogFormat, Settings};
use speech_coach_core::SessionMode;
use speech_coach_llm::{ClaudeBackend, ClaudeConfig};
use speech_coach_memory::InMemoryMemoryStore;
use speech_coach_pipeline::{CoachingPipeline, PipelineConfig, SessionRequest};
use speech_coach_text_processing::{ModerationFilter, ToolReport};

const USAGE: &str = "usage: speech-coach <analyze|coach> <transcript-file> [duration-seconds] [--deep] [--user <id>]";

struct Args {
    command: String,
    path: String,
    duration_seconds: Option<f64>,
    deep: bool,
    user_id: Option<String>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let command = raw.next().context(USAGE)?;
    let path = raw.next().context(USAGE)?;
    let mut args = Args {
        command,
        path,
        duration_seconds: None,
        deep: false,
        user_id: None,
    };

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--deep" => args.deep = true,
            "--user" => args.user_id = Some(raw.next().context("--user needs a value")?),
            other => {
                let seconds: f64 = other
                    .parse()
                    .with_context(|| format!("invalid duration: {}", other))?;
                args.duration_seconds = Some(seconds);
            }
        }
    }

    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("SPEECH_COACH_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing is not initialized yet
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&settings);

    let args = parse_args(std::env::args().skip(1))?;
    let transcript = std::fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path))?;
    let duration_seconds = args
        .duration_seconds
        .unwrap_or(settings.pipeline.default_duration_seconds);

    tracing::info!(
        environment = ?settings.environment,
        command = %args.command,
        duration_seconds,
        "Starting speech coach"
    );

    match args.command.as_str() {
        "analyze" => analyze(&transcript, duration_seconds),
        "coach" => coach(&settings, &args, transcript, duration_seconds).await,
        other => bail!("unknown command: {}\n{}", other, USAGE),
    }
}

fn analyze(transcript: &str, duration_seconds: f64) -> anyhow::Result<()> {
    let moderation = ModerationFilter::default().check(transcript)?;
    let report = ToolReport::run(&moderation.text, duration_seconds);

    let output = serde_json::json!({
        "moderation": moderation,
        "metrics": report.metrics(),
        "report": report,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn coach(
    settings: &Settings,
    args: &Args,
    transcript: String,
    duration_seconds: f64,
) -> anyhow::Result<()> {
    let mut claude = ClaudeConfig::from_env()
        .with_model(&settings.llm.model)
        .with_max_tokens(settings.llm.max_tokens)
        .with_timeout(Duration::from_secs(settings.llm.timeout_secs))
        .with_endpoint(settings.llm.endpoint.clone());
    if let Some(temperature) = settings.llm.temperature {
        claude = claude.with_temperature(temperature);
    }
    let backend = ClaudeBackend::new(claude)?;

    let mode = if args.deep {
        SessionMode::Deep
    } else {
        SessionMode::Quick
    };
    let mut config = PipelineConfig::from_settings(settings);
    if args.deep {
        config.include_moderation = true;
        config.include_reflection = true;
    }

    let pipeline = CoachingPipeline::new(config, Arc::new(backend))
        .with_memory_store(Arc::new(InMemoryMemoryStore::new()));

    let mut request = SessionRequest::transcript(transcript, duration_seconds).with_mode(mode);
    if let Some(user_id) = &args.user_id {
        request = request.with_user(user_id.clone());
    }

    let result = pipeline.run(request).await;
    pipeline.flush_persistence().await;

    let state = match result {
        Ok(state) => state,
        Err(failure) => {
            tracing::error!(code = ?failure.code(), error = %failure.error, "Session failed");
            for message in &failure.state.messages {
                eprintln!("{}", message);
            }
            return Err(failure.into());
        }
    };

    for message in &state.messages {
        eprintln!("{}", message);
    }
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

/// Initialize tracing from `observability` settings; `RUST_LOG` wins when set
fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("speech_coach={},warn", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = match settings.observability.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    subscriber.with(fmt_layer).init();
}
