//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub memory: MemorySettings,

    #[serde(default)]
    pub refinement: RefinementSettings,

    /// Claude backend; the API key comes from `ANTHROPIC_API_KEY`
    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub voices: VoiceSettings,

    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_pipeline()?;
        self.validate_memory()?;
        self.validate_refinement()?;
        self.validate_llm()?;
        Ok(())
    }

    fn validate_pipeline(&self) -> Result<(), ConfigError> {
        if self.pipeline.min_audio_seconds <= 0.0 {
            return Err(invalid(
                "pipeline.min_audio_seconds",
                format!("Must be positive, got {}", self.pipeline.min_audio_seconds),
            ));
        }
        if self.pipeline.default_duration_seconds <= 0.0 {
            return Err(invalid(
                "pipeline.default_duration_seconds",
                format!(
                    "Must be positive, got {}",
                    self.pipeline.default_duration_seconds
                ),
            ));
        }
        Ok(())
    }

    fn validate_memory(&self) -> Result<(), ConfigError> {
        let memory = &self.memory;
        if memory.ltm_cache_hours <= 0 {
            return Err(invalid("memory.ltm_cache_hours", "Must be at least 1 hour"));
        }
        if memory.stm_cap == 0 {
            return Err(invalid("memory.stm_cap", "Must keep at least one STM"));
        }
        if memory.score_history_cap == 0 {
            return Err(invalid(
                "memory.score_history_cap",
                "Must keep at least one entry",
            ));
        }
        Ok(())
    }

    fn validate_refinement(&self) -> Result<(), ConfigError> {
        let refinement = &self.refinement;
        if refinement.min_feedback_chars >= refinement.max_feedback_chars {
            return Err(invalid(
                "refinement.min_feedback_chars",
                format!(
                    "Must be below max_feedback_chars ({} >= {})",
                    refinement.min_feedback_chars, refinement.max_feedback_chars
                ),
            ));
        }
        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if self.llm.max_tokens == 0 {
            return Err(invalid("llm.max_tokens", "Must be greater than 0"));
        }
        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(invalid(
                    "llm.temperature",
                    format!("Must be between 0.0 and 1.0, got {}", temperature),
                ));
            }
        }
        if self.llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs", "Must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Stage selection and input handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub include_moderation: bool,

    #[serde(default)]
    pub include_reflection: bool,

    /// Used when a transcript arrives without a duration
    #[serde(default = "default_duration_seconds")]
    pub default_duration_seconds: f64,

    #[serde(default = "default_min_audio_seconds")]
    pub min_audio_seconds: f64,

    #[serde(default = "default_language_hint")]
    pub language_hint: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            include_moderation: false,
            include_reflection: false,
            default_duration_seconds: default_duration_seconds(),
            min_audio_seconds: default_min_audio_seconds(),
            language_hint: default_language_hint(),
        }
    }
}

fn default_duration_seconds() -> f64 {
    60.0
}
fn default_min_audio_seconds() -> f64 {
    5.0
}
fn default_language_hint() -> String {
    "ko".to_string()
}

/// Memory limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "default_ltm_cache_hours")]
    pub ltm_cache_hours: i64,

    #[serde(default = "default_stm_cap")]
    pub stm_cap: usize,

    #[serde(default = "default_score_history_cap")]
    pub score_history_cap: usize,

    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: u32,

    #[serde(default = "default_stm_ttl_days")]
    pub default_stm_ttl_days: u32,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            ltm_cache_hours: default_ltm_cache_hours(),
            stm_cap: default_stm_cap(),
            score_history_cap: default_score_history_cap(),
            promotion_threshold: default_promotion_threshold(),
            default_stm_ttl_days: default_stm_ttl_days(),
        }
    }
}

fn default_ltm_cache_hours() -> i64 {
    24
}
fn default_stm_cap() -> usize {
    30
}
fn default_score_history_cap() -> usize {
    10
}
fn default_promotion_threshold() -> u32 {
    5
}
fn default_stm_ttl_days() -> u32 {
    14
}

/// Refinement loop limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementSettings {
    #[serde(default = "default_max_refinements")]
    pub max_refinements: u8,

    #[serde(default = "default_min_feedback_chars")]
    pub min_feedback_chars: usize,

    #[serde(default = "default_max_feedback_chars")]
    pub max_feedback_chars: usize,
}

impl Default for RefinementSettings {
    fn default() -> Self {
        Self {
            max_refinements: default_max_refinements(),
            min_feedback_chars: default_min_feedback_chars(),
            max_feedback_chars: default_max_feedback_chars(),
        }
    }
}

fn default_max_refinements() -> u8 {
    2
}
fn default_min_feedback_chars() -> usize {
    10
}
fn default_max_feedback_chars() -> usize {
    200
}

/// Claude backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
            timeout_secs: default_timeout_secs(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

/// Default synthesis voices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_male_voice")]
    pub default_male: String,

    #[serde(default = "default_female_voice")]
    pub default_female: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            default_male: default_male_voice(),
            default_female: default_female_voice(),
        }
    }
}

fn default_male_voice() -> String {
    "pNInz6obpgDQGcFmaJgB".to_string()
}
fn default_female_voice() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load settings from `config/default`, `config/{env}` and the environment
///
/// Environment variables use the `SPEECH_COACH` prefix with `__` between
/// levels, e.g. `SPEECH_COACH__PIPELINE__INCLUDE_REFLECTION=true`.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("SPEECH_COACH")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
