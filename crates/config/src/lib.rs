//! Configuration management for the speech coach
//!
//! Settings are layered from:
//! - `config/default.{yaml,toml,json}` (optional)
//! - `config/{env}.{yaml,toml,json}` (optional)
//! - Environment variables (`SPEECH_COACH__` prefix, `__` between levels)
//!
//! Every field has a default, so an empty environment yields a working
//! quick-mode configuration.

pub mod settings;

pub use settings::{
    load_settings, LlmSettings, LogFormat, MemorySettings, ObservabilitySettings,
    PipelineSettings, RefinementSettings, RuntimeEnvironment, Settings, VoiceSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
