//! Session-level options

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Quick,
    Deep,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceType {
    #[default]
    DefaultMale,
    DefaultFemale,
    Cloned,
}

impl VoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceType::DefaultMale => "default_male",
            VoiceType::DefaultFemale => "default_female",
            VoiceType::Cloned => "cloned",
        }
    }
}

/// Voice requested for synthesis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSelection {
    pub voice_type: VoiceType,
    pub clone_id: Option<String>,
}

impl VoiceSelection {
    pub fn cloned(clone_id: impl Into<String>) -> Self {
        Self {
            voice_type: VoiceType::Cloned,
            clone_id: Some(clone_id.into()),
        }
    }

    pub fn default_female() -> Self {
        Self {
            voice_type: VoiceType::DefaultFemale,
            clone_id: None,
        }
    }
}
