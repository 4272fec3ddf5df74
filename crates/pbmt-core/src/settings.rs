//! Decoder settings loaded from TOML.
//!
//! - `parse_settings_toml(toml)` parses and validates a settings document
//! - `Settings::from_file(path)` reads one from disk
//! - Default values are embedded via `include_str!("default_settings.toml")`
//!
//! Settings are plain values handed to the decoder or engine constructor;
//! there is no process-wide instance.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{DecoderConfig, DistortionLimit, NbestConfig};

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub search: SearchSettings,
    pub recombination: RecombinationSettings,
    pub nbest: NbestSettings,
    #[serde(default)]
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub strategy: String,
    pub beam_size: i64,
    pub max_distortion: MaxDistortion,
    #[serde(default)]
    pub itg_constraints: bool,
    #[serde(default)]
    pub strict: bool,
}

/// `max_distortion` accepts a non-negative integer or `"unlimited"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MaxDistortion {
    Limit(i64),
    Named(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecombinationSettings {
    pub mode: String,
    pub ngram_history: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NbestSettings {
    pub scan_factor: i64,
    #[serde(default)]
    pub time_budget_ms: u64,
    #[serde(default)]
    pub distinct_surface: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSettings {
    /// Worker threads; 0 means available parallelism.
    #[serde(default)]
    pub threads: usize,
}

impl Settings {
    pub fn defaults() -> Result<Self, SettingsError> {
        parse_settings_toml(DEFAULT_SETTINGS_TOML)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_settings_toml(&content)
    }

    /// Typed decoder configuration. Never fails for settings that came out
    /// of [`parse_settings_toml`].
    pub fn decoder_config(&self) -> Result<DecoderConfig, SettingsError> {
        let distortion = match &self.search.max_distortion {
            MaxDistortion::Limit(n) => DistortionLimit::Limit(*n as usize),
            MaxDistortion::Named(name) => name.parse::<DistortionLimit>()?,
        };
        let config = DecoderConfig {
            strategy: self.search.strategy.parse()?,
            beam_size: self.search.beam_size as usize,
            distortion,
            itg_constraints: self.search.itg_constraints,
            strict: self.search.strict,
            recombination: self.recombination.mode.parse()?,
            ngram_history: self.recombination.ngram_history.map(|n| n as usize),
            nbest: NbestConfig {
                scan_factor: self.nbest.scan_factor as usize,
                time_budget: (self.nbest.time_budget_ms > 0)
                    .then(|| Duration::from_millis(self.nbest.time_budget_ms)),
                distinct_surface: self.nbest.distinct_surface,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_positive {
        ($section:ident . $field:ident) => {
            if s.$section.$field <= 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }

    check_positive!(search.beam_size);
    check_positive!(nbest.scan_factor);
    if let MaxDistortion::Limit(n) = s.search.max_distortion {
        if n < 0 {
            return Err(SettingsError::InvalidValue {
                field: "search.max_distortion".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
    }
    if let Some(n) = s.recombination.ngram_history {
        if n < 0 {
            return Err(SettingsError::InvalidValue {
                field: "recombination.ngram_history".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
    }

    // enum names and the "unlimited" keyword
    s.decoder_config()?;
    Ok(())
}
