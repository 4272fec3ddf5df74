//! Typed, validated decoder configuration.
//!
//! [`crate::settings`] parses the TOML form; everything downstream works
//! with these closed enums so the search loop never compares strings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::settings::SettingsError;

/// How beams are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeamStrategy {
    /// Expand every hypothesis with every legal rule, one beam per
    /// coverage cardinality.
    #[default]
    Sorted,
    /// Lazily enumerate (hypothesis, rule) pairs best-first per bundle.
    CubePruning,
}

impl FromStr for BeamStrategy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sorted" => Ok(Self::Sorted),
            "cube_pruning" => Ok(Self::CubePruning),
            other => Err(SettingsError::InvalidValue {
                field: "search.strategy".to_string(),
                reason: format!("unknown strategy {other:?} (expected \"sorted\" or \"cube_pruning\")"),
            }),
        }
    }
}

impl fmt::Display for BeamStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sorted => "sorted",
            Self::CubePruning => "cube_pruning",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecombinationMode {
    Off,
    /// Same coverage, same trailing target context, same last source end.
    #[default]
    Classic,
}

impl FromStr for RecombinationMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "classic" => Ok(Self::Classic),
            other => Err(SettingsError::InvalidValue {
                field: "recombination.mode".to_string(),
                reason: format!("unknown mode {other:?} (expected \"off\" or \"classic\")"),
            }),
        }
    }
}

/// Maximum source jump between consecutive rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistortionLimit {
    Unlimited,
    Limit(usize),
}

impl DistortionLimit {
    pub fn allows(self, jump: usize) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limit(max) => jump <= max,
        }
    }
}

impl Default for DistortionLimit {
    fn default() -> Self {
        Self::Limit(5)
    }
}

/// Parses `"unlimited"` or a non-negative jump width.
impl FromStr for DistortionLimit {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "unlimited" {
            return Ok(Self::Unlimited);
        }
        s.parse().map(Self::Limit).map_err(|_| SettingsError::InvalidValue {
            field: "search.max_distortion".to_string(),
            reason: format!("expected a non-negative integer or \"unlimited\", got {s:?}"),
        })
    }
}

impl fmt::Display for DistortionLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Limit(max) => write!(f, "{max}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NbestConfig {
    /// Stop after scanning `n * scan_factor` lattice paths.
    pub scan_factor: usize,
    /// Wall-clock budget for extraction; `None` means unbounded.
    pub time_budget: Option<Duration>,
    /// Skip derivations whose target string was already emitted.
    pub distinct_surface: bool,
}

impl Default for NbestConfig {
    fn default() -> Self {
        Self {
            scan_factor: 10,
            time_budget: None,
            distinct_surface: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    pub strategy: BeamStrategy,
    pub beam_size: usize,
    pub distortion: DistortionLimit,
    pub itg_constraints: bool,
    /// Fail the decode on NaN or infinite model scores instead of dropping
    /// the offending hypothesis.
    pub strict: bool,
    pub recombination: RecombinationMode,
    /// Target tokens compared by classic recombination; defaults to the
    /// featurizer's context length.
    pub ngram_history: Option<usize>,
    pub nbest: NbestConfig,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            strategy: BeamStrategy::default(),
            beam_size: 200,
            distortion: DistortionLimit::default(),
            itg_constraints: false,
            strict: false,
            recombination: RecombinationMode::default(),
            ngram_history: None,
            nbest: NbestConfig::default(),
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.beam_size == 0 {
            return Err(SettingsError::InvalidValue {
                field: "search.beam_size".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.nbest.scan_factor == 0 {
            return Err(SettingsError::InvalidValue {
                field: "nbest.scan_factor".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
