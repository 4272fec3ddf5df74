macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            std::process::exit(1);
        })
    };
}

pub mod decode_ops;
pub mod explain_ops;

use std::path::Path;

use pbmt_core::settings::Settings;
use pbmt_core::{BeamStrategy, DecoderConfig, DistortionLimit};

use crate::fixture::FixtureError;

/// Command-line overrides applied on top of the settings file.
#[derive(Debug, Clone, Default)]
pub struct SearchOverrides {
    pub strategy: Option<String>,
    pub beam_size: Option<usize>,
    pub distortion: Option<String>,
}

/// Loads settings (embedded defaults when `path` is `None`) and applies
/// overrides. Returns the decoder configuration and the worker count.
pub fn load_config(
    path: Option<&str>,
    overrides: &SearchOverrides,
) -> Result<(DecoderConfig, usize), FixtureError> {
    let settings = match path {
        Some(p) => Settings::from_file(Path::new(p))?,
        None => Settings::defaults()?,
    };
    let mut config = settings.decoder_config()?;
    if let Some(s) = &overrides.strategy {
        config.strategy = s.parse::<BeamStrategy>()?;
    }
    if let Some(b) = overrides.beam_size {
        config.beam_size = b;
    }
    if let Some(d) = &overrides.distortion {
        config.distortion = d.parse::<DistortionLimit>()?;
    }
    config.validate()?;
    Ok((config, settings.engine.threads))
}

/// Splits a line into tokens; blank lines and `#` comments yield `None`.
pub fn tokenize(line: &str) -> Option<Vec<String>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.split_whitespace().map(String::from).collect())
}
