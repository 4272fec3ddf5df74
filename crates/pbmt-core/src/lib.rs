pub mod config;
pub mod coverage;
pub mod features;
pub mod lm;
pub mod rules;
pub mod search;
pub mod settings;

pub use config::{BeamStrategy, DecoderConfig, DistortionLimit, NbestConfig, RecombinationMode};
pub use search::{DecodeConstraints, DecodeError, Decoder, NbestList, RichTranslation};
