//! JSON model fixtures for the command-line tools.
//!
//! A fixture bundles a small phrase table, an optional n-gram language model
//! and the feature weights into one file:
//!
//! ```json
//! {
//!   "weights": { "TM": 1.0, "LM": 0.5, "WordPenalty": 0.2 },
//!   "passthrough": true,
//!   "phrases": [
//!     { "source": "das haus", "target": "the house", "features": { "TM": -0.5 } }
//!   ],
//!   "lm": {
//!     "order": 2,
//!     "unknown_logprob": -10.0,
//!     "ngrams": [ { "ngram": "the house", "logprob": -0.4 } ]
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use pbmt_core::features::{CombinedFeaturizer, FeatureVector, LinearScorer, Scorer};
use pbmt_core::lm::{LanguageModelFeaturizer, NgramModel};
use pbmt_core::rules::{PhraseOption, PhraseTable};
use pbmt_core::settings::SettingsError;
use pbmt_core::{DecodeError, Decoder, DecoderConfig};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid fixture: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid fixture: {0}")]
    Invalid(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub passthrough: bool,
    pub phrases: Vec<FixturePhrase>,
    #[serde(default)]
    pub lm: Option<FixtureLm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixturePhrase {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    /// Source/target word pairs within the phrase.
    #[serde(default)]
    pub alignment: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureLm {
    pub order: usize,
    #[serde(default = "default_unknown_logprob")]
    pub unknown_logprob: f64,
    pub ngrams: Vec<FixtureNgram>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureNgram {
    pub ngram: String,
    pub logprob: f64,
    #[serde(default)]
    pub backoff: Option<f64>,
}

fn default_unknown_logprob() -> f64 {
    -100.0
}

impl Fixture {
    pub fn open(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let fixture: Fixture = serde_json::from_str(json)?;
        fixture.check()?;
        Ok(fixture)
    }

    fn check(&self) -> Result<(), FixtureError> {
        for (i, p) in self.phrases.iter().enumerate() {
            if p.source.split_whitespace().next().is_none() {
                return Err(FixtureError::Invalid(format!("phrase {i} has an empty source")));
            }
        }
        if let Some(lm) = &self.lm {
            if lm.order == 0 {
                return Err(FixtureError::Invalid("lm.order must be positive".to_string()));
            }
            for n in &lm.ngrams {
                let len = n.ngram.split_whitespace().count();
                if len == 0 || len > lm.order {
                    return Err(FixtureError::Invalid(format!(
                        "ngram {:?} does not fit order {}",
                        n.ngram, lm.order
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn scorer(&self) -> LinearScorer {
        LinearScorer::new(self.weights.clone())
    }

    pub fn phrase_table(&self, scorer: Arc<dyn Scorer>) -> PhraseTable {
        let mut table = PhraseTable::new(scorer).with_passthrough(self.passthrough);
        for p in &self.phrases {
            let source: Vec<&str> = p.source.split_whitespace().collect();
            let target: Vec<&str> = p.target.split_whitespace().collect();
            let mut features = FeatureVector::new();
            for (name, &value) in &p.features {
                features.push(name.as_str(), value);
            }
            let mut option = PhraseOption::new(&target, features);
            option.alignment = p.alignment.clone();
            table.insert(&source, option);
        }
        table
    }

    pub fn featurizer(&self) -> CombinedFeaturizer {
        let mut featurizer = CombinedFeaturizer::baseline();
        if let Some(lm) = &self.lm {
            let mut model = NgramModel::new(lm.order).with_unknown_logprob(lm.unknown_logprob);
            for n in &lm.ngrams {
                let words: Vec<&str> = n.ngram.split_whitespace().collect();
                model.insert(&words, n.logprob, n.backoff);
            }
            featurizer.push(Box::new(LanguageModelFeaturizer::new(model)));
        }
        featurizer
    }

    pub fn decoder(&self, config: DecoderConfig) -> Result<Decoder, FixtureError> {
        let scorer: Arc<dyn Scorer> = Arc::new(self.scorer());
        let table = self.phrase_table(Arc::clone(&scorer));
        Ok(Decoder::new(
            Arc::new(table),
            Arc::new(self.featurizer()),
            scorer,
            config,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pbmt_core::{DecodeConstraints, DistortionLimit};

    use super::*;

    const FIXTURE: &str = r#"{
        "weights": { "TM": 1.0, "LM": 1.0, "LinearDistortion": 1.0, "UnknownWord": -10.0 },
        "passthrough": true,
        "phrases": [
            { "source": "das", "target": "the", "features": { "TM": -0.2 } },
            { "source": "haus", "target": "house", "features": { "TM": -0.3 } },
            { "source": "das haus", "target": "the house", "features": { "TM": -0.1 },
              "alignment": [[0, 0], [1, 1]] }
        ],
        "lm": {
            "order": 2,
            "unknown_logprob": -5.0,
            "ngrams": [
                { "ngram": "the", "logprob": -1.0, "backoff": -0.5 },
                { "ngram": "house", "logprob": -1.0, "backoff": -0.5 },
                { "ngram": "</s>", "logprob": -1.0 },
                { "ngram": "the house", "logprob": -0.2 }
            ]
        }
    }"#;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn config() -> DecoderConfig {
        DecoderConfig {
            distortion: DistortionLimit::Limit(2),
            ..DecoderConfig::default()
        }
    }

    #[test]
    fn test_fixture_decodes() {
        let fixture = Fixture::from_json(FIXTURE).unwrap();
        let decoder = fixture.decoder(config()).unwrap();
        let t = decoder
            .translate(&toks("das haus"), 0, &DecodeConstraints::none())
            .unwrap()
            .unwrap();
        assert_eq!(t.text(), "the house");
        assert_eq!(t.alignment.len(), 1);
        assert_eq!(t.alignment[0].words, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_passthrough_unknown_words() {
        let fixture = Fixture::from_json(FIXTURE).unwrap();
        let decoder = fixture.decoder(config()).unwrap();
        let t = decoder
            .translate(&toks("das auto"), 0, &DecodeConstraints::none())
            .unwrap()
            .unwrap();
        assert_eq!(t.text(), "the auto");
        assert_eq!(t.features.get("UnknownWord"), Some(1.0));
    }

    #[test]
    fn test_bundled_fixture() {
        let fixture = Fixture::from_json(include_str!("../fixtures/toy_de_en.json")).unwrap();
        let decoder = fixture.decoder(config()).unwrap();
        let t = decoder
            .translate(&toks("das haus ist klein"), 0, &DecodeConstraints::none())
            .unwrap()
            .unwrap();
        assert_eq!(t.text(), "the house is small");
    }

    #[test]
    fn test_open_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        let fixture = Fixture::open(file.path()).unwrap();
        assert_eq!(fixture.phrases.len(), 3);
        assert_eq!(fixture.lm.unwrap().order, 2);
    }

    #[test]
    fn test_missing_file() {
        let err = Fixture::open(Path::new("/nonexistent/fixture.json")).unwrap_err();
        assert!(matches!(err, FixtureError::Io { .. }));
    }

    #[test]
    fn test_invalid_fixtures() {
        assert!(matches!(
            Fixture::from_json("{ not json"),
            Err(FixtureError::Json(_))
        ));
        let bad_order = r#"{ "weights": {}, "phrases": [],
            "lm": { "order": 1, "ngrams": [ { "ngram": "a b", "logprob": -1.0 } ] } }"#;
        assert!(matches!(
            Fixture::from_json(bad_order),
            Err(FixtureError::Invalid(_))
        ));
        let empty_source = r#"{ "weights": {}, "phrases": [ { "source": " ", "target": "x" } ] }"#;
        assert!(matches!(
            Fixture::from_json(empty_source),
            Err(FixtureError::Invalid(_))
        ));
    }
}
