//! Phrase-based beam search.
//!
//! A decode builds a per-sentence rule grid and future-cost table, then
//! grows hypotheses stage by stage (one beam per number of covered source
//! words) until the goal beam holds complete translations. Recombined
//! hypotheses are remembered so that n-best lists can be read off the
//! resulting derivation lattice.

mod beam;
mod constraints;
mod cube;
pub mod explain;
mod heuristic;
mod hypothesis;
mod lattice;
mod multibeam;
mod nbest;
mod recombination;
mod space;
#[cfg(test)]
pub(crate) mod testutil;

#[cfg(test)]
mod tests;

use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, debug_span, warn};

use crate::config::{BeamStrategy, DecoderConfig, DistortionLimit};
use crate::features::{FeatureVector, Featurizer, Scorer};
use crate::rules::{RuleGrid, RuleSource, Span};
use crate::settings::SettingsError;

pub use beam::{Beam, BeamStats, PutOutcome};
pub use heuristic::SpanScores;
pub use hypothesis::{HypId, Hypothesis, HypothesisArena};
pub use lattice::{LatticePath, StateLatticeDecoder};
pub use nbest::{NbestDiagnostic, NbestList, NbestStop};
pub use recombination::{RecombinationFilter, RecombinationHistory, RecombinationKey};
pub use space::SearchStats;

use space::{SearchParams, SearchSpace};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("non-finite score {value} in sentence {sentence_id}")]
    NonFinite { sentence_id: usize, value: f64 },
    #[error(transparent)]
    Config(#[from] SettingsError),
}

/// Per-sentence restrictions on the output.
#[derive(Debug, Clone, Default)]
pub struct DecodeConstraints {
    /// Forced decoding: only these target strings may be produced.
    pub allowed_targets: Option<Vec<Vec<String>>>,
    /// Prefix decoding: the output must start with these tokens; the rest
    /// is decoded freely.
    pub target_prefix: Option<Vec<String>>,
    /// Overrides the configured distortion limit for this sentence.
    pub distortion_limit: Option<DistortionLimit>,
}

impl DecodeConstraints {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn forced(targets: Vec<Vec<String>>) -> Self {
        Self {
            allowed_targets: Some(targets),
            ..Self::default()
        }
    }

    pub fn prefix(prefix: Vec<String>) -> Self {
        Self {
            target_prefix: Some(prefix),
            ..Self::default()
        }
    }
}

/// One applied rule of a translation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhraseAlignment {
    pub source: Span,
    /// Target token range produced by the rule.
    pub target: Range<usize>,
    /// Word alignment within the phrase pair.
    pub words: Vec<(usize, usize)>,
}

/// A complete translation with its score breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct RichTranslation {
    pub tokens: Vec<String>,
    pub score: f64,
    /// Summed feature values, one entry per feature name.
    pub features: FeatureVector,
    pub alignment: Vec<PhraseAlignment>,
    /// Goal hypothesis of the search this translation was read from.
    pub goal: HypId,
}

impl RichTranslation {
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Result of a finished search: the search state and the goal beam,
/// best first.
struct Search<'a> {
    space: SearchSpace<'a>,
    goals: Vec<HypId>,
}

/// Beam-search decoder over shared, read-only models.
///
/// Cheap to clone; every decode allocates its own search state, so one
/// decoder may serve many threads.
#[derive(Clone)]
pub struct Decoder {
    rules: Arc<dyn RuleSource>,
    featurizer: Arc<dyn Featurizer>,
    scorer: Arc<dyn Scorer>,
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(
        rules: Arc<dyn RuleSource>,
        featurizer: Arc<dyn Featurizer>,
        scorer: Arc<dyn Scorer>,
        config: DecoderConfig,
    ) -> Result<Self, DecodeError> {
        config.validate()?;
        Ok(Self {
            rules,
            featurizer,
            scorer,
            config,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Best complete translation, or `None` when no derivation covers the
    /// sentence under the active constraints.
    pub fn translate(
        &self,
        source: &[String],
        sentence_id: usize,
        constraints: &DecodeConstraints,
    ) -> Result<Option<RichTranslation>, DecodeError> {
        let _span = debug_span!("decode", sentence_id, source_len = source.len()).entered();
        let Some(search) = self.search(source, sentence_id, constraints)? else {
            return Ok(None);
        };
        let Some(&goal) = search.goals.first() else {
            return Ok(None);
        };
        let rules = search.space.arena.rules_of(goal);
        Ok(Some(search.space.rescore(&rules, goal)))
    }

    /// Up to `n` translations in non-increasing score order.
    pub fn nbest(
        &self,
        source: &[String],
        sentence_id: usize,
        constraints: &DecodeConstraints,
        n: usize,
    ) -> Result<NbestList, DecodeError> {
        let _span = debug_span!("decode", sentence_id, source_len = source.len(), n).entered();
        if n == 0 {
            return Ok(NbestList::default());
        }
        let Some(search) = self.search(source, sentence_id, constraints)? else {
            return Ok(NbestList::default());
        };
        Ok(nbest::extract(&search.space, &search.goals, n, &self.config.nbest))
    }

    fn search<'a>(
        &'a self,
        source: &'a [String],
        sentence_id: usize,
        constraints: &'a DecodeConstraints,
    ) -> Result<Option<Search<'a>>, DecodeError> {
        if source.is_empty() {
            debug!("empty source");
            return Ok(None);
        }

        let mut rules = self.rules.rules(source, sentence_id);
        let references = constraints.allowed_targets.as_deref();
        if let Some(references) = references {
            let before = rules.len();
            rules.retain(|r| space::phrase_allowed(references, &r.target));
            debug!(before, after = rules.len(), "filtered rules by allowed targets");
        }
        let grid = RuleGrid::new(rules, source.len());
        if !grid.is_coverage_complete() {
            warn!(sentence_id, "incomplete rule coverage");
        }
        let heuristic = SpanScores::build(&grid);
        if heuristic.initial() == f64::NEG_INFINITY {
            warn!(sentence_id, "no rule tiling covers the sentence");
            return Ok(None);
        }

        let history_len = self
            .config
            .ngram_history
            .unwrap_or_else(|| self.featurizer.context_len());
        let params = SearchParams {
            sentence_id,
            source,
            featurizer: self.featurizer.as_ref(),
            scorer: self.scorer.as_ref(),
            distortion: constraints.distortion_limit.unwrap_or(self.config.distortion),
            itg: self.config.itg_constraints,
            strict: self.config.strict,
            filter: RecombinationFilter::new(self.config.recombination, history_len),
            references,
            prefix: constraints.target_prefix.as_deref(),
        };
        let mut space = SearchSpace::new(params, grid, heuristic);
        let goals = match self.config.strategy {
            BeamStrategy::Sorted => multibeam::search(&mut space, self.config.beam_size)?,
            BeamStrategy::CubePruning => cube::search(&mut space, self.config.beam_size)?,
        };

        let stats = &space.stats;
        debug!(
            strategy = %self.config.strategy,
            hypotheses = space.arena.len(),
            generated = stats.generated,
            recombined = stats.recombined,
            pruned = stats.pruned,
            discarded = stats.discarded,
            goals = goals.len(),
        );
        if goals.is_empty() {
            warn!(sentence_id, "no complete hypothesis reached the goal beam");
            return Ok(None);
        }
        Ok(Some(Search { space, goals }))
    }

    /// Runs a search and hands its state to `inspect`; used by diagnostics.
    pub(crate) fn with_search<T>(
        &self,
        source: &[String],
        sentence_id: usize,
        constraints: &DecodeConstraints,
        inspect: impl FnOnce(Option<(&SearchSpace<'_>, &[HypId])>) -> T,
    ) -> Result<T, DecodeError> {
        let search = self.search(source, sentence_id, constraints)?;
        Ok(inspect(search.as_ref().map(|s| (&s.space, s.goals.as_slice()))))
    }
}
