use serde::Serialize;

use crate::config::DistortionLimit;
use crate::coverage::CoverageSet;
use crate::features::{Featurizable, FeatureVector, Featurizer, Scorer};
use crate::rules::{RuleGrid, RuleId, Span};

use super::beam::PutOutcome;
use super::heuristic::SpanScores;
use super::hypothesis::{HypId, Hypothesis, HypothesisArena};
use super::recombination::{RecombinationFilter, RecombinationHistory};
use super::{DecodeError, PhraseAlignment, RichTranslation};

/// Counters collected over one decode.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchStats {
    /// Expansions attempted.
    pub generated: usize,
    pub recombined: usize,
    /// Beam occupants evicted by better hypotheses.
    pub pruned: usize,
    /// Hypotheses rejected by a full beam.
    pub discarded: usize,
    /// Expansions dropped for a non-finite score or an untileable gap.
    pub infeasible: usize,
    /// Expansions dropped by the allowed-target or prefix constraint.
    pub constrained: usize,
    /// Occupancy of each beam after search, by coverage cardinality.
    pub beam_sizes: Vec<usize>,
}

/// Immutable inputs of one search, shared by both beam strategies.
pub(crate) struct SearchParams<'a> {
    pub sentence_id: usize,
    pub source: &'a [String],
    pub featurizer: &'a dyn Featurizer,
    pub scorer: &'a dyn Scorer,
    pub distortion: DistortionLimit,
    pub itg: bool,
    pub strict: bool,
    pub filter: RecombinationFilter,
    pub references: Option<&'a [Vec<String>]>,
    pub prefix: Option<&'a [String]>,
}

enum Expansion {
    Ready(Hypothesis),
    Infeasible,
    Constrained,
}

/// Everything one sentence's search creates. Dropped when the decode ends.
pub(crate) struct SearchSpace<'a> {
    pub params: SearchParams<'a>,
    pub grid: RuleGrid,
    pub heuristic: SpanScores,
    pub arena: HypothesisArena,
    pub history: RecombinationHistory,
    pub stats: SearchStats,
    max_phrase_len: usize,
    context_len: usize,
    tail_len: usize,
}

impl<'a> SearchSpace<'a> {
    pub fn new(params: SearchParams<'a>, grid: RuleGrid, heuristic: SpanScores) -> Self {
        let context_len = params.featurizer.context_len();
        let tail_len = context_len.max(params.filter.history_len());
        let max_phrase_len = grid.longest_span().max(1);
        Self {
            params,
            grid,
            heuristic,
            arena: HypothesisArena::new(),
            history: RecombinationHistory::new(),
            stats: SearchStats::default(),
            max_phrase_len,
            context_len,
            tail_len,
        }
    }

    pub fn source_len(&self) -> usize {
        self.params.source.len()
    }

    pub fn root(&mut self) -> HypId {
        let initial = self.heuristic.initial();
        self.arena.start(self.source_len(), initial)
    }

    pub fn legal_spans(&self, id: HypId) -> Vec<Span> {
        super::constraints::legal_spans(
            &self.arena[id],
            self.max_phrase_len,
            self.params.distortion,
            self.params.itg,
        )
    }

    /// Applies `rule` to `pred`. Returns `None` when the result is
    /// infeasible or violates the allowed-target constraint.
    pub fn extend(&mut self, pred: HypId, rule: RuleId) -> Result<Option<HypId>, DecodeError> {
        self.stats.generated += 1;
        match self.expand(pred, rule)? {
            Expansion::Ready(hyp) => Ok(Some(self.arena.push(hyp))),
            Expansion::Infeasible => {
                self.stats.infeasible += 1;
                Ok(None)
            }
            Expansion::Constrained => {
                self.stats.constrained += 1;
                Ok(None)
            }
        }
    }

    fn expand(&self, pred_id: HypId, rule_id: RuleId) -> Result<Expansion, DecodeError> {
        let pred = &self.arena[pred_id];
        let rule = self.grid.rule(rule_id);
        let coverage = pred.coverage.extended(rule.span.start, rule.span.end);
        let done = coverage.is_complete();

        if let Some(references) = self.params.references {
            let mut target = self.target_of(pred_id);
            target.extend(rule.target.iter().cloned());
            if !target_allowed(references, &target, done) {
                return Ok(Expansion::Constrained);
            }
        }
        if let Some(prefix) = self.params.prefix {
            // past the prefix the predecessor is already known to match
            if pred.target_len < prefix.len() {
                let mut target = self.target_of(pred_id);
                target.extend(rule.target.iter().cloned());
                if !prefix_consistent(prefix, &target, done) {
                    return Ok(Expansion::Constrained);
                }
            }
        }

        let f = Featurizable {
            sentence_id: self.params.sentence_id,
            source: self.params.source,
            rule,
            prior_span: pred.last_span,
            prior_context: pred.context(self.context_len),
            target_position: pred.target_len,
            untranslated: coverage.len() - coverage.cardinality(),
            done,
        };
        let mut features = FeatureVector::new();
        self.params.featurizer.featurize_into(&f, &mut features);
        let local_score = self.params.scorer.score(&features);
        let score = pred.score + local_score;
        if !local_score.is_finite() || !score.is_finite() {
            if self.params.strict {
                return Err(DecodeError::NonFinite {
                    sentence_id: self.params.sentence_id,
                    value: local_score,
                });
            }
            return Ok(Expansion::Infeasible);
        }

        let heuristic = if pred.heuristic == f64::NEG_INFINITY {
            f64::NEG_INFINITY
        } else {
            pred.heuristic + self.heuristic.delta(&pred.coverage, &coverage)
        };
        if !heuristic.is_finite() {
            return Ok(Expansion::Infeasible);
        }

        let mut tail = Vec::with_capacity(self.tail_len);
        let keep = self.tail_len.saturating_sub(rule.target.len());
        tail.extend(pred.context(keep).iter().cloned());
        let skip = rule.target.len().saturating_sub(self.tail_len);
        tail.extend(rule.target[skip..].iter().cloned());

        Ok(Expansion::Ready(Hypothesis {
            id: HypId(u32::MAX),
            predecessor: Some(pred_id),
            rule: Some(rule_id),
            coverage,
            score,
            heuristic,
            local_score,
            target_len: pred.target_len + rule.target.len(),
            depth: pred.depth + 1,
            last_span: Some(rule.span),
            linear_distortion: f.linear_distortion(),
            done,
            tail,
        }))
    }

    /// Books a beam outcome into the history and counters.
    pub fn record(&mut self, outcome: PutOutcome) {
        match outcome {
            PutOutcome::Inserted => {}
            PutOutcome::Evicted(_) => self.stats.pruned += 1,
            PutOutcome::Recombined {
                survivor,
                dominated,
            } => {
                self.stats.recombined += 1;
                self.history.log(survivor, dominated);
            }
            PutOutcome::Discarded => self.stats.discarded += 1,
        }
    }

    /// Full target string of the derivation ending at `id`.
    pub fn target_of(&self, id: HypId) -> Vec<String> {
        let mut target = Vec::with_capacity(self.arena[id].target_len);
        for rule in self.arena.rules_of(id) {
            target.extend(self.grid.rule(rule).target.iter().cloned());
        }
        target
    }

    /// Re-featurizes a rule sequence from scratch.
    ///
    /// For a hypothesis' own derivation this reproduces its score exactly;
    /// for lattice paths that splice in recombined alternatives it yields
    /// the true score of the spliced derivation.
    pub fn rescore(&self, rules: &[RuleId], goal: HypId) -> RichTranslation {
        let mut coverage = CoverageSet::new(self.source_len());
        let mut tokens: Vec<String> = Vec::new();
        let mut features = FeatureVector::new();
        let mut alignment = Vec::with_capacity(rules.len());
        let mut prior_span = None;
        let mut score = 0.0;

        for &rule_id in rules {
            let rule = self.grid.rule(rule_id);
            coverage.set_range(rule.span.start, rule.span.end);
            let f = Featurizable {
                sentence_id: self.params.sentence_id,
                source: self.params.source,
                rule,
                prior_span,
                prior_context: &tokens[tokens.len().saturating_sub(self.context_len)..],
                target_position: tokens.len(),
                untranslated: coverage.len() - coverage.cardinality(),
                done: coverage.is_complete(),
            };
            let mut local = FeatureVector::new();
            self.params.featurizer.featurize_into(&f, &mut local);
            score += self.params.scorer.score(&local);
            features.extend_from(&local);

            alignment.push(PhraseAlignment {
                source: rule.span,
                target: tokens.len()..tokens.len() + rule.target.len(),
                words: rule.alignment.clone(),
            });
            tokens.extend(rule.target.iter().cloned());
            prior_span = Some(rule.span);
        }

        RichTranslation {
            tokens,
            score,
            features: features.merged(),
            alignment,
            goal,
        }
    }
}

/// With `done`, `target` must equal a reference; otherwise it must be a
/// prefix of one.
fn target_allowed(references: &[Vec<String>], target: &[String], done: bool) -> bool {
    references.iter().any(|reference| {
        if done {
            reference.as_slice() == target
        } else {
            reference.starts_with(target)
        }
    })
}

/// `target` and `prefix` agree on their common length; a complete target
/// must contain the whole prefix.
fn prefix_consistent(prefix: &[String], target: &[String], done: bool) -> bool {
    let common = prefix.len().min(target.len());
    prefix[..common] == target[..common] && (!done || target.len() >= prefix.len())
}

/// True if `phrase` occurs contiguously in some reference.
pub(crate) fn phrase_allowed(references: &[Vec<String>], phrase: &[String]) -> bool {
    phrase.is_empty()
        || references
            .iter()
            .any(|reference| reference.windows(phrase.len()).any(|w| w == phrase))
}
