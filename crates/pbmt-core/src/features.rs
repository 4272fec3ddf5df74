//! Feature vectors and the featurizer/scorer collaborator contracts.
//!
//! The search core never looks inside a model. For each candidate expansion
//! it builds a [`Featurizable`] view, asks the shared [`Featurizer`] for the
//! incremental feature values, and turns them into a score with the shared
//! [`Scorer`]. Both are `Send + Sync` and read-only during decoding.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::rules::{Rule, Span};

/// A named feature value.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureValue {
    pub name: Arc<str>,
    pub value: f64,
}

/// Sparse feature vector; the same name may appear more than once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    values: Vec<FeatureValue>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        let mut fv = Self::new();
        for &(name, value) in pairs {
            fv.push(name, value);
        }
        fv
    }

    pub fn push(&mut self, name: impl Into<Arc<str>>, value: f64) {
        self.values.push(FeatureValue {
            name: name.into(),
            value,
        });
    }

    pub fn extend_from(&mut self, other: &FeatureVector) {
        self.values.extend(other.values.iter().cloned());
    }

    /// Sum of all values recorded under `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        let mut found = None;
        for fv in self.values.iter().filter(|fv| &*fv.name == name) {
            *found.get_or_insert(0.0) += fv.value;
        }
        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// One entry per name, values summed, names in lexicographic order.
    pub fn merged(&self) -> FeatureVector {
        let mut sums: BTreeMap<Arc<str>, f64> = BTreeMap::new();
        for fv in &self.values {
            *sums.entry(Arc::clone(&fv.name)).or_insert(0.0) += fv.value;
        }
        FeatureVector {
            values: sums
                .into_iter()
                .map(|(name, value)| FeatureValue { name, value })
                .collect(),
        }
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let merged = self.merged();
        let mut map = serializer.serialize_map(Some(merged.len()))?;
        for fv in merged.iter() {
            map.serialize_entry(&*fv.name, &fv.value)?;
        }
        map.end()
    }
}

/// Everything a featurizer may inspect when a rule extends a hypothesis.
#[derive(Debug, Clone, Copy)]
pub struct Featurizable<'a> {
    pub sentence_id: usize,
    pub source: &'a [String],
    pub rule: &'a Rule,
    /// Span of the previously applied rule; `None` when extending the start
    /// hypothesis.
    pub prior_span: Option<Span>,
    /// Target tokens immediately preceding this rule, oldest first. Holds at
    /// most [`Featurizer::context_len`] tokens.
    pub prior_context: &'a [String],
    /// Number of target tokens produced before this rule.
    pub target_position: usize,
    /// Source tokens still uncovered after this rule is applied.
    pub untranslated: usize,
    /// Set on the expansion that completes the coverage; featurizers add
    /// their closing context (e.g. end of sentence) here.
    pub done: bool,
}

impl Featurizable<'_> {
    /// Source-position jump from the end of the previous rule to the start
    /// of this one.
    pub fn linear_distortion(&self) -> usize {
        let prior_end = self.prior_span.map_or(0, |s| s.end);
        self.rule.span.start.abs_diff(prior_end)
    }
}

/// Computes the incremental feature values of one expansion.
///
/// Must be a pure function of its input: no hidden state that depends on
/// earlier calls or other sentences.
pub trait Featurizer: Send + Sync {
    fn featurize_into(&self, f: &Featurizable<'_>, out: &mut FeatureVector);

    fn featurize(&self, f: &Featurizable<'_>) -> FeatureVector {
        let mut out = FeatureVector::new();
        self.featurize_into(f, &mut out);
        out
    }

    /// How many preceding target tokens this featurizer reads. Hypotheses
    /// that agree on this many trailing tokens are indistinguishable to it.
    fn context_len(&self) -> usize {
        0
    }
}

/// Collapses a feature vector into a model score.
pub trait Scorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> f64;
}

/// Weighted sum of named features; unknown names weigh zero.
#[derive(Debug, Clone, Default)]
pub struct LinearScorer {
    weights: HashMap<String, f64>,
}

impl LinearScorer {
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self { weights }
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self {
            weights: pairs.iter().map(|&(n, w)| (n.to_string(), w)).collect(),
        }
    }

    pub fn weight(&self, name: &str) -> f64 {
        self.weights.get(name).copied().unwrap_or(0.0)
    }
}

impl Scorer for LinearScorer {
    fn score(&self, features: &FeatureVector) -> f64 {
        features
            .iter()
            .map(|fv| self.weight(&fv.name) * fv.value)
            .sum()
    }
}

/// Copies the rule's own (translation model) features.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleFeaturizer;

impl Featurizer for RuleFeaturizer {
    fn featurize_into(&self, f: &Featurizable<'_>, out: &mut FeatureVector) {
        out.extend_from(&f.rule.features);
    }
}

pub const WORD_PENALTY_FEATURE: &str = "WordPenalty";
pub const LINEAR_DISTORTION_FEATURE: &str = "LinearDistortion";

/// `WordPenalty = -|target|` for every applied rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordPenaltyFeaturizer;

impl Featurizer for WordPenaltyFeaturizer {
    fn featurize_into(&self, f: &Featurizable<'_>, out: &mut FeatureVector) {
        out.push(WORD_PENALTY_FEATURE, -(f.rule.target.len() as f64));
    }
}

/// `LinearDistortion = -|jump|` between consecutive rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearDistortionFeaturizer;

impl Featurizer for LinearDistortionFeaturizer {
    fn featurize_into(&self, f: &Featurizable<'_>, out: &mut FeatureVector) {
        let jump = f.linear_distortion();
        if jump > 0 {
            out.push(LINEAR_DISTORTION_FEATURE, -(jump as f64));
        }
    }
}

/// Runs several featurizers in order and concatenates their output.
#[derive(Default)]
pub struct CombinedFeaturizer {
    featurizers: Vec<Box<dyn Featurizer>>,
}

impl CombinedFeaturizer {
    pub fn new(featurizers: Vec<Box<dyn Featurizer>>) -> Self {
        Self { featurizers }
    }

    /// Rule scores, word penalty and linear distortion.
    pub fn baseline() -> Self {
        Self::new(vec![
            Box::new(RuleFeaturizer),
            Box::new(WordPenaltyFeaturizer),
            Box::new(LinearDistortionFeaturizer),
        ])
    }

    pub fn push(&mut self, featurizer: Box<dyn Featurizer>) {
        self.featurizers.push(featurizer);
    }
}

impl Featurizer for CombinedFeaturizer {
    fn featurize_into(&self, f: &Featurizable<'_>, out: &mut FeatureVector) {
        for featurizer in &self.featurizers {
            featurizer.featurize_into(f, out);
        }
    }

    fn context_len(&self) -> usize {
        self.featurizers
            .iter()
            .map(|f| f.context_len())
            .max()
            .unwrap_or(0)
    }
}
