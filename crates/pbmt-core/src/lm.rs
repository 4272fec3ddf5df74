//! In-memory back-off n-gram language model and its featurizer.
//!
//! No file format is read here; callers populate the tables directly. The
//! model follows the usual back-off recursion: when an n-gram is missing,
//! the back-off weight of its history is added and the history shortened.

use std::collections::HashMap;

use crate::features::{Featurizable, FeatureVector, Featurizer};

pub const LM_FEATURE: &str = "LM";
pub const SENTENCE_START: &str = "<s>";
pub const SENTENCE_END: &str = "</s>";

/// Log-probability assigned to words the model has never seen.
const DEFAULT_UNKNOWN_LOGPROB: f64 = -100.0;

#[derive(Debug, Clone)]
pub struct NgramModel {
    order: usize,
    logprobs: HashMap<Vec<String>, f64>,
    backoffs: HashMap<Vec<String>, f64>,
    unknown_logprob: f64,
}

impl NgramModel {
    pub fn new(order: usize) -> Self {
        Self {
            order: order.max(1),
            logprobs: HashMap::new(),
            backoffs: HashMap::new(),
            unknown_logprob: DEFAULT_UNKNOWN_LOGPROB,
        }
    }

    pub fn with_unknown_logprob(mut self, logprob: f64) -> Self {
        self.unknown_logprob = logprob;
        self
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Adds an n-gram with its log-probability and optional back-off weight.
    /// N-grams longer than the model order are ignored.
    pub fn insert(&mut self, ngram: &[&str], logprob: f64, backoff: Option<f64>) {
        if ngram.is_empty() || ngram.len() > self.order {
            return;
        }
        let key: Vec<String> = ngram.iter().map(|w| w.to_string()).collect();
        if let Some(bo) = backoff {
            self.backoffs.insert(key.clone(), bo);
        }
        self.logprobs.insert(key, logprob);
    }

    /// `log P(word | context)`; only the last `order - 1` context tokens
    /// are consulted.
    pub fn score(&self, context: &[String], word: &str) -> f64 {
        let keep = context.len().min(self.order - 1);
        let mut history = &context[context.len() - keep..];
        let mut penalty = 0.0;
        let mut key: Vec<String> = Vec::with_capacity(keep + 1);
        loop {
            key.clear();
            key.extend(history.iter().cloned());
            key.push(word.to_string());
            if let Some(&lp) = self.logprobs.get(&key) {
                return lp + penalty;
            }
            if history.is_empty() {
                return self.unknown_logprob + penalty;
            }
            penalty += self.backoffs.get(history).copied().unwrap_or(0.0);
            history = &history[1..];
        }
    }
}

/// Emits the `LM` feature: the log-probability of the rule's target words
/// given the preceding target context, plus `</s>` on the closing step.
#[derive(Debug, Clone)]
pub struct LanguageModelFeaturizer {
    model: NgramModel,
}

impl LanguageModelFeaturizer {
    pub fn new(model: NgramModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &NgramModel {
        &self.model
    }
}

impl Featurizer for LanguageModelFeaturizer {
    fn featurize_into(&self, f: &Featurizable<'_>, out: &mut FeatureVector) {
        let mut context: Vec<String> = Vec::with_capacity(self.model.order + f.rule.target.len());
        if f.target_position < self.context_len() {
            context.push(SENTENCE_START.to_string());
        }
        context.extend(f.prior_context.iter().cloned());

        let mut total = 0.0;
        for word in &f.rule.target {
            total += self.model.score(&context, word);
            context.push(word.clone());
        }
        if f.done {
            total += self.model.score(&context, SENTENCE_END);
        }
        out.push(LM_FEATURE, total);
    }

    fn context_len(&self) -> usize {
        self.model.order - 1
    }
}
