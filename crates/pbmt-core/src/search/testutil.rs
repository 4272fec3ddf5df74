//! Shared fixtures for search tests.

use std::sync::Arc;

use crate::config::{DecoderConfig, DistortionLimit};
use crate::features::{
    CombinedFeaturizer, FeatureVector, Featurizer, LinearScorer, RuleFeaturizer,
    LINEAR_DISTORTION_FEATURE, WORD_PENALTY_FEATURE,
};
use crate::lm::{LanguageModelFeaturizer, NgramModel, LM_FEATURE};
use crate::rules::{Rule, Span, StaticRuleSource};

use super::Decoder;

pub(crate) const TM: &str = "TM";

pub(crate) fn toks(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

/// Rule whose only feature is `TM = score`; with [`tm_scorer`] its
/// isolation score equals `score`.
pub(crate) fn rule(start: usize, end: usize, target: &str, score: f64) -> Rule {
    Rule::new(
        Span::new(start, end),
        Vec::new(),
        toks(target),
        score,
        FeatureVector::from_pairs(&[(TM, score)]),
    )
}

pub(crate) fn tm_scorer() -> LinearScorer {
    LinearScorer::from_pairs(&[(TM, 1.0)])
}

pub(crate) fn config(distortion: DistortionLimit) -> DecoderConfig {
    DecoderConfig {
        distortion,
        ..DecoderConfig::default()
    }
}

/// Decoder scoring rules by their `TM` feature only.
pub(crate) fn tm_decoder(rules: Vec<Rule>, config: DecoderConfig) -> Decoder {
    Decoder::new(
        Arc::new(StaticRuleSource::new(rules)),
        Arc::new(RuleFeaturizer),
        Arc::new(tm_scorer()),
        config,
    )
    .unwrap()
}

/// `a b c` with one rule per word and a two-word phrase for `a b`.
pub(crate) fn abc_rules() -> Vec<Rule> {
    vec![
        rule(0, 1, "X", 1.0),
        rule(1, 2, "Y", 1.0),
        rule(2, 3, "Z", 1.0),
        rule(0, 2, "XY", 2.5),
    ]
}

/// Bigram model preferring "b a" over "a b".
pub(crate) fn reorder_lm() -> NgramModel {
    let mut lm = NgramModel::new(2).with_unknown_logprob(-5.0);
    for w in ["a", "b", "c", "</s>"] {
        lm.insert(&[w], -2.0, Some(0.0));
    }
    lm.insert(&["<s>", "b"], -0.1, None);
    lm.insert(&["b", "a"], -0.1, None);
    lm.insert(&["a", "c"], -0.1, None);
    lm.insert(&["c", "</s>"], -0.1, None);
    lm
}

/// Rule features, word penalty, linear distortion and an LM.
pub(crate) fn full_featurizer(lm: NgramModel) -> CombinedFeaturizer {
    let mut featurizer = CombinedFeaturizer::baseline();
    featurizer.push(Box::new(LanguageModelFeaturizer::new(lm)));
    featurizer
}

pub(crate) fn full_scorer() -> LinearScorer {
    LinearScorer::from_pairs(&[
        (TM, 1.0),
        (LM_FEATURE, 1.0),
        (WORD_PENALTY_FEATURE, 0.1),
        (LINEAR_DISTORTION_FEATURE, 0.2),
    ])
}

pub(crate) fn full_decoder(rules: Vec<Rule>, lm: NgramModel, config: DecoderConfig) -> Decoder {
    Decoder::new(
        Arc::new(StaticRuleSource::new(rules)),
        Arc::new(full_featurizer(lm)),
        Arc::new(full_scorer()),
        config,
    )
    .unwrap()
}

/// Highest score over every derivation, by exhaustive search.
///
/// Enumerates all rule sequences that cover the sentence exactly once
/// within the distortion limit and scores each from scratch.
pub(crate) fn brute_force_best(
    rules: &[Rule],
    source_len: usize,
    featurizer: &dyn Featurizer,
    scorer: &LinearScorer,
    distortion: DistortionLimit,
) -> Option<(f64, Vec<String>)> {
    use crate::coverage::CoverageSet;
    use crate::features::{Featurizable, Scorer};

    struct Walk<'a> {
        rules: &'a [Rule],
        featurizer: &'a dyn Featurizer,
        scorer: &'a LinearScorer,
        distortion: DistortionLimit,
        source: Vec<String>,
        best: Option<(f64, Vec<String>)>,
    }

    fn go(w: &mut Walk<'_>, coverage: &CoverageSet, prior: Option<Span>, tokens: &[String], score: f64) {
        if coverage.is_complete() {
            if w.best.as_ref().map_or(true, |(b, _)| score > *b) {
                w.best = Some((score, tokens.to_vec()));
            }
            return;
        }
        for rule in w.rules {
            let span = rule.span;
            if coverage.intersects(span.start, span.end) {
                continue;
            }
            let jump = span.start.abs_diff(prior.map_or(0, |s| s.end));
            if !w.distortion.allows(jump) {
                continue;
            }
            let next = coverage.extended(span.start, span.end);
            let context_len = w.featurizer.context_len();
            let f = Featurizable {
                sentence_id: 0,
                source: &w.source,
                rule,
                prior_span: prior,
                prior_context: &tokens[tokens.len().saturating_sub(context_len)..],
                target_position: tokens.len(),
                untranslated: next.len() - next.cardinality(),
                done: next.is_complete(),
            };
            let local = w.scorer.score(&w.featurizer.featurize(&f));
            let mut extended = tokens.to_vec();
            extended.extend(rule.target.iter().cloned());
            go(w, &next, Some(span), &extended, score + local);
        }
    }

    let mut walk = Walk {
        rules,
        featurizer,
        scorer,
        distortion,
        source: vec![String::new(); source_len],
        best: None,
    };
    go(&mut walk, &CoverageSet::new(source_len), None, &[], 0.0);
    walk.best
}
