//! Property-based tests for the search.
//!
//! Generates small random rule sets via proptest and checks the decoder
//! against exhaustive search and structural invariants.

use proptest::prelude::*;

use super::{covers_exactly, jumps};
use crate::config::{BeamStrategy, DecoderConfig, DistortionLimit, NbestConfig};
use crate::features::Scorer;
use crate::lm::NgramModel;
use crate::rules::Rule;
use crate::search::testutil::*;
use crate::search::{DecodeConstraints, HypId, NbestList};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

const WORDS: [&str; 3] = ["a", "b", "c"];

fn arb_target() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS.to_vec()), 1..=2).prop_map(|w| w.join(" "))
}

/// Rule score in quarter steps, so sums stay exact.
fn arb_score() -> impl Strategy<Value = f64> {
    (-12i32..=0).prop_map(|q| q as f64 / 4.0)
}

/// Up to three rules per position; the first always covers one word so
/// every sentence can be tiled.
fn arb_rules(len: usize) -> impl Strategy<Value = Vec<Rule>> {
    let per_position = (
        arb_target(),
        arb_score(),
        prop::collection::vec((1usize..=2, arb_target(), arb_score()), 0..=2),
    );
    prop::collection::vec(per_position, len).prop_map(move |positions| {
        let mut rules = Vec::new();
        for (start, (target, score, extra)) in positions.into_iter().enumerate() {
            rules.push(rule(start, start + 1, &target, score));
            for (width, target, score) in extra {
                if start + width <= len {
                    rules.push(rule(start, start + width, &target, score));
                }
            }
        }
        rules
    })
}

fn arb_case() -> impl Strategy<Value = (usize, Vec<Rule>)> {
    (1usize..=5).prop_flat_map(|len| (Just(len), arb_rules(len)))
}

/// A case plus a position `s` in `1..len`; no rule may end at `s`.
fn arb_blocked_case() -> impl Strategy<Value = (usize, Vec<Rule>, usize)> {
    (2usize..=5).prop_flat_map(|len| (Just(len), arb_rules(len), 1..len))
}

fn arb_distortion() -> impl Strategy<Value = DistortionLimit> {
    prop_oneof![
        2 => (0usize..=2).prop_map(DistortionLimit::Limit),
        1 => Just(DistortionLimit::Unlimited),
    ]
}

fn bigram() -> NgramModel {
    let mut lm = NgramModel::new(2).with_unknown_logprob(-3.0);
    for (w, lp) in [("a", -1.0), ("b", -1.5), ("c", -2.0), ("</s>", -1.0)] {
        lm.insert(&[w], lp, Some(-0.5));
    }
    lm.insert(&["<s>", "c"], -0.25, None);
    lm.insert(&["a", "b"], -0.25, None);
    lm.insert(&["b", "a"], -0.5, None);
    lm.insert(&["c", "a"], -0.25, None);
    lm.insert(&["b", "</s>"], -0.25, None);
    lm
}

fn wide(distortion: DistortionLimit, strategy: BeamStrategy) -> DecoderConfig {
    DecoderConfig {
        strategy,
        beam_size: 100_000,
        distortion,
        ..DecoderConfig::default()
    }
}

fn source(len: usize) -> Vec<String> {
    (0..len).map(|i| format!("s{i}")).collect()
}

fn strategy(cube: bool) -> BeamStrategy {
    if cube {
        BeamStrategy::CubePruning
    } else {
        BeamStrategy::Sorted
    }
}

fn exact(list: &NbestList) -> Vec<(Vec<String>, u64)> {
    list.translations
        .iter()
        .map(|t| (t.tokens.clone(), t.score.to_bits()))
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// With a beam wide enough to never prune, recombination must not lose
    /// the best derivation.
    #[test]
    fn recombination_matches_brute_force(
        (len, rules) in arb_case(),
        distortion in arb_distortion(),
    ) {
        let decoder = full_decoder(rules.clone(), bigram(), wide(distortion, BeamStrategy::Sorted));
        let got = decoder.translate(&source(len), 0, &DecodeConstraints::none()).unwrap();
        let expected = brute_force_best(&rules, len, &full_featurizer(bigram()), &full_scorer(), distortion);
        match (got, expected) {
            (Some(t), Some((score, _))) => prop_assert!((t.score - score).abs() < 1e-9,
                "decoder {} vs brute force {}", t.score, score),
            (None, None) => {}
            (got, expected) => prop_assert!(false, "decoder {:?} vs brute force {:?}",
                got.map(|t| t.score), expected.map(|e| e.0)),
        }
    }

    /// Exhaustive cube pruning reaches the same optimum as sorted search.
    #[test]
    fn cube_pruning_matches_sorted_with_wide_beam(
        (len, rules) in arb_case(),
        distortion in arb_distortion(),
    ) {
        let src = source(len);
        let sorted = full_decoder(rules.clone(), bigram(), wide(distortion, BeamStrategy::Sorted))
            .translate(&src, 0, &DecodeConstraints::none()).unwrap();
        let cube = full_decoder(rules, bigram(), wide(distortion, BeamStrategy::CubePruning))
            .translate(&src, 0, &DecodeConstraints::none()).unwrap();
        prop_assert_eq!(sorted.is_some(), cube.is_some());
        if let (Some(s), Some(c)) = (sorted, cube) {
            prop_assert!((s.score - c.score).abs() < 1e-9);
        }
    }

    /// Every output covers the source exactly once within the jump limit,
    /// and its score is the weighted sum of its features.
    #[test]
    fn outputs_are_well_formed(
        (len, rules) in arb_case(),
        distortion in arb_distortion(),
        beam_size in 1usize..=8,
        cube in any::<bool>(),
    ) {
        let config = DecoderConfig { beam_size, ..wide(distortion, strategy(cube)) };
        let decoder = full_decoder(rules, bigram(), config);
        let list = decoder.nbest(&source(len), 0, &DecodeConstraints::none(), 5).unwrap();
        let scorer = full_scorer();
        for t in &list.translations {
            prop_assert!(covers_exactly(t, len));
            prop_assert!(jumps(t).iter().all(|&j| distortion.allows(j)));
            prop_assert!((scorer.score(&t.features) - t.score).abs() < 1e-9);
        }
    }

    /// N-best lists are sorted and, with dedup on, surface-distinct.
    #[test]
    fn nbest_sorted_and_distinct(
        (len, rules) in arb_case(),
        n in 1usize..=8,
    ) {
        let config = DecoderConfig {
            nbest: NbestConfig { distinct_surface: true, ..NbestConfig::default() },
            ..wide(DistortionLimit::Limit(1), BeamStrategy::Sorted)
        };
        let decoder = full_decoder(rules, bigram(), config);
        let list = decoder.nbest(&source(len), 0, &DecodeConstraints::none(), n).unwrap();
        prop_assert!(list.len() <= n);
        for pair in list.translations.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            prop_assert_ne!(&pair[0].tokens, &pair[1].tokens);
        }
        let mut seen = std::collections::HashSet::new();
        for t in &list.translations {
            prop_assert!(seen.insert(t.tokens.clone()));
        }
    }

    /// Same input, same configuration, same output.
    #[test]
    fn decoding_is_deterministic(
        (len, rules) in arb_case(),
        beam_size in 1usize..=4,
    ) {
        let config = DecoderConfig { beam_size, ..wide(DistortionLimit::Limit(2), BeamStrategy::Sorted) };
        let decoder = full_decoder(rules, bigram(), config);
        let src = source(len);
        let first = decoder.nbest(&src, 0, &DecodeConstraints::none(), 4).unwrap();
        let second = decoder.nbest(&src, 0, &DecodeConstraints::none(), 4).unwrap();
        prop_assert_eq!(exact(&first), exact(&second));
    }

    /// Along every arena edge the coverage grows by exactly the applied
    /// rule's span and the score grows by exactly the local score.
    #[test]
    fn arena_edges_extend_coverage_and_add_scores(
        (len, rules) in arb_case(),
        distortion in arb_distortion(),
        beam_size in 1usize..=8,
        cube in any::<bool>(),
    ) {
        let config = DecoderConfig { beam_size, ..wide(distortion, strategy(cube)) };
        let decoder = full_decoder(rules, bigram(), config);
        let bad = decoder
            .with_search(&source(len), 0, &DecodeConstraints::none(), |search| {
                let Some((space, _)) = search else {
                    return Vec::new();
                };
                let mut bad = Vec::new();
                for i in 0..space.arena.len() {
                    let h = &space.arena[HypId(i as u32)];
                    let (Some(pred), Some(rule)) = (h.predecessor, h.rule) else {
                        continue;
                    };
                    let p = &space.arena[pred];
                    let span = space.grid.rule(rule).span;
                    let ok = h.coverage.is_superset(&p.coverage)
                        && !p.coverage.intersects(span.start, span.end)
                        && h.coverage == p.coverage.extended(span.start, span.end)
                        && h.coverage.cardinality() == p.coverage.cardinality() + span.len()
                        && h.score == p.score + h.local_score
                        && h.depth == p.depth + 1;
                    if !ok {
                        bad.push(i);
                    }
                }
                bad
            })
            .unwrap();
        prop_assert!(bad.is_empty(), "inconsistent arena nodes {:?}", bad);
    }

    /// A rule reachable only by a jump past the limit changes nothing.
    #[test]
    fn unreachable_rule_leaves_output_unchanged(
        (len, mut rules, blocked) in arb_blocked_case(),
        beam_size in 1usize..=8,
        cube in any::<bool>(),
    ) {
        // nothing ends at `blocked`, so a monotone search never stands there
        rules.retain(|r| r.span.end != blocked);
        let mut with_extra = rules.clone();
        // lowest possible score keeps the span table unchanged
        with_extra.push(rule(blocked, blocked + 1, "c", -3.0));

        let config = DecoderConfig {
            beam_size,
            ..wide(DistortionLimit::Limit(0), strategy(cube))
        };
        let src = source(len);
        let without = full_decoder(rules, bigram(), config.clone())
            .nbest(&src, 0, &DecodeConstraints::none(), 4)
            .unwrap();
        let with = full_decoder(with_extra, bigram(), config)
            .nbest(&src, 0, &DecodeConstraints::none(), 4)
            .unwrap();
        prop_assert_eq!(exact(&without), exact(&with));
    }
}
