use super::covers_exactly;
use crate::config::{BeamStrategy, DecoderConfig, DistortionLimit};
use crate::search::testutil::*;
use crate::search::DecodeConstraints;

fn cube(distortion: DistortionLimit, beam_size: usize) -> DecoderConfig {
    DecoderConfig {
        strategy: BeamStrategy::CubePruning,
        beam_size,
        distortion,
        ..DecoderConfig::default()
    }
}

#[test]
fn test_cube_phrase_beats_words() {
    let decoder = tm_decoder(abc_rules(), cube(DistortionLimit::Limit(0), 200));
    let t = decoder
        .translate(&toks("a b c"), 0, &DecodeConstraints::none())
        .unwrap()
        .unwrap();
    assert_eq!(t.text(), "XY Z");
    assert!((t.score - 3.5).abs() < 1e-9);
}

#[test]
fn test_cube_matches_sorted_with_wide_beam() {
    let rules = vec![
        rule(0, 1, "a", -0.5),
        rule(0, 1, "b", -0.7),
        rule(1, 2, "b", -0.2),
        rule(1, 2, "a", -0.3),
        rule(2, 3, "c", -0.1),
        rule(0, 2, "b a", -0.4),
    ];
    let source = toks("x y z");
    let sorted = full_decoder(rules.clone(), reorder_lm(), config(DistortionLimit::Limit(2)))
        .translate(&source, 0, &DecodeConstraints::none())
        .unwrap()
        .unwrap();
    let cubed = full_decoder(rules, reorder_lm(), cube(DistortionLimit::Limit(2), 1000))
        .translate(&source, 0, &DecodeConstraints::none())
        .unwrap()
        .unwrap();
    assert!((sorted.score - cubed.score).abs() < 1e-9);
}

#[test]
fn test_cube_narrow_beam_completes() {
    let decoder = tm_decoder(abc_rules(), cube(DistortionLimit::Unlimited, 1));
    let t = decoder
        .translate(&toks("a b c"), 0, &DecodeConstraints::none())
        .unwrap()
        .unwrap();
    assert!(covers_exactly(&t, 3));
}

#[test]
fn test_cube_skips_constrained_cells() {
    let mut rules = abc_rules();
    rules.push(rule(0, 1, "Q", 5.0));
    rules.push(rule(1, 2, "W", 4.0));
    // allowed as a phrase but never as a prefix, so its cell is skipped
    rules.push(rule(0, 1, "Z", 9.0));
    let decoder = tm_decoder(rules, cube(DistortionLimit::Limit(0), 4));
    let forced = DecodeConstraints::forced(vec![toks("X W Z"), toks("X Y Z")]);
    let t = decoder
        .translate(&toks("a b c"), 0, &forced)
        .unwrap()
        .unwrap();
    assert_eq!(t.text(), "X W Z");
}

#[test]
fn test_cube_nbest() {
    let decoder = tm_decoder(abc_rules(), cube(DistortionLimit::Limit(0), 200));
    let list = decoder
        .nbest(&toks("a b c"), 0, &DecodeConstraints::none(), 5)
        .unwrap();
    let texts: Vec<String> = list.translations.iter().map(|t| t.text()).collect();
    assert_eq!(texts, vec!["XY Z", "X Y Z"]);
}
