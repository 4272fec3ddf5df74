use serde::Serialize;

use crate::rules::{RuleId, Span};

use super::hypothesis::HypId;
use super::lattice::StateLatticeDecoder;
use super::space::{SearchSpace, SearchStats};
use super::{DecodeConstraints, DecodeError, Decoder, PhraseAlignment};

/// Full diagnostic result for a single sentence.
#[derive(Debug, Serialize)]
pub struct ExplainResult {
    pub source: Vec<String>,
    pub sentence_id: usize,
    pub rules: Vec<ExplainRule>,
    /// Future-cost estimate of the empty hypothesis.
    pub initial_heuristic: Option<f64>,
    pub stats: Option<SearchStats>,
    pub derivations: Vec<ExplainDerivation>,
}

/// A rule of the sentence's grid for diagnostic display.
#[derive(Debug, Serialize)]
pub struct ExplainRule {
    pub span: Span,
    pub source: String,
    pub target: String,
    pub isolation_score: f64,
}

/// A derivation with its per-rule score breakdown.
#[derive(Debug, Serialize)]
pub struct ExplainDerivation {
    pub target: String,
    /// Score from the lattice, before re-scoring.
    pub estimate: f64,
    pub score: f64,
    pub goal: HypId,
    pub steps: Vec<ExplainStep>,
    pub alignment: Vec<PhraseAlignment>,
}

/// One hypothesis on a derivation.
#[derive(Debug, Serialize)]
pub struct ExplainStep {
    pub hyp: HypId,
    pub span: Span,
    pub target: String,
    pub local_score: f64,
    pub score: f64,
    pub heuristic: f64,
    pub linear_distortion: usize,
    /// Hypotheses recombined into this one.
    pub recombined: usize,
}

/// Decodes `source` and reports the rule grid, search counters and the
/// top `n` lattice paths with their step-by-step scores.
pub fn explain(
    decoder: &Decoder,
    source: &[String],
    sentence_id: usize,
    constraints: &DecodeConstraints,
    n: usize,
) -> Result<ExplainResult, DecodeError> {
    decoder.with_search(source, sentence_id, constraints, |search| {
        let mut result = ExplainResult {
            source: source.to_vec(),
            sentence_id,
            rules: Vec::new(),
            initial_heuristic: None,
            stats: None,
            derivations: Vec::new(),
        };
        if let Some((space, goals)) = search {
            result.rules = explain_rules(space);
            result.initial_heuristic = Some(space.heuristic.initial());
            result.stats = Some(space.stats.clone());
            result.derivations = explain_derivations(space, goals, n);
        }
        result
    })
}

fn explain_rules(space: &SearchSpace<'_>) -> Vec<ExplainRule> {
    let len = space.source_len();
    let mut rules = Vec::new();
    for start in 0..len {
        for end in start + 1..=len {
            for &id in space.grid.get(start, end) {
                let rule = space.grid.rule(id);
                rules.push(ExplainRule {
                    span: rule.span,
                    source: rule.source.join(" "),
                    target: rule.target.join(" "),
                    isolation_score: rule.isolation_score,
                });
            }
        }
    }
    rules
}

fn explain_derivations(space: &SearchSpace<'_>, goals: &[HypId], n: usize) -> Vec<ExplainDerivation> {
    StateLatticeDecoder::new(&space.arena, &space.history, goals)
        .take(n)
        .filter_map(|path| {
            let goal = path.goal()?;
            let rules: Vec<RuleId> = path.nodes.iter().filter_map(|&h| space.arena[h].rule).collect();
            let translation = space.rescore(&rules, goal);
            let steps = path
                .nodes
                .iter()
                .filter_map(|&id| {
                    let hyp = &space.arena[id];
                    let rule = space.grid.rule(hyp.rule?);
                    Some(ExplainStep {
                        hyp: id,
                        span: rule.span,
                        target: rule.target.join(" "),
                        local_score: hyp.local_score,
                        score: hyp.score,
                        heuristic: hyp.heuristic,
                        linear_distortion: hyp.linear_distortion,
                        recombined: space.history.alternatives(id).len(),
                    })
                })
                .collect();
            Some(ExplainDerivation {
                target: translation.text(),
                estimate: path.estimate,
                score: translation.score,
                goal,
                steps,
                alignment: translation.alignment,
            })
        })
        .collect()
}

/// Human-readable rendering of an [`ExplainResult`].
pub fn format_text(result: &ExplainResult) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== Rules for \"{}\" ({} tokens, {} rules) ===\n",
        result.source.join(" "),
        result.source.len(),
        result.rules.len(),
    ));
    let mut last_start = None;
    for rule in &result.rules {
        if last_start != Some(rule.span.start) {
            out.push_str(&format!("  Position {}:\n", rule.span.start));
            last_start = Some(rule.span.start);
        }
        out.push_str(&format!(
            "    {:<8} {} -> {}  score={:.4}\n",
            rule.span.to_string(),
            rule.source,
            rule.target,
            rule.isolation_score,
        ));
    }

    if let Some(h) = result.initial_heuristic {
        out.push_str(&format!("\nInitial heuristic: {h:.4}\n"));
    }
    if let Some(stats) = &result.stats {
        out.push_str(&format!(
            "Search: generated={} recombined={} pruned={} discarded={} infeasible={} constrained={}\n",
            stats.generated,
            stats.recombined,
            stats.pruned,
            stats.discarded,
            stats.infeasible,
            stats.constrained,
        ));
        let sizes: Vec<String> = stats.beam_sizes.iter().map(|s| s.to_string()).collect();
        out.push_str(&format!("Beams:  [{}]\n", sizes.join(", ")));
    }

    if result.derivations.is_empty() {
        out.push_str("\nNo derivations found.\n");
        return out;
    }

    out.push_str(&format!("\n=== Derivations ({}) ===\n", result.derivations.len()));
    for (i, d) in result.derivations.iter().enumerate() {
        out.push_str(&format!(
            "\n  #{:<2} {}  (score={:.4}, estimate={:.4})\n",
            i + 1,
            d.target,
            d.score,
            d.estimate,
        ));
        for step in &d.steps {
            let recombined = if step.recombined > 0 {
                format!("  +{} recombined", step.recombined)
            } else {
                String::new()
            };
            out.push_str(&format!(
                "      {:<8} {:<20} local={:<9.4} total={:<9.4} h={:<9.4} jump={}{}\n",
                step.span.to_string(),
                step.target,
                step.local_score,
                step.score,
                step.heuristic,
                step.linear_distortion,
                recombined,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistortionLimit;
    use crate::search::testutil::*;

    #[test]
    fn test_explain_reports_grid_and_paths() {
        let decoder = tm_decoder(abc_rules(), config(DistortionLimit::Limit(0)));
        let result = explain(&decoder, &toks("a b c"), 3, &DecodeConstraints::none(), 5).unwrap();
        assert_eq!(result.sentence_id, 3);
        assert_eq!(result.rules.len(), 4);
        assert!((result.initial_heuristic.unwrap() - 3.5).abs() < 1e-9);
        assert_eq!(result.derivations.len(), 2);

        let best = &result.derivations[0];
        assert_eq!(best.target, "XY Z");
        assert!((best.score - 3.5).abs() < 1e-9);
        assert_eq!(best.steps.len(), 2);
        assert_eq!(best.steps[0].span, Span::new(0, 2));
        assert!((best.steps[1].score - 3.5).abs() < 1e-9);

        let stats = result.stats.unwrap();
        assert!(stats.generated >= 4);
        assert_eq!(stats.beam_sizes.len(), 4);
    }

    #[test]
    fn test_explain_untileable() {
        let decoder = tm_decoder(vec![rule(0, 1, "X", 1.0)], config(DistortionLimit::Limit(0)));
        let result = explain(&decoder, &toks("a b"), 0, &DecodeConstraints::none(), 5).unwrap();
        assert!(result.derivations.is_empty());
        assert!(format_text(&result).contains("No derivations found."));
    }

    #[test]
    fn test_format_text() {
        let decoder = tm_decoder(abc_rules(), config(DistortionLimit::Limit(0)));
        let result = explain(&decoder, &toks("a b c"), 0, &DecodeConstraints::none(), 5).unwrap();
        let text = format_text(&result);
        assert!(text.contains("=== Rules for \"a b c\" (3 tokens, 4 rules) ==="));
        assert!(text.contains("#1  XY Z  (score=3.5000"));
        assert!(text.contains("=== Derivations (2) ==="));
    }
}
