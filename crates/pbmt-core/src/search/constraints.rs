//! Legality of applying a source span to a hypothesis.

use crate::config::DistortionLimit;
use crate::coverage::CoverageSet;
use crate::rules::Span;

use super::hypothesis::Hypothesis;

/// Source spans that may extend `hyp`: uncovered, within the phrase length
/// bound, inside the distortion limit and (optionally) ITG-consistent.
pub(crate) fn legal_spans(
    hyp: &Hypothesis,
    max_phrase_len: usize,
    distortion: DistortionLimit,
    itg: bool,
) -> Vec<Span> {
    let len = hyp.coverage.len();
    let mut spans = Vec::new();
    let mut start = hyp.coverage.next_clear_from(0);
    while start < len {
        if distortion.allows(start.abs_diff(hyp.last_end())) {
            let gap_end = hyp.coverage.next_set_from(start).unwrap_or(len);
            let max_end = gap_end.min(start + max_phrase_len);
            for end in start + 1..=max_end {
                let span = Span::new(start, end);
                if !itg || itg_consistent(&hyp.coverage, hyp.last_span, span) {
                    spans.push(span);
                }
            }
        }
        start = hyp.coverage.next_clear_from(start + 1);
    }
    spans
}

/// Rejects orders that no binary bracketing can produce: every covered
/// block skipped over by the jump must be attached to the block next to it.
pub(crate) fn itg_consistent(coverage: &CoverageSet, prior: Option<Span>, span: Span) -> bool {
    let Some(prior) = prior else {
        return true;
    };
    if span.start > prior.start {
        (prior.end..span.start).all(|pos| !coverage.is_set(pos) || coverage.is_set(pos - 1))
    } else {
        (span.start..prior.start).all(|pos| !coverage.is_set(pos) || coverage.is_set(pos + 1))
    }
}
