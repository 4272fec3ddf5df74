mod cube;
mod properties;

use crate::rules::Span;

use super::RichTranslation;

/// Source jumps between consecutive rules, measured from position 0.
pub(super) fn jumps(t: &RichTranslation) -> Vec<usize> {
    let mut prior_end = 0;
    t.alignment
        .iter()
        .map(|a| {
            let jump = a.source.start.abs_diff(prior_end);
            prior_end = a.source.end;
            jump
        })
        .collect()
}

/// True if the applied spans tile `[0, len)` exactly once.
pub(super) fn covers_exactly(t: &RichTranslation, len: usize) -> bool {
    let mut spans: Vec<Span> = t.alignment.iter().map(|a| a.source).collect();
    spans.sort();
    let mut next = 0;
    for span in spans {
        if span.start != next {
            return false;
        }
        next = span.end;
    }
    next == len
}
