//! Future-cost estimate over uncovered source spans.
//!
//! For every span the table holds the best score obtainable by tiling it
//! with rules scored in isolation. A hypothesis' heuristic is the sum of the
//! table entries of its maximal uncovered gaps. Context-dependent features
//! are ignored, so the estimate is guidance for pruning rather than a bound.

use tracing::{debug, debug_span};

use crate::coverage::CoverageSet;
use crate::rules::RuleGrid;

/// Best isolation-score tiling of each source span.
#[derive(Debug, Clone)]
pub struct SpanScores {
    len: usize,
    /// table[start * len + (end - 1)]
    table: Vec<f64>,
}

impl SpanScores {
    pub fn build(grid: &RuleGrid) -> Self {
        let len = grid.source_len();
        let _span = debug_span!("heuristic", source_len = len).entered();
        let mut table = vec![f64::NEG_INFINITY; len * len];

        for start in 0..len {
            for end in start + 1..=len {
                table[start * len + end - 1] = grid
                    .get(start, end)
                    .iter()
                    .map(|&id| grid.rule(id).isolation_score)
                    .filter(|score| !score.is_nan())
                    .fold(f64::NEG_INFINITY, f64::max);
            }
        }

        for width in 2..=len {
            for start in 0..=len - width {
                let end = start + width;
                let mut best = table[start * len + end - 1];
                for split in start + 1..end {
                    let left = table[start * len + split - 1];
                    let right = table[split * len + end - 1];
                    best = best.max(left + right);
                }
                table[start * len + end - 1] = best;
            }
        }

        let scores = Self { len, table };
        debug!(initial = scores.initial());
        scores
    }

    /// Score of the best tiling of `[start, end)`; `-inf` when no tiling
    /// exists.
    pub fn get(&self, start: usize, end: usize) -> f64 {
        if start >= end || end > self.len {
            return 0.0;
        }
        self.table[start * self.len + end - 1]
    }

    /// Estimate for the empty coverage. `-inf` means the rules cannot tile
    /// the sentence at all.
    pub fn initial(&self) -> f64 {
        self.get(0, self.len)
    }

    /// Sum over the maximal uncovered gaps of `coverage`.
    pub fn estimate(&self, coverage: &CoverageSet) -> f64 {
        coverage.gaps().map(|(start, end)| self.get(start, end)).sum()
    }

    /// Change in the estimate when `old` grows into `new`.
    pub fn delta(&self, old: &CoverageSet, new: &CoverageSet) -> f64 {
        let before = self.estimate(old);
        let after = self.estimate(new);
        if before == f64::NEG_INFINITY && after == f64::NEG_INFINITY {
            return 0.0;
        }
        after - before
    }
}
