use tracing::{debug, warn};

use crate::coverage::CoverageSet;

use super::{Rule, RuleId, Span};

/// Rules of one sentence, indexed by source span.
///
/// Each span cell lists its rules best-first by isolation score, NaN scores
/// last; ties keep the order in which the rule source produced them.
pub struct RuleGrid {
    rules: Vec<Rule>,
    /// cells[start * len + (end - 1)]
    cells: Vec<Vec<RuleId>>,
    source_len: usize,
    longest_span: usize,
    coverage: CoverageSet,
}

impl RuleGrid {
    pub fn new(rules: Vec<Rule>, source_len: usize) -> Self {
        let mut kept = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.span.is_empty() || rule.span.end > source_len {
                warn!(span = %rule.span, source_len, "dropping rule outside the sentence");
                continue;
            }
            kept.push(rule);
        }

        let mut cells: Vec<Vec<RuleId>> = vec![Vec::new(); source_len * source_len];
        let mut coverage = CoverageSet::new(source_len);
        let mut longest_span = 0;
        for (idx, rule) in kept.iter().enumerate() {
            let Span { start, end } = rule.span;
            cells[start * source_len + end - 1].push(RuleId(idx as u32));
            coverage.set_range(start, end);
            longest_span = longest_span.max(rule.span.len());
        }
        for cell in &mut cells {
            cell.sort_by(|a, b| {
                let (sa, sb) = (
                    kept[a.0 as usize].isolation_score,
                    kept[b.0 as usize].isolation_score,
                );
                // NaN sorts last regardless of sign
                sa.is_nan().cmp(&sb.is_nan()).then_with(|| sb.total_cmp(&sa))
            });
        }

        debug!(rules = kept.len(), source_len, longest_span);
        Self {
            rules: kept,
            cells,
            source_len,
            longest_span,
            coverage,
        }
    }

    /// Rules covering exactly `[start, end)`, best first.
    pub fn get(&self, start: usize, end: usize) -> &[RuleId] {
        if start >= end || end > self.source_len {
            return &[];
        }
        &self.cells[start * self.source_len + end - 1]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0 as usize]
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Length of the longest source span with at least one rule.
    pub fn longest_span(&self) -> usize {
        self.longest_span
    }

    /// True if every source position is covered by some rule.
    pub fn is_coverage_complete(&self) -> bool {
        self.coverage.is_complete()
    }
}
