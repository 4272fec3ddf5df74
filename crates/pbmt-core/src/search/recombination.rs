use std::collections::HashMap;

use crate::config::RecombinationMode;
use crate::coverage::CoverageSet;

use super::hypothesis::{HypId, Hypothesis};

/// Equivalence class of search states under classic recombination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecombinationKey {
    coverage: CoverageSet,
    context: Vec<String>,
    last_end: usize,
}

/// Decides which hypotheses are interchangeable for every future expansion.
///
/// Classic recombination merges hypotheses with identical coverage,
/// identical last `history_len` target tokens and the same end of the last
/// covered span. That is exact as long as no featurizer reads more target
/// context than `history_len` and distortion only depends on the last end.
#[derive(Debug, Clone, Copy)]
pub struct RecombinationFilter {
    mode: RecombinationMode,
    history_len: usize,
}

impl RecombinationFilter {
    pub fn new(mode: RecombinationMode, history_len: usize) -> Self {
        Self { mode, history_len }
    }

    pub fn mode(&self) -> RecombinationMode {
        self.mode
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// `None` when recombination is off.
    pub fn key(&self, hyp: &Hypothesis) -> Option<RecombinationKey> {
        match self.mode {
            RecombinationMode::Off => None,
            RecombinationMode::Classic => Some(RecombinationKey {
                coverage: hyp.coverage.clone(),
                context: hyp.context(self.history_len).to_vec(),
                last_end: hyp.last_end(),
            }),
        }
    }

    pub fn combinable(&self, a: &Hypothesis, b: &Hypothesis) -> bool {
        match self.mode {
            RecombinationMode::Off => false,
            RecombinationMode::Classic => {
                a.coverage == b.coverage
                    && a.last_end() == b.last_end()
                    && a.context(self.history_len) == b.context(self.history_len)
            }
        }
    }
}

/// Survivor → hypotheses recombined into it.
///
/// When a survivor is itself later dominated, its alternatives move to the
/// new survivor so every list stays one level deep.
#[derive(Debug, Default)]
pub struct RecombinationHistory {
    alternatives: HashMap<HypId, Vec<HypId>>,
}

impl RecombinationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, survivor: HypId, dominated: HypId) {
        let mut moved = self.alternatives.remove(&dominated).unwrap_or_default();
        let list = self.alternatives.entry(survivor).or_default();
        list.push(dominated);
        list.append(&mut moved);
    }

    /// Hypotheses recombined into `id`.
    pub fn alternatives(&self, id: HypId) -> &[HypId] {
        self.alternatives.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Total number of recorded alternatives.
    pub fn len(&self) -> usize {
        self.alternatives.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Span;

    fn hyp(id: u32, covered: (usize, usize), tail: &[&str]) -> Hypothesis {
        let mut coverage = CoverageSet::new(4);
        coverage.set_range(covered.0, covered.1);
        Hypothesis {
            id: HypId(id),
            predecessor: None,
            rule: None,
            coverage,
            score: 0.0,
            heuristic: 0.0,
            local_score: 0.0,
            target_len: tail.len(),
            depth: 1,
            last_span: Some(Span::new(covered.0, covered.1)),
            linear_distortion: 0,
            done: false,
            tail: tail.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn classic_compares_trailing_context() {
        let filter = RecombinationFilter::new(RecombinationMode::Classic, 1);
        let a = hyp(1, (0, 2), &["x", "the"]);
        let b = hyp(2, (0, 2), &["y", "the"]);
        let c = hyp(3, (0, 2), &["x", "a"]);
        assert!(filter.combinable(&a, &b));
        assert_eq!(filter.key(&a), filter.key(&b));
        assert!(!filter.combinable(&a, &c));

        let wider = RecombinationFilter::new(RecombinationMode::Classic, 2);
        assert!(!wider.combinable(&a, &b));
        assert_ne!(wider.key(&a), wider.key(&b));
    }

    #[test]
    fn classic_compares_coverage_and_last_end() {
        let filter = RecombinationFilter::new(RecombinationMode::Classic, 0);
        let a = hyp(1, (0, 2), &["x"]);
        let b = hyp(2, (1, 3), &["x"]);
        assert!(!filter.combinable(&a, &b));

        let mut c = hyp(3, (0, 2), &["x"]);
        c.last_span = Some(Span::new(0, 1));
        assert!(!filter.combinable(&a, &c));
    }

    #[test]
    fn off_never_combines() {
        let filter = RecombinationFilter::new(RecombinationMode::Off, 3);
        let a = hyp(1, (0, 2), &["x"]);
        assert!(!filter.combinable(&a, &a.clone()));
        assert_eq!(filter.key(&a), None);
    }

    #[test]
    fn history_moves_alternatives_to_new_survivor() {
        let mut history = RecombinationHistory::new();
        history.log(HypId(5), HypId(3));
        history.log(HypId(5), HypId(4));
        history.log(HypId(9), HypId(5));
        assert!(history.alternatives(HypId(5)).is_empty());
        assert_eq!(
            history.alternatives(HypId(9)),
            [HypId(5), HypId(3), HypId(4)]
        );
        assert_eq!(history.len(), 3);
    }
}
