//! N-best extraction: walk the lattice, re-score each path, keep the top n.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, debug_span, warn};

use crate::config::NbestConfig;
use crate::rules::RuleId;

use super::hypothesis::HypId;
use super::lattice::StateLatticeDecoder;
use super::space::SearchSpace;
use super::RichTranslation;

/// Why extraction stopped before collecting `n` derivations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NbestStop {
    ScanLimit,
    TimeBudget,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NbestDiagnostic {
    pub stop: NbestStop,
    pub requested: usize,
    pub returned: usize,
    /// Lattice paths examined.
    pub scanned: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NbestList {
    /// Sorted by true score, best first.
    pub translations: Vec<RichTranslation>,
    /// Set when the list may be missing derivations.
    pub diagnostic: Option<NbestDiagnostic>,
}

impl NbestList {
    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }

    pub fn best(&self) -> Option<&RichTranslation> {
        self.translations.first()
    }
}

pub(crate) fn extract(
    space: &SearchSpace<'_>,
    goals: &[HypId],
    n: usize,
    config: &NbestConfig,
) -> NbestList {
    let _span = debug_span!("nbest", n, goals = goals.len()).entered();
    let started = Instant::now();
    let scan_limit = n.saturating_mul(config.scan_factor);

    let mut translations: Vec<RichTranslation> = Vec::with_capacity(n);
    let mut seen_rules: HashSet<Vec<RuleId>> = HashSet::new();
    let mut seen_surface: HashSet<Vec<String>> = HashSet::new();
    let mut scanned = 0;
    let mut stop = None;

    for path in StateLatticeDecoder::new(&space.arena, &space.history, goals) {
        if translations.len() >= n {
            break;
        }
        if scanned >= scan_limit {
            stop = Some(NbestStop::ScanLimit);
            break;
        }
        if config.time_budget.is_some_and(|budget| started.elapsed() >= budget) {
            stop = Some(NbestStop::TimeBudget);
            break;
        }
        scanned += 1;

        let Some(goal) = path.goal() else {
            continue;
        };
        let rules: Vec<RuleId> = path.nodes.iter().filter_map(|&h| space.arena[h].rule).collect();
        if !seen_rules.insert(rules.clone()) {
            continue;
        }
        let translation = space.rescore(&rules, goal);
        if !translation.score.is_finite() {
            continue;
        }
        if let Some(references) = space.params.references {
            if !references.iter().any(|r| *r == translation.tokens) {
                continue;
            }
        }
        if let Some(prefix) = space.params.prefix {
            if !translation.tokens.starts_with(prefix) {
                continue;
            }
        }
        if config.distinct_surface && !seen_surface.insert(translation.tokens.clone()) {
            continue;
        }
        translations.push(translation);
    }

    // Recombination makes lattice estimates inexact; order by true score.
    translations.sort_by(|a, b| b.score.total_cmp(&a.score));
    translations.truncate(n);

    let diagnostic = stop.map(|stop| NbestDiagnostic {
        stop,
        requested: n,
        returned: translations.len(),
        scanned,
    });
    if let Some(d) = &diagnostic {
        warn!(
            stop = ?d.stop,
            requested = d.requested,
            returned = d.returned,
            scanned = d.scanned,
            "n-best list truncated"
        );
    } else {
        debug!(returned = translations.len(), scanned);
    }

    NbestList {
        translations,
        diagnostic,
    }
}
