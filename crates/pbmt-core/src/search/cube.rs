//! Cube pruning.
//!
//! When a beam is complete its hypotheses are grouped by (coverage, last
//! span); every group and every legal span with rules forms a bundle, a
//! grid of hypotheses (best first) × rules (best first). Filling the beam
//! for `i` covered words pops cells best-first from all bundles that lead to
//! `i`, pushing the right and lower neighbour of each popped cell, until
//! `beam_size` items have been popped.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, debug_span};

use crate::coverage::CoverageSet;
use crate::rules::{RuleId, Span};

use super::beam::Beam;
use super::hypothesis::HypId;
use super::space::SearchSpace;
use super::DecodeError;

struct Bundle {
    hyps: Rc<[HypId]>,
    rules: Vec<RuleId>,
}

struct Item {
    priority: f64,
    hyp: HypId,
    bundle: usize,
    row: usize,
    col: usize,
}

impl Ord for Item {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then(other.hyp.cmp(&self.hyp))
    }
}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Item {}

struct Cube<'s, 'a> {
    space: &'s mut SearchSpace<'a>,
    bundles: Vec<Bundle>,
    /// Bundle indices by the coverage cardinality they produce.
    pending: Vec<Vec<usize>>,
    heap: BinaryHeap<Item>,
    visited: HashSet<(usize, usize, usize)>,
}

impl Cube<'_, '_> {
    /// Turns a finished beam into bundles.
    fn bundle_beam(&mut self, beam: &Beam) {
        let mut groups: Vec<Vec<HypId>> = Vec::new();
        let mut index: HashMap<(CoverageSet, Option<Span>), usize> = HashMap::new();
        for hyp in beam.iter() {
            let h = &self.space.arena[hyp];
            let key = (h.coverage.clone(), h.last_span);
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(hyp);
        }

        for group in groups {
            let hyps: Rc<[HypId]> = group.into();
            let cardinality = self.space.arena[hyps[0]].coverage.cardinality();
            for span in self.space.legal_spans(hyps[0]) {
                let rules = self.space.grid.get(span.start, span.end);
                if rules.is_empty() {
                    continue;
                }
                self.pending[cardinality + span.len()].push(self.bundles.len());
                self.bundles.push(Bundle {
                    hyps: Rc::clone(&hyps),
                    rules: rules.to_vec(),
                });
            }
        }
    }

    /// Queues cell `(row, col)` of a bundle. Cells whose expansion is
    /// infeasible are skipped over to their own neighbours.
    fn push_cell(&mut self, bundle: usize, row: usize, col: usize) -> Result<(), DecodeError> {
        let mut stack = vec![(row, col)];
        while let Some((r, c)) = stack.pop() {
            let b = &self.bundles[bundle];
            if r >= b.hyps.len() || c >= b.rules.len() || !self.visited.insert((bundle, r, c)) {
                continue;
            }
            let (hyp, rule) = (b.hyps[r], b.rules[c]);
            match self.space.extend(hyp, rule)? {
                Some(next) => self.heap.push(Item {
                    priority: self.space.arena[next].priority(),
                    hyp: next,
                    bundle,
                    row: r,
                    col: c,
                }),
                None => {
                    stack.push((r, c + 1));
                    stack.push((r + 1, c));
                }
            }
        }
        Ok(())
    }
}

/// Fills the beams by cube pruning and returns the goal beam, best first.
pub(crate) fn search(space: &mut SearchSpace<'_>, beam_size: usize) -> Result<Vec<HypId>, DecodeError> {
    let len = space.source_len();
    let mut beams: Vec<Beam> = (0..=len).map(|_| Beam::new(beam_size)).collect();
    let root = space.root();
    let outcome = beams[0].put_hypothesis(&space.arena[root], &space.params.filter);
    space.record(outcome);

    let mut cube = Cube {
        space,
        bundles: Vec::new(),
        pending: vec![Vec::new(); len + 1],
        heap: BinaryHeap::new(),
        visited: HashSet::new(),
    };
    cube.bundle_beam(&beams[0]);

    for stage in 1..=len {
        let _span = debug_span!("cube_stage", stage).entered();
        cube.heap.clear();
        cube.visited.clear();
        for bundle in std::mem::take(&mut cube.pending[stage]) {
            cube.push_cell(bundle, 0, 0)?;
        }

        let mut popped = 0;
        while popped < beam_size {
            let Some(item) = cube.heap.pop() else {
                break;
            };
            let outcome = beams[stage].put_hypothesis(&cube.space.arena[item.hyp], &cube.space.params.filter);
            cube.space.record(outcome);
            cube.push_cell(item.bundle, item.row + 1, item.col)?;
            cube.push_cell(item.bundle, item.row, item.col + 1)?;
            popped += 1;
        }
        debug!(popped, queued = cube.heap.len(), beam = beams[stage].len());

        if stage < len {
            cube.bundle_beam(&beams[stage]);
        }
    }

    cube.space.stats.beam_sizes = beams.iter().map(Beam::len).collect();
    Ok(beams[len].iter().collect())
}
