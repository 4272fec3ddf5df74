//! Lazy enumeration of derivations from the search lattice.
//!
//! The lattice is the predecessor graph plus the recombination edges. A
//! composite path starts as the predecessor chain of a goal hypothesis;
//! replacing any node on it by a hypothesis recombined into that node gives
//! another complete derivation. Paths come out of an agenda ordered by
//! estimated score: the parent's estimate adjusted by the score difference
//! at the replaced node. Because features may look past the recombination
//! context, estimates can differ from true scores and callers re-score.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

use super::hypothesis::{HypId, HypothesisArena};
use super::recombination::RecombinationHistory;

/// One derivation, root first.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticePath {
    pub nodes: Vec<HypId>,
    pub estimate: f64,
}

impl LatticePath {
    pub fn goal(&self) -> Option<HypId> {
        self.nodes.last().copied()
    }
}

struct Composite {
    estimate: f64,
    seq: u64,
    /// Goal first.
    nodes: Vec<HypId>,
    /// Shallowest position still open for substitution.
    frontier: usize,
}

impl Ord for Composite {
    fn cmp(&self, other: &Self) -> Ordering {
        self.estimate
            .total_cmp(&other.estimate)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Composite {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Composite {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Composite {}

/// Iterator over derivations in non-increasing estimated score.
pub struct StateLatticeDecoder<'a> {
    arena: &'a HypothesisArena,
    history: &'a RecombinationHistory,
    agenda: BinaryHeap<Composite>,
    chains: HashMap<HypId, Rc<[HypId]>>,
    seq: u64,
}

impl<'a> StateLatticeDecoder<'a> {
    pub fn new(arena: &'a HypothesisArena, history: &'a RecombinationHistory, goals: &[HypId]) -> Self {
        let mut decoder = Self {
            arena,
            history,
            agenda: BinaryHeap::with_capacity(goals.len()),
            chains: HashMap::new(),
            seq: 0,
        };
        for &goal in goals {
            let nodes = decoder.cached_chain(goal).to_vec();
            decoder.push(arena[goal].score, nodes, 0);
        }
        decoder
    }

    fn push(&mut self, estimate: f64, nodes: Vec<HypId>, frontier: usize) {
        self.agenda.push(Composite {
            estimate,
            seq: self.seq,
            nodes,
            frontier,
        });
        self.seq += 1;
    }

    /// `id` and its ancestors, goal first. Shared prefixes of the lattice
    /// are walked once.
    fn cached_chain(&mut self, id: HypId) -> Rc<[HypId]> {
        if let Some(chain) = self.chains.get(&id) {
            return Rc::clone(chain);
        }
        let chain: Rc<[HypId]> = self.arena.chain(id).into();
        self.chains.insert(id, Rc::clone(&chain));
        chain
    }

    /// Paths still waiting on the agenda.
    pub fn pending(&self) -> usize {
        self.agenda.len()
    }
}

impl Iterator for StateLatticeDecoder<'_> {
    type Item = LatticePath;

    fn next(&mut self) -> Option<LatticePath> {
        let top = self.agenda.pop()?;
        for depth in top.frontier..top.nodes.len() {
            let node = top.nodes[depth];
            let alternatives = self.history.alternatives(node);
            if alternatives.is_empty() {
                continue;
            }
            let node_score = self.arena[node].score;
            for &alt in alternatives {
                let chain = self.cached_chain(alt);
                let mut nodes = Vec::with_capacity(depth + chain.len());
                nodes.extend_from_slice(&top.nodes[..depth]);
                nodes.extend_from_slice(&chain);
                let estimate = top.estimate - node_score + self.arena[alt].score;
                self.push(estimate, nodes, depth + 1);
            }
        }

        let mut nodes = top.nodes;
        nodes.reverse();
        Some(LatticePath {
            nodes,
            estimate: top.estimate,
        })
    }
}
