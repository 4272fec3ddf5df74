use std::ops::Index;

use serde::Serialize;

use crate::coverage::CoverageSet;
use crate::rules::{RuleId, Span};

/// Dense hypothesis index, unique within one decode.
///
/// Ids grow monotonically as hypotheses are created, so comparing ids
/// orders hypotheses by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HypId(pub u32);

/// A node of the search graph: a partial translation reached by applying
/// `rule` to `predecessor`.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    pub id: HypId,
    pub predecessor: Option<HypId>,
    pub rule: Option<RuleId>,
    pub coverage: CoverageSet,
    /// Cumulative model score.
    pub score: f64,
    /// Estimated score of translating the rest of the sentence.
    pub heuristic: f64,
    /// Score added by the last rule.
    pub local_score: f64,
    pub target_len: usize,
    /// Number of rules applied.
    pub depth: usize,
    pub last_span: Option<Span>,
    pub linear_distortion: usize,
    pub done: bool,
    /// Trailing target tokens, oldest first, as many as any consumer of the
    /// context needs.
    pub(crate) tail: Vec<String>,
}

impl Hypothesis {
    /// Beam ordering key.
    pub fn priority(&self) -> f64 {
        self.score + self.heuristic
    }

    /// End of the last covered span; 0 for the start hypothesis.
    pub fn last_end(&self) -> usize {
        self.last_span.map_or(0, |s| s.end)
    }

    /// The last `n` target tokens (fewer near the sentence start).
    pub fn context(&self, n: usize) -> &[String] {
        &self.tail[self.tail.len().saturating_sub(n)..]
    }
}

/// Per-sentence store of every hypothesis created during search.
///
/// Hypotheses are never removed; predecessor links stay valid until the
/// arena is dropped with the rest of the search state.
#[derive(Debug, Default)]
pub struct HypothesisArena {
    nodes: Vec<Hypothesis>,
}

impl HypothesisArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the empty-coverage root.
    pub fn start(&mut self, source_len: usize, heuristic: f64) -> HypId {
        self.push(Hypothesis {
            id: HypId(0),
            predecessor: None,
            rule: None,
            coverage: CoverageSet::new(source_len),
            score: 0.0,
            heuristic,
            local_score: 0.0,
            target_len: 0,
            depth: 0,
            last_span: None,
            linear_distortion: 0,
            done: source_len == 0,
            tail: Vec::new(),
        })
    }

    /// Stores `hyp` and assigns its id.
    pub fn push(&mut self, mut hyp: Hypothesis) -> HypId {
        let id = HypId(self.nodes.len() as u32);
        hyp.id = id;
        self.nodes.push(hyp);
        id
    }

    pub fn get(&self, id: HypId) -> Option<&Hypothesis> {
        self.nodes.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `id` and its ancestors, goal-first, ending with the start hypothesis.
    pub fn chain(&self, id: HypId) -> Vec<HypId> {
        let mut out = Vec::with_capacity(self[id].depth + 1);
        let mut cur = Some(id);
        while let Some(h) = cur {
            out.push(h);
            cur = self[h].predecessor;
        }
        out
    }

    /// Rules applied along the derivation ending at `id`, in order.
    pub fn rules_of(&self, id: HypId) -> Vec<RuleId> {
        let mut rules: Vec<RuleId> = self.chain(id).iter().filter_map(|&h| self[h].rule).collect();
        rules.reverse();
        rules
    }
}

impl Index<HypId> for HypothesisArena {
    type Output = Hypothesis;

    fn index(&self, id: HypId) -> &Hypothesis {
        &self.nodes[id.0 as usize]
    }
}
