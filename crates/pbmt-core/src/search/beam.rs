use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use super::hypothesis::{HypId, Hypothesis};
use super::recombination::{RecombinationFilter, RecombinationKey};

/// Result of offering a hypothesis to a [`Beam`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// Inserted at capacity; the previous worst occupant was dropped.
    Evicted(HypId),
    /// Met an occupant with the same recombination key. The higher scorer
    /// stays in the beam; the other belongs in the recombination history.
    Recombined { survivor: HypId, dominated: HypId },
    /// Beam full and the hypothesis ranks below its worst occupant.
    Discarded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeamStats {
    pub recombined: usize,
    pub pruned: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone, Copy)]
struct Ranked {
    priority: f64,
    id: HypId,
}

impl Ord for Ranked {
    /// Best first: higher priority, then lower id.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

#[derive(Debug)]
struct Occupant {
    priority: f64,
    score: f64,
    key: Option<RecombinationKey>,
}

/// Capacity-bounded set of hypotheses ordered by `score + heuristic`.
///
/// Holds ids only; the hypotheses themselves live in the arena.
#[derive(Debug)]
pub struct Beam {
    capacity: usize,
    order: BTreeSet<Ranked>,
    occupants: HashMap<HypId, Occupant>,
    by_key: HashMap<RecombinationKey, HypId>,
    stats: BeamStats,
}

impl Beam {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: BTreeSet::new(),
            occupants: HashMap::new(),
            by_key: HashMap::new(),
            stats: BeamStats::default(),
        }
    }

    pub fn put_hypothesis(&mut self, hyp: &Hypothesis, filter: &RecombinationFilter) -> PutOutcome {
        self.put(hyp.id, hyp.score, hyp.priority(), filter.key(hyp))
    }

    pub fn put(
        &mut self,
        id: HypId,
        score: f64,
        priority: f64,
        key: Option<RecombinationKey>,
    ) -> PutOutcome {
        if let Some(key) = &key {
            if let Some(&occupant) = self.by_key.get(key) {
                self.stats.recombined += 1;
                let occupant_score = self.occupants[&occupant].score;
                if score > occupant_score {
                    self.remove(occupant);
                    self.insert(id, score, priority, Some(key.clone()));
                    return PutOutcome::Recombined {
                        survivor: id,
                        dominated: occupant,
                    };
                }
                return PutOutcome::Recombined {
                    survivor: occupant,
                    dominated: id,
                };
            }
        }

        if self.order.len() < self.capacity {
            self.insert(id, score, priority, key);
            return PutOutcome::Inserted;
        }

        let candidate = Ranked { priority, id };
        match self.order.last().copied() {
            Some(worst) if candidate < worst => {
                self.remove(worst.id);
                self.insert(id, score, priority, key);
                self.stats.pruned += 1;
                PutOutcome::Evicted(worst.id)
            }
            _ => {
                self.stats.discarded += 1;
                PutOutcome::Discarded
            }
        }
    }

    fn insert(&mut self, id: HypId, score: f64, priority: f64, key: Option<RecombinationKey>) {
        self.order.insert(Ranked { priority, id });
        if let Some(key) = &key {
            self.by_key.insert(key.clone(), id);
        }
        self.occupants.insert(id, Occupant { priority, score, key });
    }

    fn remove(&mut self, id: HypId) {
        if let Some(occupant) = self.occupants.remove(&id) {
            self.order.remove(&Ranked {
                priority: occupant.priority,
                id,
            });
            if let Some(key) = occupant.key {
                self.by_key.remove(&key);
            }
        }
    }

    /// Occupants, best first.
    pub fn iter(&self) -> impl Iterator<Item = HypId> + '_ {
        self.order.iter().map(|r| r.id)
    }

    pub fn best(&self) -> Option<HypId> {
        self.order.first().map(|r| r.id)
    }

    pub fn contains(&self, id: HypId) -> bool {
        self.occupants.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> BeamStats {
        self.stats
    }
}
