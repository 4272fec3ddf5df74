//! Translation rules and their per-sentence index.
//!
//! A `Rule` is a concrete phrase pair anchored at a source span of one
//! sentence. Rules come from an external [`RuleSource`] and are immutable for
//! the duration of a decode.

mod grid;
mod phrase_table;

pub use grid::RuleGrid;
pub use phrase_table::{PhraseOption, PhraseTable};

use std::fmt;

use serde::Serialize;

use crate::features::FeatureVector;

/// Half-open source range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start < end, "empty span {start}..{end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

/// Dense index of a rule inside a sentence's [`RuleGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

/// A phrase pair applied at a fixed source span.
#[derive(Debug, Clone)]
pub struct Rule {
    pub span: Span,
    pub source: Vec<String>,
    pub target: Vec<String>,
    /// Model score of the rule in isolation, used by the search heuristic
    /// and to order rules within a span.
    pub isolation_score: f64,
    /// Rule-local feature values (translation model scores).
    pub features: FeatureVector,
    /// Word alignment as `(source offset, target offset)` pairs relative to
    /// the phrase.
    pub alignment: Vec<(usize, usize)>,
}

impl Rule {
    pub fn new(
        span: Span,
        source: Vec<String>,
        target: Vec<String>,
        isolation_score: f64,
        features: FeatureVector,
    ) -> Self {
        Self {
            span,
            source,
            target,
            isolation_score,
            features,
            alignment: Vec::new(),
        }
    }

    pub fn with_alignment(mut self, alignment: Vec<(usize, usize)>) -> Self {
        self.alignment = alignment;
        self
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} => {} ({:.3})",
            self.span,
            self.source.join(" "),
            self.target.join(" "),
            self.isolation_score
        )
    }
}

/// Supplies candidate rules for a sentence.
///
/// Implementations are shared read-only across decode threads.
pub trait RuleSource: Send + Sync {
    fn rules(&self, source: &[String], sentence_id: usize) -> Vec<Rule>;

    /// Longest source phrase this source can return, if known.
    fn longest_source_phrase(&self) -> Option<usize> {
        None
    }
}

/// A fixed rule list, returned as-is for every sentence.
///
/// Mostly useful in tests and for replaying a dumped rule set.
#[derive(Debug, Clone, Default)]
pub struct StaticRuleSource {
    rules: Vec<Rule>,
}

impl StaticRuleSource {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl RuleSource for StaticRuleSource {
    fn rules(&self, source: &[String], _sentence_id: usize) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|r| r.span.end <= source.len())
            .cloned()
            .collect()
    }

    fn longest_source_phrase(&self) -> Option<usize> {
        self.rules.iter().map(|r| r.span.len()).max()
    }
}
