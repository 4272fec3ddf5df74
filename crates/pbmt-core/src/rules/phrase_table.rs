use std::collections::HashMap;
use std::sync::Arc;

use crate::features::{FeatureVector, Scorer};

use super::{Rule, RuleSource, Span};

/// Feature fired by pass-through rules for tokens the table cannot translate.
pub const UNKNOWN_WORD_FEATURE: &str = "UnknownWord";

/// One target side for a source phrase.
#[derive(Debug, Clone)]
pub struct PhraseOption {
    pub target: Vec<String>,
    pub features: FeatureVector,
    pub alignment: Vec<(usize, usize)>,
}

impl PhraseOption {
    pub fn new(target: &[&str], features: FeatureVector) -> Self {
        Self {
            target: target.iter().map(|t| t.to_string()).collect(),
            features,
            alignment: Vec::new(),
        }
    }
}

/// In-memory phrase table.
///
/// Enumerates every source n-gram of a sentence up to the longest stored
/// phrase and instantiates a [`Rule`] per matching option. Isolation scores
/// come from the shared scorer. This is a minimal stand-in for a real
/// phrase-table backend; it neither reads nor writes any file format.
pub struct PhraseTable {
    entries: HashMap<Vec<String>, Vec<PhraseOption>>,
    scorer: Arc<dyn Scorer>,
    longest: usize,
    passthrough: bool,
}

impl PhraseTable {
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Self {
            entries: HashMap::new(),
            scorer,
            longest: 0,
            passthrough: false,
        }
    }

    /// Emit a copy-through rule for source tokens that no single-token
    /// option covers.
    pub fn with_passthrough(mut self, enabled: bool) -> Self {
        self.passthrough = enabled;
        self
    }

    pub fn insert(&mut self, source: &[&str], option: PhraseOption) {
        if source.is_empty() {
            return;
        }
        self.longest = self.longest.max(source.len());
        self.entries
            .entry(source.iter().map(|s| s.to_string()).collect())
            .or_default()
            .push(option);
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RuleSource for PhraseTable {
    fn rules(&self, source: &[String], _sentence_id: usize) -> Vec<Rule> {
        let mut rules = Vec::new();
        for start in 0..source.len() {
            let mut single_token = false;
            let max_end = (start + self.longest).min(source.len());
            for end in start + 1..=max_end {
                let Some(options) = self.entries.get(&source[start..end]) else {
                    continue;
                };
                single_token |= end == start + 1;
                for option in options {
                    let score = self.scorer.score(&option.features);
                    rules.push(
                        Rule::new(
                            Span::new(start, end),
                            source[start..end].to_vec(),
                            option.target.clone(),
                            score,
                            option.features.clone(),
                        )
                        .with_alignment(option.alignment.clone()),
                    );
                }
            }

            if self.passthrough && !single_token {
                let mut features = FeatureVector::new();
                features.push(UNKNOWN_WORD_FEATURE, 1.0);
                let score = self.scorer.score(&features);
                rules.push(
                    Rule::new(
                        Span::new(start, start + 1),
                        vec![source[start].clone()],
                        vec![source[start].clone()],
                        score,
                        features,
                    )
                    .with_alignment(vec![(0, 0)]),
                );
            }
        }
        rules
    }

    fn longest_source_phrase(&self) -> Option<usize> {
        Some(self.longest.max(1))
    }
}
