//! Source coverage bitsets.
//!
//! A `CoverageSet` records which source positions a partial translation has
//! consumed. Bits only ever go from clear to set along a derivation, so a
//! full set identifies a goal state.

use std::fmt;

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-length bit vector over source positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoverageSet {
    words: Vec<u64>,
    len: usize,
}

impl CoverageSet {
    /// Empty coverage over `len` source positions.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// Number of source positions (not the number of set bits).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set every bit in the half-open range `[start, end)`.
    pub fn set_range(&mut self, start: usize, end: usize) {
        debug_assert!(start <= end && end <= self.len, "range {start}..{end} out of bounds");
        let mut pos = start;
        while pos < end {
            let word = pos / WORD_BITS;
            let offset = pos % WORD_BITS;
            let take = (WORD_BITS - offset).min(end - pos);
            let mask = if take == WORD_BITS {
                u64::MAX
            } else {
                ((1u64 << take) - 1) << offset
            };
            self.words[word] |= mask;
            pos += take;
        }
    }

    pub fn is_set(&self, pos: usize) -> bool {
        pos < self.len && self.words[pos / WORD_BITS] & (1u64 << (pos % WORD_BITS)) != 0
    }

    /// First clear position at or after `from`; `len()` when there is none.
    pub fn next_clear_from(&self, from: usize) -> usize {
        let mut word = from / WORD_BITS;
        if word >= self.words.len() {
            return self.len;
        }
        let mut bits = !self.words[word] & (u64::MAX << (from % WORD_BITS));
        loop {
            if bits != 0 {
                let pos = word * WORD_BITS + bits.trailing_zeros() as usize;
                return pos.min(self.len);
            }
            word += 1;
            if word >= self.words.len() {
                return self.len;
            }
            bits = !self.words[word];
        }
    }

    /// First set position at or after `from`, if any.
    pub fn next_set_from(&self, from: usize) -> Option<usize> {
        let mut word = from / WORD_BITS;
        if word >= self.words.len() {
            return None;
        }
        let mut bits = self.words[word] & (u64::MAX << (from % WORD_BITS));
        loop {
            if bits != 0 {
                let pos = word * WORD_BITS + bits.trailing_zeros() as usize;
                return (pos < self.len).then_some(pos);
            }
            word += 1;
            if word >= self.words.len() {
                return None;
            }
            bits = self.words[word];
        }
    }

    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True when every source position is covered.
    pub fn is_complete(&self) -> bool {
        self.cardinality() == self.len
    }

    /// True if any position in `[start, end)` is already covered.
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        self.next_set_from(start).is_some_and(|pos| pos < end)
    }

    /// Copy of this set with `[start, end)` added.
    pub fn extended(&self, start: usize, end: usize) -> Self {
        debug_assert!(
            !self.intersects(start, end),
            "span {start}..{end} overlaps coverage {self}"
        );
        let mut next = self.clone();
        next.set_range(start, end);
        next
    }

    /// True if every bit set in `other` is also set here.
    pub fn is_superset(&self, other: &CoverageSet) -> bool {
        self.len == other.len
            && self
                .words
                .iter()
                .zip(&other.words)
                .all(|(mine, theirs)| theirs & !mine == 0)
    }

    /// Maximal uncovered ranges, left to right, as half-open `(start, end)`.
    pub fn gaps(&self) -> Gaps<'_> {
        Gaps {
            coverage: self,
            pos: self.next_clear_from(0),
        }
    }
}

/// Iterator over the maximal uncovered ranges of a [`CoverageSet`].
pub struct Gaps<'a> {
    coverage: &'a CoverageSet,
    pos: usize,
}

impl Iterator for Gaps<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.coverage.len {
            return None;
        }
        let start = self.pos;
        let end = self
            .coverage
            .next_set_from(start)
            .unwrap_or(self.coverage.len);
        self.pos = self.coverage.next_clear_from(end);
        Some((start, end))
    }
}

impl fmt::Display for CoverageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let mut first = true;
        for pos in (0..self.len).filter(|&p| self.is_set(p)) {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{pos}")?;
            first = false;
        }
        f.write_str("}")
    }
}
