//! Concurrent fixed-capacity bitset for incidence tracking.
//!
//! The inspector sets bits from many threads at once; setting is
//! idempotent, so relaxed atomic OR is all that is needed. After the
//! metadata exchange the per-peer sets are OR-merged into one. Word-level
//! access exists solely for the wire.

use std::sync::atomic::{AtomicU64, Ordering};

const WORD_BITS: usize = 64;

/// Bitset over `[0, len)` with thread-safe, idempotent `set`.
pub struct AtomicBitSet {
    words: Box<[AtomicU64]>,
    len: u64,
}

impl AtomicBitSet {
    pub fn new(len: u64) -> Self {
        let num_words = (len as usize).div_ceil(WORD_BITS);
        Self {
            words: (0..num_words).map(|_| AtomicU64::new(0)).collect(),
            len,
        }
    }

    /// Rebuild from wire words; extra high bits must be absent.
    pub fn from_words(len: u64, words: Vec<u64>) -> Option<Self> {
        if words.len() != (len as usize).div_ceil(WORD_BITS) {
            return None;
        }
        Some(Self {
            words: words.into_iter().map(AtomicU64::new).collect(),
            len,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn set(&self, bit: u64) {
        debug_assert!(bit < self.len);
        let (word, mask) = (bit as usize / WORD_BITS, 1u64 << (bit as usize % WORD_BITS));
        self.words[word].fetch_or(mask, Ordering::Relaxed);
    }

    #[inline]
    pub fn test(&self, bit: u64) -> bool {
        debug_assert!(bit < self.len);
        let (word, mask) = (bit as usize / WORD_BITS, 1u64 << (bit as usize % WORD_BITS));
        self.words[word].load(Ordering::Relaxed) & mask != 0
    }

    /// OR every bit of `other` into `self`. Lengths must match.
    pub fn union_with(&self, other: &AtomicBitSet) {
        assert_eq!(self.len, other.len, "bitset length mismatch");
        for (w, o) in self.words.iter().zip(other.words.iter()) {
            let bits = o.load(Ordering::Relaxed);
            if bits != 0 {
                w.fetch_or(bits, Ordering::Relaxed);
            }
        }
    }

    pub fn count_ones(&self) -> u64 {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as u64)
            .sum()
    }

    /// Snapshot of the backing words, for serialization.
    pub fn to_words(&self) -> Vec<u64> {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed))
            .collect()
    }
}
