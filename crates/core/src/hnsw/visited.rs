//! Bitset-based visited tracking for HNSW graph traversal.
//!
//! One bit per node, packed into u64 words. Clearing zeroes only the words
//! that were touched, so repeated searches on a large index stay cheap.

/// Per-search visited-node set. One bit per internal node id.
#[derive(Debug)]
pub struct VisitedSet {
    words: Vec<u64>,
    touched: Vec<u32>,
}

impl VisitedSet {
    /// Creates a set able to hold `capacity` node ids.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0u64; capacity.div_ceil(64)],
            touched: Vec::new(),
        }
    }

    /// Grows the set to cover at least `capacity` node ids.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let needed = capacity.div_ceil(64);
        if needed > self.words.len() {
            self.words.resize(needed, 0);
        }
    }

    /// Marks `id` as visited. Returns `true` if it was not previously visited.
    #[inline]
    pub fn insert(&mut self, id: u32) -> bool {
        let word = (id / 64) as usize;
        let bit = 1u64 << (id % 64);
        if self.words[word] & bit != 0 {
            return false;
        }
        if self.words[word] == 0 {
            self.touched.push(word as u32);
        }
        self.words[word] |= bit;
        true
    }

    /// Resets the set, zeroing only touched words.
    pub fn clear(&mut self) {
        for &w in &self.touched {
            self.words[w as usize] = 0;
        }
        self.touched.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut vs = VisitedSet::with_capacity(200);
        assert!(vs.insert(0));
        assert!(!vs.insert(0));
        assert!(vs.insert(63));
        assert!(vs.insert(64));
        assert!(vs.insert(199));
        assert!(!vs.insert(199));
    }

    #[test]
    fn test_clear() {
        let mut vs = VisitedSet::with_capacity(128);
        vs.insert(5);
        vs.insert(100);
        vs.clear();
        assert!(vs.insert(5));
        assert!(vs.insert(100));
    }

    #[test]
    fn test_ensure_capacity_grows() {
        let mut vs = VisitedSet::with_capacity(10);
        vs.ensure_capacity(1000);
        assert!(vs.insert(999));
        assert!(!vs.insert(999));
    }
}
