//! Byte-array pool keyed by size class.
//!
//! The pool is a plain owned object with no interior locking; it is held by
//! the session and lent out by `&mut` on the tick thread. A miss allocates a
//! fresh array, so running dry only costs throughput.

use std::collections::HashMap;

const MIN_SIZE_CLASS: usize = 64;
const DEFAULT_MAX_PER_CLASS: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub returned: u64,
    pub discarded: u64,
}

#[derive(Debug)]
pub struct BufferPool {
    classes: HashMap<usize, Vec<Vec<u8>>>,
    max_per_class: usize,
    stats: PoolStats,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_max_per_class(DEFAULT_MAX_PER_CLASS)
    }

    pub fn with_max_per_class(max_per_class: usize) -> Self {
        Self {
            classes: HashMap::new(),
            max_per_class,
            stats: PoolStats::default(),
        }
    }

    pub fn size_class(len: usize) -> usize {
        len.max(MIN_SIZE_CLASS).next_power_of_two()
    }

    /// Returns an array of at least `len` bytes. Reused arrays keep their old
    /// contents.
    pub fn take(&mut self, len: usize) -> Vec<u8> {
        let class = Self::size_class(len);
        match self.classes.get_mut(&class).and_then(Vec::pop) {
            Some(buf) => {
                self.stats.hits += 1;
                buf
            }
            None => {
                self.stats.misses += 1;
                vec![0u8; class]
            }
        }
    }

    pub fn give(&mut self, buf: Vec<u8>) {
        let len = buf.len();
        if len < MIN_SIZE_CLASS || !len.is_power_of_two() {
            self.stats.discarded += 1;
            return;
        }

        let slot = self.classes.entry(len).or_default();
        if slot.len() >= self.max_per_class {
            self.stats.discarded += 1;
            return;
        }
        slot.push(buf);
        self.stats.returned += 1;
    }

    pub fn available(&self, len: usize) -> usize {
        self.classes
            .get(&Self::size_class(len))
            .map_or(0, Vec::len)
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.classes.clear();
    }
}
