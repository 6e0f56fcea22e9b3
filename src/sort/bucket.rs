//! Two-phase bucket partitioning.
//!
//! `classify` makes one sequential pass assigning every record to a bucket and
//! threading its index onto that bucket's linked list; no record data moves.
//! `materialize` then permutes the store in place so bucket 0 occupies the
//! first `size0` slots, bucket 1 the next `size1`, and so on, using a
//! `PositionMap` to find where each record currently lives after earlier swaps.

use super::record::RecordStore;
use super::sample::Splitters;
use crate::error::{PsortError, Result};

const NIL: usize = usize::MAX;

/// Per-bucket singly linked lists of original record indices.
///
/// Nodes live in one arena indexed by record index: `next[i]` is the record
/// that follows `i` in its bucket. Lists are appended at the tail so each
/// bucket keeps original record order.
#[derive(Debug, Clone)]
pub struct BucketLists {
    heads: Vec<usize>,
    tails: Vec<usize>,
    sizes: Vec<usize>,
    next: Vec<usize>,
}

impl BucketLists {
    pub fn new(buckets: usize, records: usize) -> Self {
        BucketLists {
            heads: vec![NIL; buckets],
            tails: vec![NIL; buckets],
            sizes: vec![0; buckets],
            next: Vec::with_capacity(records),
        }
    }

    /// Append the next record index to `bucket`. Indices must be pushed in
    /// order `0, 1, 2, ...`.
    pub fn push(&mut self, bucket: usize, index: usize) {
        debug_assert_eq!(index, self.next.len());
        self.next.push(NIL);
        match self.tails[bucket] {
            NIL => self.heads[bucket] = index,
            tail => self.next[tail] = index,
        }
        self.tails[bucket] = index;
        self.sizes[bucket] += 1;
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.heads.len()
    }

    /// Total number of staged record indices.
    #[inline]
    pub fn len(&self) -> usize {
        self.next.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Original indices in `bucket`, in classification order.
    pub fn iter(&self, bucket: usize) -> BucketIter<'_> {
        BucketIter {
            next: &self.next,
            cur: self.heads[bucket],
        }
    }

    /// Contiguous slot range each bucket occupies once materialized:
    /// exact prefix sums of the bucket sizes.
    pub fn slices(&self) -> Vec<BucketSlice> {
        let mut start = 0;
        self.sizes
            .iter()
            .enumerate()
            .map(|(bucket, &len)| {
                let slice = BucketSlice { bucket, start, len };
                start += len;
                slice
            })
            .collect()
    }
}

pub struct BucketIter<'a> {
    next: &'a [usize],
    cur: usize,
}

impl Iterator for BucketIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.cur == NIL {
            return None;
        }
        let idx = self.cur;
        self.cur = self.next[idx];
        Some(idx)
    }
}

/// Where one bucket lives in the materialized store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSlice {
    pub bucket: usize,
    pub start: usize,
    pub len: usize,
}

impl BucketSlice {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Bidirectional map between original record indices and physical slots.
///
/// `position[orig]` is the slot currently holding the record that started at
/// `orig`; `occupant[slot]` is the inverse. Both start as the identity and
/// every swap applied to the store must be mirrored with `record_swap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionMap {
    position: Vec<usize>,
    occupant: Vec<usize>,
}

impl PositionMap {
    pub fn identity(n: usize) -> Self {
        PositionMap {
            position: (0..n).collect(),
            occupant: (0..n).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.position.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Current slot of the record that started at `orig`.
    #[inline]
    pub fn resolve(&self, orig: usize) -> usize {
        assert!(
            orig < self.position.len(),
            "position map lookup {} outside {} records",
            orig,
            self.position.len()
        );
        let slot = self.position[orig];
        assert!(
            slot < self.occupant.len(),
            "record {} resolved to slot {} outside {} records",
            orig,
            slot,
            self.occupant.len()
        );
        slot
    }

    /// Original index of the record currently in `slot`.
    #[inline]
    pub fn occupant(&self, slot: usize) -> usize {
        self.occupant[slot]
    }

    /// Mirror a store swap of slots `a` and `b`.
    #[inline]
    pub fn record_swap(&mut self, a: usize, b: usize) {
        let oa = self.occupant[a];
        let ob = self.occupant[b];
        self.occupant.swap(a, b);
        self.position[oa] = b;
        self.position[ob] = a;
    }

    /// True if `position` and `occupant` are mutually inverse permutations.
    pub fn is_consistent(&self) -> bool {
        self.position.len() == self.occupant.len()
            && self
                .occupant
                .iter()
                .enumerate()
                .all(|(slot, &orig)| orig < self.position.len() && self.position[orig] == slot)
    }
}

/// Output of the classification pass.
#[derive(Debug, Clone)]
pub struct Classified {
    pub lists: BucketLists,
    pub positions: PositionMap,
}

/// Assign every record to a bucket in one sequential pass.
pub fn classify(store: &RecordStore<'_>, splitters: &Splitters) -> Classified {
    let n = store.len();
    let mut lists = BucketLists::new(splitters.bucket_count(), n);
    for i in 0..n {
        lists.push(splitters.bucket_for(store.key_at(i)), i);
    }
    Classified {
        lists,
        positions: PositionMap::identity(n),
    }
}

/// Permute `store` into bucket-contiguous order. Returns the number of swaps
/// performed, which is at most `store.len()`.
///
/// Walking buckets in id order, each staged record is resolved to its current
/// slot and swapped into the write cursor. Slots below the cursor are final,
/// so every record moves into place at most once.
pub fn materialize(store: &mut RecordStore<'_>, classified: Classified) -> Result<usize> {
    let Classified {
        lists,
        mut positions,
    } = classified;

    if lists.len() != store.len() || positions.len() != store.len() {
        return Err(PsortError::Invariant(format!(
            "classification staged {} records but the store holds {}",
            lists.len(),
            store.len()
        )));
    }

    let mut cursor = 0;
    let mut swaps = 0;
    for bucket in 0..lists.bucket_count() {
        for orig in lists.iter(bucket) {
            let slot = positions.resolve(orig);
            assert!(
                slot >= cursor,
                "record {} resolved to already placed slot {} (cursor {})",
                orig,
                slot,
                cursor
            );
            if slot != cursor {
                store.swap(cursor, slot);
                positions.record_swap(cursor, slot);
                swaps += 1;
            }
            cursor += 1;
        }
    }
    debug_assert!(positions.is_consistent());

    if cursor != store.len() {
        return Err(PsortError::Invariant(format!(
            "materialized {} of {} records",
            cursor,
            store.len()
        )));
    }
    Ok(swaps)
}
