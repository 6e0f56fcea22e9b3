//! Typed, stride-aware view over a contiguous buffer of fixed-width records.
//!
//! Each record is `width` bytes; the first `KEY_WIDTH` bytes hold a
//! native-endian `i32` sort key and the rest is payload that is only ever
//! moved, never read. The view borrows the buffer mutably, so two live
//! views can only alias when they were carved out of disjoint ranges
//! (`slice`, `split_at`, `split_into`).

use crate::error::{PsortError, Result};

/// Size in bytes of the leading sort key.
pub const KEY_WIDTH: usize = 4;

/// Default record width: 4-byte key + 96-byte payload.
pub const DEFAULT_ENTRY_SIZE: usize = 100;

/// Decode the native-endian `i32` key at the front of a record.
#[inline]
pub fn key_of(record: &[u8]) -> i32 {
    i32::from_ne_bytes([record[0], record[1], record[2], record[3]])
}

pub struct RecordStore<'a> {
    data: &'a mut [u8],
    width: usize,
    /// Index of this view's first record in the store it was carved from.
    /// Only used for diagnostics.
    origin: usize,
}

impl<'a> RecordStore<'a> {
    /// Wrap `data` as a sequence of `width`-byte records.
    /// Fails unless `width >= KEY_WIDTH` and the buffer is a whole number of records.
    pub fn new(data: &'a mut [u8], width: usize) -> Result<Self> {
        if width < KEY_WIDTH {
            return Err(PsortError::Config(format!(
                "entry size {} is smaller than the {}-byte key",
                width, KEY_WIDTH
            )));
        }
        if data.len() % width != 0 {
            return Err(PsortError::Invariant(format!(
                "buffer of {} bytes is not a multiple of the {}-byte entry size",
                data.len(),
                width
            )));
        }
        Ok(RecordStore {
            data,
            width,
            origin: 0,
        })
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.width
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Index of this view's first record within the store it was carved from.
    #[inline]
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Sort key of record `i`.
    #[inline]
    pub fn key_at(&self, i: usize) -> i32 {
        let off = self.offset(i);
        key_of(&self.data[off..off + KEY_WIDTH])
    }

    /// Full bytes (key + payload) of record `i`.
    #[inline]
    pub fn record(&self, i: usize) -> &[u8] {
        let off = self.offset(i);
        &self.data[off..off + self.width]
    }

    /// Exchange records `i` and `j` in full. No-op when `i == j`.
    #[inline]
    pub fn swap(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let w = self.width;
        let hi_off = self.offset(hi);
        let lo_off = self.offset(lo);
        let (head, tail) = self.data.split_at_mut(hi_off);
        head[lo_off..lo_off + w].swap_with_slice(&mut tail[..w]);
    }

    /// Bounded sub-view over records `[start, start + len)`.
    pub fn slice(&mut self, start: usize, len: usize) -> RecordStore<'_> {
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.len())
            .unwrap_or_else(|| {
                panic!(
                    "slice {}+{} out of range for {} records",
                    start,
                    len,
                    self.len()
                )
            });
        RecordStore {
            data: &mut self.data[start * self.width..end * self.width],
            width: self.width,
            origin: self.origin + start,
        }
    }

    /// Split into two disjoint views at record `mid`.
    pub fn split_at(self, mid: usize) -> (RecordStore<'a>, RecordStore<'a>) {
        assert!(
            mid <= self.len(),
            "split point {} out of range for {} records",
            mid,
            self.len()
        );
        let RecordStore {
            data,
            width,
            origin,
        } = self;
        let (left, right) = data.split_at_mut(mid * width);
        (
            RecordStore {
                data: left,
                width,
                origin,
            },
            RecordStore {
                data: right,
                width,
                origin: origin + mid,
            },
        )
    }

    /// Carve the store into consecutive disjoint views of the given lengths.
    /// The lengths must add up to exactly `len()`.
    pub fn split_into(self, lens: &[usize]) -> Result<Vec<RecordStore<'a>>> {
        let total: usize = lens.iter().sum();
        if total != self.len() {
            return Err(PsortError::Invariant(format!(
                "partition covers {} records but the store holds {}",
                total,
                self.len()
            )));
        }
        let mut views = Vec::with_capacity(lens.len());
        let mut rest = self;
        for &len in lens {
            let (head, tail) = rest.split_at(len);
            views.push(head);
            rest = tail;
        }
        Ok(views)
    }

    /// Iterator over all keys in physical order.
    pub fn keys(&self) -> impl Iterator<Item = i32> + '_ {
        (0..self.len()).map(move |i| self.key_at(i))
    }

    #[inline]
    fn offset(&self, i: usize) -> usize {
        assert!(
            i < self.len(),
            "record index {} out of range for {} records",
            i,
            self.len()
        );
        i * self.width
    }
}

impl std::fmt::Debug for RecordStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("origin", &self.origin)
            .field("len", &self.len())
            .field("width", &self.width)
            .finish()
    }
}
