use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::quicksort::quicksort;
use super::record::{KEY_WIDTH, RecordStore};
use crate::error::{PsortError, Result};

/// Create the sampling RNG, optionally seeded for reproducibility.
/// With `None` the generator is seeded from OS entropy.
#[must_use]
pub fn create_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    }
}

/// Draws keys uniformly at random, with replacement, from a record store.
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    pub fn new(seed: Option<u64>) -> Self {
        Sampler {
            rng: create_rng(seed),
        }
    }

    /// Draw `count` keys into a key-only buffer (`KEY_WIDTH` bytes per sample)
    /// so the samples can be sorted with the same record machinery as the data.
    pub fn draw(&mut self, store: &RecordStore<'_>, count: usize) -> Vec<u8> {
        let n = store.len();
        let mut samples = Vec::with_capacity(count * KEY_WIDTH);
        if n == 0 {
            return samples;
        }
        for _ in 0..count {
            let i = self.rng.random_range(0..n);
            samples.extend_from_slice(&store.key_at(i).to_ne_bytes());
        }
        samples
    }
}

/// Ascending bucket boundaries. `p - 1` splitters define `p` buckets; a key
/// belongs to the first bucket whose splitter is `>=` it, or to the last
/// bucket if it exceeds every splitter. Repeated splitter values are legal
/// and leave the buckets between them empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splitters {
    keys: Vec<i32>,
}

impl Splitters {
    /// Build a splitter set from explicit keys, which must be ascending.
    pub fn new(keys: Vec<i32>) -> Result<Self> {
        if let Some(w) = keys.windows(2).find(|w| w[0] > w[1]) {
            return Err(PsortError::Invariant(format!(
                "splitters out of order: {} precedes {}",
                w[0], w[1]
            )));
        }
        Ok(Splitters { keys })
    }

    /// Sort a key-only sample buffer in place and pick the splitters at
    /// 1-indexed positions `k, 2k, ..., (buckets - 1)k`.
    ///
    /// The buffer must hold exactly `(buckets - 1) * oversampling` keys.
    pub fn select(samples: &mut [u8], buckets: usize, oversampling: usize) -> Result<Self> {
        if buckets == 0 || oversampling == 0 {
            return Err(PsortError::Config(format!(
                "cannot select splitters for {} buckets with oversampling {}",
                buckets, oversampling
            )));
        }
        let expected = (buckets - 1).checked_mul(oversampling);
        let mut store = RecordStore::new(samples, KEY_WIDTH)?;
        if Some(store.len()) != expected {
            return Err(PsortError::Invariant(format!(
                "{} samples drawn but {} buckets with oversampling {} need {}",
                store.len(),
                buckets,
                oversampling,
                (buckets - 1).saturating_mul(oversampling)
            )));
        }
        quicksort(&mut store);

        let keys: Vec<i32> = (1..buckets)
            .map(|j| store.key_at(j * oversampling - 1))
            .collect();
        trace!("selected splitters {:?}", keys);
        Splitters::new(keys)
    }

    /// Number of buckets these splitters partition key space into.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.keys.len() + 1
    }

    /// Bucket id for `key`: first `j` with `key <= splitter[j]`, else the last bucket.
    #[inline]
    pub fn bucket_for(&self, key: i32) -> usize {
        self.keys
            .iter()
            .position(|&s| key <= s)
            .unwrap_or(self.keys.len())
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.keys
    }
}
