//! Sample sort of fixed-width binary records.
//!
//! Pipeline for one call:
//! - draw `(p - 1) * k` random keys and sort them (same quicksort, 4-byte stride)
//! - take every k-th sample as a splitter, giving p key ranges
//! - classify each record into a bucket via per-bucket index lists
//! - permute the buffer in place into bucket-contiguous order
//! - quicksort each populated bucket on its own worker and join
//!
//! Classification and materialization are sequential; only the final
//! per-bucket sorts run concurrently, each on a disjoint slice.

use std::fmt;
use std::time::Instant;

use log::{debug, info};

use super::bucket::{classify, materialize};
use super::dispatch::{DispatchMode, dispatch};
use super::record::{DEFAULT_ENTRY_SIZE, KEY_WIDTH, RecordStore, key_of};
use super::sample::{Sampler, Splitters};
use crate::error::{PsortError, Result};
use crate::hardware_parallelism;

/// Default samples drawn per splitter.
pub const DEFAULT_OVERSAMPLING: usize = 3;

/// Configuration for a sort operation.
#[derive(Debug, Clone)]
pub struct SortConfig {
    /// Record width in bytes, key included.
    pub entry_size: usize,
    /// Bucket count p; also the upper bound on concurrent workers.
    pub parallelism: usize,
    /// Samples per splitter (k).
    pub oversampling: usize,
    /// Sampling seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
    pub dispatch: DispatchMode,
}

impl Default for SortConfig {
    fn default() -> Self {
        SortConfig {
            entry_size: DEFAULT_ENTRY_SIZE,
            parallelism: hardware_parallelism(),
            oversampling: DEFAULT_OVERSAMPLING,
            seed: None,
            dispatch: DispatchMode::Auto,
        }
    }
}

impl SortConfig {
    pub fn validate(&self) -> Result<()> {
        if self.entry_size < KEY_WIDTH {
            return Err(PsortError::Config(format!(
                "entry size must be at least {} bytes, got {}",
                KEY_WIDTH, self.entry_size
            )));
        }
        if self.parallelism == 0 {
            return Err(PsortError::Config("parallelism must be at least 1".into()));
        }
        if self.oversampling == 0 {
            return Err(PsortError::Config("oversampling must be at least 1".into()));
        }
        self.sample_count(self.parallelism)?;
        Ok(())
    }

    /// Keys drawn for `buckets` buckets: `(buckets - 1) * oversampling`.
    /// The sample buffer (`KEY_WIDTH` bytes per key) must be addressable.
    fn sample_count(&self, buckets: usize) -> Result<usize> {
        buckets
            .saturating_sub(1)
            .checked_mul(self.oversampling)
            .filter(|count| {
                count
                    .checked_mul(KEY_WIDTH)
                    .is_some_and(|bytes| bytes <= isize::MAX as usize)
            })
            .ok_or_else(|| {
                PsortError::Config(format!(
                    "oversampling {} is too large for parallelism {}",
                    self.oversampling, self.parallelism
                ))
            })
    }
}

/// Stages of one sort call, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sampled,
    SplittersSelected,
    Classified,
    Materialized,
    Dispatched,
    Completed,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::Sampled),
            Phase::Sampled => Some(Phase::SplittersSelected),
            Phase::SplittersSelected => Some(Phase::Classified),
            Phase::Classified => Some(Phase::Materialized),
            Phase::Materialized => Some(Phase::Dispatched),
            Phase::Dispatched => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Sampled => "sampled",
            Phase::SplittersSelected => "splitters-selected",
            Phase::Classified => "classified",
            Phase::Materialized => "materialized",
            Phase::Dispatched => "dispatched",
            Phase::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Logs each phase transition with the time spent in the previous phase.
struct PhaseClock {
    phase: Phase,
    since: Instant,
}

impl PhaseClock {
    fn start() -> Self {
        PhaseClock {
            phase: Phase::Idle,
            since: Instant::now(),
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.phase.next() {
            debug!(
                "{} -> {} after {:?}",
                self.phase,
                next,
                self.since.elapsed()
            );
            self.phase = next;
            self.since = Instant::now();
        }
    }
}

/// What one sort call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortReport {
    /// Records sorted.
    pub records: usize,
    /// Buckets actually used: `min(parallelism, records)`.
    pub active_buckets: usize,
    /// Size of each bucket after classification, in bucket id order.
    pub bucket_sizes: Vec<usize>,
    /// Record swaps performed while materializing buckets.
    pub swaps: usize,
    /// Worker tasks spawned (populated buckets).
    pub workers: usize,
}

/// Sort `data`, a buffer of `config.entry_size`-byte records, in place by key.
///
/// Ties end up in arbitrary relative order. The buffer length must be a
/// whole number of records.
pub fn sample_sort(data: &mut [u8], config: &SortConfig) -> Result<SortReport> {
    config.validate()?;
    let store = RecordStore::new(data, config.entry_size)?;
    sort_store(store, config)
}

/// Sort an existing record view in place. See [`sample_sort`].
pub fn sort_store(mut store: RecordStore<'_>, config: &SortConfig) -> Result<SortReport> {
    config.validate()?;
    if store.width() != config.entry_size {
        return Err(PsortError::Config(format!(
            "store has {}-byte records but config.entry_size is {}",
            store.width(),
            config.entry_size
        )));
    }

    let n = store.len();
    if n == 0 {
        return Ok(SortReport::default());
    }

    let started = Instant::now();
    let mut clock = PhaseClock::start();
    let buckets = config.parallelism.min(n);
    let k = config.oversampling;

    let mut sampler = Sampler::new(config.seed);
    let mut samples = sampler.draw(&store, config.sample_count(buckets)?);
    clock.advance();

    let splitters = Splitters::select(&mut samples, buckets, k)?;
    if splitters.bucket_count() != buckets {
        return Err(PsortError::Invariant(format!(
            "{} splitters for {} buckets",
            splitters.as_slice().len(),
            buckets
        )));
    }
    clock.advance();

    let classified = classify(&store, &splitters);
    let slices = classified.lists.slices();
    let bucket_sizes = classified.lists.sizes().to_vec();
    clock.advance();

    let swaps = materialize(&mut store, classified)?;
    clock.advance();
    clock.advance();
    let workers = dispatch(store, &slices, config.dispatch, hardware_parallelism())?;
    clock.advance();

    info!(
        "sorted {} records in {:?}: {} buckets, {} workers, {} swaps",
        n,
        started.elapsed(),
        buckets,
        workers,
        swaps
    );
    debug!("bucket sizes {:?}", bucket_sizes);

    Ok(SortReport {
        records: n,
        active_buckets: buckets,
        bucket_sizes,
        swaps,
        workers,
    })
}

/// Index of the first record in `data` whose key is lower than its
/// predecessor's, or `None` if the records are in ascending key order.
pub fn check_sorted(data: &[u8], entry_size: usize) -> Result<Option<usize>> {
    if entry_size < KEY_WIDTH {
        return Err(PsortError::Config(format!(
            "entry size must be at least {} bytes, got {}",
            KEY_WIDTH, entry_size
        )));
    }
    if data.len() % entry_size != 0 {
        return Err(PsortError::Invariant(format!(
            "buffer of {} bytes is not a multiple of the {}-byte entry size",
            data.len(),
            entry_size
        )));
    }
    let mut prev: Option<i32> = None;
    for (i, record) in data.chunks_exact(entry_size).enumerate() {
        let key = key_of(record);
        if prev.is_some_and(|p| p > key) {
            return Ok(Some(i));
        }
        prev = Some(key);
    }
    Ok(None)
}

