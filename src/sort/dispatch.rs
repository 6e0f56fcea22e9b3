use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use log::debug;

use super::bucket::BucketSlice;
use super::quicksort::quicksort;
use super::record::RecordStore;
use crate::error::{PsortError, Result};

/// How bucket sorts are scheduled onto threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Thread per bucket, unless there are more populated buckets than
    /// hardware threads; then a fixed pool.
    #[default]
    Auto,
    /// One scoped OS thread per populated bucket.
    ThreadPerBucket,
    /// A rayon pool sized to hardware parallelism drains one task per bucket.
    Pool,
}

impl DispatchMode {
    fn resolve(self, workers: usize, hardware: usize) -> DispatchMode {
        match self {
            DispatchMode::Auto if workers > hardware => DispatchMode::Pool,
            DispatchMode::Auto => DispatchMode::ThreadPerBucket,
            other => other,
        }
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(DispatchMode::Auto),
            "thread-per-bucket" | "threads" => Ok(DispatchMode::ThreadPerBucket),
            "pool" => Ok(DispatchMode::Pool),
            _ => Err(format!(
                "invalid dispatch mode '{}' (expected auto, thread-per-bucket or pool)",
                s
            )),
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Auto => write!(f, "auto"),
            DispatchMode::ThreadPerBucket => write!(f, "thread-per-bucket"),
            DispatchMode::Pool => write!(f, "pool"),
        }
    }
}

/// Sort every populated bucket of a materialized store concurrently and
/// block until all of them are done. Returns the number of workers used.
///
/// `slices` must be the exact prefix-sum partition of `store`. Each worker
/// owns a disjoint view, so no synchronization on record data is needed.
/// A panicking worker propagates its panic to the caller.
pub fn dispatch(
    store: RecordStore<'_>,
    slices: &[BucketSlice],
    mode: DispatchMode,
    hardware: usize,
) -> Result<usize> {
    let base = store.origin();
    let lens: Vec<usize> = slices.iter().map(|s| s.len).collect();
    let views = store.split_into(&lens)?;

    let work: Vec<(BucketSlice, RecordStore<'_>)> = slices
        .iter()
        .copied()
        .zip(views)
        .filter(|(slice, _)| !slice.is_empty())
        .collect();
    let workers = work.len();
    if workers == 0 {
        return Ok(0);
    }

    let mode = mode.resolve(workers, hardware);
    debug!("dispatching {} bucket sorts ({})", workers, mode);

    match mode {
        DispatchMode::Pool => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(hardware.max(1))
                .thread_name(|i| format!("psort-worker-{}", i))
                .build()
                .map_err(|e| PsortError::Config(format!("cannot build worker pool: {}", e)))?;
            pool.scope(|s| {
                for (slice, mut view) in work {
                    s.spawn(move |_| sort_bucket(base, slice, &mut view));
                }
            });
        }
        _ => {
            std::thread::scope(|s| {
                let handles: Vec<_> = work
                    .into_iter()
                    .map(|(slice, mut view)| {
                        s.spawn(move || sort_bucket(base, slice, &mut view))
                    })
                    .collect();
                for h in handles {
                    if let Err(panic) = h.join() {
                        std::panic::resume_unwind(panic);
                    }
                }
            });
        }
    }

    Ok(workers)
}

// `slice` is relative to the dispatched store; `view.origin()` is relative to
// the root buffer, which sits `base` records earlier.
fn sort_bucket(base: usize, slice: BucketSlice, view: &mut RecordStore<'_>) {
    debug_assert_eq!(view.origin(), base + slice.start);
    debug_assert_eq!(view.len(), slice.len);
    let start = Instant::now();
    quicksort(view);
    debug!(
        "bucket {} [{}..{}) sorted in {:?}",
        slice.bucket,
        slice.start,
        slice.end(),
        start.elapsed()
    );
}
