use super::record::RecordStore;

/// In-place quicksort of a record view by key.
///
/// First-element pivot with a Lomuto partition: keys `< pivot` end up left of
/// it, keys `>= pivot` right of it. Not stable. The same routine sorts the
/// key-only sample array and each full-width bucket; only the stride differs.
///
/// Recurses into the smaller partition and loops on the larger one, so stack
/// depth stays logarithmic even when the first-element pivot degrades
/// (already sorted or all-equal input).
pub fn quicksort(store: &mut RecordStore<'_>) {
    let len = store.len();
    sort_range(store, 0, len);
}

fn sort_range(store: &mut RecordStore<'_>, mut lo: usize, mut hi: usize) {
    while hi - lo > 1 {
        let p = partition(store, lo, hi);
        if p - lo < hi - p - 1 {
            sort_range(store, lo, p);
            lo = p + 1;
        } else {
            sort_range(store, p + 1, hi);
            hi = p;
        }
    }
}

/// Partition `[lo, hi)` around the key at `lo`; returns the pivot's final index.
fn partition(store: &mut RecordStore<'_>, lo: usize, hi: usize) -> usize {
    let pivot = store.key_at(lo);
    let mut boundary = lo;
    for i in lo + 1..hi {
        if store.key_at(i) < pivot {
            boundary += 1;
            store.swap(boundary, i);
        }
    }
    store.swap(lo, boundary);
    boundary
}

/// True if keys are non-decreasing across the view.
pub fn is_sorted(store: &RecordStore<'_>) -> bool {
    first_disorder(store).is_none()
}

/// Index of the first record whose key is lower than its predecessor's.
pub fn first_disorder(store: &RecordStore<'_>) -> Option<usize> {
    (1..store.len()).find(|&i| store.key_at(i - 1) > store.key_at(i))
}
