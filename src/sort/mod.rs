pub mod bucket;
pub mod core;
pub mod dispatch;
pub mod quicksort;
pub mod record;
pub mod sample;


pub use self::bucket::{BucketLists, BucketSlice, Classified, PositionMap, classify, materialize};
pub use self::core::*;
pub use self::dispatch::{DispatchMode, dispatch};
pub use self::quicksort::{first_disorder, is_sorted, quicksort};
pub use self::record::{DEFAULT_ENTRY_SIZE, KEY_WIDTH, RecordStore, key_of};
pub use self::sample::{Sampler, Splitters, create_rng};
