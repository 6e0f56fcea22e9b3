use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::io_error_msg;

pub type Result<T> = std::result::Result<T, PsortError>;

/// Errors surfaced by a sort run.
///
/// `Io` and `Misaligned` are caller-facing: a bad path or a file that is not
/// made of whole records. `Config` rejects a `SortConfig` before any work is
/// done. `Invariant` means the pipeline itself produced inconsistent state and
/// the call was abandoned before touching more record data.
#[derive(Debug, Error)]
pub enum PsortError {
    #[error("{}: {}", .path.display(), io_error_msg(.source))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "{}: size {} is not a multiple of the {}-byte entry size",
        .path.display(),
        .len,
        .entry_size
    )]
    Misaligned {
        path: PathBuf,
        len: u64,
        entry_size: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl PsortError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PsortError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures caused by the environment (paths, permissions,
    /// file layout) rather than by the sort itself.
    pub fn is_io(&self) -> bool {
        matches!(self, PsortError::Io { .. } | PsortError::Misaligned { .. })
    }
}
