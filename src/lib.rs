/// Use mimalloc as the global allocator for all binaries.
/// The sort pipeline allocates many short-lived staging vectors per call
/// (samples, index nodes, position map), which mimalloc serves from
/// thread-local caches.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod common;
pub mod error;
pub mod sort;

pub use error::{PsortError, Result};

/// Format an IO error message without the "(os error N)" suffix.
/// GNU tools print e.g. "No such file or directory" while Rust's
/// Display impl adds " (os error 2)". This strips the suffix for compat.
pub fn io_error_msg(e: &std::io::Error) -> String {
    if let Some(raw) = e.raw_os_error() {
        let os_err = std::io::Error::from_raw_os_error(raw);
        let msg = format!("{}", os_err);
        msg.replace(&format!(" (os error {})", raw), "")
    } else {
        format!("{}", e)
    }
}

/// Number of usable execution units, used as the default bucket count.
/// Falls back to 1 when the platform cannot report it.
pub fn hardware_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
