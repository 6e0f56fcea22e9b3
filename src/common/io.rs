use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};
use std::path::Path;

#[cfg(target_os = "linux")]
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use memmap2::{MmapMut, MmapOptions};

use crate::error::{PsortError, Result};

/// Mutable record data: either a private copy-on-write mapping or an owned Vec.
/// Dereferences to `&mut [u8]` so the sort core never sees which one it got.
/// Writes through either variant stay in this process; the input file on
/// disk is never modified.
pub enum RecordData {
    Mmap(MmapMut),
    Owned(Vec<u8>),
}

impl Deref for RecordData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            RecordData::Mmap(m) => m,
            RecordData::Owned(v) => v,
        }
    }
}

impl DerefMut for RecordData {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            RecordData::Mmap(m) => m,
            RecordData::Owned(v) => v,
        }
    }
}

/// Threshold below which we use read() instead of mmap.
/// For files under 1MB, read() is faster since mmap has setup/teardown overhead
/// (page table creation, TLB flush on munmap) that exceeds the zero-copy benefit.
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Track whether O_NOATIME is supported to avoid repeated failed open() attempts.
#[cfg(target_os = "linux")]
static NOATIME_SUPPORTED: AtomicBool = AtomicBool::new(true);

/// Open a file with O_NOATIME on Linux to avoid atime inode writes.
#[cfg(target_os = "linux")]
fn open_noatime(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    if NOATIME_SUPPORTED.load(Ordering::Relaxed) {
        match fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NOATIME)
            .open(path)
        {
            Ok(f) => return Ok(f),
            Err(ref e) if e.raw_os_error() == Some(libc::EPERM) => {
                // O_NOATIME requires file ownership or CAP_FOWNER
                NOATIME_SUPPORTED.store(false, Ordering::Relaxed);
            }
            Err(e) => return Err(e),
        }
    }
    File::open(path)
}

#[cfg(not(target_os = "linux"))]
fn open_noatime(path: &Path) -> io::Result<File> {
    File::open(path)
}

/// Map an input record file for in-place sorting.
///
/// Fails with `Io` if the file cannot be opened or read, and with
/// `Misaligned` if its length is not a whole number of `entry_size` records.
/// Large files get a private (MAP_PRIVATE) writable mapping; small files are
/// read into a Vec.
pub fn map_input(path: &Path, entry_size: usize) -> Result<RecordData> {
    let file = open_noatime(path).map_err(|e| PsortError::io(path, e))?;
    let metadata = file.metadata().map_err(|e| PsortError::io(path, e))?;
    let len = metadata.len();

    if entry_size == 0 || len % entry_size as u64 != 0 {
        return Err(PsortError::Misaligned {
            path: path.to_path_buf(),
            len,
            entry_size,
        });
    }

    if len == 0 {
        return Ok(RecordData::Owned(Vec::new()));
    }

    if len < MMAP_THRESHOLD || !metadata.file_type().is_file() {
        let mut buf = vec![0u8; len as usize];
        let n = read_full(&mut &file, &mut buf).map_err(|e| PsortError::io(path, e))?;
        if n != buf.len() {
            // File shrank between fstat and read: whatever we got is not the
            // file we validated.
            return Err(PsortError::io(
                path,
                io::Error::new(io::ErrorKind::UnexpectedEof, "file truncated while reading"),
            ));
        }
        debug!("read {} bytes from {}", len, path.display());
        return Ok(RecordData::Owned(buf));
    }

    // SAFETY: private copy-on-write mapping. Our writes never reach the file;
    // concurrent truncation of the file by another process is outside our
    // contract, same as for any mmap-based tool.
    let mmap = unsafe { MmapOptions::new().map_copy(&file) }.map_err(|e| PsortError::io(path, e))?;
    #[cfg(target_os = "linux")]
    {
        if len >= 2 * 1024 * 1024 {
            let _ = mmap.advise(memmap2::Advice::HugePage);
        }
        let _ = mmap.advise(memmap2::Advice::WillNeed);
    }
    debug!("mapped {} bytes from {}", len, path.display());
    Ok(RecordData::Mmap(mmap))
}

/// Write the final record order to `path`, creating or truncating it.
/// Called only after the sort core has finished.
pub fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| PsortError::io(path, e))?;
    file.write_all(data).map_err(|e| PsortError::io(path, e))?;
    file.flush().map_err(|e| PsortError::io(path, e))?;
    debug!("wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// Read as many bytes as possible into buf, retrying on partial reads.
/// Fast path: regular file reads usually return the full buffer on the first call.
#[inline]
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let n = reader.read(buf)?;
    if n == buf.len() || n == 0 {
        return Ok(n);
    }
    let mut total = n;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
