//! The file-creation helper (§4.5.1). In scope, unlike the mmap and
//! buffer-pool helpers: creates the synthesized path and extends it to
//! `recorded_size` bytes.

use crate::error::{FatalError, Result};
use nix::unistd::ftruncate;
use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::{Duration, Instant};

pub struct CreateOutcome {
    pub bytes_written: u64,
    pub elapsed: Duration,
}

/// Creates `path` (truncating if it already exists from a prior run) and
/// extends it to `size` bytes via `ftruncate`. `ftruncate` produces a
/// sparse file on every filesystem this benchmark targets, which is the
/// right choice here: only the recorded *size* is reproduced, never
/// byte-identical content, so there is no reason to pay for zero-filling
/// pages nobody will ever read before the workload overwrites them.
pub fn create_and_fill(path: &Path, size: u64) -> Result<CreateOutcome> {
    let start = Instant::now();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| FatalError::io(format!("creating {}", path.display()), e))?;
    ftruncate(file.as_raw_fd(), size as i64)
        .map_err(|e| FatalError::syscall("ftruncate", Some(path.to_path_buf()), e))?;
    let elapsed = start.elapsed();
    Ok(CreateOutcome {
        bytes_written: size,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_file_of_requested_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.0.7");
        let outcome = create_and_fill(&path, 4096).unwrap();
        assert_eq!(outcome.bytes_written, 4096);
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.len(), 4096);
    }

    #[test]
    fn zero_size_file_is_still_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.0.1");
        create_and_fill(&path, 0).unwrap();
        assert!(path.exists());
    }
}
