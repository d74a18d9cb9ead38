//! Per-trace file registry (§4.2). Owned exclusively by one `TraceWorker`;
//! never shared across threads, so no internal locking is needed.

use crate::log::LogWarn;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use nix::unistd;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::time::Instant;

/// One file's bookkeeping: its synthesized path, recorded size, and live
/// descriptor (or none). `fd` transitions `none -> open -> none -> ...`.
pub struct RegistryNode {
    pub path: PathBuf,
    pub recorded_size: u64,
    fd: Option<RawFd>,
}

impl RegistryNode {
    fn new() -> RegistryNode {
        RegistryNode {
            path: PathBuf::new(),
            recorded_size: 0,
            fd: None,
        }
    }
}

#[derive(Default)]
pub struct FileRegistry {
    nodes: HashMap<u32, RegistryNode>,
}

impl FileRegistry {
    pub fn new() -> FileRegistry {
        FileRegistry::default()
    }

    pub fn add(&mut self, fileno: u32) -> &mut RegistryNode {
        self.nodes.entry(fileno).or_insert_with(RegistryNode::new)
    }

    pub fn lookup(&mut self, fileno: u32) -> Option<&mut RegistryNode> {
        self.nodes.get_mut(&fileno)
    }

    pub fn set_path(node: &mut RegistryNode, path: PathBuf) {
        node.path = path;
    }

    pub fn set_size(node: &mut RegistryNode, size: u64) {
        node.recorded_size = size;
    }

    pub fn set_fd(node: &mut RegistryNode, fd: RawFd) {
        node.fd = Some(fd);
    }

    pub fn get_fd(node: &RegistryNode) -> Option<RawFd> {
        node.fd
    }

    pub fn get_path(node: &RegistryNode) -> &std::path::Path {
        &node.path
    }

    /// Closes the node's fd if open, then sets it to none. Errors are
    /// never fatal here; callers that need a fatal close go through the
    /// dispatcher's own `close` syscall wrapper instead.
    pub fn close_fd(node: &mut RegistryNode) {
        if let Some(fd) = node.fd.take() {
            let _ = unistd::close(fd);
        }
    }

    /// Sets the node's fd to none without issuing `close(2)`. Used only by
    /// the dispatcher's CLOSE handler, which has already closed the
    /// descriptor itself and just needs the bookkeeping updated.
    pub fn forget_fd(node: &mut RegistryNode) {
        node.fd = None;
    }

    /// Best-effort fsync of every still-open fd, followed by a hint to
    /// drop cached pages for the files we just flushed. Errors are logged,
    /// not propagated (§4.2, §7 "best-effort hygiene failures").
    pub fn fsync_and_discard_all(&mut self) {
        for node in self.nodes.values() {
            if let Some(fd) = node.fd {
                if let Err(e) = unistd::fsync(fd) {
                    log!(
                        LogWarn,
                        "best-effort fsync of {} failed: {}",
                        node.path.display(),
                        e
                    );
                }
                hint_drop_cache(fd, node);
            }
        }
    }

    /// Closes every still-open fd. Errors are logged, not fatal.
    pub fn close_all(&mut self) {
        for node in self.nodes.values_mut() {
            if let Some(fd) = node.fd.take() {
                if let Err(e) = unistd::close(fd) {
                    log!(
                        LogWarn,
                        "best-effort close of {} failed: {}",
                        node.path.display(),
                        e
                    );
                }
            }
        }
    }

    /// Unlinks every node's path, charging the elapsed wall time onto
    /// `elapsed`. Individual unlink failures are logged, not fatal --
    /// teardown must not abort a benchmark that otherwise completed.
    pub fn unlink_all(&mut self, elapsed: &mut std::time::Duration) {
        let start = Instant::now();
        for node in self.nodes.values() {
            if let Err(e) = std::fs::remove_file(&node.path) {
                log!(
                    LogWarn,
                    "best-effort unlink of {} failed: {}",
                    node.path.display(),
                    e
                );
            }
        }
        *elapsed += start.elapsed();
    }

    /// Drops the registry. All fds must already be closed -- enforced by
    /// the replay driver's epilogue, which runs `close_all` before this.
    pub fn free(self) {
        drop(self);
    }
}

/// Opens `path` read-write, the "transparent auto-recovery open" used when
/// a non-OPEN operation finds `fd = none` (§4.3 step 2), and also used by
/// the pre-create driver immediately after creating a file.
pub fn open_rw(path: &std::path::Path) -> nix::Result<RawFd> {
    nix::fcntl::open(path, OFlag::O_RDWR, Mode::empty())
}

fn hint_drop_cache(fd: RawFd, node: &RegistryNode) {
    // POSIX_FADV_DONTNEED: best-effort kernel hint, failure is routine on
    // filesystems that don't support it and is never worth reporting above
    // debug level.
    unsafe {
        let ret = libc::posix_fadvise(fd, 0, 0, libc::POSIX_FADV_DONTNEED);
        if ret != 0 {
            log!(
                crate::log::LogDebug,
                "posix_fadvise(DONTNEED) on {} returned {}",
                node.path.display(),
                ret
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn add_then_lookup_returns_same_node() {
        let mut reg = FileRegistry::new();
        {
            let node = reg.add(7);
            FileRegistry::set_path(node, PathBuf::from("/tmp/file.0.7"));
            FileRegistry::set_size(node, 4096);
        }
        let node = reg.lookup(7).unwrap();
        assert_eq!(node.recorded_size, 4096);
        assert_eq!(FileRegistry::get_path(node), PathBuf::from("/tmp/file.0.7"));
        assert!(FileRegistry::get_fd(node).is_none());
    }

    #[test]
    fn lookup_missing_fileno_is_none() {
        let mut reg = FileRegistry::new();
        assert!(reg.lookup(42).is_none());
    }
}
