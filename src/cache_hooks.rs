//! The page-cache-drop side effect between phases is an external
//! collaborator by design (§1, §6 "Kernel hook (optional)"): a best-effort
//! system action whose failure is ignored. Modeled as a trait so a test
//! harness (which usually can't write to `/proc/sys/vm/drop_caches`
//! anyway) can swap in a no-op.

use crate::log::LogDebug;
use std::fs::OpenOptions;
use std::io::Write;

pub trait CacheDropHook {
    fn drop_caches(&self);
}

/// Writes `3` to `/proc/sys/vm/drop_caches`, mirroring the original
/// `echo 3 > /proc/sys/vm/drop_caches` between phases. Any failure
/// (missing file, insufficient permission, non-Linux host) is swallowed.
pub struct ProcDropCaches;

impl CacheDropHook for ProcDropCaches {
    fn drop_caches(&self) {
        let result = OpenOptions::new()
            .write(true)
            .open("/proc/sys/vm/drop_caches")
            .and_then(|mut f| f.write_all(b"3\n"));
        if let Err(e) = result {
            log!(LogDebug, "drop_caches hook failed (ignored): {}", e);
        }
    }
}

/// Used by tests and by any environment where the real hook would be
/// destructive or unavailable.
pub struct NoopCacheDropHook;

impl CacheDropHook for NoopCacheDropHook {
    fn drop_caches(&self) {}
}
