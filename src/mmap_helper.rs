//! The mmap/mmap2 replay strategy is an external collaborator by design
//! (§1, §4.3.1): the dispatcher only knows it hands off an `MmapPayload`
//! and gets back timing/op/byte deltas. Modeled as a trait so a caller can
//! substitute a different strategy without touching the dispatcher.

use crate::aggregator::RwBytes;
use crate::trace::format::MmapPayload;
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use std::os::unix::io::RawFd;
use std::ptr::NonNull;
use std::time::{Duration, Instant};

pub struct MmapOutcome {
    pub elapsed: Duration,
    pub bytes: RwBytes,
}

pub trait MmapHelper {
    /// `fd` is the node's current descriptor (already auto-opened by the
    /// dispatcher if it was missing).
    fn replay(&self, fd: RawFd, payload: MmapPayload) -> MmapOutcome;
}

/// Performs a real `mmap`/`munmap` round trip sized from the payload,
/// touching the first and last page to force the page fault the original
/// workload would have seen, then unmaps. Attributes its own elapsed time,
/// matching "may itself attribute time, ops, and bytes" (§4.3).
pub struct RealMmapHelper;

impl MmapHelper for RealMmapHelper {
    fn replay(&self, fd: RawFd, payload: MmapPayload) -> MmapOutcome {
        let len = payload.len.max(1) as usize;
        let prot = ProtFlags::from_bits_truncate(payload.prot);
        let flags = MapFlags::from_bits_truncate(payload.flags);

        let start = Instant::now();
        let result = unsafe { mmap(std::ptr::null_mut(), len, prot, flags, fd, payload.offset as i64) };
        let mut bytes = RwBytes::default();
        if let Ok(addr) = result {
            if let Some(addr) = NonNull::new(addr) {
                touch(addr, len, prot);
                if prot.contains(ProtFlags::PROT_READ) {
                    bytes.read += len as u64;
                }
                if prot.contains(ProtFlags::PROT_WRITE) {
                    bytes.written += len as u64;
                }
                let _ = unsafe { munmap(addr.as_ptr(), len) };
            }
        }
        let elapsed = start.elapsed();
        MmapOutcome { elapsed, bytes }
    }
}

/// Touches the first and last byte of each page-rounded end of the
/// mapping so the kernel actually services the fault, without assuming
/// anything about the mapped content.
fn touch(addr: NonNull<std::ffi::c_void>, len: usize, prot: ProtFlags) {
    if !prot.contains(ProtFlags::PROT_READ) && !prot.contains(ProtFlags::PROT_WRITE) {
        return;
    }
    let base = addr.as_ptr() as *mut u8;
    unsafe {
        let first = std::ptr::read_volatile(base);
        if prot.contains(ProtFlags::PROT_WRITE) {
            std::ptr::write_volatile(base, first);
        }
        if len > 1 {
            let last = base.add(len - 1);
            let v = std::ptr::read_volatile(last);
            if prot.contains(ProtFlags::PROT_WRITE) {
                std::ptr::write_volatile(last, v);
            }
        }
    }
}
