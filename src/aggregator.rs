//! Thread-safe accumulators for elapsed times, per-operation counts, and
//! byte totals across all workers (§4.8). Two locks -- one for time, one
//! for counts/bytes -- to keep the two hot paths from false-sharing.

use crate::trace::format::NUM_FILE_OPS;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Copy, Clone, Default, Debug)]
pub struct RwBytes {
    pub read: u64,
    pub written: u64,
}

impl RwBytes {
    fn merge(&mut self, other: RwBytes) {
        self.read += other.read;
        self.written += other.written;
    }
}

/// Which cumulative timer a `TraceWorker` is charging elapsed time to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TimeKind {
    Create,
    Remove,
    Io,
    Delay,
}

#[derive(Default)]
struct Times {
    create_time: Duration,
    remove_time: Duration,
    io_time: Duration,
    delay_time: Duration,
}

#[derive(Default)]
struct CountsAndBytes {
    op_counts: [u64; NUM_FILE_OPS],
    create_rw_bytes: RwBytes,
    io_rw_bytes: RwBytes,
    auto_open_count: u64,
}

pub struct Aggregator {
    times: Mutex<Times>,
    counts: Mutex<CountsAndBytes>,
}

/// A snapshot of the aggregator's state, cheap to print or serialize.
#[derive(Debug)]
pub struct AggregatorSnapshot {
    pub create_time: Duration,
    pub remove_time: Duration,
    pub io_time: Duration,
    pub delay_time: Duration,
    pub op_counts: [u64; NUM_FILE_OPS],
    pub create_rw_bytes: RwBytes,
    pub io_rw_bytes: RwBytes,
    pub auto_open_count: u64,
}

impl Aggregator {
    pub fn new() -> Aggregator {
        Aggregator {
            times: Mutex::new(Times::default()),
            counts: Mutex::new(CountsAndBytes::default()),
        }
    }

    pub fn add_time(&self, which: TimeKind, delta: Duration) {
        let mut t = self.times.lock().unwrap();
        match which {
            TimeKind::Create => t.create_time += delta,
            TimeKind::Remove => t.remove_time += delta,
            TimeKind::Io => t.io_time += delta,
            TimeKind::Delay => t.delay_time += delta,
        }
    }

    pub fn add_create_bytes(&self, delta: RwBytes) {
        let mut c = self.counts.lock().unwrap();
        c.create_rw_bytes.merge(delta);
    }

    pub fn add_io_bytes(&self, delta: RwBytes) {
        let mut c = self.counts.lock().unwrap();
        c.io_rw_bytes.merge(delta);
    }

    pub fn add_op_counts(&self, delta: &[u64; NUM_FILE_OPS]) {
        let mut c = self.counts.lock().unwrap();
        for i in 0..NUM_FILE_OPS {
            c.op_counts[i] += delta[i];
        }
    }

    pub fn add_auto_open_count(&self, delta: u64) {
        let mut c = self.counts.lock().unwrap();
        c.auto_open_count += delta;
    }

    pub fn snapshot(&self) -> AggregatorSnapshot {
        let t = self.times.lock().unwrap();
        let c = self.counts.lock().unwrap();
        AggregatorSnapshot {
            create_time: t.create_time,
            remove_time: t.remove_time,
            io_time: t.io_time,
            delay_time: t.delay_time,
            op_counts: c.op_counts,
            create_rw_bytes: c.create_rw_bytes,
            io_rw_bytes: c.io_rw_bytes,
            auto_open_count: c.auto_open_count,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Aggregator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::format::FileOp;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_updates_all_land() {
        let agg = Arc::new(Aggregator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let agg = Arc::clone(&agg);
            handles.push(thread::spawn(move || {
                let mut counts = [0u64; NUM_FILE_OPS];
                counts[FileOp::Write.as_index()] = 1;
                agg.add_op_counts(&counts);
                agg.add_io_bytes(RwBytes {
                    read: 0,
                    written: 1024,
                });
                agg.add_time(TimeKind::Io, Duration::from_micros(10));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let snap = agg.snapshot();
        assert_eq!(snap.op_counts[FileOp::Write.as_index()], 8);
        assert_eq!(snap.io_rw_bytes.written, 8 * 1024);
        assert_eq!(snap.io_time, Duration::from_micros(80));
    }
}
