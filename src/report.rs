//! Human-readable statistics formatting is delegated (§6 "Reported
//! output"): exact column layout is not contractual. `StatsReporter` is
//! the seam; `PlainTextReporter` is one concrete, unremarkable
//! implementation so the binary prints something useful.

use crate::aggregator::AggregatorSnapshot;
use std::time::Duration;

pub trait StatsReporter {
    fn report(&self, snapshot: &AggregatorSnapshot, delay_enabled: bool);
}

pub struct PlainTextReporter;

fn msecs_usecs(d: Duration) -> (u64, u64) {
    let total_usecs = d.as_micros() as u64;
    (total_usecs / 1000, total_usecs % 1000)
}

impl StatsReporter for PlainTextReporter {
    fn report(&self, snapshot: &AggregatorSnapshot, delay_enabled: bool) {
        let (create_ms, create_us) = msecs_usecs(snapshot.create_time);
        println!("Total Creation time = {}.{} (msecs.usecs)", create_ms, create_us);
        let (remove_ms, remove_us) = msecs_usecs(snapshot.remove_time);
        println!("Total Remove time = {}.{} (msecs.usecs)", remove_ms, remove_us);
        if delay_enabled {
            let (delay_ms, delay_us) = msecs_usecs(snapshot.delay_time);
            println!("Total delay time = {}.{} (msecs.usecs)", delay_ms, delay_us);
        }
        let (io_ms, io_us) = msecs_usecs(snapshot.io_time);
        println!("Total IO time = {}.{} (msecs.usecs)", io_ms, io_us);

        println!(
            "Upfront File Creation bytes: read={} written={}",
            snapshot.create_rw_bytes.read, snapshot.create_rw_bytes.written
        );
        println!(
            "IO bytes: read={} written={}",
            snapshot.io_rw_bytes.read, snapshot.io_rw_bytes.written
        );

        for op_index in 0..snapshot.op_counts.len() {
            let count = snapshot.op_counts[op_index];
            if count > 0 {
                if let Ok(op) = crate::trace::format_file_op_from_index(op_index) {
                    println!("{}: {}", op.name(), count);
                }
            }
        }
        if snapshot.auto_open_count > 0 {
            println!(
                "note: {} operation(s) triggered fd auto-recovery (file opened before its recorded OPEN)",
                snapshot.auto_open_count
            );
        }
    }
}

/// Renders the same snapshot as JSON, for tooling that wants to diff runs
/// programmatically rather than scrape stdout. Selected by `--json` (§6
/// "Reported output": exact formatting is delegated, so a second
/// machine-readable rendering alongside the plain-text one is fair game).
pub fn to_json(snapshot: &AggregatorSnapshot) -> serde_json::Value {
    let mut op_counts = serde_json::Map::new();
    for op_index in 0..snapshot.op_counts.len() {
        if let Ok(op) = crate::trace::format_file_op_from_index(op_index) {
            op_counts.insert(op.name().to_string(), snapshot.op_counts[op_index].into());
        }
    }
    serde_json::json!({
        "create_time_us": snapshot.create_time.as_micros() as u64,
        "remove_time_us": snapshot.remove_time.as_micros() as u64,
        "io_time_us": snapshot.io_time.as_micros() as u64,
        "delay_time_us": snapshot.delay_time.as_micros() as u64,
        "create_bytes_read": snapshot.create_rw_bytes.read,
        "create_bytes_written": snapshot.create_rw_bytes.written,
        "io_bytes_read": snapshot.io_rw_bytes.read,
        "io_bytes_written": snapshot.io_rw_bytes.written,
        "op_counts": op_counts,
        "auto_open_count": snapshot.auto_open_count,
    })
}
