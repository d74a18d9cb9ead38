//! Drives one trace through its three phases (§4.5): pre-create, replay
//! (one call per iteration), teardown. A `TraceSlot` is the per-trace
//! state that outlives any single phase -- different OS threads touch it
//! across phases (whichever thread the `WorkPump` hands it to), but never
//! concurrently, since phase boundaries are global joins (§5). The
//! `Mutex` here is bookkeeping for `Send`/`Sync`, not contended locking.

use crate::aggregator::{Aggregator, RwBytes, TimeKind};
use crate::delay_gate::DelayGate;
use crate::dispatcher::dispatch;
use crate::error::Result;
use crate::file_creator::create_and_fill;
use crate::mmap_helper::RealMmapHelper;
use crate::registry::FileRegistry;
use crate::scratch_buffer::ScratchBuffer;
use crate::trace::{TraceReader, NUM_FILE_OPS};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct TraceRuntime {
    reader: TraceReader,
    registry: FileRegistry,
}

pub struct TraceSlot {
    /// This trace's position in the global trace-slot array; also the
    /// `<s>` in the synthesized `file.<s>.<fileno>` path (§3).
    pub index: usize,
    pub path: PathBuf,
    runtime: Mutex<Option<TraceRuntime>>,
}

impl TraceSlot {
    pub fn new(index: usize, path: PathBuf) -> TraceSlot {
        TraceSlot {
            index,
            path,
            runtime: Mutex::new(None),
        }
    }
}

/// Pre-create driver (§4.5): reads the file-state table, materializes
/// every file at its recorded size, and registers a node for each.
pub fn pre_create(slot: &TraceSlot, scratch_dir: &Path, aggregator: &Aggregator) -> Result<()> {
    let mut reader = TraceReader::open(&slot.path)?;
    let file_states = reader.read_file_states()?;

    let mut registry = FileRegistry::new();
    let mut create_time = Duration::default();
    let mut create_bytes = RwBytes::default();

    for entry in file_states {
        let path = scratch_dir.join(format!("file.{}.{}", slot.index, entry.fileno));
        let outcome = create_and_fill(&path, entry.size)?;
        create_time += outcome.elapsed;
        create_bytes.written += outcome.bytes_written;

        let node = registry.add(entry.fileno);
        FileRegistry::set_path(node, path);
        FileRegistry::set_size(node, entry.size);
    }

    aggregator.add_time(TimeKind::Create, create_time);
    aggregator.add_create_bytes(create_bytes);

    let mut guard = slot.runtime.lock().unwrap();
    *guard = Some(TraceRuntime { reader, registry });
    Ok(())
}

/// Replay driver (§4.5): rewinds to the operation log, resets per-op
/// state, dispatches every record, then runs the fsync/discard/close
/// epilogue charged to `io_time`.
pub fn replay(slot: &TraceSlot, aggregator: &Aggregator, delay_enabled: bool) -> Result<()> {
    let mut guard = slot.runtime.lock().unwrap();
    let runtime = guard
        .as_mut()
        .expect("replay() called on a trace slot with no pre-created state");

    runtime.reader.rewind_to_operations()?;

    let mut delay_gate = DelayGate::new(delay_enabled);
    let mut scratch = ScratchBuffer::new();
    let mmap_helper = RealMmapHelper;

    let mut op_counts = [0u64; NUM_FILE_OPS];
    let mut io_bytes = RwBytes::default();
    let mut io_time = Duration::default();
    let mut delay_time = Duration::default();
    let mut auto_open_count = 0u64;

    let num_operations = runtime.reader.num_operations();
    for _ in 0..num_operations {
        let record = runtime.reader.read_operation()?;
        delay_time += delay_gate.advance(record.delta_us);

        let outcome = dispatch(&slot.path, &record, &mut runtime.registry, &mut scratch, &mmap_helper)?;
        io_time += outcome.elapsed;
        io_bytes.read += outcome.bytes.read;
        io_bytes.written += outcome.bytes.written;
        op_counts[record.file_op.as_index()] += 1;
        if outcome.auto_opened {
            auto_open_count += 1;
        }
    }

    let epilogue_start = Instant::now();
    runtime.registry.fsync_and_discard_all();
    runtime.registry.close_all();
    io_time += epilogue_start.elapsed();

    aggregator.add_time(TimeKind::Io, io_time);
    aggregator.add_time(TimeKind::Delay, delay_time);
    aggregator.add_op_counts(&op_counts);
    aggregator.add_io_bytes(io_bytes);
    aggregator.add_auto_open_count(auto_open_count);
    Ok(())
}

/// Teardown driver (§4.5): unlinks every registered path, charges the
/// elapsed time to `remove_time`, and frees the registry.
pub fn teardown(slot: &TraceSlot, aggregator: &Aggregator) -> Result<()> {
    let mut guard = slot.runtime.lock().unwrap();
    if let Some(mut runtime) = guard.take() {
        let mut elapsed = Duration::default();
        runtime.registry.unlink_all(&mut elapsed);
        runtime.registry.free();
        aggregator.add_time(TimeKind::Remove, elapsed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::format::{FileOp, FileStateEntry, OperationRecord, TraceHeader};
    use tempfile::tempdir;

    fn write_trace(path: &Path) {
        let mut f = std::fs::File::create(path).unwrap();
        TraceHeader {
            num_files: 1,
            num_operations: 1,
        }
        .write_to(&mut f)
        .unwrap();
        FileStateEntry {
            fileno: 7,
            size: 4096,
        }
        .write_to(&mut f)
        .unwrap();
        OperationRecord::positional_rw(FileOp::Pwrite, 1024, 0, 7, 0)
            .write_to(&mut f)
            .unwrap();
    }

    #[test]
    fn full_lifecycle_reaches_zero_fd_and_no_files() {
        let trace_dir = tempdir().unwrap();
        let scratch_dir = tempdir().unwrap();
        let trace_path = trace_dir.path().join("t0.trace");
        write_trace(&trace_path);

        let slot = TraceSlot::new(0, trace_path);
        let aggregator = Aggregator::new();

        pre_create(&slot, scratch_dir.path(), &aggregator).unwrap();
        let file_path = scratch_dir.path().join("file.0.7");
        assert!(file_path.exists());
        assert_eq!(std::fs::metadata(&file_path).unwrap().len(), 4096);

        replay(&slot, &aggregator, false).unwrap();
        replay(&slot, &aggregator, false).unwrap();

        teardown(&slot, &aggregator).unwrap();
        assert!(!file_path.exists());

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.op_counts[FileOp::Pwrite.as_index()], 2);
        assert_eq!(snapshot.io_rw_bytes.written, 2048);
        assert_eq!(snapshot.create_rw_bytes.written, 4096);
    }

    #[test]
    fn zero_operation_trace_still_pre_creates_and_tears_down() {
        let trace_dir = tempdir().unwrap();
        let scratch_dir = tempdir().unwrap();
        let trace_path = trace_dir.path().join("empty.trace");
        {
            let mut f = std::fs::File::create(&trace_path).unwrap();
            TraceHeader {
                num_files: 1,
                num_operations: 0,
            }
            .write_to(&mut f)
            .unwrap();
            FileStateEntry {
                fileno: 1,
                size: 0,
            }
            .write_to(&mut f)
            .unwrap();
        }

        let slot = TraceSlot::new(0, trace_path);
        let aggregator = Aggregator::new();
        pre_create(&slot, scratch_dir.path(), &aggregator).unwrap();
        let file_path = scratch_dir.path().join("file.0.1");
        assert!(file_path.exists());

        replay(&slot, &aggregator, false).unwrap();
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.op_counts, [0u64; NUM_FILE_OPS]);

        teardown(&slot, &aggregator).unwrap();
        assert!(!file_path.exists());
    }
}
