//! Top-level orchestration (§4.9): not a spec component in its own
//! right, but the glue that drives the Capacity Planner, Work Pump, and
//! Trace Worker through the flow described in §2. Owns the `Aggregator`
//! for the whole run and is the only place that spawns threads.

use crate::aggregator::Aggregator;
use crate::cache_hooks::CacheDropHook;
use crate::capacity_planner::{CapacityPlanner, Wave};
use crate::config::ReplayConfig;
use crate::error::Result;
use crate::log::LogWarn;
use crate::trace::read_file_sizes;
use crate::work_pump::WorkPump;
use crate::worker::{pre_create, replay, teardown, TraceSlot};
use std::sync::Arc;
use std::thread;

/// Runs every wave of the input trace list to completion and returns the
/// aggregator holding the whole run's totals. An empty input list returns
/// immediately with zero totals (§8 boundary behavior).
pub fn run(config: &ReplayConfig, cache_hook: &dyn CacheDropHook) -> Result<Arc<Aggregator>> {
    let aggregator = Arc::new(Aggregator::new());
    if config.trace_paths.is_empty() {
        return Ok(aggregator);
    }

    let mut trace_sizes = Vec::with_capacity(config.trace_paths.len());
    for path in &config.trace_paths {
        let entries = read_file_sizes(path)?;
        trace_sizes.push(entries.iter().map(|e| e.size).sum());
    }

    let slots: Vec<TraceSlot> = config
        .trace_paths
        .iter()
        .enumerate()
        .map(|(index, path)| TraceSlot::new(index, path.clone()))
        .collect();
    let slots = Arc::new(slots);
    let pump = Arc::new(WorkPump::new());
    let mut planner = CapacityPlanner::new(trace_sizes);

    loop {
        let wave = planner.next_wave(&config.scratch_dir)?;
        if wave.count == 0 {
            if wave.start != planner.total_traces() {
                log!(
                    LogWarn,
                    "trace at index {} does not fit the scratch filesystem's reserved capacity even alone; stopping with {} of {} traces planned",
                    wave.start,
                    wave.start,
                    planner.total_traces()
                );
            }
            break;
        }
        run_wave(config, cache_hook, &pump, &slots, &aggregator, wave)?;
    }

    Ok(aggregator)
}

fn run_wave(
    config: &ReplayConfig,
    cache_hook: &dyn CacheDropHook,
    pump: &Arc<WorkPump>,
    slots: &Arc<Vec<TraceSlot>>,
    aggregator: &Arc<Aggregator>,
    wave: Wave,
) -> Result<()> {
    let threads = config.effective_threads(wave.count);

    cache_hook.drop_caches();
    let scratch_dir = config.scratch_dir.clone();
    run_phase(pump, slots, aggregator, wave, threads, move |slot, agg| {
        pre_create(slot, &scratch_dir, agg)
    })?;

    for _ in 0..config.iterations {
        cache_hook.drop_caches();
        let delay_enabled = config.delay;
        run_phase(pump, slots, aggregator, wave, threads, move |slot, agg| {
            replay(slot, agg, delay_enabled)
        })?;
    }

    run_phase(pump, slots, aggregator, wave, threads, |slot, agg| {
        teardown(slot, agg)
    })?;

    Ok(())
}

/// Seeds the pump for one phase, spawns `threads` workers that drain it,
/// and joins all of them -- the global barrier described in §5. Returns
/// the first fatal error observed by any worker, if any; a worker that
/// hits an error stops pulling further work but does not try to cancel
/// the others, matching "no attempt is made to continue" being decided at
/// the wave/run level, not mid-phase (§7).
fn run_phase<F>(
    pump: &Arc<WorkPump>,
    slots: &Arc<Vec<TraceSlot>>,
    aggregator: &Arc<Aggregator>,
    wave: Wave,
    threads: usize,
    work: F,
) -> Result<()>
where
    F: Fn(&TraceSlot, &Aggregator) -> Result<()> + Send + Sync + 'static,
{
    pump.init(wave.start, wave.count);
    let work = Arc::new(work);

    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let pump = Arc::clone(pump);
        let slots = Arc::clone(slots);
        let aggregator = Arc::clone(aggregator);
        let work = Arc::clone(&work);
        handles.push(thread::spawn(move || -> Result<()> {
            while let Some(index) = pump.next_trace() {
                work(&slots[index], &aggregator)?;
            }
            Ok(())
        }));
    }

    let mut first_err = None;
    for handle in handles {
        let result = handle.join().expect("trace worker thread panicked");
        if let Err(e) = result {
            if first_err.is_none() {
                first_err = Some(e);
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_hooks::NoopCacheDropHook;
    use crate::trace::format::{FileOp, FileStateEntry, OperationRecord, TraceHeader};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_trace(path: &std::path::Path, fileno: u32, size: u64, write_len: u64) {
        let mut f = std::fs::File::create(path).unwrap();
        TraceHeader {
            num_files: 1,
            num_operations: 1,
        }
        .write_to(&mut f)
        .unwrap();
        FileStateEntry { fileno, size }.write_to(&mut f).unwrap();
        OperationRecord::positional_rw(FileOp::Pwrite, write_len, 0, fileno, 0)
            .write_to(&mut f)
            .unwrap();
    }

    #[test]
    fn empty_trace_list_yields_zero_totals() {
        let config = ReplayConfig {
            trace_paths: vec![],
            scratch_dir: PathBuf::from("."),
            iterations: 1,
            threads: None,
            delay: false,
            json: false,
        };
        let aggregator = run(&config, &NoopCacheDropHook).unwrap();
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.op_counts, [0u64; crate::trace::NUM_FILE_OPS]);
        assert_eq!(snapshot.io_rw_bytes.written, 0);
    }

    #[test]
    fn two_disjoint_traces_run_concurrently_sum_correctly() {
        let trace_dir = tempdir().unwrap();
        let scratch_dir = tempdir().unwrap();

        let t0 = trace_dir.path().join("t0.trace");
        let t1 = trace_dir.path().join("t1.trace");
        write_trace(&t0, 1, 4096, 1024);
        write_trace(&t1, 2, 4096, 2048);

        let config = ReplayConfig {
            trace_paths: vec![t0, t1],
            scratch_dir: scratch_dir.path().to_path_buf(),
            iterations: 2,
            threads: Some(2),
            delay: false,
            json: false,
        };

        let aggregator = run(&config, &NoopCacheDropHook).unwrap();
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.op_counts[FileOp::Pwrite.as_index()], 4);
        assert_eq!(snapshot.io_rw_bytes.written, 2 * (1024 + 2048));
        assert!(!scratch_dir.path().join("file.0.1").exists());
        assert!(!scratch_dir.path().join("file.1.2").exists());
    }
}
