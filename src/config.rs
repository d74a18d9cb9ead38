//! Command-line surface (§6 "CLI surface"). The binary's only job is to
//! translate flags into a [`ReplayConfig`] and hand it to the runner; no
//! replay logic lives here.

use std::path::PathBuf;
use structopt::StructOpt;

/// Compile-time ceiling on worker threads per wave (§5), mirroring the
/// original `MAX_THREADS`.
pub const MAX_THREADS: usize = 1024;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "ioreplay",
    about = "Replays a captured storage-I/O trace against a scratch directory."
)]
pub struct Cli {
    /// Sleep between operations to approximate the trace's recorded timing.
    #[structopt(short = "d", long = "delay")]
    pub delay: bool,

    /// Number of times to replay each wave's operation log.
    #[structopt(short = "n", long = "iterations", default_value = "1")]
    pub iterations: u32,

    /// Worker threads per wave; defaults to the wave's trace count.
    #[structopt(short = "t", long = "threads")]
    pub threads: Option<usize>,

    /// Scratch directory the replayed files are created in.
    #[structopt(long = "scratch-dir", default_value = ".", parse(from_os_str))]
    pub scratch_dir: PathBuf,

    /// Emit the final report as JSON on stdout instead of plain text.
    #[structopt(long = "json")]
    pub json: bool,

    /// Parsed trace files to replay.
    #[structopt(name = "TRACE", parse(from_os_str))]
    pub traces: Vec<PathBuf>,
}

/// The core's view of the operator's choices, independent of how they
/// were obtained (CLI today; nothing stops a test from building one by
/// hand).
pub struct ReplayConfig {
    pub trace_paths: Vec<PathBuf>,
    pub scratch_dir: PathBuf,
    pub iterations: u32,
    pub threads: Option<usize>,
    pub delay: bool,
    pub json: bool,
}

impl ReplayConfig {
    pub fn from_cli(cli: Cli) -> ReplayConfig {
        ReplayConfig {
            trace_paths: cli.traces,
            scratch_dir: cli.scratch_dir,
            iterations: cli.iterations.max(1),
            threads: cli.threads,
            delay: cli.delay,
            json: cli.json,
        }
    }

    /// Thread count for a wave of `wave_count` traces: the operator's
    /// choice if set, else one thread per trace, clamped to
    /// `[1, MAX_THREADS]` and never more than there is work for (§5).
    pub fn effective_threads(&self, wave_count: usize) -> usize {
        let requested = self.threads.unwrap_or(wave_count).max(1);
        requested.min(MAX_THREADS).min(wave_count.max(1))
    }
}
