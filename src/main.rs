//! A thin binary: parse flags into a [`config::ReplayConfig`], hand it to
//! the runner, print whatever the runner's aggregator collected. No
//! replay logic lives here (§6 "CLI surface").

#[macro_use]
extern crate lazy_static;

#[macro_use]
mod log;

mod aggregator;
mod cache_hooks;
mod capacity_planner;
mod config;
mod delay_gate;
mod dispatcher;
mod error;
mod file_creator;
mod mmap_helper;
mod registry;
mod report;
mod runner;
mod scratch_buffer;
mod trace;
mod work_pump;
mod worker;

use cache_hooks::ProcDropCaches;
use config::{Cli, ReplayConfig};
use report::{PlainTextReporter, StatsReporter};
use structopt::StructOpt;

fn main() {
    let cli = Cli::from_args();
    let config = ReplayConfig::from_cli(cli);
    let cache_hook = ProcDropCaches;

    match runner::run(&config, &cache_hook) {
        Ok(aggregator) => {
            let snapshot = aggregator.snapshot();
            if config.json {
                println!("{}", report::to_json(&snapshot));
            } else {
                PlainTextReporter.report(&snapshot, config.delay);
            }
        }
        Err(e) => {
            eprintln!("ioreplay: {}", e);
            std::process::exit(1);
        }
    }
}
