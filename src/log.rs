//! Minimal hand-rolled logging, in the spirit of a tracer's own `log.rs`:
//! no external logging crate, just a level, a global sink behind a mutex,
//! and a `log!` macro keyed off `file!()`/`line!()`.
//!
//! Fatal conditions do NOT go through here. They go through
//! [`crate::error::FatalError`]'s `Display` impl so that the "one
//! diagnostic, then exit" contract stays a single code path.

use std::io::{self, Write};
use std::sync::Mutex;

#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Debug)]
pub enum LogLevel {
    LogError,
    LogWarn,
    LogInfo,
    LogDebug,
}

pub use LogLevel::*;

struct LogGlobals {
    level: LogLevel,
}

lazy_static! {
    static ref LOG_GLOBALS: Mutex<LogGlobals> = Mutex::new(LogGlobals {
        level: default_level(),
    });
}

fn default_level() -> LogLevel {
    match std::env::var("RD_BENCH_LOG").ok().as_deref() {
        Some("debug") => LogDebug,
        Some("info") => LogInfo,
        Some("warn") => LogWarn,
        Some("error") => LogError,
        _ => LogWarn,
    }
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogError => "ERROR",
        LogWarn => "WARN",
        LogInfo => "INFO",
        LogDebug => "DEBUG",
    }
}

/// Returns true and writes the formatted line to stderr if `level` is
/// enabled at the current global verbosity.
pub fn log_line(level: LogLevel, filename: &str, line: u32, args: std::fmt::Arguments) {
    let enabled = {
        let g = LOG_GLOBALS.lock().unwrap();
        level <= g.level
    };
    if !enabled {
        return;
    }
    let mut stderr = io::stderr();
    let _ = write!(stderr, "[{}] {}:{} ", level_name(level), filename, line);
    let _ = stderr.write_fmt(args);
    let _ = stderr.write_all(b"\n");
}

macro_rules! log {
    ($level:expr, $($args:tt)*) => {{
        $crate::log::log_line($level, file!(), line!(), format_args!($($args)*))
    }};
}
