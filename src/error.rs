//! The crate's single error type. Every fallible core operation returns
//! `Result<T, FatalError>`; only `main` converts a `FatalError` into a
//! process exit, preserving the "either the whole benchmark ran or it did
//! not" contract (no per-trace recovery, see the dispatcher design notes).

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum FatalError {
    /// The trace file itself is malformed: a short read, or an operation
    /// record naming an unknown `file_op`.
    Trace { path: PathBuf, reason: String },
    /// A syscall the dispatcher is not allowed to tolerate failed.
    Syscall {
        op: &'static str,
        path: Option<PathBuf>,
        source: nix::Error,
    },
    /// Non-syscall I/O failure, e.g. opening the trace file or the scratch
    /// directory.
    Io {
        context: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, FatalError>;

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::Trace { path, reason } => {
                write!(f, "trace format error in {}: {}", path.display(), reason)
            }
            FatalError::Syscall { op, path, source } => match path {
                Some(p) => write!(f, "{}({}) failed: {}", op, p.display(), source),
                None => write!(f, "{}() failed: {}", op, source),
            },
            FatalError::Io { context, source } => write!(f, "{}: {}", context, source),
        }
    }
}

impl std::error::Error for FatalError {}

impl FatalError {
    pub fn syscall(op: &'static str, path: Option<PathBuf>, source: nix::Error) -> FatalError {
        FatalError::Syscall { op, path, source }
    }

    pub fn trace(path: impl Into<PathBuf>, reason: impl Into<String>) -> FatalError {
        FatalError::Trace {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> FatalError {
        FatalError::Io {
            context: context.into(),
            source,
        }
    }
}
