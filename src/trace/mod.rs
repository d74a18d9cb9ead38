pub mod format;
pub mod reader;

pub use format::{FileOp, FileStateEntry, MmapPayload, OperationRecord, TraceHeader, NUM_FILE_OPS};
pub use reader::{read_file_sizes, TraceReader};

use std::convert::TryFrom;

/// Inverse of `FileOp::as_index`, used by the reporter to name each slot
/// of `op_counts` without hardcoding the enum order a second time.
pub fn format_file_op_from_index(index: usize) -> Result<FileOp, u32> {
    FileOp::try_from(index as u32)
}
