//! Sequential reader over one trace file: header, then the file-state
//! table, then the operation log. §4.1 of the design.

use crate::error::{FatalError, Result};
use crate::trace::format::{FileStateEntry, OperationRecord, TraceHeader, FILE_STATE_SIZE};
use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub struct TraceReader {
    path: PathBuf,
    file: BufReader<File>,
    header: TraceHeader,
}

impl TraceReader {
    /// Opens the trace and reads its header. Stream position is left just
    /// after the header, i.e. at the start of the file-state table.
    pub fn open(path: &Path) -> Result<TraceReader> {
        let file = File::open(path)
            .map_err(|e| FatalError::io(format!("opening trace {}", path.display()), e))?;
        let mut file = BufReader::new(file);
        let header = TraceHeader::read_from(&mut file).map_err(|e| short_read(path, "header", e))?;
        Ok(TraceReader {
            path: path.to_path_buf(),
            file,
            header,
        })
    }

    /// Reads exactly `num_files` file-state entries from the current
    /// position (immediately after the header on first call).
    pub fn read_file_states(&mut self) -> Result<Vec<FileStateEntry>> {
        let mut entries = Vec::with_capacity(self.header.num_files as usize);
        for _ in 0..self.header.num_files {
            let entry = FileStateEntry::read_from(&mut self.file)
                .map_err(|e| short_read(&self.path, "file-state entry", e))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Rewinds to the header, re-reads it (trace files never change
    /// between iterations so this is purely a position reset), and seeks
    /// past the file-state table so the next read is the first operation
    /// record. Used at the start of every replay iteration.
    pub fn rewind_to_operations(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| FatalError::io(format!("rewinding trace {}", self.path.display()), e))?;
        let header =
            TraceHeader::read_from(&mut self.file).map_err(|e| short_read(&self.path, "header", e))?;
        debug_assert_eq!(header, self.header);
        let skip = self.header.num_files as u64 * FILE_STATE_SIZE as u64;
        self.file
            .seek(SeekFrom::Current(skip as i64))
            .map_err(|e| FatalError::io(format!("seeking trace {}", self.path.display()), e))?;
        Ok(())
    }

    /// Reads the next operation record. Returns `Ok(None)` only after
    /// exactly `num_operations` records have been returned by prior calls
    /// within the current iteration -- callers drive this with a counted
    /// loop rather than relying on EOF, since a short read mid-record is a
    /// fatal trace error, not a clean end.
    pub fn read_operation(&mut self) -> Result<OperationRecord> {
        match OperationRecord::read_from(&mut self.file) {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(raw_op)) => Err(FatalError::trace(
                &self.path,
                format!("unknown file_op {}", raw_op),
            )),
            Err(e) => Err(short_read(&self.path, "operation record", e)),
        }
    }

    pub fn num_operations(&self) -> u64 {
        self.header.num_operations
    }
}

fn short_read(path: &Path, what: &str, source: io::Error) -> FatalError {
    FatalError::trace(path, format!("short read of {}: {}", what, source))
}

/// Header-only peek used by the capacity planner: it needs each trace's
/// `(fileno, size)` table without driving a full pre-create/replay cycle.
pub fn read_file_sizes(path: &Path) -> Result<Vec<FileStateEntry>> {
    let mut reader = TraceReader::open(path)?;
    reader.read_file_states()
}
