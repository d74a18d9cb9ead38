//! Wire layout for trace files: a fixed header, a table of file-state
//! entries, then an ordered list of operation records. Byte order is the
//! host's; records are read with [`byteorder::NativeEndian`].
//!
//! The exact payload field widths for each `file_op` kind are owned by the
//! capture tool's schema out-of-band. This module fixes one concrete layout
//! (chosen to mirror the field names `ioshark_bench.c` uses) so the crate
//! has something to compile and test against.

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{self, Read, Write};

pub const HEADER_SIZE: usize = 16;
pub const FILE_STATE_SIZE: usize = 16;
pub const OP_RECORD_SIZE: usize = 40;
pub const PAYLOAD_SIZE: usize = 24;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct TraceHeader {
    pub num_files: u32,
    pub num_operations: u64,
}

impl TraceHeader {
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<TraceHeader> {
        let num_files = r.read_u32::<NativeEndian>()?;
        let _pad = r.read_u32::<NativeEndian>()?;
        let num_operations = r.read_u64::<NativeEndian>()?;
        Ok(TraceHeader {
            num_files,
            num_operations,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<NativeEndian>(self.num_files)?;
        w.write_u32::<NativeEndian>(0)?;
        w.write_u64::<NativeEndian>(self.num_operations)?;
        Ok(())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FileStateEntry {
    pub fileno: u32,
    pub size: u64,
}

impl FileStateEntry {
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<FileStateEntry> {
        let fileno = r.read_u32::<NativeEndian>()?;
        let _pad = r.read_u32::<NativeEndian>()?;
        let size = r.read_u64::<NativeEndian>()?;
        Ok(FileStateEntry { fileno, size })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<NativeEndian>(self.fileno)?;
        w.write_u32::<NativeEndian>(0)?;
        w.write_u64::<NativeEndian>(self.size)?;
        Ok(())
    }
}

/// One recorded filesystem operation. Mirrors `IOSHARK_*` in the original
/// capture tool's enum.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u32)]
pub enum FileOp {
    Lseek = 0,
    Llseek = 1,
    Pread = 2,
    Pwrite = 3,
    Read = 4,
    Write = 5,
    Mmap = 6,
    Mmap2 = 7,
    Open = 8,
    Fsync = 9,
    Fdatasync = 10,
    Close = 11,
}

pub const NUM_FILE_OPS: usize = 12;

impl FileOp {
    pub fn as_index(self) -> usize {
        self as u32 as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FileOp::Lseek => "lseek",
            FileOp::Llseek => "llseek",
            FileOp::Pread => "pread",
            FileOp::Pwrite => "pwrite",
            FileOp::Read => "read",
            FileOp::Write => "write",
            FileOp::Mmap => "mmap",
            FileOp::Mmap2 => "mmap2",
            FileOp::Open => "open",
            FileOp::Fsync => "fsync",
            FileOp::Fdatasync => "fdatasync",
            FileOp::Close => "close",
        }
    }
}

impl TryFrom<u32> for FileOp {
    type Error = u32;

    fn try_from(raw: u32) -> Result<FileOp, u32> {
        Ok(match raw {
            0 => FileOp::Lseek,
            1 => FileOp::Llseek,
            2 => FileOp::Pread,
            3 => FileOp::Pwrite,
            4 => FileOp::Read,
            5 => FileOp::Write,
            6 => FileOp::Mmap,
            7 => FileOp::Mmap2,
            8 => FileOp::Open,
            9 => FileOp::Fsync,
            10 => FileOp::Fdatasync,
            11 => FileOp::Close,
            other => return Err(other),
        })
    }
}

/// An mmap/mmap2 payload, handed to the mmap helper collaborator verbatim.
#[derive(Copy, Clone, Debug)]
pub struct MmapPayload {
    pub offset: u64,
    pub len: u64,
    pub prot: i32,
    pub flags: i32,
}

/// One operation record, with its fixed 24-byte payload reinterpreted on
/// demand depending on `file_op` (the original C layout is a union; here
/// each accessor reads the relevant prefix of the same byte buffer).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OperationRecord {
    pub file_op: FileOp,
    pub fileno: u32,
    pub delta_us: u64,
    payload: [u8; PAYLOAD_SIZE],
}

impl OperationRecord {
    pub fn new(file_op: FileOp, fileno: u32, delta_us: u64, payload: [u8; PAYLOAD_SIZE]) -> Self {
        OperationRecord {
            file_op,
            fileno,
            delta_us,
            payload,
        }
    }

    pub fn seek(offset: i64, whence: i32, fileno: u32, delta_us: u64) -> Self {
        let mut payload = [0u8; PAYLOAD_SIZE];
        (&mut payload[0..8]).write_i64::<NativeEndian>(offset).unwrap();
        (&mut payload[8..12]).write_i32::<NativeEndian>(whence).unwrap();
        OperationRecord::new(FileOp::Lseek, fileno, delta_us, payload)
    }

    pub fn positional_rw(file_op: FileOp, len: u64, offset: u64, fileno: u32, delta_us: u64) -> Self {
        let mut payload = [0u8; PAYLOAD_SIZE];
        (&mut payload[0..8]).write_u64::<NativeEndian>(len).unwrap();
        (&mut payload[8..16]).write_u64::<NativeEndian>(offset).unwrap();
        OperationRecord::new(file_op, fileno, delta_us, payload)
    }

    pub fn sequential_rw(file_op: FileOp, len: u64, fileno: u32, delta_us: u64) -> Self {
        let mut payload = [0u8; PAYLOAD_SIZE];
        (&mut payload[0..8]).write_u64::<NativeEndian>(len).unwrap();
        OperationRecord::new(file_op, fileno, delta_us, payload)
    }

    pub fn open(flags: i32, mode: u32, fileno: u32, delta_us: u64) -> Self {
        let mut payload = [0u8; PAYLOAD_SIZE];
        (&mut payload[0..4]).write_i32::<NativeEndian>(flags).unwrap();
        (&mut payload[4..8]).write_u32::<NativeEndian>(mode).unwrap();
        OperationRecord::new(FileOp::Open, fileno, delta_us, payload)
    }

    pub fn no_payload(file_op: FileOp, fileno: u32, delta_us: u64) -> Self {
        OperationRecord::new(file_op, fileno, delta_us, [0u8; PAYLOAD_SIZE])
    }

    pub fn seek_offset_whence(&self) -> (i64, i32) {
        let mut p = &self.payload[0..8];
        let offset = p.read_i64::<NativeEndian>().unwrap();
        let mut w = &self.payload[8..12];
        let whence = w.read_i32::<NativeEndian>().unwrap();
        (offset, whence)
    }

    pub fn positional_len_offset(&self) -> (u64, u64) {
        let mut l = &self.payload[0..8];
        let len = l.read_u64::<NativeEndian>().unwrap();
        let mut o = &self.payload[8..16];
        let offset = o.read_u64::<NativeEndian>().unwrap();
        (len, offset)
    }

    pub fn sequential_len(&self) -> u64 {
        let mut l = &self.payload[0..8];
        l.read_u64::<NativeEndian>().unwrap()
    }

    pub fn open_flags_mode(&self) -> (i32, u32) {
        let mut f = &self.payload[0..4];
        let flags = f.read_i32::<NativeEndian>().unwrap();
        let mut m = &self.payload[4..8];
        let mode = m.read_u32::<NativeEndian>().unwrap();
        (flags, mode)
    }

    pub fn mmap_payload(&self) -> MmapPayload {
        let mut o = &self.payload[0..8];
        let offset = o.read_u64::<NativeEndian>().unwrap();
        let mut l = &self.payload[8..16];
        let len = l.read_u64::<NativeEndian>().unwrap();
        let mut p = &self.payload[16..20];
        let prot = p.read_i32::<NativeEndian>().unwrap();
        let mut fl = &self.payload[20..24];
        let flags = fl.read_i32::<NativeEndian>().unwrap();
        MmapPayload {
            offset,
            len,
            prot,
            flags,
        }
    }

    /// Returns `Err(raw)` with the raw `file_op` value when it does not
    /// name a known kind -- this is fatal to the owning trace (§4.1).
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Result<OperationRecord, u32>> {
        let raw_op = r.read_u32::<NativeEndian>()?;
        let fileno = r.read_u32::<NativeEndian>()?;
        let delta_us = r.read_u64::<NativeEndian>()?;
        let mut payload = [0u8; PAYLOAD_SIZE];
        r.read_exact(&mut payload)?;
        Ok(match FileOp::try_from(raw_op) {
            Ok(file_op) => Ok(OperationRecord {
                file_op,
                fileno,
                delta_us,
                payload,
            }),
            Err(raw) => Err(raw),
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<NativeEndian>(self.file_op as u32)?;
        w.write_u32::<NativeEndian>(self.fileno)?;
        w.write_u64::<NativeEndian>(self.delta_us)?;
        w.write_all(&self.payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trips() {
        let h = TraceHeader {
            num_files: 3,
            num_operations: 42,
        };
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let mut cur = Cursor::new(buf);
        let h2 = TraceHeader::read_from(&mut cur).unwrap();
        assert_eq!(h, h2);
    }

    #[test]
    fn file_state_round_trips() {
        let e = FileStateEntry {
            fileno: 7,
            size: 4096,
        };
        let mut buf = Vec::new();
        e.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), FILE_STATE_SIZE);
        let mut cur = Cursor::new(buf);
        let e2 = FileStateEntry::read_from(&mut cur).unwrap();
        assert_eq!(e, e2);
    }

    #[test]
    fn positional_rw_round_trips() {
        let rec = OperationRecord::positional_rw(FileOp::Pwrite, 1024, 2048, 7, 500);
        let mut buf = Vec::new();
        rec.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), OP_RECORD_SIZE);
        let mut cur = Cursor::new(buf);
        let rec2 = OperationRecord::read_from(&mut cur).unwrap().unwrap();
        assert_eq!(rec2.fileno, 7);
        assert_eq!(rec2.delta_us, 500);
        assert_eq!(rec2.positional_len_offset(), (1024, 2048));
    }

    #[test]
    fn unknown_op_is_reported() {
        let mut buf = Vec::new();
        buf.write_u32::<NativeEndian>(99).unwrap();
        buf.write_u32::<NativeEndian>(0).unwrap();
        buf.write_u64::<NativeEndian>(0).unwrap();
        buf.extend_from_slice(&[0u8; PAYLOAD_SIZE]);
        let mut cur = Cursor::new(buf);
        let result = OperationRecord::read_from(&mut cur).unwrap();
        assert_eq!(result, Err(99));
    }
}
