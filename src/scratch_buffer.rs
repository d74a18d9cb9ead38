//! Per-worker scratch buffer for read/write payloads (§4.3.1 "Scratch
//! buffer"). Grows on demand, is reused across operations, and its
//! contents are never inspected -- only its length matters, since the
//! spec only promises reproduced length and offset, not byte-identical
//! content.

pub struct ScratchBuffer {
    buf: Vec<u8>,
}

impl ScratchBuffer {
    pub fn new() -> ScratchBuffer {
        ScratchBuffer { buf: Vec::new() }
    }

    /// Returns a slice of exactly `len` bytes, growing the backing buffer
    /// if needed. Used both as the destination for reads and the source
    /// for writes.
    pub fn get(&mut self, len: usize) -> &mut [u8] {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
        &mut self.buf[..len]
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        ScratchBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_to_requested_length_and_keeps_capacity() {
        let mut buf = ScratchBuffer::new();
        assert_eq!(buf.get(16).len(), 16);
        assert_eq!(buf.get(4096).len(), 4096);
        // Shrinking a request doesn't need to shrink the backing buffer.
        assert_eq!(buf.get(8).len(), 8);
    }
}
