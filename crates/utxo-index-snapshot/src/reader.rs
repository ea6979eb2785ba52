use crate::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default refill size of [`BinaryCursor`].
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024 * 1024;

/// Forward-only buffered reader over a byte source of known length.
///
/// The cursor keeps a window `[buffer_start, buffer_start + buffer.len())` that covers the
/// current position. A refill allocates a fresh buffer of `max(buffer_size, requested)`
/// bytes, carrying over the unread tail of the previous one.
///
/// [`BinaryCursor::read`] hands out a view into the window; the borrow ends before the next
/// read. Use [`BinaryCursor::read_vec`] or [`BinaryCursor::read_array`] for bytes that must
/// outlive it.
pub struct BinaryCursor<R> {
    inner: R,
    len: u64,
    buffer_size: usize,
    buffer: Vec<u8>,
    buffer_start: u64,
    offset: usize,
}

impl BinaryCursor<File> {
    /// Opens `path` for sequential reads.
    pub fn open(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::new(file, len, buffer_size))
    }
}

impl<R: Read> BinaryCursor<R> {
    /// Wraps `inner`, which must yield exactly `len` bytes.
    pub fn new(inner: R, len: u64, buffer_size: usize) -> Self {
        Self {
            inner,
            len,
            buffer_size: buffer_size.max(1),
            buffer: Vec::new(),
            buffer_start: 0,
            offset: 0,
        }
    }

    /// Absolute position of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.buffer_start + self.offset as u64
    }

    /// Total length of the underlying source.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether every byte of the source has been consumed.
    pub fn at_end(&self) -> bool {
        self.position() >= self.len
    }

    fn buffered(&self) -> usize {
        self.buffer.len() - self.offset
    }

    fn refill(&mut self, min_bytes: usize) -> Result<()> {
        let capacity = self.buffer_size.max(min_bytes);
        let mut next = Vec::with_capacity(capacity);
        next.extend_from_slice(&self.buffer[self.offset..]);

        let wanted = (capacity - next.len()) as u64;
        (&mut self.inner).take(wanted).read_to_end(&mut next)?;

        self.buffer_start += self.offset as u64;
        self.offset = 0;
        self.buffer = next;

        Ok(())
    }

    /// Reads exactly `n` bytes, returning a view into the internal buffer.
    pub fn read(&mut self, n: usize) -> Result<&[u8]> {
        if self.buffered() < n {
            self.refill(n)?;
        }

        let available = self.buffered();
        if available < n {
            return Err(Error::UnexpectedEndOfInput {
                position: self.position(),
                requested: n,
                available,
            });
        }

        let start = self.offset;
        self.offset += n;
        Ok(&self.buffer[start..start + n])
    }

    /// Reads exactly `n` bytes into an owned buffer.
    pub fn read_vec(&mut self, n: usize) -> Result<Vec<u8>> {
        self.read(n).map(<[u8]>::to_vec)
    }

    /// Reads exactly `N` bytes into an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }
}
