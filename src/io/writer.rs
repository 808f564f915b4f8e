//! Streaming writer for the trie's binary format
//!
//! Wraps any [`std::io::Write`] and tracks the output position so callers
//! can keep records aligned. All integers are written little-endian.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Positioned little-endian writer over an arbitrary byte sink.
///
/// # Examples
///
/// ```rust
/// use loudtrie::io::Writer;
///
/// let mut buf = Vec::new();
/// let mut writer = Writer::new(&mut buf);
/// writer.write_u64(0x0102_0304)?;
/// writer.pad(4)?;
/// assert_eq!(writer.position(), 12);
/// # Ok::<(), loudtrie::TrieError>(())
/// ```
pub struct Writer<W> {
    inner: W,
    pos: u64,
}

impl Writer<BufWriter<File>> {
    /// Create a buffered writer over a newly created (or truncated) file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> Writer<W> {
    /// Wrap an arbitrary byte sink.
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Write a 32-bit unsigned integer in little-endian format.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a 64-bit unsigned integer in little-endian format.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a raw byte slice.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    /// Advance the output by `n` zero bytes.
    ///
    /// This is the writer-side equivalent of a seek and is used for
    /// alignment padding between records.
    pub fn pad(&mut self, n: usize) -> Result<()> {
        const ZEROS: [u8; 8] = [0; 8];
        let mut left = n;
        while left > 0 {
            let chunk = left.min(ZEROS.len());
            self.write_bytes(&ZEROS[..chunk])?;
            left -= chunk;
        }
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
