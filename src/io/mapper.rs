//! Zero-copy record mapping
//!
//! A [`Mapper`] walks a byte region record by record and hands out aliased
//! views instead of copies. The region is either a real file mapping (via
//! `memmap2`, zero-copy) or an owned buffer copied once into 8-byte aligned
//! storage so that mapped `u64` views are always legal to form.

use std::sync::Arc;

use crate::error::{Result, TrieError};

/// Backing storage for a [`Mapper`].
///
/// The trie keeps one `Arc<MapRegion>` alive for as long as any mapped
/// vector aliases into it, which ties view lifetimes to the region handle.
pub struct MapRegion {
    kind: RegionKind,
}

enum RegionKind {
    #[cfg(feature = "mmap")]
    File(memmap2::Mmap),
    Owned { words: Vec<u64>, len: usize },
}

impl MapRegion {
    /// Copy a byte slice into an owned, 8-byte aligned region.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; bytes.len().div_ceil(8)];
        // Vec<u64> guarantees the 8-byte base alignment mapped views need.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                words.as_mut_ptr() as *mut u8,
                bytes.len(),
            );
        }
        Self {
            kind: RegionKind::Owned {
                words,
                len: bytes.len(),
            },
        }
    }

    /// Map an existing file read-only.
    #[cfg(feature = "mmap")]
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self {
            kind: RegionKind::File(mmap),
        })
    }

    /// The mapped bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.kind {
            #[cfg(feature = "mmap")]
            RegionKind::File(mmap) => mmap,
            RegionKind::Owned { words, len } => unsafe {
                std::slice::from_raw_parts(words.as_ptr() as *const u8, *len)
            },
        }
    }

    /// Total region size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the region is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cursor over a [`MapRegion`] that aliases records in place.
///
/// # Examples
///
/// ```rust
/// use loudtrie::io::Mapper;
///
/// let bytes = 9u64.to_le_bytes();
/// let mut mapper = Mapper::from_bytes(&bytes);
/// assert_eq!(mapper.read_u64()?, 9);
/// assert_eq!(mapper.remaining(), 0);
/// # Ok::<(), loudtrie::TrieError>(())
/// ```
pub struct Mapper {
    region: Arc<MapRegion>,
    pos: usize,
}

impl Mapper {
    /// Map a file and position the cursor at its start.
    #[cfg(feature = "mmap")]
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self::from_region(Arc::new(MapRegion::open(path)?)))
    }

    /// Map an in-memory image. The bytes are copied once into aligned
    /// storage; subsequent vector views alias that copy.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_region(Arc::new(MapRegion::from_bytes(bytes)))
    }

    /// Start a cursor over an existing region.
    pub fn from_region(region: Arc<MapRegion>) -> Self {
        Self { region, pos: 0 }
    }

    /// Current byte offset into the region.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the cursor and the end of the region.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.region.len().saturating_sub(self.pos)
    }

    /// Read a little-endian u64 by copy and advance.
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.region.as_bytes();
        let end = self
            .pos
            .checked_add(8)
            .ok_or_else(|| TrieError::invalid_data("mapper position overflow"))?;
        if end > bytes.len() {
            return Err(TrieError::invalid_data("truncated input: expected u64"));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[self.pos..end]);
        self.pos = end;
        Ok(u64::from_le_bytes(buf))
    }

    /// Alias the next `n` bytes in place. Returns the shared region plus the
    /// byte offset of the view; the caller casts as needed.
    pub fn map_bytes(&mut self, n: usize) -> Result<(Arc<MapRegion>, usize)> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or_else(|| TrieError::invalid_data("mapper position overflow"))?;
        if end > self.region.len() {
            return Err(TrieError::invalid_data(format!(
                "truncated input: need {} bytes, {} remain",
                n,
                self.remaining()
            )));
        }
        let offset = self.pos;
        self.pos = end;
        Ok((Arc::clone(&self.region), offset))
    }

    /// Advance over `n` padding bytes.
    pub fn seek(&mut self, n: usize) -> Result<()> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or_else(|| TrieError::invalid_data("mapper position overflow"))?;
        if end > self.region.len() {
            return Err(TrieError::invalid_data("truncated input: short padding"));
        }
        self.pos = end;
        Ok(())
    }
}
