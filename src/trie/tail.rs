//! Out-of-line suffix storage
//!
//! Multi-byte edge suffixes that end a path are stored once in a flat tail
//! store instead of as chains of single-byte nodes. TEXT layout keeps
//! zero-terminated strings addressed by byte offset and shares storage
//! between suffixes with a common ending. BINARY layout packs the bytes
//! tightly and marks the last byte of each suffix in a boundary bit vector,
//! addressing suffixes by index; it is the only layout that can hold
//! suffixes containing NUL bytes.

use log::warn;

use crate::config::{CacheLevel, TailMode};
use crate::error::{Result, TrieError};
use crate::io::{Mapper, Reader, Writer};
use crate::succinct::{BitVec, PodVec};

/// Flat store of deduplicated edge suffixes.
pub(crate) struct TailStore {
    mode: TailMode,
    bytes: PodVec<u8>,
    end_flags: BitVec,
}

impl TailStore {
    /// An empty store, used by levels that spill nothing.
    pub fn empty(mode: TailMode) -> Self {
        Self {
            mode,
            bytes: PodVec::new(),
            end_flags: BitVec::new(),
        }
    }

    /// Build a store from raw suffixes, deduplicating shared storage.
    ///
    /// Returns the store plus one link value per input suffix: a byte
    /// offset in TEXT mode, a suffix index in BINARY mode. A TEXT request
    /// is demoted to BINARY when any suffix contains a NUL byte.
    pub fn build(
        suffixes: &[&[u8]],
        mode: TailMode,
        cache_level: CacheLevel,
    ) -> Result<(Self, Vec<u32>)> {
        debug_assert!(suffixes.iter().all(|s| !s.is_empty()));

        let mode = match mode {
            TailMode::Text if suffixes.iter().any(|s| s.contains(&0)) => {
                warn!("tail suffix contains a NUL byte; storing the tail in binary layout");
                TailMode::Binary
            }
            other => other,
        };

        match mode {
            TailMode::Text => Self::build_text(suffixes),
            TailMode::Binary => Self::build_binary(suffixes, cache_level),
        }
    }

    fn build_text(suffixes: &[&[u8]]) -> Result<(Self, Vec<u32>)> {
        // Sorting by reversed bytes, longest first, puts every suffix right
        // after a string it can share an ending (and terminator) with.
        let mut order: Vec<usize> = (0..suffixes.len()).collect();
        order.sort_by(|&a, &b| {
            let ra = suffixes[a].iter().rev();
            let rb = suffixes[b].iter().rev();
            ra.cmp(rb).reverse()
        });

        let mut bytes: PodVec<u8> = PodVec::new();
        let mut offsets = vec![0u32; suffixes.len()];
        let mut last: &[u8] = &[];
        let mut last_offset = 0usize;

        for &index in &order {
            let suffix = suffixes[index];
            let offset = if last.ends_with(suffix) {
                last_offset + (last.len() - suffix.len())
            } else {
                let offset = bytes.len();
                bytes.extend_from_slice(suffix)?;
                bytes.push(0)?;
                last = suffix;
                last_offset = offset;
                offset
            };
            offsets[index] = u32::try_from(offset)
                .map_err(|_| TrieError::capacity("tail offset overflow"))?;
        }

        Ok((
            Self {
                mode: TailMode::Text,
                bytes,
                end_flags: BitVec::new(),
            },
            offsets,
        ))
    }

    fn build_binary(suffixes: &[&[u8]], cache_level: CacheLevel) -> Result<(Self, Vec<u32>)> {
        // Exact duplicates collapse onto one stored suffix.
        let mut order: Vec<usize> = (0..suffixes.len()).collect();
        order.sort_by(|&a, &b| suffixes[a].cmp(suffixes[b]));

        let mut bytes: PodVec<u8> = PodVec::new();
        let mut end_flags = BitVec::new();
        let mut ids = vec![0u32; suffixes.len()];
        let mut previous: Option<&[u8]> = None;
        let mut next_id = 0u32;

        for &index in &order {
            let suffix = suffixes[index];
            if previous != Some(suffix) {
                bytes.extend_from_slice(suffix)?;
                for _ in 0..suffix.len() - 1 {
                    end_flags.push(false)?;
                }
                end_flags.push(true)?;
                previous = Some(suffix);
                next_id = next_id
                    .checked_add(1)
                    .ok_or_else(|| TrieError::capacity("tail link index overflow"))?;
            }
            ids[index] = next_id - 1;
        }

        end_flags.build(false, cache_level >= CacheLevel::Large, cache_level)?;
        Ok((
            Self {
                mode: TailMode::Binary,
                bytes,
                end_flags,
            },
            ids,
        ))
    }

    /// The layout actually used (TEXT may have been demoted).
    #[inline]
    pub fn mode(&self) -> TailMode {
        self.mode
    }

    /// Stored payload size in bytes.
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Number of stored suffixes. Meaningful for BINARY layout; TEXT
    /// addresses suffixes by offset and reports zero here.
    #[inline]
    pub fn num_suffixes(&self) -> usize {
        self.end_flags.num_ones()
    }

    /// Resolve a link value to its suffix bytes.
    pub fn suffix(&self, link: u32) -> &[u8] {
        let slice = self.bytes.as_slice();
        match self.mode {
            TailMode::Text => {
                let start = link as usize;
                let end = start
                    + slice[start..]
                        .iter()
                        .position(|&b| b == 0)
                        .expect("text tail suffix is zero-terminated");
                &slice[start..end]
            }
            TailMode::Binary => {
                let k = link as usize;
                let start = if k == 0 {
                    0
                } else {
                    self.end_flags.select1(k - 1) + 1
                };
                let end = self.end_flags.select1(k) + 1;
                &slice[start..end]
            }
        }
    }

    /// Exact serialized size in bytes.
    pub fn io_size(&self) -> usize {
        self.bytes.io_size() + self.end_flags.io_size()
    }

    /// Serialize: content vector, then boundary flags (empty for TEXT).
    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        self.bytes.write(writer)?;
        self.end_flags.write(writer)?;
        Ok(())
    }

    /// Deserialize into owned storage. The mode comes from the trie's
    /// serialized flag word.
    pub fn read<R: std::io::Read>(reader: &mut Reader<R>, mode: TailMode) -> Result<Self> {
        let bytes = PodVec::read(reader)?;
        let end_flags = BitVec::read(reader)?;
        Self::assemble(bytes, end_flags, mode)
    }

    /// Deserialize as fixed views over the mapped region.
    pub fn map(mapper: &mut Mapper, mode: TailMode) -> Result<Self> {
        let bytes = PodVec::map(mapper)?;
        let end_flags = BitVec::map(mapper)?;
        Self::assemble(bytes, end_flags, mode)
    }

    fn assemble(bytes: PodVec<u8>, end_flags: BitVec, mode: TailMode) -> Result<Self> {
        match mode {
            TailMode::Text => {
                if !end_flags.is_empty() {
                    return Err(TrieError::invalid_data(
                        "text tail must not carry boundary flags",
                    ));
                }
                if bytes.len() > 0 && bytes[bytes.len() - 1] != 0 {
                    return Err(TrieError::invalid_data(
                        "text tail does not end with a terminator",
                    ));
                }
            }
            TailMode::Binary => {
                if end_flags.len() != bytes.len() {
                    return Err(TrieError::invalid_data(
                        "binary tail boundary flags do not match its content",
                    ));
                }
            }
        }
        Ok(Self {
            mode,
            bytes,
            end_flags,
        })
    }
}
