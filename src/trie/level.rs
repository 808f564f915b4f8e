//! One level of the recursive trie
//!
//! A level is a complete trie over its input strings, encoded succinctly.
//! Tree shape lives in the LOUDS sequence, which starts with the super-root
//! bits `10` and then holds, for each node in level order, one `1` per
//! child followed by a terminating `0`. A level with n nodes therefore has
//! n ones and n + 1 zeros, and for node v (root = 0):
//!
//! - the child list starts at LOUDS position `select0(v) + 1`,
//! - a child 1-bit at position p denotes node `rank1(p)`,
//! - the parent of v != 0 is `rank0(select1(v)) - 1`.
//!
//! `labels[v - 1]` holds the first byte of v's incoming edge. When
//! `link_flags` marks v, the rest of the edge lives out of line and
//! `links[link_flags.rank1(v)]` addresses it. The low bit of a link word
//! tags its kind: set means a suffix in this level's own tail store, clear
//! means a node of the next level; the remaining 31 bits are the target.

use crate::config::TailMode;
use crate::error::{Result, TrieError};
use crate::io::{Mapper, Reader, Writer};
use crate::succinct::{BitVec, PodVec};
use crate::trie::tail::TailStore;

/// Decoded out-of-line target of a link edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkTarget {
    /// Offset (TEXT) or suffix index (BINARY) in the owning level's tail.
    Tail(u32),
    /// Terminal node of the edge remainder's key in the next level.
    Level(u32),
}

impl LinkTarget {
    /// Pack into a link word with the kind tag in the low bit.
    pub fn encode(self) -> Result<u32> {
        let (value, tag) = match self {
            Self::Tail(value) => (value, 1),
            Self::Level(value) => (value, 0),
        };
        if value > u32::MAX >> 1 {
            return Err(TrieError::capacity("tail link index overflow"));
        }
        Ok(value << 1 | tag)
    }

    /// Unpack a link word.
    pub fn decode(raw: u32) -> Self {
        if raw & 1 == 1 {
            Self::Tail(raw >> 1)
        } else {
            Self::Level(raw >> 1)
        }
    }
}

pub(crate) struct LoudsLevel {
    pub louds: BitVec,
    pub terminal_flags: BitVec,
    pub link_flags: BitVec,
    pub labels: PodVec<u8>,
    pub links: PodVec<u32>,
    pub tail: TailStore,
}

impl LoudsLevel {
    /// Total number of nodes, the super-root excluded.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.louds.num_zeros().saturating_sub(1)
    }

    /// LOUDS position where node v's child list starts.
    #[inline]
    pub fn child_begin(&self, v: u32) -> usize {
        self.louds.select0(v as usize) + 1
    }

    /// Whether the LOUDS bit at `pos` marks a child edge.
    #[inline]
    pub fn has_child_at(&self, pos: usize) -> bool {
        self.louds.get(pos) == Some(true)
    }

    /// The node denoted by a child 1-bit at `pos`.
    #[inline]
    pub fn node_at(&self, pos: usize) -> u32 {
        self.louds.rank1(pos) as u32
    }

    /// Number of children of the node whose child list starts at `begin`.
    #[inline]
    pub fn child_count_from(&self, begin: usize) -> usize {
        let mut count = 0;
        while self.louds.get(begin + count) == Some(true) {
            count += 1;
        }
        count
    }

    /// Parent of node v. The caller guarantees v != 0.
    #[inline]
    pub fn parent(&self, v: u32) -> u32 {
        debug_assert!(v != 0);
        (self.louds.rank0(self.louds.select1(v as usize)) - 1) as u32
    }

    /// First byte of node v's incoming edge. The caller guarantees v != 0.
    #[inline]
    pub fn label(&self, v: u32) -> u8 {
        self.labels[v as usize - 1]
    }

    /// Whether node v's incoming edge continues out of line.
    #[inline]
    pub fn is_link(&self, v: u32) -> bool {
        self.link_flags.bit(v as usize)
    }

    /// Whether a key ends at node v. Always false on levels that carry no
    /// terminal flags.
    #[inline]
    pub fn is_terminal(&self, v: u32) -> bool {
        !self.terminal_flags.is_empty() && self.terminal_flags.bit(v as usize)
    }

    /// Out-of-line target of node v's edge.
    #[inline]
    pub fn link(&self, v: u32) -> LinkTarget {
        LinkTarget::decode(self.links[self.link_flags.rank1(v as usize)])
    }

    /// Identifier of the key ending at terminal node v.
    #[inline]
    pub fn key_id(&self, v: u32) -> usize {
        self.terminal_flags.rank1(v as usize)
    }

    /// Terminal node of the key with identifier `id`.
    #[inline]
    pub fn terminal_node(&self, id: usize) -> u32 {
        self.terminal_flags.select1(id) as u32
    }

    /// Number of keys ending on this level.
    #[inline]
    pub fn num_keys(&self) -> usize {
        self.terminal_flags.num_ones()
    }

    /// Exact serialized size in bytes.
    pub fn io_size(&self) -> usize {
        self.louds.io_size()
            + self.terminal_flags.io_size()
            + self.link_flags.io_size()
            + self.labels.io_size()
            + self.tail.io_size()
            + self.links.io_size()
    }

    /// Serialize in the fixed per-level order: louds, terminal flags, link
    /// flags, labels, tail, link targets.
    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        self.louds.write(writer)?;
        self.terminal_flags.write(writer)?;
        self.link_flags.write(writer)?;
        self.labels.write(writer)?;
        self.tail.write(writer)?;
        self.links.write(writer)?;
        Ok(())
    }

    /// Deserialize into owned storage.
    pub fn read<R: std::io::Read>(reader: &mut Reader<R>, tail_mode: TailMode) -> Result<Self> {
        let louds = BitVec::read(reader)?;
        let terminal_flags = BitVec::read(reader)?;
        let link_flags = BitVec::read(reader)?;
        let labels = PodVec::read(reader)?;
        let tail = TailStore::read(reader, tail_mode)?;
        let links = PodVec::read(reader)?;
        Self::assemble(louds, terminal_flags, link_flags, labels, tail, links)
    }

    /// Deserialize as fixed views over the mapped region.
    pub fn map(mapper: &mut Mapper, tail_mode: TailMode) -> Result<Self> {
        let louds = BitVec::map(mapper)?;
        let terminal_flags = BitVec::map(mapper)?;
        let link_flags = BitVec::map(mapper)?;
        let labels = PodVec::map(mapper)?;
        let tail = TailStore::map(mapper, tail_mode)?;
        let links = PodVec::map(mapper)?;
        Self::assemble(louds, terminal_flags, link_flags, labels, tail, links)
    }

    fn assemble(
        louds: BitVec,
        terminal_flags: BitVec,
        link_flags: BitVec,
        labels: PodVec<u8>,
        tail: TailStore,
        links: PodVec<u32>,
    ) -> Result<Self> {
        let level = Self {
            louds,
            terminal_flags,
            link_flags,
            labels,
            links,
            tail,
        };
        let nodes = level.num_nodes();
        if level.louds.len() < 2 || level.louds.num_ones() != nodes {
            return Err(TrieError::invalid_data("malformed LOUDS sequence"));
        }
        if level.labels.len() != nodes.saturating_sub(1) {
            return Err(TrieError::invalid_data(
                "label array does not match the node count",
            ));
        }
        if level.link_flags.len() != nodes {
            return Err(TrieError::invalid_data(
                "link flags do not match the node count",
            ));
        }
        if !level.terminal_flags.is_empty() && level.terminal_flags.len() != nodes {
            return Err(TrieError::invalid_data(
                "terminal flags do not match the node count",
            ));
        }
        if level.links.len() != level.link_flags.num_ones() {
            return Err(TrieError::invalid_data(
                "link targets do not match the link flags",
            ));
        }
        Ok(level)
    }
}
