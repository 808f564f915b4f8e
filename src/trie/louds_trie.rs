//! Recursive LOUDS trie engine
//!
//! The engine stacks trie levels in one indexed array. Level 0 is a trie
//! over the input keys; every multi-byte edge keeps its first byte inline
//! and stores the remainder out of line. A remainder unique to one key
//! goes straight into its level's tail store; a remainder shared by
//! several keys becomes a key of the next level, so the recursion
//! compresses edge text that actually repeats across the key set. The
//! recursion depth is bounded by `num_tries`; at the bound shared
//! remainders spill into the last level's tail as well.
//!
//! Matching direction alternates: level 0 is matched walking down from the
//! root, every deeper level is matched walking up from the linked node.
//! Each stage therefore stores its strings so that its own walk yields the
//! bytes in the order the parent consumes them.
//!
//! All four queries run in constant time per consumed edge over the frozen
//! rank/select indices. Queries only read; the caller's [`Agent`] carries
//! the query, the result and any iteration state.

use log::{debug, warn};

use crate::agent::{Agent, PredictiveFrame, TraversalState};
use crate::config::{CacheLevel, Config, NodeOrder, TailMode};
use crate::error::{Result, TrieError};
use crate::io::{Mapper, Reader, Writer};
use crate::keyset::Keyset;
use crate::succinct::BitVec;
use crate::trie::builder::{build_level, dedup_pending, LevelOutput, TailSpill};
use crate::trie::level::{LinkTarget, LoudsLevel};
use crate::trie::tail::TailStore;

/// Static trie over a bulk-loaded key set.
///
/// Lifecycle: *empty* (new) to *queryable* via [`LoudsTrie::build`] or one
/// of the loaders; [`LoudsTrie::clear`] returns to empty. A queryable trie
/// is immutable; concurrent readers only need their own [`Agent`]s.
///
/// # Examples
///
/// ```rust
/// use loudtrie::{Agent, Keyset, LoudsTrie};
///
/// let mut keyset = Keyset::new();
/// keyset.push(b"west")?;
/// keyset.push(b"western")?;
///
/// let mut trie = LoudsTrie::new();
/// trie.build(&mut keyset, 0)?;
///
/// let mut agent = Agent::new();
/// agent.set_query(b"western");
/// assert!(trie.lookup(&mut agent)?);
/// assert_eq!(agent.key(), b"western");
/// # Ok::<(), loudtrie::TrieError>(())
/// ```
#[derive(Default)]
pub struct LoudsTrie {
    levels: Vec<LoudsLevel>,
    config: Config,
    num_keys: usize,
}

impl LoudsTrie {
    /// Create an empty trie. Queries error until it is built or loaded.
    pub fn new() -> Self {
        Self {
            levels: Vec::new(),
            config: Config::default(),
            num_keys: 0,
        }
    }

    /// Number of stored keys.
    #[inline]
    pub fn num_keys(&self) -> usize {
        self.num_keys
    }

    /// Whether the trie stores no keys (or is not yet built).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_keys == 0
    }

    /// Number of built levels.
    #[inline]
    pub fn num_tries(&self) -> usize {
        self.levels.len()
    }

    /// Total node count across levels.
    pub fn num_nodes(&self) -> usize {
        self.levels.iter().map(|l| l.num_nodes()).sum()
    }

    /// Tail layout actually in use.
    #[inline]
    pub fn tail_mode(&self) -> TailMode {
        self.config.tail_mode()
    }

    /// Sibling layout order.
    #[inline]
    pub fn node_order(&self) -> NodeOrder {
        self.config.node_order()
    }

    /// Exact serialized size in bytes.
    pub fn io_size(&self) -> usize {
        8 + self.levels.iter().map(|l| l.io_size()).sum::<usize>()
    }

    /// Total tail store payload in bytes, across all levels.
    pub fn tail_size(&self) -> usize {
        self.levels.iter().map(|l| l.tail.len_bytes()).sum()
    }

    /// Return to the empty state, releasing all storage and any mapped
    /// region handle.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Exchange the contents of two engines.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    fn require_ready(&self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(TrieError::state("the trie is empty; build or load it first"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------

    /// Build the trie from `keyset` under the packed `config_flags`.
    ///
    /// Duplicate keys fail the build. On success every key's assigned
    /// identifier is written back into the keyset; on failure the trie is
    /// left empty.
    pub fn build(&mut self, keyset: &mut Keyset, config_flags: u32) -> Result<()> {
        let config = Config::parse(config_flags)?;
        match Self::build_impl(keyset, config) {
            Ok((trie, terminals)) => {
                for (index, &node) in terminals.iter().enumerate() {
                    keyset.set_key_id(index, trie.levels[0].key_id(node));
                }
                *self = trie;
                Ok(())
            }
            Err(err) => {
                self.clear();
                Err(err)
            }
        }
    }

    fn build_impl(keyset: &Keyset, config: Config) -> Result<(Self, Vec<u32>)> {
        let node_order = config.node_order();
        let cache = config.cache_level();

        // Every level may own a tail, so the layout decision is global:
        // a NUL anywhere in the keys forces binary layout up front.
        let mut tail_mode = config.tail_mode();
        if tail_mode == TailMode::Text
            && (0..keyset.num_keys()).any(|i| keyset.key_bytes(i).contains(&0))
        {
            warn!("keys contain NUL bytes; storing tails in binary layout");
            tail_mode = TailMode::Binary;
        }

        let mut outputs: Vec<LevelOutput> = Vec::new();
        let mut tails: Vec<TailStore> = Vec::new();

        // Entries of the level under construction; level 0 borrows the
        // keyset, deeper levels own their label strings.
        let mut owned: Vec<(Vec<u8>, f32)> = Vec::new();
        let mut assignments: Vec<(usize, usize)> = Vec::new();
        let mut level = 0usize;

        loop {
            let slices: Vec<(&[u8], f32)> = if level == 0 {
                (0..keyset.num_keys())
                    .map(|i| {
                        let key = keyset.key(i);
                        (key.bytes(), key.weight())
                    })
                    .collect()
            } else {
                owned.iter().map(|(b, w)| (b.as_slice(), *w)).collect()
            };

            let mut out = build_level(&slices, level, node_order)?;
            drop(slices);
            let pending = std::mem::take(&mut out.pending);
            let mut spills = std::mem::take(&mut out.tail_spills);

            if level > 0 {
                // The previous level's links point at the terminal nodes
                // of the entries just built.
                let entry_terminals = &out.entry_terminals;
                let prev = outputs.last_mut().expect("previous level exists");
                for &(slot, unique) in &assignments {
                    prev.links
                        .set(slot, LinkTarget::Level(entry_terminals[unique]).encode()?)?;
                }
            }

            // Shared remainders recurse while depth allows; at the bound
            // they join this level's own spills.
            let next_input = if !pending.is_empty() && level + 1 < config.num_tries() {
                Some(dedup_pending(&pending))
            } else {
                spills.extend(pending.into_iter().map(|p| TailSpill {
                    suffix: p.suffix,
                    slot: p.slot,
                }));
                None
            };

            let tail = if spills.is_empty() {
                TailStore::empty(tail_mode)
            } else {
                let suffixes: Vec<&[u8]> = spills.iter().map(|s| s.suffix.as_slice()).collect();
                let (tail, links) = TailStore::build(&suffixes, tail_mode, cache)?;
                for (spill, link) in spills.iter().zip(links) {
                    out.links.set(spill.slot, LinkTarget::Tail(link).encode()?)?;
                }
                tail
            };
            outputs.push(out);
            tails.push(tail);

            match next_input {
                Some(next) => {
                    owned = next.entries;
                    assignments = next.assignments;
                    level += 1;
                }
                None => break,
            }
        }

        let num_levels = outputs.len();
        let mut levels = Vec::with_capacity(num_levels);
        let mut level0_terminals = Vec::new();
        for ((index, mut out), tail) in outputs.into_iter().enumerate().zip(tails) {
            out.louds
                .build(cache >= CacheLevel::Small, cache >= CacheLevel::Small, cache)?;
            out.link_flags.build(false, cache >= CacheLevel::Huge, cache)?;
            let terminal_flags = if index == 0 {
                out.terminal_flags.build(false, cache >= CacheLevel::Normal, cache)?;
                level0_terminals = std::mem::take(&mut out.entry_terminals);
                out.terminal_flags
            } else {
                // Identifiers live on level 0 alone; deeper levels carry
                // an empty terminal record.
                BitVec::new()
            };
            levels.push(LoudsLevel {
                louds: out.louds,
                terminal_flags,
                link_flags: out.link_flags,
                labels: out.labels,
                links: out.links,
                tail,
            });
        }

        let num_keys = levels[0].num_keys();
        debug_assert_eq!(num_keys, keyset.num_keys());
        debug!(
            "built trie: {} keys, {} levels, {} nodes",
            num_keys,
            levels.len(),
            levels.iter().map(|l| l.num_nodes()).sum::<usize>()
        );

        Ok((
            Self {
                levels,
                config: config
                    .with_actual_levels(num_levels)
                    .with_tail_mode(tail_mode),
                num_keys,
            },
            level0_terminals,
        ))
    }

    // ------------------------------------------------------------------
    // Edge resolution
    // ------------------------------------------------------------------

    /// Child of `node` on level 0 whose edge starts with `byte`.
    fn child_by_byte(&self, node: u32, byte: u8) -> Option<u32> {
        let lvl = &self.levels[0];
        let begin = lvl.child_begin(node);
        let count = lvl.child_count_from(begin);
        if count == 0 {
            return None;
        }
        let first = lvl.node_at(begin) as usize;
        let labels = &lvl.labels.as_slice()[first - 1..first - 1 + count];
        let index = match self.config.node_order() {
            NodeOrder::Label => labels.binary_search(&byte).ok()?,
            NodeOrder::Weight => labels.iter().position(|&l| l == byte)?,
        };
        Some((first + index) as u32)
    }

    /// Descend one full edge from `node`, consuming query bytes. Multi-byte
    /// edges must match completely.
    fn find_child(&self, node: u32, query: &[u8], pos: &mut usize) -> Option<u32> {
        let child = self.child_by_byte(node, query[*pos])?;
        *pos += 1;
        let lvl = &self.levels[0];
        if lvl.is_link(child) && !self.match_link(0, lvl.link(child), query, pos) {
            return None;
        }
        Some(child)
    }

    /// Compare a link's out-of-line suffix against the query. `level` is
    /// the level that owns the link edge.
    fn match_link(&self, level: usize, target: LinkTarget, query: &[u8], pos: &mut usize) -> bool {
        match target {
            LinkTarget::Tail(t) => {
                let suffix = self.levels[level].tail.suffix(t);
                if query.len() - *pos < suffix.len() || &query[*pos..*pos + suffix.len()] != suffix
                {
                    return false;
                }
                *pos += suffix.len();
                true
            }
            LinkTarget::Level(node) => self.match_up(level + 1, node, query, pos),
        }
    }

    /// Match the string stored at `node` of a deeper level by walking up
    /// to that level's root. The walk yields the bytes in query order.
    fn match_up(&self, level: usize, node: u32, query: &[u8], pos: &mut usize) -> bool {
        let lvl = &self.levels[level];
        let mut v = node;
        while v != 0 {
            if lvl.is_link(v) && !self.match_link(level, lvl.link(v), query, pos) {
                return false;
            }
            if *pos >= query.len() || query[*pos] != lvl.label(v) {
                return false;
            }
            *pos += 1;
            v = lvl.parent(v);
        }
        true
    }

    /// Append a link's out-of-line suffix bytes in consumption order.
    fn link_suffix_into(&self, level: usize, target: LinkTarget, out: &mut Vec<u8>) {
        match target {
            LinkTarget::Tail(t) => out.extend_from_slice(self.levels[level].tail.suffix(t)),
            LinkTarget::Level(node) => self.read_up(level + 1, node, out),
        }
    }

    /// Append the string stored at `node` of a deeper level by walking up.
    fn read_up(&self, level: usize, node: u32, out: &mut Vec<u8>) {
        let lvl = &self.levels[level];
        let mut v = node;
        while v != 0 {
            if lvl.is_link(v) {
                self.link_suffix_into(level, lvl.link(v), out);
            }
            out.push(lvl.label(v));
            v = lvl.parent(v);
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Exact membership. On a match the agent receives the key bytes and
    /// the key's identifier.
    pub fn lookup(&self, agent: &mut Agent) -> Result<bool> {
        self.require_ready()?;
        let mut found = None;
        let matched_len;
        {
            let query = agent.query();
            matched_len = query.len();
            let lvl = &self.levels[0];
            let mut node = 0u32;
            let mut pos = 0usize;
            loop {
                if pos == query.len() {
                    if lvl.is_terminal(node) {
                        found = Some(lvl.key_id(node));
                    }
                    break;
                }
                match self.find_child(node, query, &mut pos) {
                    Some(child) => node = child,
                    None => break,
                }
            }
        }
        match found {
            Some(id) => {
                agent.set_match_from_query(matched_len, id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reconstruct the key with identifier `agent.query_id()`.
    ///
    /// Errors if the identifier is out of range.
    pub fn reverse_lookup(&self, agent: &mut Agent) -> Result<()> {
        self.require_ready()?;
        let id = agent.query_id();
        if id >= self.num_keys {
            return Err(TrieError::out_of_bounds(id, self.num_keys));
        }

        let lvl = &self.levels[0];
        let mut path = Vec::new();
        let mut v = lvl.terminal_node(id);
        while v != 0 {
            path.push(v);
            v = lvl.parent(v);
        }

        let mut key = Vec::new();
        for &node in path.iter().rev() {
            key.push(lvl.label(node));
            if lvl.is_link(node) {
                self.link_suffix_into(0, lvl.link(node), &mut key);
            }
        }
        agent.set_match_bytes(&key, id);
        Ok(())
    }

    /// Enumerate the keys that are prefixes of the query, shortest first.
    /// Each call reports one match and parks the position in the agent;
    /// returns false once exhausted.
    pub fn common_prefix_search(&self, agent: &mut Agent) -> Result<bool> {
        self.require_ready()?;

        let (mut node, mut pos, mut at_start, mut done) = match agent.state.take() {
            Some(state) => match *state {
                TraversalState::CommonPrefix {
                    node,
                    pos,
                    at_start,
                    done,
                } => (node, pos, at_start, done),
                _ => (0, 0, true, false),
            },
            None => (0, 0, true, false),
        };

        let mut matched = None;
        if !done {
            let query = agent.query();
            let lvl = &self.levels[0];
            if at_start {
                at_start = false;
                if lvl.is_terminal(0) {
                    matched = Some((0, lvl.key_id(0)));
                }
            }
            while matched.is_none() {
                if pos == query.len() {
                    done = true;
                    break;
                }
                match self.find_child(node, query, &mut pos) {
                    Some(child) => {
                        node = child;
                        if lvl.is_terminal(child) {
                            matched = Some((pos, lvl.key_id(child)));
                        }
                    }
                    None => {
                        done = true;
                        break;
                    }
                }
            }
        }

        if let Some((len, id)) = matched {
            agent.set_match_from_query(len, id);
        }
        agent.state = Some(Box::new(TraversalState::CommonPrefix {
            node,
            pos,
            at_start,
            done,
        }));
        Ok(matched.is_some())
    }

    /// Enumerate the keys the query is a prefix of, one per call, honouring
    /// the node order: lexicographic under label order, heaviest subtree
    /// first under weight order. Returns false once exhausted.
    pub fn predictive_search(&self, agent: &mut Agent) -> Result<bool> {
        self.require_ready()?;

        let (mut stack, mut key_buf, done) = match agent.state.take() {
            Some(state) => match *state {
                TraversalState::Predictive {
                    stack,
                    key_buf,
                    done,
                } => (stack, key_buf, done),
                _ => self.init_predictive(agent.query()),
            },
            None => self.init_predictive(agent.query()),
        };

        let mut matched = None;
        if !done {
            let lvl = &self.levels[0];
            loop {
                let Some(top) = stack.last_mut() else {
                    break;
                };
                if !top.visited {
                    top.visited = true;
                    if lvl.is_terminal(top.node) {
                        matched = Some(lvl.key_id(top.node));
                        break;
                    }
                }
                if lvl.has_child_at(top.louds_pos) {
                    let child = lvl.node_at(top.louds_pos);
                    top.louds_pos += 1;
                    let base = top.key_len;

                    key_buf.truncate(base);
                    key_buf.push(lvl.label(child));
                    if lvl.is_link(child) {
                        self.link_suffix_into(0, lvl.link(child), &mut key_buf);
                    }
                    stack.push(PredictiveFrame {
                        node: child,
                        louds_pos: lvl.child_begin(child),
                        key_len: key_buf.len(),
                        visited: false,
                    });
                } else {
                    stack.pop();
                }
            }
        }

        if let Some(id) = matched {
            agent.set_match_bytes(&key_buf, id);
        }
        agent.state = Some(Box::new(TraversalState::Predictive {
            stack,
            key_buf,
            done: matched.is_none(),
        }));
        Ok(matched.is_some())
    }

    /// Resolve the query prefix to its subtree, producing the initial
    /// search stack. An empty stack means nothing matches the prefix.
    fn init_predictive(&self, query: &[u8]) -> (Vec<PredictiveFrame>, Vec<u8>, bool) {
        let lvl = &self.levels[0];
        let mut node = 0u32;
        let mut pos = 0usize;
        let mut key_buf = Vec::with_capacity(query.len());

        while pos < query.len() {
            let Some(child) = self.child_by_byte(node, query[pos]) else {
                return (Vec::new(), Vec::new(), true);
            };
            key_buf.push(query[pos]);
            pos += 1;
            if lvl.is_link(child) {
                let mut suffix = Vec::new();
                self.link_suffix_into(0, lvl.link(child), &mut suffix);
                let compare = (query.len() - pos).min(suffix.len());
                if query[pos..pos + compare] != suffix[..compare] {
                    return (Vec::new(), Vec::new(), true);
                }
                key_buf.extend_from_slice(&suffix);
                pos += compare;
            }
            node = child;
        }

        let stack = vec![PredictiveFrame {
            node,
            louds_pos: lvl.child_begin(node),
            key_len: key_buf.len(),
            visited: false,
        }];
        (stack, key_buf, false)
    }

    // ------------------------------------------------------------------
    // I/O
    // ------------------------------------------------------------------

    /// Serialize the trie: the flag word, then every level in order.
    ///
    /// Errors if the trie has not been built or loaded.
    pub fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        self.require_ready()?;
        writer.write_u64(u64::from(self.config.flags()))?;
        for level in &self.levels {
            level.write(writer)?;
        }
        Ok(())
    }

    /// Deserialize a trie into owned storage.
    pub fn read<R: std::io::Read>(reader: &mut Reader<R>) -> Result<Self> {
        let flags = reader.read_u64()?;
        let flags = u32::try_from(flags)
            .map_err(|_| TrieError::invalid_data("oversized flag word"))?;
        let config = Config::parse(flags)?;

        let mut levels = Vec::with_capacity(config.num_tries());
        for _ in 0..config.num_tries() {
            levels.push(LoudsLevel::read(reader, config.tail_mode())?);
        }
        Self::assemble(levels, config)
    }

    /// Deserialize a trie as zero-copy views over a mapped region.
    pub fn map(mapper: &mut Mapper) -> Result<Self> {
        let flags = mapper.read_u64()?;
        let flags = u32::try_from(flags)
            .map_err(|_| TrieError::invalid_data("oversized flag word"))?;
        let config = Config::parse(flags)?;

        let mut levels = Vec::with_capacity(config.num_tries());
        for _ in 0..config.num_tries() {
            levels.push(LoudsLevel::map(mapper, config.tail_mode())?);
        }
        Self::assemble(levels, config)
    }

    fn assemble(levels: Vec<LoudsLevel>, config: Config) -> Result<Self> {
        Self::validate_links(&levels)?;
        let num_keys = levels[0].num_keys();
        debug!(
            "loaded trie: {} keys, {} levels",
            num_keys,
            levels.len()
        );
        Ok(Self {
            levels,
            config,
            num_keys,
        })
    }

    /// Check every decoded link target against the structure it points
    /// into, so corrupt images fail the load instead of a later query.
    fn validate_links(levels: &[LoudsLevel]) -> Result<()> {
        for (index, level) in levels.iter().enumerate() {
            for &raw in level.links.as_slice() {
                match LinkTarget::decode(raw) {
                    LinkTarget::Level(node) => {
                        let next = levels.get(index + 1).ok_or_else(|| {
                            TrieError::invalid_data("link into a missing level")
                        })?;
                        if node as usize >= next.num_nodes() {
                            return Err(TrieError::invalid_data("link target out of range"));
                        }
                    }
                    LinkTarget::Tail(t) => {
                        let in_range = match level.tail.mode() {
                            TailMode::Text => (t as usize) < level.tail.len_bytes(),
                            TailMode::Binary => (t as usize) < level.tail.num_suffixes(),
                        };
                        if !in_range {
                            return Err(TrieError::invalid_data("tail link out of range"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Serialize into a fresh byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.io_size());
        let mut writer = Writer::new(&mut buf);
        self.write(&mut writer)?;
        drop(writer);
        Ok(buf)
    }

    /// Load a trie from an in-memory image without copying the payload
    /// vectors (the image is copied once into aligned storage).
    pub fn map_bytes(bytes: &[u8]) -> Result<Self> {
        Self::map(&mut Mapper::from_bytes(bytes))
    }

    /// Write the serialized trie to a file.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let mut writer = Writer::open(path)?;
        self.write(&mut writer)?;
        writer.flush()
    }

    /// Read a trie from a file into owned storage.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Self::read(&mut Reader::open(path)?)
    }

    /// Memory-map a trie file for zero-copy queries. The mapping stays
    /// alive for as long as the trie does.
    #[cfg(feature = "mmap")]
    pub fn mmap<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Self::map(&mut Mapper::open(path)?)
    }
}
