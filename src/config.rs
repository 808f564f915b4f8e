//! Build configuration flags
//!
//! Options are packed into one 32-bit word with four disjoint fields so a
//! single integer describes a build and can be stored in the serialized
//! image. [`Config::parse`] rejects unknown bits and out-of-range fields
//! and substitutes defaults for unset ones; the parsed value is immutable.
//!
//! Field layout: bits 0..7 hold `num_tries`, bits 7..10 the cache level,
//! bits 10..12 the tail mode and bits 12..14 the node order.

use crate::error::{Result, TrieError};

/// Mask of the `num_tries` field (1 to 127 levels, 0 selects the default).
pub const NUM_TRIES_MASK: u32 = 0x7F;

const CACHE_SHIFT: u32 = 7;
const CACHE_MASK: u32 = 0x7 << CACHE_SHIFT;
const TAIL_SHIFT: u32 = 10;
const TAIL_MASK: u32 = 0x3 << TAIL_SHIFT;
const ORDER_SHIFT: u32 = 12;
const ORDER_MASK: u32 = 0x3 << ORDER_SHIFT;
const CONFIG_MASK: u32 = NUM_TRIES_MASK | CACHE_MASK | TAIL_MASK | ORDER_MASK;

/// Default recursion depth across trie levels.
pub const DEFAULT_NUM_TRIES: usize = 3;

/// How aggressively rank/select sample tables are built.
///
/// Higher levels sample select positions on more of the per-level bit
/// vectors, trading space for faster traversal. [`CacheLevel::Tiny`]
/// builds no samples at all; select then binary searches the rank index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheLevel {
    /// No select samples.
    Tiny = 1,
    /// Samples on the LOUDS sequence only.
    Small = 2,
    /// Samples on the LOUDS sequence and terminal flags.
    Normal = 3,
    /// Additionally samples binary-tail boundary flags.
    Large = 4,
    /// Samples every select-capable vector.
    Huge = 5,
}

impl CacheLevel {
    fn from_field(value: u32) -> Result<Self> {
        match value {
            0 | 3 => Ok(Self::Normal),
            1 => Ok(Self::Tiny),
            2 => Ok(Self::Small),
            4 => Ok(Self::Large),
            5 => Ok(Self::Huge),
            _ => Err(TrieError::configuration(format!(
                "undefined cache level {}",
                value
            ))),
        }
    }
}

/// Layout of the out-of-line suffix store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailMode {
    /// Zero-terminated suffixes addressed by byte offset. Suffix sharing
    /// through common endings.
    Text = 1,
    /// Packed suffixes with a boundary bit vector, addressed by index.
    /// Required when suffixes may contain NUL bytes.
    Binary = 2,
}

impl TailMode {
    fn from_field(value: u32) -> Result<Self> {
        match value {
            0 | 1 => Ok(Self::Text),
            2 => Ok(Self::Binary),
            _ => Err(TrieError::configuration(format!(
                "undefined tail mode {}",
                value
            ))),
        }
    }
}

/// Order in which sibling nodes are laid out and visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrder {
    /// Descending total key weight. Child lookup scans linearly but
    /// predictive search visits heavy subtrees first.
    Weight = 1,
    /// Ascending label byte. Child lookup binary searches.
    Label = 2,
}

impl NodeOrder {
    fn from_field(value: u32) -> Result<Self> {
        match value {
            0 | 1 => Ok(Self::Weight),
            2 => Ok(Self::Label),
            _ => Err(TrieError::configuration(format!(
                "undefined node order {}",
                value
            ))),
        }
    }
}

/// Parsed, immutable build configuration.
///
/// # Examples
///
/// ```rust
/// use loudtrie::{Config, NodeOrder, TailMode};
///
/// let config = Config::builder()
///     .num_tries(2)
///     .tail_mode(TailMode::Binary)
///     .node_order(NodeOrder::Label)
///     .build()?;
/// assert_eq!(config.num_tries(), 2);
/// # Ok::<(), loudtrie::TrieError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    flags: u32,
}

impl Config {
    /// Parse a packed flag word, validating every field and substituting
    /// defaults for unset ones.
    pub fn parse(config_flags: u32) -> Result<Self> {
        if config_flags & !CONFIG_MASK != 0 {
            return Err(TrieError::configuration(format!(
                "unknown config bits {:#x}",
                config_flags & !CONFIG_MASK
            )));
        }

        let mut num_tries = (config_flags & NUM_TRIES_MASK) as usize;
        if num_tries == 0 {
            num_tries = DEFAULT_NUM_TRIES;
        }
        let cache_level = CacheLevel::from_field((config_flags & CACHE_MASK) >> CACHE_SHIFT)?;
        let tail_mode = TailMode::from_field((config_flags & TAIL_MASK) >> TAIL_SHIFT)?;
        let node_order = NodeOrder::from_field((config_flags & ORDER_MASK) >> ORDER_SHIFT)?;

        Ok(Self {
            flags: num_tries as u32
                | (cache_level as u32) << CACHE_SHIFT
                | (tail_mode as u32) << TAIL_SHIFT
                | (node_order as u32) << ORDER_SHIFT,
        })
    }

    /// Start a fluent builder with default fields.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// The packed flag word with every field resolved.
    #[inline]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Maximum number of trie levels built.
    #[inline]
    pub fn num_tries(&self) -> usize {
        (self.flags & NUM_TRIES_MASK) as usize
    }

    /// Select-sampling aggressiveness.
    #[inline]
    pub fn cache_level(&self) -> CacheLevel {
        // Fields were validated in `parse`.
        CacheLevel::from_field((self.flags & CACHE_MASK) >> CACHE_SHIFT).unwrap()
    }

    /// Tail store layout.
    #[inline]
    pub fn tail_mode(&self) -> TailMode {
        TailMode::from_field((self.flags & TAIL_MASK) >> TAIL_SHIFT).unwrap()
    }

    /// Sibling layout order.
    #[inline]
    pub fn node_order(&self) -> NodeOrder {
        NodeOrder::from_field((self.flags & ORDER_MASK) >> ORDER_SHIFT).unwrap()
    }

    /// Copy with the `num_tries` field replaced by the number of levels
    /// actually built, for the serialized header word.
    pub(crate) fn with_actual_levels(&self, levels: usize) -> Self {
        debug_assert!(levels >= 1 && levels <= NUM_TRIES_MASK as usize);
        Self {
            flags: (self.flags & !NUM_TRIES_MASK) | levels as u32,
        }
    }

    /// Copy with the tail mode replaced, for a forced binary demotion.
    pub(crate) fn with_tail_mode(&self, mode: TailMode) -> Self {
        Self {
            flags: (self.flags & !TAIL_MASK) | (mode as u32) << TAIL_SHIFT,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse(0).unwrap()
    }
}

/// Fluent builder packing fields into a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    flags: u32,
}

impl ConfigBuilder {
    /// Start with every field unset (defaults apply on `build`).
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    /// Maximum recursion depth, 1 to 127.
    pub fn num_tries(mut self, n: usize) -> Self {
        self.flags = (self.flags & !NUM_TRIES_MASK) | (n as u32 & NUM_TRIES_MASK);
        self
    }

    /// Select-sampling aggressiveness.
    pub fn cache_level(mut self, level: CacheLevel) -> Self {
        self.flags = (self.flags & !CACHE_MASK) | (level as u32) << CACHE_SHIFT;
        self
    }

    /// Tail store layout.
    pub fn tail_mode(mut self, mode: TailMode) -> Self {
        self.flags = (self.flags & !TAIL_MASK) | (mode as u32) << TAIL_SHIFT;
        self
    }

    /// Sibling layout order.
    pub fn node_order(mut self, order: NodeOrder) -> Self {
        self.flags = (self.flags & !ORDER_MASK) | (order as u32) << ORDER_SHIFT;
        self
    }

    /// Validate and produce the immutable configuration.
    pub fn build(self) -> Result<Config> {
        Config::parse(self.flags)
    }
}
