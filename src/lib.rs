//! # loudtrie: static succinct trie with LOUDS encoding
//!
//! A space-efficient dictionary for byte-string keys. Keys are supplied in
//! bulk, the builder factors shared edge text into recursive levels and a
//! deduplicated tail store, and the result is an immutable structure
//! answering four queries over a succinct LOUDS tree shape:
//!
//! - **lookup**: exact membership, returning a stable integer identifier
//! - **reverse lookup**: identifier back to key bytes
//! - **common prefix search**: every stored key that prefixes a query
//! - **predictive search**: every stored key a query prefixes
//!
//! The serialized image is a portable little-endian binary that can be
//! reloaded into owned memory or memory-mapped for zero-copy reads.
//!
//! ## Quick Start
//!
//! ```rust
//! use loudtrie::{Agent, Keyset, LoudsTrie};
//!
//! let mut keyset = Keyset::new();
//! keyset.push(b"apple")?;
//! keyset.push(b"apricot")?;
//! keyset.push(b"banana")?;
//!
//! let mut trie = LoudsTrie::new();
//! trie.build(&mut keyset, 0)?;
//!
//! let mut agent = Agent::new();
//! agent.set_query(b"apricot");
//! assert!(trie.lookup(&mut agent)?);
//! let id = agent.key_id();
//!
//! agent.set_query_id(id);
//! trie.reverse_lookup(&mut agent)?;
//! assert_eq!(agent.key(), b"apricot");
//!
//! agent.set_query(b"ap");
//! while trie.predictive_search(&mut agent)? {
//!     println!("completion: {:?}", agent.key());
//! }
//! # Ok::<(), loudtrie::TrieError>(())
//! ```
//!
//! ## Concurrency
//!
//! A built trie is immutable; any number of threads may query it at once
//! as long as each uses its own [`Agent`]. Build, load and clear need
//! exclusive access.

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

mod agent;
mod config;
mod keyset;
mod trie;

pub mod error;
pub mod io;
pub mod succinct;

pub use agent::Agent;
pub use config::{
    CacheLevel, Config, ConfigBuilder, NodeOrder, TailMode, DEFAULT_NUM_TRIES, NUM_TRIES_MASK,
};
pub use error::{Result, TrieError};
pub use keyset::{Key, Keyset, MAX_KEY_LEN};
pub use trie::LoudsTrie;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
