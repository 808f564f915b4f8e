//! Succinct data structure primitives
//!
//! The two building blocks every trie level is assembled from: a plain-data
//! vector with owned and memory-mapped lifecycles, and a frozen bit vector
//! with constant-time rank and sampled select.

mod bit_vec;
mod pod_vec;

pub use bit_vec::BitVec;
pub use pod_vec::{Pod, PodVec};
