//! Level-by-level trie construction
//!
//! Each level is built from its input strings by a breadth-first sweep
//! over ranges of the lexicographically sorted inputs. A range is one
//! node's key group; it is split by the byte at the current depth into
//! child groups, each of which becomes one node. A group's edge is the
//! longest common prefix of its strings from the current depth (the whole
//! remaining suffix for a single-string group). Edges longer than one byte
//! keep their first byte in the label array and store the rest out of
//! line, routed by group size: a single-string group's remainder always
//! spills into the current level's tail store, while a multi-string
//! group's shared remainder goes onto the pending list to become a key of
//! the next level (or a tail spill once the recursion bound is reached).
//!
//! Under weight node order, sibling groups are reordered by descending
//! total weight before emission; the sorted input array itself stays
//! lexicographic so groups remain contiguous.

use std::collections::VecDeque;

use crate::config::NodeOrder;
use crate::error::{Result, TrieError};
use crate::succinct::{BitVec, PodVec};

/// A shared multi-byte edge remainder awaiting a next-level target.
#[derive(Debug)]
pub(crate) struct PendingLink {
    /// Suffix bytes after the first edge byte, in the order the owning
    /// level consumes them: forward on level 0 (matched top-down),
    /// reversed on deeper levels (matched while walking up).
    pub suffix: Vec<u8>,
    /// Index into the level's link target vector to patch.
    pub slot: usize,
    /// Total weight of the keys behind the edge.
    pub weight: f32,
}

/// A single-string edge remainder bound for the current level's tail.
#[derive(Debug)]
pub(crate) struct TailSpill {
    /// Suffix bytes after the first edge byte, in consumption order.
    pub suffix: Vec<u8>,
    /// Index into the level's link target vector to patch.
    pub slot: usize,
}

/// Raw parts of one built level, before the bit vectors are frozen.
#[derive(Debug)]
pub(crate) struct LevelOutput {
    pub louds: BitVec,
    pub terminal_flags: BitVec,
    pub link_flags: BitVec,
    pub labels: PodVec<u8>,
    pub links: PodVec<u32>,
    pub pending: Vec<PendingLink>,
    pub tail_spills: Vec<TailSpill>,
    /// Node at which each input string ends, indexed like the input.
    pub entry_terminals: Vec<u32>,
}

struct Range {
    begin: usize,
    end: usize,
    pos: usize,
    node: u32,
}

/// Longest common prefix length of `a` and `b` starting at `from`.
fn lcp_from(a: &[u8], b: &[u8], from: usize) -> usize {
    let limit = a.len().min(b.len()) - from;
    let mut len = 0;
    while len < limit && a[from + len] == b[from + len] {
        len += 1;
    }
    len
}

/// Build one level over `entries`. Level 0 reports duplicate inputs as an
/// error; deeper levels receive pre-deduplicated label strings.
pub(crate) fn build_level(
    entries: &[(&[u8], f32)],
    level_index: usize,
    node_order: NodeOrder,
) -> Result<LevelOutput> {
    let mut order: Vec<u32> = (0..entries.len() as u32).collect();
    order.sort_by(|&a, &b| entries[a as usize].0.cmp(entries[b as usize].0));

    let mut louds = BitVec::new();
    louds.push(true)?;
    louds.push(false)?;

    let mut terminal_flags = BitVec::new();
    let mut link_flags = BitVec::new();
    let mut labels: PodVec<u8> = PodVec::new();
    let mut links: PodVec<u32> = PodVec::new();
    let mut pending = Vec::new();
    let mut tail_spills = Vec::new();
    let mut entry_terminals = vec![0u32; entries.len()];

    terminal_flags.push(false)?;
    link_flags.push(false)?;
    let mut node_count = 1usize;

    let mut queue = VecDeque::new();
    queue.push_back(Range {
        begin: 0,
        end: entries.len(),
        pos: 0,
        node: 0,
    });

    while let Some(range) = queue.pop_front() {
        // Strings exhausted exactly at this node end here.
        let mut i = range.begin;
        while i < range.end && entries[order[i] as usize].0.len() == range.pos {
            entry_terminals[order[i] as usize] = range.node;
            i += 1;
        }
        if i > range.begin {
            terminal_flags.set(range.node as usize, true)?;
            if i - range.begin > 1 {
                debug_assert_eq!(level_index, 0, "deeper levels are deduplicated");
                return Err(TrieError::invalid_data("duplicate keys in the input"));
            }
        }

        // Contiguous child groups by the byte at the current depth.
        let mut groups: Vec<(usize, usize, f32)> = Vec::new();
        let mut j = i;
        while j < range.end {
            let byte = entries[order[j] as usize].0[range.pos];
            let mut weight = entries[order[j] as usize].1;
            let mut k = j + 1;
            while k < range.end && entries[order[k] as usize].0[range.pos] == byte {
                weight += entries[order[k] as usize].1;
                k += 1;
            }
            groups.push((j, k, weight));
            j = k;
        }
        if node_order == NodeOrder::Weight {
            groups.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        }

        for &(gb, ge, weight) in &groups {
            let first = entries[order[gb] as usize].0;
            let edge_len = if ge - gb == 1 {
                first.len() - range.pos
            } else {
                lcp_from(first, entries[order[ge - 1] as usize].0, range.pos)
            };
            debug_assert!(edge_len >= 1);

            if node_count >= u32::MAX as usize {
                return Err(TrieError::capacity("node count overflow"));
            }
            let child = node_count as u32;
            node_count += 1;

            louds.push(true)?;
            labels.push(first[range.pos])?;
            terminal_flags.push(false)?;
            if edge_len == 1 {
                link_flags.push(false)?;
            } else {
                link_flags.push(true)?;
                let slot = links.len();
                links.push(0)?;
                let raw = &first[range.pos + 1..range.pos + edge_len];
                let suffix = if level_index == 0 {
                    raw.to_vec()
                } else {
                    raw.iter().rev().copied().collect()
                };
                if ge - gb == 1 {
                    // A lone string's remainder never recurses; it lives
                    // in this level's tail.
                    tail_spills.push(TailSpill { suffix, slot });
                } else {
                    pending.push(PendingLink {
                        suffix,
                        slot,
                        weight,
                    });
                }
            }

            queue.push_back(Range {
                begin: gb,
                end: ge,
                pos: range.pos + edge_len,
                node: child,
            });
        }
        louds.push(false)?;
    }

    Ok(LevelOutput {
        louds,
        terminal_flags,
        link_flags,
        labels,
        links,
        pending,
        tail_spills,
        entry_terminals,
    })
}

/// Input of the next level: unique label strings plus the mapping from
/// each pending link back to its string.
pub(crate) struct NextLevelInput {
    /// Unique strings with accumulated weights.
    pub entries: Vec<(Vec<u8>, f32)>,
    /// For each pending link: its slot and the unique entry it resolved to.
    pub assignments: Vec<(usize, usize)>,
}

/// Deduplicate pending suffixes into next-level keys.
///
/// The next level stores the reversal of each consumption-order suffix;
/// reading a stored key by walking terminal to root then yields the suffix
/// in consumption order again.
pub(crate) fn dedup_pending(pending: &[PendingLink]) -> NextLevelInput {
    let mut order: Vec<usize> = (0..pending.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = pending[a].suffix.iter().rev();
        let rb = pending[b].suffix.iter().rev();
        ra.cmp(rb)
    });

    let mut entries: Vec<(Vec<u8>, f32)> = Vec::new();
    let mut assignments = vec![(0usize, 0usize); pending.len()];
    let mut previous: Option<&[u8]> = None;

    for &index in &order {
        let link = &pending[index];
        if previous != Some(link.suffix.as_slice()) {
            entries.push((link.suffix.iter().rev().copied().collect(), 0.0));
            previous = Some(link.suffix.as_slice());
        }
        let unique = entries.len() - 1;
        entries[unique].1 += link.weight;
        assignments[index] = (link.slot, unique);
    }

    NextLevelInput {
        entries,
        assignments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries<'a>(keys: &[&'a [u8]]) -> Vec<(&'a [u8], f32)> {
        keys.iter().map(|&k| (k, 1.0)).collect()
    }

    fn bits(bv: &BitVec) -> String {
        (0..bv.len())
            .map(|i| if bv.get(i).unwrap() { '1' } else { '0' })
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let out = build_level(&[], 0, NodeOrder::Label).unwrap();
        // Super-root plus a childless root.
        assert_eq!(bits(&out.louds), "100");
        assert_eq!(out.labels.len(), 0);
        assert!(out.pending.is_empty());
        assert!(!out.terminal_flags.get(0).unwrap());
    }

    #[test]
    fn test_chain_of_prefixes() {
        let keys: Vec<&[u8]> = vec![b"a", b"ab", b"abc"];
        let out = build_level(&entries(&keys), 0, NodeOrder::Label).unwrap();

        // Nodes: root, then a single-byte chain a -> b -> c.
        assert_eq!(bits(&out.louds), "101010100");
        assert_eq!(out.labels.as_slice(), b"abc");
        assert!(out.pending.is_empty());
        assert_eq!(out.entry_terminals, vec![1, 2, 3]);
        for node in 1..=3 {
            assert!(out.terminal_flags.get(node).unwrap());
        }
    }

    #[test]
    fn test_single_key_suffixes_spill_to_tail() {
        let keys: Vec<&[u8]> = vec![b"nesting", b"resting", b"testing"];
        let out = build_level(&entries(&keys), 0, NodeOrder::Label).unwrap();

        // Three link children under the root, no deeper structure.
        assert_eq!(bits(&out.louds), "101110000");
        assert_eq!(out.labels.as_slice(), b"nrt");
        // Lone-string remainders go to this level's tail, never pending.
        assert!(out.pending.is_empty());
        assert_eq!(out.tail_spills.len(), 3);
        for spill in &out.tail_spills {
            assert_eq!(spill.suffix, b"esting");
        }
        // Level 0 keeps suffixes forward.
        assert_eq!(out.entry_terminals, vec![1, 2, 3]);
    }

    #[test]
    fn test_deeper_level_reverses_suffixes() {
        let keys: Vec<&[u8]> = vec![b"gnitse"];
        let out = build_level(&entries(&keys), 1, NodeOrder::Label).unwrap();

        assert!(out.pending.is_empty());
        assert_eq!(out.tail_spills.len(), 1);
        // Edge "gnitse" minus its first byte, reversed for upward matching.
        assert_eq!(out.tail_spills[0].suffix, b"estin");
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let keys: Vec<&[u8]> = vec![b"dup", b"dup"];
        let err = build_level(&entries(&keys), 0, NodeOrder::Label).unwrap_err();
        assert_eq!(err.category(), "data");
    }

    #[test]
    fn test_shared_prefix_split() {
        let keys: Vec<&[u8]> = vec![b"apple", b"apricot"];
        let out = build_level(&entries(&keys), 0, NodeOrder::Label).unwrap();

        // Root -> link node "ap" -> two link children "ple" and "ricot".
        // Only the shared remainder recurses; the lone remainders spill.
        assert_eq!(out.labels.as_slice(), b"apr");
        assert_eq!(out.pending.len(), 1);
        assert_eq!(out.pending[0].suffix, b"p");
        assert_eq!(out.tail_spills.len(), 2);
        assert_eq!(out.tail_spills[0].suffix, b"le");
        assert_eq!(out.tail_spills[1].suffix, b"icot");
    }

    #[test]
    fn test_weight_order_reorders_siblings() {
        let keys: Vec<(&[u8], f32)> = vec![(b"ax", 1.0), (b"by", 10.0)];
        let out = build_level(&keys, 0, NodeOrder::Weight).unwrap();
        // Heavier group first.
        assert_eq!(out.labels[0], b'b');
        assert_eq!(out.labels[1], b'a');

        let label_out = build_level(&keys, 0, NodeOrder::Label).unwrap();
        assert_eq!(label_out.labels[0], b'a');
    }

    #[test]
    fn test_dedup_pending_accumulates_weights() {
        let pending = vec![
            PendingLink {
                suffix: b"esting".to_vec(),
                slot: 0,
                weight: 1.0,
            },
            PendingLink {
                suffix: b"esting".to_vec(),
                slot: 1,
                weight: 2.0,
            },
            PendingLink {
                suffix: b"oo".to_vec(),
                slot: 2,
                weight: 4.0,
            },
        ];
        let next = dedup_pending(&pending);
        assert_eq!(next.entries.len(), 2);

        let esting = next
            .entries
            .iter()
            .find(|(bytes, _)| bytes == b"gnitse")
            .unwrap();
        assert_eq!(esting.1, 3.0);

        let (slot0, u0) = next.assignments[0];
        let (slot1, u1) = next.assignments[1];
        assert_eq!((slot0, slot1), (0, 1));
        assert_eq!(u0, u1);
    }
}
