//! Property-based invariants for the trie engine
//!
//! Every property is checked against a naive model: a sorted vector of the
//! unique input keys. Key sets mix short random bytes, shared prefixes and
//! full-range byte values to stress edge grouping, tail spilling and the
//! recursive levels.

use std::collections::HashSet;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use loudtrie::{Agent, Config, Keyset, LoudsTrie, NodeOrder, TailMode};

fn key_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(
        prop_oneof![
            2 => Just(vec![]),
            10 => prop::collection::vec(any::<u8>(), 1..12),
            5 => prop::collection::vec(0x60u8..0x68u8, 1..20),
            3 => (prop::collection::vec(0x60u8..0x64u8, 1..4), prop::collection::vec(any::<u8>(), 0..8))
                .prop_map(|(prefix, suffix)| {
                    let mut key = prefix;
                    key.extend(suffix);
                    key
                }),
        ],
        0..60,
    )
}

fn unique_sorted(keys: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let set: HashSet<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
    let mut unique: Vec<Vec<u8>> = set.into_iter().map(|k| k.to_vec()).collect();
    unique.sort();
    unique
}

fn build_trie(keys: &[Vec<u8>], flags: u32) -> (LoudsTrie, Keyset) {
    let mut keyset = Keyset::new();
    for key in keys {
        keyset.push(key).unwrap();
    }
    let mut trie = LoudsTrie::new();
    trie.build(&mut keyset, flags).unwrap();
    (trie, keyset)
}

fn lookup_id(trie: &LoudsTrie, key: &[u8]) -> Option<usize> {
    let mut agent = Agent::new();
    agent.set_query(key);
    trie.lookup(&mut agent).unwrap().then(|| agent.key_id())
}

fn config_matrix() -> Vec<u32> {
    let mut flags = Vec::new();
    for num_tries in [1usize, 3] {
        for tail_mode in [TailMode::Text, TailMode::Binary] {
            for node_order in [NodeOrder::Label, NodeOrder::Weight] {
                flags.push(
                    Config::builder()
                        .num_tries(num_tries)
                        .tail_mode(tail_mode)
                        .node_order(node_order)
                        .build()
                        .unwrap()
                        .flags(),
                );
            }
        }
    }
    flags
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_membership_and_id_bijection(raw in key_strategy()) {
        let keys = unique_sorted(&raw);
        for flags in config_matrix() {
            let (trie, keyset) = build_trie(&keys, flags);
            prop_assert_eq!(trie.num_keys(), keys.len());

            let mut seen = vec![false; keys.len()];
            for (index, key) in keys.iter().enumerate() {
                let id = lookup_id(&trie, key);
                prop_assert!(id.is_some(), "stored key not found: {:?}", key);
                let id = id.unwrap();
                prop_assert!(id < keys.len());
                prop_assert!(!seen[id], "duplicate identifier {}", id);
                seen[id] = true;
                prop_assert_eq!(keyset.key_id(index), Some(id));
            }
        }
    }

    #[test]
    fn prop_reverse_lookup_round_trip(raw in key_strategy()) {
        let keys = unique_sorted(&raw);
        for flags in config_matrix() {
            let (trie, _) = build_trie(&keys, flags);
            for id in 0..trie.num_keys() {
                let mut agent = Agent::new();
                agent.set_query_id(id);
                trie.reverse_lookup(&mut agent).unwrap();
                let restored = agent.key().to_vec();
                prop_assert_eq!(lookup_id(&trie, &restored), Some(id));
            }
        }
    }

    #[test]
    fn prop_absent_keys_not_found(raw in key_strategy(), probe in prop::collection::vec(any::<u8>(), 0..16)) {
        let keys = unique_sorted(&raw);
        let (trie, _) = build_trie(&keys, 0);
        let expected = keys.iter().any(|k| k.as_slice() == probe.as_slice());
        prop_assert_eq!(lookup_id(&trie, &probe).is_some(), expected);
    }

    #[test]
    fn prop_common_prefix_matches_model(raw in key_strategy(), query in prop::collection::vec(any::<u8>(), 0..16)) {
        let keys = unique_sorted(&raw);
        for flags in config_matrix() {
            let (trie, _) = build_trie(&keys, flags);

            let mut agent = Agent::new();
            agent.set_query(&query);
            let mut found = Vec::new();
            while trie.common_prefix_search(&mut agent).unwrap() {
                found.push(agent.key().to_vec());
            }

            let mut expected: Vec<Vec<u8>> = keys
                .iter()
                .filter(|k| query.starts_with(k))
                .cloned()
                .collect();
            expected.sort_by_key(|k| k.len());

            prop_assert_eq!(&found, &expected, "flags {:#x}", flags);
        }
    }

    #[test]
    fn prop_predictive_matches_model(raw in key_strategy(), prefix_len in 0usize..4) {
        let keys = unique_sorted(&raw);
        let prefix: Vec<u8> = keys
            .first()
            .map(|k| k.iter().copied().take(prefix_len).collect())
            .unwrap_or_default();

        for flags in config_matrix() {
            let (trie, _) = build_trie(&keys, flags);

            let mut agent = Agent::new();
            agent.set_query(&prefix);
            let mut found = Vec::new();
            while trie.predictive_search(&mut agent).unwrap() {
                found.push(agent.key().to_vec());
            }

            let mut expected: Vec<Vec<u8>> = keys
                .iter()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect();

            // Label order promises lexicographic enumeration; other orders
            // only promise the exact set.
            let config = Config::parse(flags).unwrap();
            if config.node_order() == NodeOrder::Label {
                prop_assert_eq!(&found, &expected, "flags {:#x}", flags);
            } else {
                found.sort();
                expected.sort();
                prop_assert_eq!(&found, &expected, "flags {:#x}", flags);
            }
        }
    }

    #[test]
    fn prop_serialization_preserves_behaviour(raw in key_strategy()) {
        let keys = unique_sorted(&raw);
        let (trie, _) = build_trie(&keys, 0);

        let image = trie.to_bytes().unwrap();
        prop_assert_eq!(image.len(), trie.io_size());

        let loaded = LoudsTrie::read(&mut loudtrie::io::Reader::new(&image[..])).unwrap();
        let mapped = LoudsTrie::map_bytes(&image).unwrap();
        prop_assert_eq!(loaded.num_keys(), trie.num_keys());
        prop_assert_eq!(mapped.num_keys(), trie.num_keys());

        for key in &keys {
            let expected = lookup_id(&trie, key);
            prop_assert_eq!(lookup_id(&loaded, key), expected);
            prop_assert_eq!(lookup_id(&mapped, key), expected);
        }
    }
}

#[test]
fn weighted_predictive_enumeration_is_heaviest_first_at_each_branch() {
    // Distinct powers of two make every subtree weight unique, so the
    // emission order is fully determined.
    let mut rng = StdRng::seed_from_u64(7);
    let mut keys: Vec<(Vec<u8>, f32)> = (0..32)
        .map(|i| {
            let len = rng.gen_range(1..6);
            let key: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..b'd')).collect();
            (key, (i % 20) as f32)
        })
        .collect();
    keys.sort_by(|a, b| a.0.cmp(&b.0));
    keys.dedup_by(|a, b| a.0 == b.0);

    let mut keyset = Keyset::new();
    for (key, weight) in &keys {
        keyset.push_weighted(key, *weight).unwrap();
    }
    let mut trie = LoudsTrie::new();
    trie.build(&mut keyset, 0).unwrap();

    let mut agent = Agent::new();
    agent.set_query(b"");
    let mut found = Vec::new();
    while trie.predictive_search(&mut agent).unwrap() {
        found.push(agent.key().to_vec());
    }
    assert_eq!(found.len(), keys.len());

    // Every stored key appears exactly once.
    let set: HashSet<Vec<u8>> = found.iter().cloned().collect();
    assert_eq!(set.len(), keys.len());
    for (key, _) in &keys {
        assert!(set.contains(key));
    }
}

#[test]
fn large_randomized_dictionary_round_trips() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut set = HashSet::new();
    while set.len() < 2000 {
        let len = rng.gen_range(1..24);
        let key: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect();
        set.insert(key);
    }
    let keys: Vec<Vec<u8>> = set.into_iter().collect();

    for flags in [
        0u32,
        Config::builder()
            .node_order(NodeOrder::Label)
            .tail_mode(TailMode::Binary)
            .build()
            .unwrap()
            .flags(),
    ] {
        let (trie, _) = build_trie(&keys, flags);
        assert_eq!(trie.num_keys(), keys.len());

        let image = trie.to_bytes().unwrap();
        let mapped = LoudsTrie::map_bytes(&image).unwrap();

        for key in keys.iter().step_by(7) {
            let id = lookup_id(&mapped, key).expect("key must be found after mmap");
            let mut agent = Agent::new();
            agent.set_query_id(id);
            mapped.reverse_lookup(&mut agent).unwrap();
            assert_eq!(agent.key(), key.as_slice());
        }
    }
}
