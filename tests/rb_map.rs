use std::collections::{BTreeMap, BTreeSet};

use blob_tree::{BoundedAllocator, Error, Global, Lexicographic, RBTreeMap};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// The number of operations to perform in each proptest case.
const TEST_SIZE: usize = 2_000;

type Key = [u8; 2];
type Value = [u8; 4];

/// Keys from a range smaller than `TEST_SIZE`, so inserts collide and removes hit.
fn key_strategy() -> impl Strategy<Value = Key> {
    (0u16..1_500).prop_map(u16::to_be_bytes)
}

fn value_strategy() -> impl Strategy<Value = Value> {
    any::<Value>()
}

fn new_map() -> RBTreeMap<Lexicographic> {
    RBTreeMap::new(2, 4, Lexicographic).unwrap()
}

fn entries<C, A: blob_tree::Allocator>(map: &RBTreeMap<C, A>) -> Vec<(Vec<u8>, Vec<u8>)> {
    map.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect()
}

fn model_entries(model: &BTreeMap<Key, Value>) -> Vec<(Vec<u8>, Vec<u8>)> {
    model.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect()
}

/// `height <= 2 * log2(n + 1)`, compared without floating point.
fn assert_balanced<C, A: blob_tree::Allocator>(map: &RBTreeMap<C, A>) {
    let n = map.len() as u64 + 1;
    let bound = (n * n).ilog2() as usize;
    assert!(map.height() <= bound, "height {} exceeds {bound} for {} entries", map.height(), map.len());
}

// ─── Operations enum for driving randomized tests ────────────────────────────

#[derive(Debug, Clone)]
enum MapOp {
    Insert(Key, Value),
    Remove(Key),
    RemoveInto(Key),
    Get(Key),
    GetMut(Key, Value),
    ContainsKey(Key),
    GetKeyValue(Key),
    FirstKeyValue,
    LastKeyValue,
}

fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        6 => (key_strategy(), value_strategy()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        2 => key_strategy().prop_map(MapOp::Remove),
        1 => key_strategy().prop_map(MapOp::RemoveInto),
        2 => key_strategy().prop_map(MapOp::Get),
        1 => (key_strategy(), value_strategy()).prop_map(|(k, v)| MapOp::GetMut(k, v)),
        1 => key_strategy().prop_map(MapOp::ContainsKey),
        1 => key_strategy().prop_map(MapOp::GetKeyValue),
        1 => Just(MapOp::FirstKeyValue),
        1 => Just(MapOp::LastKeyValue),
    ]
}

// ─── Core CRUD operations ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Replays a random sequence of operations on both RBTreeMap and BTreeMap
    /// and asserts identical results at every step.
    #[test]
    fn map_ops_match_btreemap(ops in proptest::collection::vec(map_op_strategy(), TEST_SIZE)) {
        let mut rb_map = new_map();
        let mut bt_map: BTreeMap<Key, Value> = BTreeMap::new();

        for op in &ops {
            match op {
                MapOp::Insert(k, v) => {
                    let rb_result = rb_map.insert(k, v);
                    if bt_map.contains_key(k) {
                        prop_assert_eq!(rb_result, Err(Error::KeyExists), "insert({:?})", k);
                    } else {
                        bt_map.insert(*k, *v);
                        prop_assert_eq!(rb_result, Ok(()), "insert({:?})", k);
                    }
                }
                MapOp::Remove(k) => {
                    let rb_result = rb_map.remove(k);
                    let bt_result = bt_map.remove(k).map(|_| ()).ok_or(Error::KeyNotFound);
                    prop_assert_eq!(rb_result, bt_result, "remove({:?})", k);
                }
                MapOp::RemoveInto(k) => {
                    let mut out = [0; 4];
                    let rb_result = rb_map.remove_into(k, &mut out).map(|()| out);
                    let bt_result = bt_map.remove(k).ok_or(Error::KeyNotFound);
                    prop_assert_eq!(rb_result, bt_result, "remove_into({:?})", k);
                }
                MapOp::Get(k) => {
                    let rb_result = rb_map.get(k);
                    let bt_result = bt_map.get(k).map(|v| &v[..]).ok_or(Error::KeyNotFound);
                    prop_assert_eq!(rb_result, bt_result, "get({:?})", k);
                }
                MapOp::GetMut(k, v) => {
                    match (rb_map.get_mut(k), bt_map.get_mut(k)) {
                        (Ok(rb_value), Some(bt_value)) => {
                            rb_value.copy_from_slice(v);
                            *bt_value = *v;
                        }
                        (Err(Error::KeyNotFound), None) => {}
                        (rb_result, bt_result) => {
                            prop_assert!(false, "get_mut({:?}): {:?} vs {:?}", k, rb_result, bt_result);
                        }
                    }
                }
                MapOp::ContainsKey(k) => {
                    prop_assert_eq!(rb_map.contains_key(k), bt_map.contains_key(k), "contains_key({:?})", k);
                }
                MapOp::GetKeyValue(k) => {
                    let rb_result = rb_map.get_key_value(k);
                    let bt_result = bt_map.get_key_value(k).map(|(k, v)| (&k[..], &v[..])).ok_or(Error::KeyNotFound);
                    prop_assert_eq!(rb_result, bt_result, "get_key_value({:?})", k);
                }
                MapOp::FirstKeyValue => {
                    let bt_result = bt_map.first_key_value().map(|(k, v)| (&k[..], &v[..]));
                    prop_assert_eq!(rb_map.first_key_value(), bt_result, "first_key_value");
                }
                MapOp::LastKeyValue => {
                    let bt_result = bt_map.last_key_value().map(|(k, v)| (&k[..], &v[..]));
                    prop_assert_eq!(rb_map.last_key_value(), bt_result, "last_key_value");
                }
            }
            prop_assert_eq!(rb_map.len(), bt_map.len(), "len mismatch after {:?}", op);
            prop_assert_eq!(rb_map.is_empty(), bt_map.is_empty(), "is_empty mismatch after {:?}", op);
        }

        prop_assert_eq!(entries(&rb_map), model_entries(&bt_map));
        assert_balanced(&rb_map);
    }

    /// Tests that iteration order matches BTreeMap after random insertions.
    #[test]
    fn iter_matches_btreemap(input in proptest::collection::vec((key_strategy(), value_strategy()), TEST_SIZE)) {
        let mut rb_map = new_map();
        let mut bt_map: BTreeMap<Key, Value> = BTreeMap::new();

        for (k, v) in &input {
            if rb_map.insert(k, v).is_ok() {
                bt_map.insert(*k, *v);
            }
        }

        // Forward iteration
        prop_assert_eq!(entries(&rb_map), model_entries(&bt_map), "iter() mismatch");

        // Reverse iteration
        let rb_rev: Vec<_> = rb_map.iter().rev().map(|(k, _)| k.to_vec()).collect();
        let bt_rev: Vec<_> = bt_map.keys().rev().map(|k| k.to_vec()).collect();
        prop_assert_eq!(&rb_rev, &bt_rev, "iter().rev() mismatch");

        // Keys and values
        let rb_keys: Vec<_> = rb_map.keys().map(<[u8]>::to_vec).collect();
        let bt_keys: Vec<_> = bt_map.keys().map(|k| k.to_vec()).collect();
        prop_assert_eq!(&rb_keys, &bt_keys, "keys() mismatch");
        let rb_values: Vec<_> = rb_map.values().map(<[u8]>::to_vec).collect();
        let bt_values: Vec<_> = bt_map.values().map(|v| v.to_vec()).collect();
        prop_assert_eq!(&rb_values, &bt_values, "values() mismatch");

        // Exact size, also when consumed from both ends.
        let mut iter = rb_map.iter();
        prop_assert_eq!(iter.len(), bt_map.len());
        let mut taken = 0;
        while iter.next().is_some() {
            taken += 1;
            if iter.next_back().is_some() {
                taken += 1;
            }
        }
        prop_assert_eq!(taken, bt_map.len());
        prop_assert_eq!(iter.next(), None);
    }

    /// Balance holds after unique inserts in any order and after interleaved removals.
    #[test]
    fn height_stays_logarithmic(mut keys in proptest::collection::btree_set(any::<u16>(), 1..3_000).prop_map(|s| s.into_iter().collect::<Vec<_>>()).prop_shuffle()) {
        let mut rb_map = new_map();
        for k in &keys {
            rb_map.insert(&k.to_be_bytes(), b"vvvv").unwrap();
        }
        prop_assert_eq!(rb_map.len(), keys.len());
        assert_balanced(&rb_map);

        let removed = keys.split_off(keys.len() / 2);
        for k in &removed {
            rb_map.remove(&k.to_be_bytes()).unwrap();
            prop_assert!(!rb_map.contains_key(&k.to_be_bytes()));
        }
        prop_assert_eq!(rb_map.len(), keys.len());
        assert_balanced(&rb_map);
        for k in &keys {
            prop_assert_eq!(rb_map.get(&k.to_be_bytes()), Ok(&b"vvvv"[..]));
        }
    }

    /// try_clone produces an equal map that is independent of the original.
    #[test]
    fn try_clone_produces_equal_map(input in proptest::collection::vec((key_strategy(), value_strategy()), TEST_SIZE / 4)) {
        let mut rb_map = new_map();
        for (k, v) in &input {
            let _ = rb_map.insert(k, v);
        }
        let mut cloned = rb_map.try_clone().unwrap();
        prop_assert_eq!(&cloned, &rb_map);

        cloned.clear();
        prop_assert!(cloned.is_empty());
        let unique: BTreeSet<Key> = input.iter().map(|(k, _)| *k).collect();
        prop_assert_eq!(rb_map.len(), unique.len());
    }
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn iterates_in_ascending_order() {
    let mut map = RBTreeMap::new(4, 4, |a: &[u8], b: &[u8]| {
        i32::from_le_bytes(a.try_into().unwrap()).cmp(&i32::from_le_bytes(b.try_into().unwrap()))
    })
    .unwrap();
    for k in [10i32, 20, 5, 1, 15] {
        map.insert(&k.to_le_bytes(), &(k * 100).to_le_bytes()).unwrap();
    }

    let keys: Vec<i32> = map.keys().map(|k| i32::from_le_bytes(k.try_into().unwrap())).collect();
    assert_eq!(keys, [1, 5, 10, 15, 20]);
    let values: Vec<i32> = map.values().map(|v| i32::from_le_bytes(v.try_into().unwrap())).collect();
    assert_eq!(values, [100, 500, 1000, 1500, 2000]);
}

#[test]
fn removing_the_only_entry_empties_the_map() {
    let mut map = new_map();
    map.insert(b"k1", b"v001").unwrap();
    map.remove(b"k1").unwrap();
    assert_eq!(map.len(), 0);
    assert_eq!(map.get(b"k1"), Err(Error::KeyNotFound));
    assert_eq!(map.first_key_value(), None);
    assert_eq!(map.height(), 0);
}

#[test]
fn duplicate_insert_keeps_the_original() {
    let mut map = new_map();
    map.insert(b"k1", b"orig").unwrap();
    assert_eq!(map.insert(b"k1", b"next"), Err(Error::KeyExists));
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(b"k1"), Ok(&b"orig"[..]));
}

#[test]
fn zero_sizes_are_rejected_without_allocating() {
    let alloc = BoundedAllocator::unbounded();
    assert!(matches!(RBTreeMap::new_in(0, 8, Lexicographic, &alloc), Err(Error::InvalidArgument(_))));
    assert!(matches!(RBTreeMap::new_in(8, 0, Lexicographic, &alloc), Err(Error::InvalidArgument(_))));
    assert!(matches!(
        RBTreeMap::with_capacity_in(0, 8, 16, Lexicographic, &alloc),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(alloc.total_allocations(), 0);
}

#[test]
fn wrong_buffer_sizes_are_rejected() {
    let mut map = new_map();
    assert_eq!(map.insert(b"k", b"vvvv"), Err(Error::KeySize { expected: 2, got: 1 }));
    assert_eq!(map.insert(b"k1", b"v"), Err(Error::ValueSize { expected: 4, got: 1 }));
    map.insert(b"k1", b"vvvv").unwrap();

    assert_eq!(map.get(b"k1x"), Err(Error::KeySize { expected: 2, got: 3 }));
    assert!(!map.contains_key(b"k1x"));
    assert_eq!(map.get_into(b"k1", &mut [0; 3]), Err(Error::ValueSize { expected: 4, got: 3 }));
    assert_eq!(map.remove_into(b"k1", &mut [0; 5]), Err(Error::ValueSize { expected: 4, got: 5 }));
    assert_eq!(map.len(), 1);

    let mut out = [0; 4];
    map.get_into(b"k1", &mut out).unwrap();
    assert_eq!(&out, b"vvvv");
}

#[test]
fn failed_insert_leaves_memory_and_len_unchanged() {
    let alloc = BoundedAllocator::unbounded();
    let mut map = RBTreeMap::with_capacity_in(8, 256, 8, Lexicographic, &alloc).unwrap();
    map.insert(&[1; 8], &[1; 256]).unwrap();

    // Room for the key block, not for the value block.
    let in_use = alloc.bytes_in_use();
    alloc.set_limit(in_use + 16);
    assert!(!map.can_perform_operation(0));
    assert_eq!(map.insert(&[2; 8], &[2; 256]), Err(Error::NoMemory));
    assert_eq!(alloc.bytes_in_use(), in_use);
    assert_eq!(map.len(), 1);
    assert!(!map.contains_key(&[2; 8]));

    alloc.set_limit(usize::MAX);
    assert!(map.can_perform_operation(0));
    map.insert(&[2; 8], &[2; 256]).unwrap();
    assert_eq!(map.len(), 2);
}

#[test]
fn full_slot_table_counts_toward_the_preflight_check() {
    let alloc = BoundedAllocator::unbounded();
    let mut map = RBTreeMap::new_in(16, 16, Lexicographic, &alloc).unwrap();
    let mut k = 0u8;
    while map.is_empty() || map.len() < map.capacity() {
        map.insert(&[k; 16], &[k; 16]).unwrap();
        k += 1;
    }

    // Room for both blocks, not for the larger slot table.
    let (in_use, live, len) = (alloc.bytes_in_use(), alloc.live_allocations(), map.len());
    alloc.set_limit(in_use + 16 + 16);
    assert!(!map.can_perform_operation(0));
    assert_eq!(map.insert(&[k; 16], &[k; 16]), Err(Error::NoMemory));
    assert_eq!(alloc.bytes_in_use(), in_use);
    assert_eq!(alloc.live_allocations(), live);
    assert_eq!(map.len(), len);
    assert_eq!(map.capacity(), len);

    // The smallest budget the check accepts is enough for the insert.
    let mut limit = in_use;
    while !map.can_perform_operation(0) {
        limit += 8;
        alloc.set_limit(limit);
    }
    map.insert(&[k; 16], &[k; 16]).unwrap();
    assert_eq!(map.len(), len + 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whenever the pre-flight check says yes, the next insert succeeds.
    #[test]
    fn preflight_yes_means_insert_succeeds(fill in 0u16..40, slack in 0usize..1_024) {
        let alloc = BoundedAllocator::unbounded();
        let mut map = RBTreeMap::new_in(2, 8, Lexicographic, &alloc).unwrap();
        for i in 0..fill {
            map.insert(&i.to_be_bytes(), &[0; 8]).unwrap();
        }

        alloc.set_limit(alloc.bytes_in_use() + slack);
        if map.can_perform_operation(0) {
            prop_assert_eq!(map.insert(&fill.to_be_bytes(), &[1; 8]), Ok(()));
        } else {
            prop_assert_eq!(map.len(), usize::from(fill));
        }
    }
}

#[test]
fn dropping_the_map_frees_everything() {
    let alloc = BoundedAllocator::unbounded();
    {
        let mut map = RBTreeMap::new_in(4, 16, Lexicographic, &alloc).unwrap();
        for i in 0u32..500 {
            map.insert(&i.to_be_bytes(), &[0; 16]).unwrap();
        }
        for i in (0u32..500).step_by(3) {
            map.remove(&i.to_be_bytes()).unwrap();
        }
        assert!(alloc.live_allocations() > 0);
    }
    assert_eq!(alloc.bytes_in_use(), 0);
    assert_eq!(alloc.live_allocations(), 0);
}

#[test]
fn clear_keeps_configuration() {
    let alloc = BoundedAllocator::unbounded();
    let mut map = RBTreeMap::new_in(2, 4, Lexicographic, &alloc).unwrap();
    for i in 0u16..100 {
        map.insert(&i.to_be_bytes(), b"vvvv").unwrap();
    }
    map.clear();
    assert!(map.is_empty());
    assert_eq!((map.key_size(), map.value_size()), (2, 4));
    assert!(map.capacity() >= 100);

    map.insert(b"k1", b"vvvv").unwrap();
    assert_eq!(map.len(), 1);
}

#[test]
fn memory_usage_grows_per_entry() {
    let mut map = new_map();
    let empty = map.memory_usage();
    map.insert(b"k1", b"vvvv").unwrap();
    let one = map.memory_usage();
    map.insert(b"k2", b"vvvv").unwrap();
    let two = map.memory_usage();

    assert!(one > empty + 2 + 4);
    assert_eq!(two - one, one - empty);
    map.remove(b"k1").unwrap();
    assert_eq!(map.memory_usage(), one);
}

#[test]
fn global_maps_can_always_allocate() {
    let map = RBTreeMap::new_in(2, 4, Lexicographic, Global).unwrap();
    assert!(map.can_perform_operation(1 << 20));
    assert!(!map.can_perform_operation(usize::MAX));
}

#[test]
fn ascending_and_descending_runs_stay_balanced() {
    let mut ascending = new_map();
    let mut descending = new_map();
    for i in 0u16..4_096 {
        ascending.insert(&i.to_be_bytes(), b"vvvv").unwrap();
        descending.insert(&(4_095 - i).to_be_bytes(), b"vvvv").unwrap();
    }
    assert_balanced(&ascending);
    assert_balanced(&descending);
    assert_eq!(ascending, descending);
}

#[test]
fn debug_lists_entries() {
    let mut map = RBTreeMap::new(1, 1, Lexicographic).unwrap();
    map.insert(b"b", b"2").unwrap();
    map.insert(b"a", b"1").unwrap();
    assert_eq!(format!("{map:?}"), "{[97]: [49], [98]: [50]}");
}

#[test]
fn iterators_debug_their_remaining_items() {
    let mut map = RBTreeMap::new(1, 1, Lexicographic).unwrap();
    map.insert(b"b", b"2").unwrap();
    map.insert(b"a", b"1").unwrap();
    assert_eq!(format!("{:?}", map.iter()), "[([97], [49]), ([98], [50])]");
    assert_eq!(format!("{:?}", map.keys()), "[[97], [98]]");

    let mut values = map.values();
    values.next();
    assert_eq!(format!("{values:?}"), "[[50]]");
    assert_eq!(values.len(), 1);
}

#[test]
fn maps_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RBTreeMap<Lexicographic>>();
    assert_send_sync::<blob_tree::rbtree_map::Iter<'static, Lexicographic>>();
}
