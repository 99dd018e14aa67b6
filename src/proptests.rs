//! Randomised property tests and complexity checks for the map.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use proptest::collection::vec as pvec;
use proptest::prelude::*;

use crate::algorithms::{binary_search_merge, remove_duplicates};
use crate::entry::Entry;
use crate::storage::Storage;
use crate::SquareMap;

fn model_pairs(model: &BTreeMap<u16, u32>) -> Vec<(u16, u32)> {
    model.iter().map(|(k, v)| (*k, *v)).collect()
}

fn map_pairs(map: &SquareMap<u16, u32>) -> Vec<(u16, u32)> {
    map.iter().map(|(k, v)| (*k, *v)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Random insert/remove/merge sequences stay structurally valid and
    /// agree with `BTreeMap` after every single step.
    #[test]
    fn random_ops_match_btreemap(ops in pvec((0u8..4, 0u16..120), 1..300)) {
        let mut map: SquareMap<u16, u32> = SquareMap::new();
        let mut model: BTreeMap<u16, u32> = BTreeMap::new();
        let mut tick = 0u32;
        for (op, key) in ops {
            match op {
                0 | 1 => {
                    tick += 1;
                    map.insert(key, tick);
                    model.insert(key, tick);
                }
                2 => {
                    // The removed value matches the model's even on the
                    // mirror-erase path.
                    prop_assert_eq!(map.remove(&key), model.remove(&key));
                }
                _ => map.merge(),
            }
            map.check_valid();
            prop_assert_eq!(map.len(), model.len());
            prop_assert_eq!(map_pairs(&map), model_pairs(&model));
        }
    }

    /// Without erases in between, `insert` reports previous values exactly
    /// like `BTreeMap::insert`.
    #[test]
    fn insert_reports_previous_value(keys in pvec(0u16..100, 1..250)) {
        let mut map: SquareMap<u16, u32> = SquareMap::new();
        let mut model: BTreeMap<u16, u32> = BTreeMap::new();
        for (tick, key) in keys.into_iter().enumerate() {
            let tick = tick as u32;
            prop_assert_eq!(map.insert(key, tick), model.insert(key, tick));
            map.check_valid();
        }
    }

    /// `find` positions an iterator whose tail is exactly the model's
    /// key range from that key upward.
    #[test]
    fn find_walks_the_suffix(keys in pvec(0u16..200, 1..120), probes in pvec(0u16..200, 1..40)) {
        let mut map: SquareMap<u16, u32> = SquareMap::new();
        let mut model: BTreeMap<u16, u32> = BTreeMap::new();
        for key in keys {
            map.insert(key, u32::from(key));
            model.insert(key, u32::from(key));
        }
        for probe in probes {
            let suffix: Vec<u16> = map.find(&probe).map(|(k, _)| *k).collect();
            if model.contains_key(&probe) {
                let expected: Vec<u16> = model.range(probe..).map(|(k, _)| *k).collect();
                prop_assert_eq!(suffix, expected);
            } else {
                prop_assert!(suffix.is_empty());
            }
        }
    }

    /// Erased keys stay out of every read path until a merge reclaims
    /// their slots, and the extracted sequence surfaces them as duplicates.
    #[test]
    fn erased_keys_surface_only_in_extraction(
        keys in pvec(0u16..80, 30..120),
        victims in pvec(0u16..80, 1..20),
    ) {
        let mut map: SquareMap<u16, u32> = SquareMap::new();
        for key in &keys {
            map.insert(*key, 1);
        }
        let mut removed = Vec::new();
        for victim in victims {
            if map.remove(&victim).is_some() {
                removed.push(victim);
            }
        }
        map.check_valid();
        for key in &removed {
            prop_assert_eq!(map.get(key), None);
            prop_assert!(!map.contains_key(key));
        }

        let live = map.len();
        let erased = map.erased_count();
        let extracted = map.clone().into_inner();
        prop_assert_eq!(extracted.len(), live + 2 * erased);

        // A key erased via the mirror path shows up twice in the raw
        // sequence; a physically removed key shows up not at all.
        let mut mirrored = 0;
        for key in &removed {
            let occurrences = extracted.iter().filter(|entry| entry.0 == *key).count();
            prop_assert!(occurrences == 0 || occurrences == 2);
            if occurrences == 2 {
                mirrored += 1;
            }
        }
        prop_assert_eq!(mirrored, erased);

        map.merge();
        map.check_valid();
        prop_assert_eq!(map.erased_count(), 0);
        prop_assert_eq!(map.len(), live);
        for key in &removed {
            prop_assert_eq!(map.get(key), None);
        }
    }

    /// The standalone merge matches a stable sort of the two concatenated
    /// runs.
    #[test]
    fn binary_search_merge_matches_stable_sort(
        mut left in pvec(0u16..50, 0..60),
        mut right in pvec(0u16..50, 0..12),
    ) {
        left.sort_unstable();
        right.sort_unstable();
        let middle = left.len();

        let mut tagged: Vec<(u16, u8)> = left.iter().map(|k| (*k, 0)).collect();
        tagged.extend(right.iter().map(|k| (*k, 1)));
        let mut expected = tagged.clone();
        expected.sort_by(|a, b| a.0.cmp(&b.0));

        binary_search_merge(&mut tagged, middle, |a, b| a.0.cmp(&b.0));
        prop_assert_eq!(tagged, expected);
    }

    /// The duplicate remover keeps exactly the multiplicity-one elements.
    #[test]
    fn remove_duplicates_keeps_singletons(mut input in pvec(0u16..30, 0..60)) {
        input.sort_unstable();
        let expected: Vec<u16> = input
            .iter()
            .filter(|k| input.iter().filter(|other| other == k).count() == 1)
            .copied()
            .collect();

        let kept = remove_duplicates(&mut input, |a, b| a.cmp(b));
        input.truncate(kept);
        prop_assert_eq!(input, expected);
    }
}

// ─── Complexity checks ────────────────────────────────────────────────────────

thread_local! {
    static COMPARISONS: Cell<u64> = const { Cell::new(0) };
    static ELEMENT_WRITES: Cell<u64> = const { Cell::new(0) };
}

fn reset_comparisons() {
    COMPARISONS.with(|c| c.set(0));
}

fn comparisons() -> u64 {
    COMPARISONS.with(Cell::get)
}

/// Key that counts every comparison made against it.
#[derive(Clone, Debug, Default)]
struct CountingKey(u32);

impl PartialEq for CountingKey {
    fn eq(&self, other: &Self) -> bool {
        COMPARISONS.with(|c| c.set(c.get() + 1));
        self.0 == other.0
    }
}

impl Eq for CountingKey {}

impl PartialOrd for CountingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CountingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        COMPARISONS.with(|c| c.set(c.get() + 1));
        self.0.cmp(&other.0)
    }
}

/// Vec wrapper that counts the element writes done by positional edits.
struct CountingVec<T>(Vec<T>);

impl<T> Default for CountingVec<T> {
    fn default() -> Self {
        CountingVec(Vec::new())
    }
}

impl<T> IntoIterator for CountingVec<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T> Storage<T> for CountingVec<T> {
    fn with_capacity(capacity: usize) -> Self {
        CountingVec(Vec::with_capacity(capacity))
    }
    fn as_slice(&self) -> &[T] {
        &self.0
    }
    fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.0
    }
    fn insert(&mut self, index: usize, element: T) {
        let shifted = (self.0.len() - index + 1) as u64;
        ELEMENT_WRITES.with(|w| w.set(w.get() + shifted));
        self.0.insert(index, element);
    }
    fn remove(&mut self, index: usize) -> T {
        let shifted = (self.0.len() - index) as u64;
        ELEMENT_WRITES.with(|w| w.set(w.get() + shifted));
        self.0.remove(index)
    }
    fn push(&mut self, element: T) {
        ELEMENT_WRITES.with(|w| w.set(w.get() + 1));
        self.0.push(element);
    }
    fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
    fn clear(&mut self) {
        self.0.clear();
    }
    fn reserve(&mut self, additional: usize) {
        self.0.reserve(additional);
    }
    fn shrink_to_fit(&mut self) {
        self.0.shrink_to_fit();
    }
    fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

/// Deterministic pseudo-random permutation of `0..n`.
fn permutation(n: u32, seed: u64) -> Vec<u32> {
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    let mut keys: Vec<u32> = (0..n).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    keys.shuffle(&mut rng);
    keys
}

#[test]
fn insert_comparisons_scale_like_n_log_n() {
    const N: u32 = 4096;
    let mut map: SquareMap<CountingKey, u32> = SquareMap::new();
    reset_comparisons();
    for key in permutation(N, 0xC0FFEE) {
        map.insert(CountingKey(key), key);
    }
    assert_eq!(map.len(), N as usize);

    let n = u64::from(N);
    let log_n = 64 - n.leading_zeros() as u64;
    let bound = 16 * n * (log_n + 2);
    let total = comparisons();
    assert!(
        total < bound,
        "insert comparisons {total} exceed O(n log n) bound {bound}"
    );
}

#[test]
fn lookup_comparisons_scale_like_log_n() {
    const N: u32 = 4096;
    let mut map: SquareMap<CountingKey, u32> = SquareMap::new();
    for key in permutation(N, 0xBEEF) {
        map.insert(CountingKey(key), key);
    }

    reset_comparisons();
    for key in permutation(N, 0xFACE) {
        assert_eq!(map.get(&CountingKey(key)), Some(&key));
    }

    let n = u64::from(N);
    let log_n = 64 - n.leading_zeros() as u64;
    let bound = n * (4 * log_n + 16);
    let total = comparisons();
    assert!(
        total < bound,
        "lookup comparisons {total} exceed O(n log n) bound {bound}"
    );
}

#[test]
fn insert_writes_scale_like_n_sqrt_n() {
    const N: u32 = 4096;
    let mut map: SquareMap<u32, u32, CountingVec<Entry<u32, u32>>> = SquareMap::default();
    ELEMENT_WRITES.with(|w| w.set(0));
    for key in permutation(N, 0xDECADE) {
        map.insert(key, key);
    }
    assert_eq!(map.len(), N as usize);

    let n = f64::from(N);
    let bound = (8.0 * n * n.sqrt()) as u64;
    let total = ELEMENT_WRITES.with(Cell::get);
    assert!(
        total >= u64::from(N),
        "every insertion writes at least once"
    );
    assert!(
        total < bound,
        "insert writes {total} exceed O(n \u{221a}n) bound {bound}"
    );
}
