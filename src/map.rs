//! Sorted map over a contiguous sequence kept as two sorted runs.

use core::borrow::Borrow;
use core::cmp::Ordering;
use core::marker::PhantomData;
use core::mem;
use std::fmt::{self, Debug};
use std::iter::FromIterator;
use std::ops::{Index, IndexMut};

use thiserror::Error;

use crate::algorithms::{binary_search_merge, remove_duplicates};
use crate::entry::Entry;
use crate::iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
use crate::storage::Storage;

/// Error returned by [`SquareMap::try_get`] when the key has no entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("key not present in map")]
pub struct KeyNotFound;

/// A sorted `Key → Value` map over one contiguous vector split into two
/// sorted runs.
///
/// # Overview
/// The backing sequence holds a large sorted **left run** `[0, split)` and a
/// small sorted **right run** `[split, len)`; `split == 0` means the map is
/// *flat* (a single run). Lookups binary-search both runs. New keys go into
/// the right run, so an insertion shifts at most the right run's tail; once
/// the right run outgrows roughly `√len`, the runs are merged and a fresh
/// split is opened. Erasing a key buried in the left run does not shift
/// half the vector either: the key is *mirrored* into the right run, and a
/// key present in both runs at once counts as erased until the next merge
/// compacts the pair away.
///
/// # Layout invariants
/// Between operations the map maintains:
/// - both runs strictly sorted by key;
/// - in split state, the first right-run key is smaller than the last
///   left-run key (the split earns its keep) and the largest key sits at
///   the physical end of the sequence;
/// - a key occurs at most once per run; a key in both runs is an erased
///   entry, counted by the map so `len()` stays O(1).
///
/// # Complexity
/// | Operation | Cost |
/// |-----------|------|
/// | `get`, `find`, `contains_key` | O(log n) |
/// | `insert` | amortised O(√n) writes, O(log n) comparisons |
/// | `remove` | amortised O(√n) |
/// | `merge` | O(n) |
/// | iteration | amortised O(1) per step |
///
/// # Generic parameters
/// | Parameter | Meaning |
/// |-----------|---------|
/// | `K` | Key type; `Ord` supplies the ordering |
/// | `V` | Value type |
/// | `C` | Backing sequence, any [`Storage`]; defaults to `Vec<Entry<K, V>>` |
///
/// # Examples
/// ```
/// use square_map::SquareMap;
///
/// let mut map: SquareMap<u32, &str> = SquareMap::new();
/// map.insert(2, "two");
/// map.insert(1, "one");
/// assert_eq!(map.get(&1), Some(&"one"));
/// assert_eq!(map.iter().count(), 2);
/// ```
#[derive(Clone)]
pub struct SquareMap<K, V, C = Vec<Entry<K, V>>> {
    storage: C,
    split: usize,
    erased: usize,
    _marker: PhantomData<(K, V)>,
}

/// [`SquareMap`] whose backing sequence keeps up to `N` entries inline on
/// the stack before spilling to the heap.
#[cfg(feature = "smallvec")]
pub type SmallSquareMap<K, V, const N: usize> =
    SquareMap<K, V, smallvec::SmallVec<[Entry<K, V>; N]>>;

/// Result of binary-searching both runs for one key.
struct Lookup {
    left: usize,
    right: usize,
    in_left: bool,
    in_right: bool,
}

impl<K, V, C> SquareMap<K, V, C>
where
    K: Ord,
    C: Storage<Entry<K, V>>,
{
    /// Insertions whose shift distance stays under this threshold are done
    /// in place instead of opening or reshaping a split.
    #[cfg(not(debug_assertions))]
    pub const MIN_SPLIT_SIZE: usize = 50;
    /// Kept small in debug builds so tests reach the split machinery early.
    #[cfg(debug_assertions)]
    pub const MIN_SPLIT_SIZE: usize = 5;

    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty map with room for at least `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        SquareMap {
            storage: C::with_capacity(capacity),
            split: 0,
            erased: 0,
            _marker: PhantomData,
        }
    }

    /// Returns the number of live entries.
    ///
    /// Erased entries still occupy two physical slots each until the next
    /// [`merge`](SquareMap::merge), but are never counted here.
    pub fn len(&self) -> usize {
        self.storage.len() - 2 * self.erased
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Returns how many entries the backing sequence can hold without
    /// reallocating.
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Reserves room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.storage.reserve(additional);
    }

    /// Drops excess capacity of the backing sequence.
    pub fn shrink_to_fit(&mut self) {
        self.storage.shrink_to_fit();
    }

    /// Removes all entries, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.split = 0;
        self.erased = 0;
    }

    /// Returns a reference to the value for `key`, or `None`.
    ///
    /// Accepts any borrowed form of the key. Complexity: O(log n).
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let loc = self.locate(key);
        let entries = self.storage.as_slice();
        match (loc.in_left, loc.in_right) {
            (true, false) => Some(&entries[loc.left].1),
            (false, true) => Some(&entries[loc.right].1),
            // Absent, or present in both runs, which marks an erased key.
            _ => None,
        }
    }

    /// Returns a mutable reference to the value for `key`, or `None`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let loc = self.locate(key);
        let entries = self.storage.as_mut_slice();
        match (loc.in_left, loc.in_right) {
            (true, false) => Some(&mut entries[loc.left].1),
            (false, true) => Some(&mut entries[loc.right].1),
            _ => None,
        }
    }

    /// Returns the value for `key`, or [`KeyNotFound`].
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).ok_or(KeyNotFound)
    }

    /// Returns `true` if the map holds an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns an iterator positioned at `key`, or at the end position if
    /// the key is absent.
    ///
    /// The iterator walks the remaining entries in key order, so
    /// `find(&k)` yields every entry with key `≥ k`.
    pub fn find<Q>(&self, key: &Q) -> Iter<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let loc = self.locate(key);
        let entries = self.storage.as_slice();
        match (loc.in_left, loc.in_right) {
            (true, false) => Iter::positioned(entries, self.split, loc.left, loc.right),
            (false, true) => {
                let alt = if loc.left == self.split {
                    entries.len()
                } else {
                    loc.left
                };
                Iter::positioned(entries, self.split, loc.right, alt)
            }
            _ => Iter::end_of(entries, self.split),
        }
    }

    /// Returns an iterator at the first right-run key, or at the end
    /// position when the map is flat. Mostly useful for inspecting the
    /// layout in tests and benchmarks.
    pub fn split_point(&self) -> Iter<'_, K, V> {
        if self.split == 0 {
            return Iter::end_of(self.storage.as_slice(), self.split);
        }
        self.find(&self.storage.as_slice()[self.split].0)
    }

    /// Iterates over `(&key, &value)` pairs in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::begin(self.storage.as_slice(), self.split)
    }

    /// Iterates over `(&key, &mut value)` pairs in ascending key order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let split = self.split;
        IterMut::begin(self.storage.as_mut_slice(), split)
    }

    /// Iterates over the keys in ascending order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Iterates over the values in ascending key order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Iterates over mutable value references in ascending key order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Returns the entry with the smallest key, or `None` on an empty map.
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.iter().next()
    }

    /// Returns the entry with the largest key, or `None` on an empty map.
    ///
    /// O(1): the largest key always sits at the physical end of the
    /// backing sequence, and the last entry is never an erased one.
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        let entry = self.storage.as_slice().last()?;
        Some((&entry.0, &entry.1))
    }

    /// Inserts a key-value pair, returning the previous value if the key
    /// already had an entry.
    ///
    /// Re-inserting a key that was erased but not yet compacted away
    /// revives its old slot; the returned value is then whatever that slot
    /// held (a default left behind by [`remove`](SquareMap::remove)), and
    /// the erased marker is dropped.
    ///
    /// # Complexity
    /// O(log n) comparisons; amortised O(√n) element writes. The expensive
    /// case runs a full merge, paid for once every ~√n insertions.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let loc = self.locate(&key);

        // A key found in the left run stays there in all cases.
        if loc.in_left {
            let old = mem::replace(&mut self.storage.as_mut_slice()[loc.left].1, value);
            if loc.in_right {
                // Present on both sides means erased: drop the right-run
                // marker and revive the left-run entry.
                self.storage.remove(loc.right);
                self.erased -= 1;
                self.restore_split();
            }
            return Some(old);
        }
        if loc.in_right {
            let old = mem::replace(&mut self.storage.as_mut_slice()[loc.right].1, value);
            return Some(old);
        }

        // New key; it belongs in the right run at `loc.right`.
        let len = self.storage.len();
        let move_distance = len - loc.right;
        let right_len = len - self.split;
        let right_still_thin = (right_len + 1)
            .saturating_mul(right_len + 1)
            .saturating_mul(4)
            < self.split;
        if move_distance < Self::MIN_SPLIT_SIZE || right_still_thin {
            self.storage.insert(loc.right, Entry(key, value));
            return None;
        }

        // Inserting here would shift too much of the right run. Fold the
        // runs together, then re-search: compaction of erased entries may
        // have moved the insertion point within cheap range.
        self.merge();
        let len = self.storage.len();
        let pos = self
            .storage
            .as_slice()
            .partition_point(|entry| entry.0 < key);
        if len - pos < Self::MIN_SPLIT_SIZE {
            self.storage.insert(pos, Entry(key, value));
        } else {
            // Open a fresh split just below the maximum, which stays the
            // physical last element.
            self.storage.insert(len - 1, Entry(key, value));
            self.split = len - 1;
        }
        None
    }

    /// Removes the entry for `key`, returning its value.
    ///
    /// Entries in the right run, at the very end of the left run, or in a
    /// flat map are removed physically. An entry buried in the left run is
    /// instead marked erased by mirroring its key into the right run (hence
    /// `K: Clone`) with a default placeholder value (hence `V: Default`);
    /// the pair of slots is reclaimed by the next
    /// [`merge`](SquareMap::merge).
    ///
    /// # Complexity
    /// Amortised O(√n).
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q> + Clone,
        Q: Ord + ?Sized,
        V: Default,
    {
        let loc = self.locate(key);
        let pos = match (loc.in_left, loc.in_right) {
            (true, false) => loc.left,
            (false, true) => loc.right,
            _ => return None,
        };

        if self.split == 0 {
            return Some(self.storage.remove(pos).1);
        }

        if pos + 1 >= self.split {
            // Right-run entries and the last left-run entry come out
            // physically; the boundary may need repair afterwards.
            let value = self.storage.remove(pos).1;
            if pos < self.split {
                self.split -= 1;
            }
            self.restore_split();
            return Some(value);
        }

        // Interior of the left run: shifting it would cost O(n), so mirror
        // the key into the right run to mark it erased.
        let (mirror, value) = {
            let entry = &mut self.storage.as_mut_slice()[pos];
            (entry.0.clone(), mem::take(&mut entry.1))
        };
        self.storage.insert(loc.right, Entry(mirror, V::default()));
        self.erased += 1;
        Some(value)
    }

    /// Returns a mutable reference to the value for `key`, inserting a
    /// default value first if the key has no entry.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        K: Clone,
        V: Default,
    {
        if self.get(&key).is_none() {
            self.insert(key.clone(), V::default());
        }
        let loc = self.locate(&key);
        let entries = self.storage.as_mut_slice();
        match (loc.in_left, loc.in_right) {
            (true, false) => &mut entries[loc.left].1,
            (false, true) => &mut entries[loc.right].1,
            _ => unreachable!("entry was inserted above"),
        }
    }

    /// Folds the two runs into one and reclaims all erased entries.
    ///
    /// Afterwards the map is flat: one strictly sorted run and no pending
    /// duplicate pairs. Calling it on a flat map is a no-op, so the
    /// operation is idempotent. Costs O(n).
    pub fn merge(&mut self) {
        if self.split == 0 {
            return;
        }
        binary_search_merge(self.storage.as_mut_slice(), self.split, |a, b| {
            a.0.cmp(&b.0)
        });
        self.split = 0;
        if self.erased > 0 {
            // The merge is stable, so both halves of every erased key are
            // now adjacent and vanish together.
            let kept = remove_duplicates(self.storage.as_mut_slice(), |a, b| a.0.cmp(&b.0));
            self.storage.truncate(kept);
            self.erased = 0;
        }
    }

    /// Consumes the map and returns the backing sequence.
    ///
    /// The sequence is returned exactly as stored: two sorted runs, with
    /// every erased key present **twice** (once per run). That raw form is
    /// the only one preserving the complete map state; run
    /// [`merge`](SquareMap::merge) first for a plain sorted sequence.
    pub fn into_inner(self) -> C {
        self.storage
    }

    /// Replaces the backing sequence, treating it as one flat sorted run.
    ///
    /// The caller is responsible for the sequence actually being sorted
    /// with unique keys; no validation is performed.
    pub fn replace(&mut self, storage: C) {
        self.storage = storage;
        self.split = 0;
        self.erased = 0;
    }

    /// Replaces the backing sequence and the split position.
    ///
    /// `split` values of `0` or `storage.len()` mean flat. The erased
    /// count resets to zero. The caller is responsible for the layout
    /// invariants; debug builds assert the run ordering.
    pub fn replace_with_split(&mut self, storage: C, split: usize) {
        let len = storage.len();
        self.storage = storage;
        self.split = if split >= len { 0 } else { split };
        self.erased = 0;
        self.debug_validate_runs();
    }

    /// Binary-searches both runs for `key`.
    fn locate<Q>(&self, key: &Q) -> Lookup
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let entries = self.storage.as_slice();
        let left = entries[..self.split].partition_point(|entry| entry.0.borrow() < key);
        let in_left = left < self.split && entries[left].0.borrow() == key;
        let right =
            self.split + entries[self.split..].partition_point(|entry| entry.0.borrow() < key);
        let in_right = right < entries.len() && entries[right].0.borrow() == key;
        Lookup {
            left,
            right,
            in_left,
            in_right,
        }
    }

    /// Re-establishes the layout invariants after a physical removal in
    /// split state.
    fn restore_split(&mut self) {
        if self.split == 0 {
            return;
        }
        if self.split >= self.storage.len() {
            // The right run emptied out.
            debug_assert_eq!(self.erased, 0);
            self.split = 0;
            return;
        }
        {
            let entries = self.storage.as_slice();
            if entries[self.split - 1].0 > entries[entries.len() - 1].0 {
                // The old maximum is gone and the largest key now sits in
                // the left run; folding flat puts the maximum back at the
                // physical end.
                self.merge();
                return;
            }
        }
        loop {
            let boundary = {
                let entries = self.storage.as_slice();
                entries[self.split - 1].0.cmp(&entries[self.split].0)
            };
            match boundary {
                Ordering::Greater => return,
                Ordering::Less => {
                    // Sorted straight across the boundary: the split is no
                    // longer doing any work.
                    debug_assert_eq!(self.erased, 0);
                    self.split = 0;
                    return;
                }
                Ordering::Equal => {
                    // The two halves of an erased key meet at the boundary;
                    // drop both.
                    self.storage.remove(self.split);
                    self.storage.remove(self.split - 1);
                    self.erased -= 1;
                    self.split -= 1;
                    if self.split == 0 || self.split >= self.storage.len() {
                        debug_assert_eq!(self.erased, 0);
                        self.split = 0;
                        return;
                    }
                }
            }
        }
    }

    fn debug_validate_runs(&self) {
        #[cfg(debug_assertions)]
        {
            let entries = self.storage.as_slice();
            let strictly_sorted =
                |run: &[Entry<K, V>]| run.windows(2).all(|pair| pair[0].0 < pair[1].0);
            debug_assert!(
                strictly_sorted(&entries[..self.split]),
                "left run not strictly sorted"
            );
            debug_assert!(
                strictly_sorted(&entries[self.split..]),
                "right run not strictly sorted"
            );
            if self.split > 0 {
                debug_assert!(
                    entries[self.split].0 < entries[self.split - 1].0,
                    "split separates runs that are already in order"
                );
                debug_assert!(
                    entries[self.split - 1].0 < entries[entries.len() - 1].0,
                    "largest key is not the physical last entry"
                );
            }
        }
    }
}

#[cfg(test)]
impl<K, V, C> SquareMap<K, V, C>
where
    K: Ord,
    C: Storage<Entry<K, V>>,
{
    /// Test-only structural validator: run ordering, boundary conditions,
    /// and erased-entry accounting.
    pub(crate) fn check_valid(&self) {
        let entries = self.storage.as_slice();
        assert_eq!(entries.is_empty(), self.is_empty());
        if entries.is_empty() {
            assert_eq!(self.len(), 0);
            assert_eq!(self.split, 0);
            assert_eq!(self.erased, 0);
            return;
        }
        let strictly_sorted =
            |run: &[Entry<K, V>]| run.windows(2).all(|pair| pair[0].0 < pair[1].0);
        assert!(strictly_sorted(&entries[..self.split]));
        assert!(strictly_sorted(&entries[self.split..]));
        if self.split == 0 {
            assert_eq!(self.erased, 0);
            assert_eq!(self.len(), entries.len());
            return;
        }
        assert!(entries[self.split].0 < entries[self.split - 1].0);
        assert!(entries[self.split - 1].0 < entries[entries.len() - 1].0);
        let (left, right) = entries.split_at(self.split);
        let duplicated = right
            .iter()
            .filter(|entry| left.binary_search_by(|probe| probe.0.cmp(&entry.0)).is_ok())
            .count();
        assert_eq!(duplicated, self.erased);
        assert_eq!(self.len() + 2 * self.erased, entries.len());
    }

    pub(crate) fn split_index(&self) -> usize {
        self.split
    }

    pub(crate) fn erased_count(&self) -> usize {
        self.erased
    }
}

impl<K, V, C> Default for SquareMap<K, V, C>
where
    C: Storage<Entry<K, V>>,
{
    fn default() -> Self {
        SquareMap {
            storage: C::default(),
            split: 0,
            erased: 0,
            _marker: PhantomData,
        }
    }
}

impl<K, V, C> Debug for SquareMap<K, V, C>
where
    K: Ord + Debug,
    V: Debug,
    C: Storage<Entry<K, V>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, C, C2> PartialEq<SquareMap<K, V, C2>> for SquareMap<K, V, C>
where
    K: Ord,
    V: PartialEq,
    C: Storage<Entry<K, V>>,
    C2: Storage<Entry<K, V>>,
{
    /// Maps are equal when they hold the same keys with equal values,
    /// regardless of backing sequence type or physical layout.
    fn eq(&self, other: &SquareMap<K, V, C2>) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((k1, v1), (k2, v2))| k1 == k2 && v1 == v2)
    }
}

impl<K, V, C> Eq for SquareMap<K, V, C>
where
    K: Ord,
    V: Eq,
    C: Storage<Entry<K, V>>,
{
}

impl<K, V, C> PartialOrd for SquareMap<K, V, C>
where
    K: Ord,
    V: PartialOrd,
    C: Storage<Entry<K, V>>,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K, V, C> Ord for SquareMap<K, V, C>
where
    K: Ord,
    V: Ord,
    C: Storage<Entry<K, V>>,
{
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<K, V, C> FromIterator<(K, V)> for SquareMap<K, V, C>
where
    K: Ord,
    C: Storage<Entry<K, V>>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::default();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K, V, C> Extend<(K, V)> for SquareMap<K, V, C>
where
    K: Ord,
    C: Storage<Entry<K, V>>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, Q, C> Index<&Q> for SquareMap<K, V, C>
where
    K: Ord + Borrow<Q>,
    Q: Ord + ?Sized,
    C: Storage<Entry<K, V>>,
{
    type Output = V;

    fn index(&self, key: &Q) -> &Self::Output {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, Q, C> IndexMut<&Q> for SquareMap<K, V, C>
where
    K: Ord + Borrow<Q>,
    Q: Ord + ?Sized,
    C: Storage<Entry<K, V>>,
{
    fn index_mut(&mut self, key: &Q) -> &mut Self::Output {
        self.get_mut(key).expect("no entry found for key")
    }
}

impl<K, V, C> IntoIterator for SquareMap<K, V, C>
where
    K: Ord,
    C: Storage<Entry<K, V>>,
{
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, C>;

    /// Merges first, so the owned iteration never surfaces erased entries.
    fn into_iter(mut self) -> Self::IntoIter {
        self.merge();
        IntoIter::new(self.storage)
    }
}

impl<'a, K, V, C> IntoIterator for &'a SquareMap<K, V, C>
where
    K: Ord,
    C: Storage<Entry<K, V>>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a mut SquareMap<K, V, C>
where
    K: Ord,
    C: Storage<Entry<K, V>>,
{
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
