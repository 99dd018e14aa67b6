//! The key-value element type stored in the backing sequence.

use core::cmp::Ordering;

/// A key-value pair whose ordering is determined **solely** by the key.
///
/// This newtype is what the map's backing sequence holds, so that binary
/// searches and the run-merge step can compare entries directly without a
/// separate comparator at every call site.
///
/// The value is intentionally excluded from all comparison traits: two
/// entries with the same key are *equal* regardless of their values, which
/// is what makes in-place value replacement and duplicate-pair detection
/// (the erased-key encoding) work.
///
/// The type shows up in the public API through [`into_inner`] and
/// [`replace_with_split`], where the raw sequence is handed to or taken from
/// the caller.
///
/// [`into_inner`]: crate::SquareMap::into_inner
/// [`replace_with_split`]: crate::SquareMap::replace_with_split
#[derive(Debug, Clone)]
pub struct Entry<K, V>(pub K, pub V);

impl<K, V> Entry<K, V> {
    /// Returns a reference to the key.
    pub fn key(&self) -> &K {
        &self.0
    }

    /// Returns a reference to the value.
    pub fn value(&self) -> &V {
        &self.1
    }
}

impl<K: PartialEq, V> PartialEq for Entry<K, V> {
    /// Returns `true` iff the two entries share the same key.
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl<K: Eq, V> Eq for Entry<K, V> {}

impl<K: PartialOrd, V> PartialOrd for Entry<K, V> {
    /// Delegates to the key's `partial_cmp`; the value is ignored.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl<K: Ord, V> Ord for Entry<K, V> {
    /// Delegates to the key's `cmp`; the value is ignored.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<K, V> From<(K, V)> for Entry<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Entry(key, value)
    }
}
