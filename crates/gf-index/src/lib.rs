#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bound alias for axis key types: dates, identifiers, strings, integers.
pub trait Key: Clone + Eq + Hash + Ord + fmt::Debug + Send + Sync {}

impl<T: Clone + Eq + Hash + Ord + fmt::Debug + Send + Sync> Key for T {}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("duplicate key: {key}")]
    DuplicateKey { key: String },
    #[error("key not found: {key}")]
    KeyNotFound { key: String },
    #[error("ordinal {ordinal} out of bounds for length {len}")]
    OutOfBounds { ordinal: usize, len: usize },
}

impl IndexError {
    pub fn duplicate_key(key: &impl fmt::Debug) -> Self {
        Self::DuplicateKey {
            key: format!("{key:?}"),
        }
    }

    pub fn key_not_found(key: &impl fmt::Debug) -> Self {
        Self::KeyNotFound {
            key: format!("{key:?}"),
        }
    }
}

/// An ordered set of unique keys with O(1) resolution in both directions:
/// a dense key vector gives `ordinal → key`, a hash map gives `key → ordinal`.
///
/// Ordinals are contiguous in `[0, len)` and stable until a mutating
/// operation re-linearizes them. Insertion order is preserved; sortedness is
/// detected lazily and cached to enable binary-search range queries.
#[derive(Debug, Clone)]
pub struct Index<K: Key> {
    keys: Vec<K>,
    ordinals: HashMap<K, usize>,
    sorted_cache: OnceLock<bool>,
}

impl<K: Key> Default for Index<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key> PartialEq for Index<K> {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys
    }
}

impl<K: Key> Eq for Index<K> {}

impl<K: Key> Index<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            ordinals: HashMap::new(),
            sorted_cache: OnceLock::new(),
        }
    }

    /// Build from a key list; duplicate keys are an error, not a silent drop.
    pub fn from_keys(keys: impl IntoIterator<Item = K>) -> Result<Self, IndexError> {
        let mut index = Self::new();
        for key in keys {
            index.add(key)?;
        }
        Ok(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Iterate keys in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.ordinals.contains_key(key)
    }

    /// O(1) key → ordinal.
    #[must_use]
    pub fn ordinal_of(&self, key: &K) -> Option<usize> {
        self.ordinals.get(key).copied()
    }

    /// O(1) ordinal → key.
    pub fn key_of(&self, ordinal: usize) -> Result<&K, IndexError> {
        self.keys.get(ordinal).ok_or(IndexError::OutOfBounds {
            ordinal,
            len: self.keys.len(),
        })
    }

    /// Append a key at the next ordinal. Fails on duplicates.
    pub fn add(&mut self, key: K) -> Result<usize, IndexError> {
        if self.ordinals.contains_key(&key) {
            return Err(IndexError::duplicate_key(&key));
        }
        let ordinal = self.keys.len();
        self.ordinals.insert(key.clone(), ordinal);
        self.keys.push(key);
        self.sorted_cache = OnceLock::new();
        Ok(ordinal)
    }

    /// Remove a key; every ordinal after the removal point shifts down by one
    /// and the hash map is rewritten. O(n) by design — the cost of keeping
    /// ordinals dense. Returns the ordinal the key occupied.
    pub fn remove(&mut self, key: &K) -> Result<usize, IndexError> {
        let ordinal = self
            .ordinals
            .remove(key)
            .ok_or_else(|| IndexError::key_not_found(key))?;
        self.keys.remove(ordinal);
        for (shifted, k) in self.keys.iter().enumerate().skip(ordinal) {
            self.ordinals.insert(k.clone(), shifted);
        }
        self.sorted_cache = OnceLock::new();
        Ok(ordinal)
    }

    /// Lazily detected, cached strict-ascending check.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        *self
            .sorted_cache
            .get_or_init(|| self.keys.windows(2).all(|w| w[0] < w[1]))
    }

    /// Ordinals of keys in the inclusive range, in ordinal order.
    ///
    /// Binary search when the keys are sorted, linear scan fallback otherwise
    /// (the two paths agree because sorted ordinal order is key order).
    #[must_use]
    pub fn range(&self, bounds: RangeInclusive<K>) -> Vec<usize> {
        let (lo, hi) = (bounds.start(), bounds.end());
        if self.is_sorted() {
            let start = self.keys.partition_point(|k| k < lo);
            let end = self.keys.partition_point(|k| k <= hi);
            (start..end).collect()
        } else {
            self.keys
                .iter()
                .enumerate()
                .filter(|(_, k)| *k >= lo && *k <= hi)
                .map(|(ordinal, _)| ordinal)
                .collect()
        }
    }
}

impl Index<i64> {
    /// Dense integer keys `start..stop`.
    pub fn from_range(start: i64, stop: i64) -> Result<Self, IndexError> {
        Self::from_keys(start..stop)
    }
}

impl<K: Key + Serialize> Serialize for Index<K> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Index", 1)?;
        state.serialize_field("keys", &self.keys)?;
        state.end()
    }
}

impl<'de, K: Key + Deserialize<'de>> Deserialize<'de> for Index<K> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(bound = "K: Deserialize<'de>")]
        struct Raw<K> {
            keys: Vec<K>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::from_keys(raw.keys).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{Index, IndexError};

    fn index_of(keys: &[&str]) -> Index<String> {
        Index::from_keys(keys.iter().map(|k| (*k).to_owned())).expect("unique keys")
    }

    #[test]
    fn bijection_holds_for_every_ordinal() {
        let index = index_of(&["a", "c", "b"]);
        for ordinal in 0..index.len() {
            let key = index.key_of(ordinal).unwrap();
            assert_eq!(index.ordinal_of(key), Some(ordinal));
        }
        for key in index.keys() {
            assert_eq!(index.key_of(index.ordinal_of(key).unwrap()).unwrap(), key);
        }
    }

    #[test]
    fn duplicate_add_is_an_error() {
        let mut index = index_of(&["a", "b"]);
        let err = index.add("a".to_owned()).unwrap_err();
        assert_eq!(
            err,
            IndexError::DuplicateKey {
                key: "\"a\"".to_owned()
            }
        );
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn from_keys_rejects_duplicates() {
        let result = Index::from_keys(vec![1_i64, 2, 1]);
        assert!(matches!(result, Err(IndexError::DuplicateKey { .. })));
    }

    #[test]
    fn add_assigns_next_ordinal() {
        let mut index = Index::new();
        assert_eq!(index.add(10_i64).unwrap(), 0);
        assert_eq!(index.add(5).unwrap(), 1);
        assert_eq!(index.ordinal_of(&5), Some(1));
    }

    #[test]
    fn remove_shifts_and_reindexes() {
        let mut index = Index::from_keys(vec![10_i64, 20, 30, 40]).unwrap();
        assert_eq!(index.remove(&20).unwrap(), 1);
        assert_eq!(index.len(), 3);
        assert_eq!(index.ordinal_of(&10), Some(0));
        assert_eq!(index.ordinal_of(&30), Some(1));
        assert_eq!(index.ordinal_of(&40), Some(2));
        assert_eq!(index.key_of(1).unwrap(), &30);
        assert_eq!(index.ordinal_of(&20), None);
    }

    #[test]
    fn remove_absent_key_is_an_error() {
        let mut index = Index::from_keys(vec![1_i64]).unwrap();
        assert!(matches!(
            index.remove(&9),
            Err(IndexError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn key_of_out_of_range_reports_bounds() {
        let index = Index::from_keys(vec![1_i64, 2]).unwrap();
        assert_eq!(
            index.key_of(2).unwrap_err(),
            IndexError::OutOfBounds { ordinal: 2, len: 2 }
        );
    }

    #[test]
    fn insertion_order_is_preserved() {
        let index = index_of(&["z", "a", "m"]);
        let collected: Vec<&String> = index.iter().collect();
        assert_eq!(collected, [&"z", &"a", &"m"]);
    }

    // ── Sortedness and range queries ───────────────────────────────────

    #[test]
    fn sortedness_detection_and_invalidation() {
        let mut index = Index::from_keys(vec![1_i64, 2, 3]).unwrap();
        assert!(index.is_sorted());
        index.add(0).unwrap();
        assert!(!index.is_sorted());
    }

    #[test]
    fn empty_and_singleton_are_sorted() {
        assert!(Index::<i64>::new().is_sorted());
        assert!(Index::from_keys(vec![7_i64]).unwrap().is_sorted());
    }

    #[test]
    fn range_uses_binary_search_on_sorted_keys() {
        let index = Index::from_keys(vec![10_i64, 20, 30, 40, 50]).unwrap();
        assert!(index.is_sorted());
        assert_eq!(index.range(20..=40), vec![1, 2, 3]);
        assert_eq!(index.range(15..=35), vec![1, 2]);
        assert_eq!(index.range(60..=70), Vec::<usize>::new());
    }

    #[test]
    fn range_falls_back_to_scan_on_unsorted_keys() {
        let index = Index::from_keys(vec![30_i64, 10, 50, 20]).unwrap();
        assert!(!index.is_sorted());
        // Ordinal order, not key order.
        assert_eq!(index.range(10..=30), vec![0, 1, 3]);
    }

    #[test]
    fn range_after_removal_stays_consistent() {
        let mut index = Index::from_keys(vec![1_i64, 2, 3, 4]).unwrap();
        index.remove(&2).unwrap();
        assert!(index.is_sorted());
        assert_eq!(index.range(1..=4), vec![0, 1, 2]);
    }

    #[test]
    fn integer_range_constructor() {
        let index = Index::from_range(3, 7).unwrap();
        assert_eq!(index.keys(), &[3, 4, 5, 6]);
        assert_eq!(index.ordinal_of(&6), Some(3));
    }
}
