//! Last-value memoization keyed on input hashes.
//!
//! A `Memo` remembers one value and the 64-bit hash of the inputs it was
//! computed from; asking again with the same hash returns the cached value.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct Memo<T> {
    entry: Option<(u64, T)>,
    recomputations: usize,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Memo {
            entry: None,
            recomputations: 0,
        }
    }
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`, computing it first when the key changed
    pub fn get_or_compute(&mut self, key: u64, compute: impl FnOnce() -> T) -> &T {
        let entry = match self.entry.take() {
            Some((cached, value)) if cached == key => (cached, value),
            _ => {
                self.recomputations += 1;
                (key, compute())
            }
        };
        let (_, value) = self.entry.insert(entry);
        value
    }

    /// Fallible variant; a failed computation leaves the memo empty
    pub fn try_get_or_compute(&mut self, key: u64, compute: impl FnOnce() -> Result<T>) -> Result<&T> {
        let entry = match self.entry.take() {
            Some((cached, value)) if cached == key => (cached, value),
            _ => {
                self.recomputations += 1;
                (key, compute()?)
            }
        };
        let (_, value) = self.entry.insert(entry);
        Ok(value)
    }

    /// How many times the value was (re)computed
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

pub fn hash_of<H: Hash + ?Sized>(value: &H) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash of a value's JSON form, for config types holding floats or maps
pub fn hash_serialized<S: Serialize>(value: &S) -> Result<u64> {
    let json = serde_json::to_string(value).context("Failed to serialize memo key")?;
    Ok(hash_of(&json))
}

/// Fold several input hashes into one key
pub fn combine(hashes: &[u64]) -> u64 {
    hash_of(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_recomputes_only_on_key_change() {
        let mut memo = Memo::new();
        assert_eq!(*memo.get_or_compute(1, || 10), 10);
        assert_eq!(*memo.get_or_compute(1, || 20), 10);
        assert_eq!(memo.recomputations(), 1);
        assert_eq!(*memo.get_or_compute(2, || 30), 30);
        assert_eq!(memo.recomputations(), 2);

        memo.invalidate();
        assert_eq!(*memo.get_or_compute(2, || 40), 40);
    }

    #[test]
    fn test_failed_compute_leaves_memo_empty() {
        let mut memo: Memo<i32> = Memo::new();
        assert!(memo.try_get_or_compute(1, || anyhow::bail!("boom")).is_err());
        assert_eq!(*memo.try_get_or_compute(1, || Ok(5)).unwrap(), 5);
        assert_eq!(*memo.try_get_or_compute(1, || Ok(6)).unwrap(), 5);
    }

    #[test]
    fn test_hashes() {
        assert_eq!(hash_of("a"), hash_of("a"));
        assert_ne!(combine(&[1, 2]), combine(&[2, 1]));
        assert_eq!(hash_serialized(&vec![1.5, 2.0]).unwrap(), hash_serialized(&vec![1.5, 2.0]).unwrap());
    }

    #[test]
    fn test_unserializable_key_is_an_error() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], "non-string map keys have no JSON form");
        assert!(hash_serialized(&map).is_err());
    }
}
