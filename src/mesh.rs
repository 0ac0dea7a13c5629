//! Pairwise pre-shared secret table
//!
//! Logically a map from an unordered hostname pair to one shared secret.
//! The pair is canonicalized (lexicographically smaller hostname first) so a
//! single lookup covers both orderings.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::keys::Key;

/// One shared secret per unordered pair of hosts
#[derive(Debug, Clone, Default)]
pub struct MeshKeyTable {
    keys: BTreeMap<(String, String), Key>,
}

/// Order a hostname pair canonically
fn canonical(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl MeshKeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the secret for a pair, in either ordering
    pub fn insert(&mut self, a: &str, b: &str, key: Key) {
        self.keys.insert(canonical(a, b), key);
    }

    /// Fetch the secret for a pair, in either ordering
    pub fn get(&self, a: &str, b: &str) -> Option<&Key> {
        self.keys.get(&canonical(a, b))
    }

    /// Fetch the secret for a pair that must exist
    ///
    /// After completion every pair has a secret; a miss here is a logic
    /// defect, not a user error.
    pub fn lookup(&self, a: &str, b: &str) -> Result<&Key> {
        self.get(a, b).ok_or_else(|| Error::MissingPresharedKey {
            a: a.to_string(),
            b: b.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &Key)> {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_pair_symmetric() {
        let mut table = MeshKeyTable::new();
        let key = Key::generate();
        table.insert("zebra", "alpha", key.clone());

        assert_eq!(table.get("alpha", "zebra"), Some(&key));
        assert_eq!(table.get("zebra", "alpha"), Some(&key));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_insert_either_order_overwrites_same_slot() {
        let mut table = MeshKeyTable::new();
        let first = Key::generate();
        let second = Key::generate();
        table.insert("a", "b", first);
        table.insert("b", "a", second.clone());

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("a", "b"), Some(&second));
    }

    #[test]
    fn test_missing_pair_is_internal_error() {
        let table = MeshKeyTable::new();
        let err = table.lookup("a", "b").unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("a <> b"));
    }
}
