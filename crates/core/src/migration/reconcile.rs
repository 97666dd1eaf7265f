//! Deletion reconciliation.
//!
//! Two policies exist. Disposable tables delete everything the source no
//! longer lists. Guarded tables additionally keep every row that is still the
//! target of a foreign key somewhere in the destination.

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Outcome of comparing destination keys to source keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionPlan<K> {
    /// Keys to delete.
    pub removed: Vec<K>,
    /// Keys absent from the source but kept because they are referenced.
    pub protected: Vec<K>,
}

impl<K> DeletionPlan<K> {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.protected.is_empty()
    }
}

impl<K> Default for DeletionPlan<K> {
    fn default() -> Self {
        Self {
            removed: Vec::new(),
            protected: Vec::new(),
        }
    }
}

/// Destination keys the source no longer lists, sorted.
pub fn missing_from_source<K, D, S>(destination: D, source: S) -> Vec<K>
where
    K: Eq + Hash + Ord,
    D: IntoIterator<Item = K>,
    S: IntoIterator<Item = K>,
{
    let source: HashSet<K> = source.into_iter().collect();
    let mut removed: Vec<K> = destination
        .into_iter()
        .filter(|k| !source.contains(k))
        .collect::<HashSet<K>>()
        .into_iter()
        .collect();
    removed.sort();
    removed
}

/// `removed = destination - source`, deleted unconditionally.
pub fn plan_disposable_deletion<K, D, S>(destination: D, source: S) -> DeletionPlan<K>
where
    K: Eq + Hash + Ord,
    D: IntoIterator<Item = K>,
    S: IntoIterator<Item = K>,
{
    DeletionPlan {
        removed: missing_from_source(destination, source),
        protected: Vec::new(),
    }
}

/// `removed = destination - source - in_use`; the in-use part is reported as
/// protected.
pub fn plan_guarded_deletion<K, D, S>(
    destination: D,
    source: S,
    in_use: &HashSet<K>,
) -> DeletionPlan<K>
where
    K: Eq + Hash + Ord,
    D: IntoIterator<Item = K>,
    S: IntoIterator<Item = K>,
{
    let (protected, removed): (Vec<K>, Vec<K>) = missing_from_source(destination, source)
        .into_iter()
        .partition(|k| in_use.contains(k));
    DeletionPlan { removed, protected }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_disposable_deletes_everything_missing() {
        let plan = plan_disposable_deletion(keys(&["a", "b", "c"]), keys(&["b"]));
        assert_eq!(plan.removed, keys(&["a", "c"]));
        assert!(plan.protected.is_empty());
    }

    #[test]
    fn test_guarded_keeps_referenced_rows() {
        let in_use: HashSet<String> = keys(&["c", "z"]).into_iter().collect();
        let plan = plan_guarded_deletion(keys(&["a", "b", "c"]), keys(&["b"]), &in_use);
        assert_eq!(plan.removed, keys(&["a"]));
        assert_eq!(plan.protected, keys(&["c"]));
    }

    #[test]
    fn test_nothing_missing() {
        let plan = plan_guarded_deletion(keys(&["a"]), keys(&["a", "b"]), &HashSet::new());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_numeric_keys() {
        let plan = plan_disposable_deletion(vec![3_i64, 1, 2], vec![2_i64]);
        assert_eq!(plan.removed, vec![1, 3]);
    }
}
