//! Natural id to surrogate id cache used during foreign-key resolution.
//!
//! One cache is created per run and handed to every task invocation. Entries
//! are removed explicitly when a task deletes the row they point at.

use std::collections::HashMap;

use super::errors::EntityKind;

#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<EntityKind, HashMap<String, String>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: EntityKind, original_id: &str) -> Option<String> {
        self.entries
            .get(&kind)
            .and_then(|m| m.get(original_id))
            .cloned()
    }

    pub fn insert(
        &mut self,
        kind: EntityKind,
        original_id: impl Into<String>,
        id: impl Into<String>,
    ) {
        self.entries
            .entry(kind)
            .or_default()
            .insert(original_id.into(), id.into());
    }

    pub fn invalidate(&mut self, kind: EntityKind, original_id: &str) {
        if let Some(m) = self.entries.get_mut(&kind) {
            m.remove(original_id);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_and_invalidate() {
        let mut cache = ResolutionCache::new();
        cache.insert(EntityKind::Company, "C1", "uuid-1");
        cache.insert(EntityKind::Portfolio, "C1", "uuid-2");

        assert_eq!(cache.get(EntityKind::Company, "C1").as_deref(), Some("uuid-1"));
        assert_eq!(cache.get(EntityKind::Portfolio, "C1").as_deref(), Some("uuid-2"));
        assert_eq!(cache.get(EntityKind::Security, "C1"), None);

        cache.invalidate(EntityKind::Company, "C1");
        assert_eq!(cache.get(EntityKind::Company, "C1"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
