//! In-memory [`StoreAdapter`] implementation used by unit and integration
//! tests in place of a live Redis instance.

use std::{
    collections::{HashMap, HashSet},
    sync::RwLock,
};

use super::adapter::{AdapterError, StoreAdapter};

/// A thread-safe, process-local store adapter backed by `HashMap`/`HashSet`.
///
/// Never returns `AdapterError::Unavailable` — it exists precisely so tests
/// can exercise the pipeline without a live Redis connection.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    hashes: RwLock<HashMap<String, HashMap<String, String>>>,
    sets: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreAdapter for InMemoryStore {
    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), AdapterError> {
        let mut hashes = self.hashes.write().expect("lock poisoned");
        hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hash_set_multiple(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), AdapterError> {
        let mut hashes = self.hashes.write().expect("lock poisoned");
        let entry = hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert((*field).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, AdapterError> {
        let hashes = self.hashes.read().expect("lock poisoned");
        Ok(hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, AdapterError> {
        let hashes = self.hashes.read().expect("lock poisoned");
        Ok(hashes
            .get(key)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn hash_contains(&self, key: &str, field: &str) -> Result<bool, AdapterError> {
        let hashes = self.hashes.read().expect("lock poisoned");
        Ok(hashes.get(key).is_some_and(|h| h.contains_key(field)))
    }

    fn set_add(&self, key: &str, member: &str) -> Result<(), AdapterError> {
        let mut sets = self.sets.write().expect("lock poisoned");
        sets.entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, AdapterError> {
        let sets = self.sets.read().expect("lock poisoned");
        Ok(sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn set_size(&self, key: &str) -> Result<usize, AdapterError> {
        let sets = self.sets.read().expect("lock poisoned");
        Ok(sets.get(key).map_or(0, HashSet::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_set_and_get_round_trips() {
        let store = InMemoryStore::new();
        store.hash_set("news:a1", "timestamp", "1000").unwrap();
        assert_eq!(
            store.hash_get("news:a1", "timestamp").unwrap(),
            Some("1000".to_string())
        );
        assert_eq!(store.hash_get("news:a1", "missing").unwrap(), None);
        assert_eq!(store.hash_get("news:missing", "timestamp").unwrap(), None);
    }

    #[test]
    fn set_add_is_idempotent_and_deduplicates() {
        let store = InMemoryStore::new();
        store.set_add("lsh:ai", "a1").unwrap();
        store.set_add("lsh:ai", "a1").unwrap();
        store.set_add("lsh:ai", "a2").unwrap();
        assert_eq!(store.set_size("lsh:ai").unwrap(), 2);
        let mut members = store.set_members("lsh:ai").unwrap();
        members.sort();
        assert_eq!(members, vec!["a1".to_string(), "a2".to_string()]);
    }

    #[test]
    fn hash_contains_reflects_field_presence() {
        let store = InMemoryStore::new();
        assert!(!store.hash_contains("jacc_sim:a2", "a1").unwrap());
        store.hash_set("jacc_sim:a2", "a1", "0.9").unwrap();
        assert!(store.hash_contains("jacc_sim:a2", "a1").unwrap());
    }
}
