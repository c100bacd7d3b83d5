use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Key/value table behind the `testentry` commands.
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl EntryStore {
    fn with_entries<R>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> R) -> R {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut entries)
    }

    /// Insert a new entry. Returns `false` if `key` is taken.
    pub fn add(&self, key: &str, value: &str) -> bool {
        self.with_entries(|entries| {
            if entries.contains_key(key) {
                return false;
            }
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    /// Replace the value of an existing entry.
    pub fn update(&self, key: &str, value: &str) -> bool {
        self.with_entries(|entries| match entries.get_mut(key) {
            Some(current) => {
                *current = value.to_string();
                true
            }
            None => false,
        })
    }

    pub fn delete(&self, key: &str) -> bool {
        self.with_entries(|entries| entries.remove(key).is_some())
    }

    pub fn len(&self) -> usize {
        self.with_entries(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.with_entries(|entries| entries.clear());
    }
}
