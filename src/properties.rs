//! Per-state memoizing property storage.
//!
//! Each level of the state hierarchy carries a `PropertyStore` that handlers
//! use to cache derived data (parse results, compiled models, ...) under
//! string keys.

use std::any::{type_name, Any};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::error::{Error, Result};

/// An opaque stored value.
pub type PropertyValue = Arc<dyn Any + Send + Sync>;

type Slot = Arc<OnceLock<PropertyValue>>;

/// Thread-safe string-keyed cache of opaque values.
///
/// Each key maps to a compute-once slot, so concurrent first access through
/// [`PropertyStore::get_or_compute`] runs the computation exactly once while
/// other keys stay available.
#[derive(Default)]
pub struct PropertyStore {
    slots: DashMap<String, Slot>,
}

impl std::fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyStore")
            .field("len", &self.len())
            .finish()
    }
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value without computing anything.
    pub fn get_value(&self, key: &str) -> Option<PropertyValue> {
        let slot = self.slots.get(key).map(|slot| Arc::clone(&slot))?;
        slot.get().cloned()
    }

    /// Look up a typed value.
    ///
    /// Returns `Ok(None)` when the key is absent and an error when the stored
    /// value has a different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Option<Arc<T>>> {
        self.get_value(key)
            .map(|value| downcast(key, value))
            .transpose()
    }

    /// Return the value for `key`, computing and storing it on first access.
    ///
    /// `compute` runs at most once per key until the key is removed or the
    /// store is cleared, even under concurrent callers.
    pub fn get_or_compute<T, F>(&self, key: &str, compute: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let slot = self.slot(key);
        let value = slot.get_or_init(|| {
            log::trace!(target: "seclsp::properties", "computing property '{}'", key);
            Arc::new(compute()) as PropertyValue
        });
        downcast(key, Arc::clone(value))
    }

    /// Store a value, or remove the key when `value` is `None`.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: Option<T>) {
        let key = key.into();
        match value {
            Some(value) => {
                let slot = OnceLock::new();
                let _ = slot.set(Arc::new(value) as PropertyValue);
                self.slots.insert(key, Arc::new(slot));
            }
            None => {
                self.slots.remove(&key);
            }
        }
    }

    /// Remove a key, returning its value if one had been computed.
    pub fn remove(&self, key: &str) -> Option<PropertyValue> {
        self.slots
            .remove(key)
            .and_then(|(_, slot)| slot.get().cloned())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Number of keys holding a value.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored value.
    pub fn clear(&self) {
        self.slots.clear();
    }

    fn slot(&self, key: &str) -> Slot {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(&slot);
        }
        // The shard lock is released before the slot is initialized.
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceLock::new()));
        Arc::clone(&slot)
    }
}

fn downcast<T: Any + Send + Sync>(key: &str, value: PropertyValue) -> Result<Arc<T>> {
    value.downcast::<T>().map_err(|_| Error::PropertyType {
        key: key.to_string(),
        expected: type_name::<T>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn get_does_not_compute() {
        let store = PropertyStore::new();
        assert!(store.get::<String>("parse").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn get_or_compute_memoizes() {
        let store = PropertyStore::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let value = store
                .get_or_compute("answer", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    42u32
                })
                .unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*store.get::<u32>("answer").unwrap().unwrap(), 42);
    }

    #[test]
    fn set_none_removes_key() {
        let store = PropertyStore::new();
        store.set("k", Some("v".to_string()));
        assert!(store.contains("k"));
        store.set::<String>("k", None);
        assert!(!store.contains("k"));
    }

    #[test]
    fn clear_allows_recomputation() {
        let store = PropertyStore::new();
        store.get_or_compute("k", || 1u8).unwrap();
        store.clear();
        let value = store.get_or_compute("k", || 2u8).unwrap();
        assert_eq!(*value, 2);
    }

    #[test]
    fn wrong_type_is_an_error() {
        let store = PropertyStore::new();
        store.set("k", Some(1u64));
        let err = store.get::<String>("k").unwrap_err();
        assert!(matches!(err, Error::PropertyType { ref key, .. } if key == "k"));
        assert!(store.get_or_compute("k", || "x".to_string()).is_err());
    }

    #[test]
    fn concurrent_first_access_computes_once() {
        const CALLERS: usize = 16;
        let store = Arc::new(PropertyStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let store = Arc::clone(&store);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store
                        .get_or_compute("shared", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            vec![1, 2, 3]
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<Arc<Vec<i32>>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for r in &results {
            assert!(Arc::ptr_eq(r, &results[0]));
        }
    }
}
