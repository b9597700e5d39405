//! Key-value persistence for tasks, timetables, and round history (§4.13).
//! The in-memory [`DashMapStore`] is always available; `persistent-store`
//! additionally compiles [`SledStore`] for durability across restarts.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[cfg(feature = "persistent-store")]
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
}

/// A namespaced, serde-backed key-value store. Implementations need not be
/// transactional across keys; each call is a single get/put/delete.
pub trait Store: Send + Sync {
    fn put<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> Result<(), StoreError>;
    fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Result<Option<T>, StoreError>;
    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError>;
    fn keys(&self, namespace: &str) -> Result<Vec<String>, StoreError>;
}

fn composite_key(namespace: &str, key: &str) -> String {
    format!("{namespace}/{key}")
}

/// Default, in-memory store backed by [`dashmap::DashMap`]; state does not
/// survive a process restart.
#[derive(Debug, Default)]
pub struct DashMapStore {
    values: dashmap::DashMap<String, Vec<u8>>,
}

impl DashMapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for DashMapStore {
    fn put<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.values.insert(composite_key(namespace, key), bytes);
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Result<Option<T>, StoreError> {
        match self.values.get(&composite_key(namespace, key)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.values.remove(&composite_key(namespace, key));
        Ok(())
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{namespace}/");
        Ok(self
            .values
            .iter()
            .filter_map(|entry| entry.key().strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

/// Durable store backed by an on-disk `sled::Db`, enabled by the
/// `persistent-store` feature for deployments that must survive a restart
/// without re-running the whole allocation history.
#[cfg(feature = "persistent-store")]
pub struct SledStore {
    db: sled::Db,
}

#[cfg(feature = "persistent-store")]
impl SledStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        Ok(Self { db: sled::open(path)? })
    }
}

#[cfg(feature = "persistent-store")]
impl Store for SledStore {
    fn put<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.db.insert(composite_key(namespace, key), bytes)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Result<Option<T>, StoreError> {
        match self.db.get(composite_key(namespace, key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.db.remove(composite_key(namespace, key))?;
        Ok(())
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{namespace}/");
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(&prefix) {
            let (k, _) = entry?;
            if let Ok(k) = std::str::from_utf8(&k) {
                if let Some(rest) = k.strip_prefix(&prefix) {
                    out.push(rest.to_string());
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use crate::ids::TaskId;

    #[test]
    fn put_then_get_round_trips() {
        let store = DashMapStore::new();
        let task = Task::new(TaskId::new("T1"), "A", "B", 10.0, 30.0);
        store.put("tasks", "T1", &task).unwrap();
        let back: Task = store.get("tasks", "T1").unwrap().unwrap();
        assert_eq!(back.task_id(), &TaskId::new("T1"));
    }

    #[test]
    fn delete_removes_the_key() {
        let store = DashMapStore::new();
        store.put("tasks", "T1", &42u32).unwrap();
        store.delete("tasks", "T1").unwrap();
        let back: Option<u32> = store.get("tasks", "T1").unwrap();
        assert!(back.is_none());
    }

    #[test]
    fn keys_are_scoped_by_namespace() {
        let store = DashMapStore::new();
        store.put("tasks", "T1", &1u32).unwrap();
        store.put("rounds", "R1", &2u32).unwrap();
        assert_eq!(store.keys("tasks").unwrap(), vec!["T1".to_string()]);
    }
}
