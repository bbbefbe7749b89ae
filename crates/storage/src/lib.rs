//! Session storage for the LexCRM client
//!
//! This crate provides a small string key/value store modelled on browser
//! local storage. The client persists its session (tokens, cached user,
//! preferences) through the [`KeyValueStore`] trait, backed either by memory
//! or by a JSON file on disk.

mod file;
pub mod keys;
mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// 結果型
pub type Result<T> = std::result::Result<T, StorageError>;

/// エラー型
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A string key/value store.
///
/// Implementations must be usable from several tasks at once; every method
/// takes `&self`.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently stored
    fn keys(&self) -> Result<Vec<String>>;

    /// Remove several keys at once
    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Read the first key that holds a value
    fn get_any(&self, keys: &[&str]) -> Result<Option<String>> {
        for key in keys {
            if let Some(value) = self.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// JSON helpers over any [`KeyValueStore`]
pub trait KeyValueStoreExt: KeyValueStore {
    /// Read and deserialize a JSON value
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a JSON value
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Cached {
        email: String,
        active: bool,
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        let value = Cached {
            email: "x@y.com".to_string(),
            active: true,
        };

        store.set_json("user", &value).unwrap();
        let loaded: Option<Cached> = store.get_json("user").unwrap();
        assert_eq!(loaded, Some(value));

        let missing: Option<Cached> = store.get_json("nobody").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_get_json_rejects_garbage() {
        let store = MemoryStore::new();
        store.set("user", "{not json").unwrap();

        let result: Result<Option<Cached>> = store.get_json("user");
        assert!(matches!(result, Err(StorageError::SerializationError(_))));
    }

    #[test]
    fn test_get_any_prefers_first_key() {
        let store = MemoryStore::new();
        store.set(keys::LEGACY_ACCESS_TOKEN, "old").unwrap();
        assert_eq!(
            store.get_any(keys::ACCESS_TOKEN_KEYS).unwrap(),
            Some("old".to_string())
        );

        store.set(keys::ACCESS_TOKEN, "new").unwrap();
        assert_eq!(
            store.get_any(keys::ACCESS_TOKEN_KEYS).unwrap(),
            Some("new".to_string())
        );
    }
}
