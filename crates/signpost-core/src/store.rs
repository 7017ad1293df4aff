//! Key-value record store contract.
//!
//! The store is an external collaborator: a partitioned map with put/get
//! semantics. Absence is a first-class result (`Ok(None)`), never an error
//! variant to be sniffed out of a backend error type. `compare_and_swap`
//! supports the two conditional writes the workflow needs: create-if-absent
//! for the signing keypair and the activations append on registrations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Logically isolated namespaces within the store.
///
/// Partitions cannot collide by construction; each record type lives in
/// exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Registrations,
    Activations,
    Keys,
}

impl Partition {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registrations => "registration",
            Self::Activations => "activation",
            Self::Keys => "keys",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend is unreachable or rejected the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A record could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(String),
}

/// Contract for the partitioned key-value store.
///
/// `put` overwrites unconditionally (last-writer-wins). `get` returns
/// `Ok(None)` when the key is absent. `compare_and_swap` writes `new` only
/// when the current value equals `expected` (`None` = key must be absent)
/// and reports whether the swap happened.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get<T>(&self, partition: Partition, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send;

    async fn put<T>(&self, partition: Partition, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync;

    async fn compare_and_swap<T>(
        &self,
        partition: Partition,
        key: &str,
        expected: Option<&T>,
        new: &T,
    ) -> Result<bool, StoreError>
    where
        T: Serialize + Sync;
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for std::sync::Arc<S> {
    async fn get<T>(&self, partition: Partition, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        self.as_ref().get(partition, key).await
    }

    async fn put<T>(&self, partition: Partition, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        self.as_ref().put(partition, key, value).await
    }

    async fn compare_and_swap<T>(
        &self,
        partition: Partition,
        key: &str,
        expected: Option<&T>,
        new: &T,
    ) -> Result<bool, StoreError>
    where
        T: Serialize + Sync,
    {
        self.as_ref()
            .compare_and_swap(partition, key, expected, new)
            .await
    }
}

/// In-memory store implementation.
///
/// Used by tests and local runs; records are held as JSON values so the
/// same serialization path is exercised as with a remote backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<(Partition, String), serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all partitions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Delete a record. Returns whether it existed.
    ///
    /// Deleting an activation record is the revocation path for its token.
    pub fn remove(&self, partition: Partition, key: &str) -> bool {
        self.lock().remove(&(partition, key.to_string())).is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Partition, String), serde_json::Value>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get<T>(&self, partition: Partition, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let value = self.lock().get(&(partition, key.to_string())).cloned();
        match value {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
        }
    }

    async fn put<T>(&self, partition: Partition, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let value = to_value(value)?;
        self.lock().insert((partition, key.to_string()), value);
        Ok(())
    }

    async fn compare_and_swap<T>(
        &self,
        partition: Partition,
        key: &str,
        expected: Option<&T>,
        new: &T,
    ) -> Result<bool, StoreError>
    where
        T: Serialize + Sync,
    {
        let expected = expected.map(to_value).transpose()?;
        let new = to_value(new)?;
        let mut map = self.lock();
        let current = map.get(&(partition, key.to_string()));
        if current == expected.as_ref() {
            map.insert((partition, key.to_string()), new);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
