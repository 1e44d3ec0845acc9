//! The key-value persistence boundary `KeyManager` uses to save and load
//! the process's static identity. Completion-based (`async_trait`) so a
//! real adapter can hit disk or a platform keychain without blocking.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use mesh_types::MeshResult;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> MeshResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> MeshResult<()>;
    async fn delete(&self, key: &str) -> MeshResult<()>;
    async fn has(&self, key: &str) -> MeshResult<bool>;
    async fn clear(&self) -> MeshResult<()>;
}

/// An in-memory `Storage` behind a mutex. Ships as a reference adapter for
/// tests and as documentation of the trait's contract — not a production
/// backend, since nothing here survives process restart.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage { entries: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> MeshResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> MeshResult<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> MeshResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn has(&self, key: &str) -> MeshResult<bool> {
        Ok(self.entries.lock().unwrap().contains_key(key))
    }

    async fn clear(&self) -> MeshResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}
