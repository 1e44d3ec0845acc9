//! Static identity lifecycle: an X25519 key pair created once, persisted
//! opaquely through a [`Storage`] adapter, and zeroed on destruction. Only
//! one active identity exists per process; loading or generating a new one
//! destroys whatever was held before.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use zeroize::Zeroize;

use mesh_crypto::x25519;
use mesh_types::{MeshError, MeshResult};

use crate::storage::Storage;

pub const DEFAULT_IDENTITY_KEY: &str = "mesh_identity";

#[derive(Serialize, Deserialize)]
struct KeyPairRecord {
    #[serde(rename = "publicKey")]
    public_key: Vec<u8>,
    #[serde(rename = "secretKey")]
    secret_key: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct IdentityRecord {
    #[serde(rename = "keyPair")]
    key_pair: KeyPairRecord,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: i64,
}

/// The process's current static identity. `secret_key` is zeroized on drop.
pub struct Identity {
    secret_key: [u8; 32],
    public_key: [u8; 32],
    display_name: Option<String>,
    created_at: i64,
}

impl Drop for Identity {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl Identity {
    pub fn public_key(&self) -> [u8; 32] {
        self.public_key
    }

    pub fn secret_key(&self) -> [u8; 32] {
        self.secret_key
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}

/// Loads, generates, and persists the process-wide static identity via a
/// [`Storage`] backend. Holds at most one [`Identity`] at a time.
pub struct KeyManager {
    storage: Arc<dyn Storage>,
    storage_key: String,
    identity: Option<Identity>,
}

impl KeyManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        KeyManager { storage, storage_key: DEFAULT_IDENTITY_KEY.to_string(), identity: None }
    }

    pub fn with_storage_key(storage: Arc<dyn Storage>, storage_key: impl Into<String>) -> Self {
        KeyManager { storage, storage_key: storage_key.into(), identity: None }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Loads the persisted identity, or generates and saves a fresh one if
    /// none is stored yet. This is the usual startup path.
    #[instrument(skip(self), fields(storage_key = %self.storage_key))]
    pub async fn load_or_generate(&mut self, created_at: i64) -> MeshResult<&Identity> {
        if let Some(raw) = self.storage.get(&self.storage_key).await? {
            self.load_from_record(&raw)?;
            debug!("loaded existing static identity");
        } else {
            self.generate(None, created_at).await?;
            info!("generated fresh static identity");
        }
        Ok(self.identity.as_ref().expect("just loaded or generated"))
    }

    /// Generates a new identity unconditionally, persists it, and replaces
    /// whatever identity was previously held (dropping — and zeroizing —
    /// the old one).
    #[instrument(skip(self, display_name), fields(storage_key = %self.storage_key))]
    pub async fn generate(
        &mut self,
        display_name: Option<String>,
        created_at: i64,
    ) -> MeshResult<&Identity> {
        let (secret_key, public_key) = x25519::generate_key_pair();
        self.identity = Some(Identity { secret_key, public_key, display_name, created_at });
        self.persist().await?;
        Ok(self.identity.as_ref().expect("just assigned"))
    }

    async fn persist(&self) -> MeshResult<()> {
        let identity = self
            .identity
            .as_ref()
            .ok_or_else(|| MeshError::InitFailed("no identity to persist".into()))?;

        let record = IdentityRecord {
            key_pair: KeyPairRecord {
                public_key: identity.public_key.to_vec(),
                secret_key: identity.secret_key.to_vec(),
            },
            display_name: identity.display_name.clone(),
            created_at: identity.created_at,
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| MeshError::InitFailed(format!("failed to serialize identity: {e}")))?;
        self.storage.set(&self.storage_key, json).await
    }

    fn load_from_record(&mut self, raw: &str) -> MeshResult<()> {
        let record: IdentityRecord = serde_json::from_str(raw)
            .map_err(|e| MeshError::InitFailed(format!("failed to parse stored identity: {e}")))?;

        let secret_key: [u8; 32] = record
            .key_pair
            .secret_key
            .as_slice()
            .try_into()
            .map_err(|_| MeshError::InitFailed("stored secret key was not 32 bytes".into()))?;
        let public_key: [u8; 32] = record
            .key_pair
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| MeshError::InitFailed("stored public key was not 32 bytes".into()))?;

        self.identity = Some(Identity {
            secret_key,
            public_key,
            display_name: record.display_name,
            created_at: record.created_at,
        });
        Ok(())
    }

    /// Deletes the persisted record and drops the in-memory identity.
    pub async fn destroy(&mut self) -> MeshResult<()> {
        self.storage.delete(&self.storage_key).await?;
        self.identity = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn generates_identity_when_none_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let mut manager = KeyManager::new(storage);
        let identity = manager.load_or_generate(1_700_000_000).await.unwrap();
        assert_ne!(identity.public_key(), [0u8; 32]);
    }

    #[tokio::test]
    async fn load_or_generate_is_stable_across_instances() {
        let storage = Arc::new(MemoryStorage::new());
        let mut first = KeyManager::new(storage.clone());
        let public_key = first.load_or_generate(1).await.unwrap().public_key();

        let mut second = KeyManager::new(storage);
        let reloaded = second.load_or_generate(1).await.unwrap();
        assert_eq!(reloaded.public_key(), public_key);
    }

    #[tokio::test]
    async fn generate_replaces_existing_identity() {
        let storage = Arc::new(MemoryStorage::new());
        let mut manager = KeyManager::new(storage);
        let first = manager.load_or_generate(1).await.unwrap().public_key();
        let second = manager.generate(Some("new".into()), 2).await.unwrap().public_key();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn destroy_clears_storage_and_identity() {
        let storage = Arc::new(MemoryStorage::new());
        let mut manager = KeyManager::new(storage.clone());
        manager.load_or_generate(1).await.unwrap();
        manager.destroy().await.unwrap();
        assert!(manager.identity().is_none());
        assert!(!storage.has(DEFAULT_IDENTITY_KEY).await.unwrap());
    }
}
