//! AlbumVault - External Collaborators
//!
//! Boundary traits for everything the key management core consumes but
//! does not own: document/blob persistence, media processing and the
//! platform biometric gate. In-memory stand-ins back the tests and any
//! environment without a real platform integration.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::crypto::{self, SecretKey};
use crate::error::{KeyVaultError, KeyVaultResult};

// ═══════════════════════════════════════════════════════════════════════════
// PERSISTENT STORE (documents + blobs)
// ═══════════════════════════════════════════════════════════════════════════

/// Document storage by collection and id, with field-equality queries.
/// Documents are JSON values; the core reads/writes only the record
/// shapes in `album::types`.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> KeyVaultResult<Option<Value>>;

    async fn set(&self, collection: &str, id: &str, doc: Value) -> KeyVaultResult<()>;

    /// Merge top-level fields into an existing document
    async fn update(&self, collection: &str, id: &str, fields: Value) -> KeyVaultResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> KeyVaultResult<()>;

    /// All documents whose top-level `field` equals `value`
    async fn find_by(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> KeyVaultResult<Vec<Value>>;
}

/// Blob storage by path
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, data: &[u8]) -> KeyVaultResult<()>;

    async fn download(&self, path: &str) -> KeyVaultResult<Vec<u8>>;

    async fn delete(&self, path: &str) -> KeyVaultResult<()>;
}

// ═══════════════════════════════════════════════════════════════════════════
// MEDIA PROCESSOR
// ═══════════════════════════════════════════════════════════════════════════

/// Image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Thumbnail generation options
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailOptions {
    pub max_edge: u32,
    pub quality: u8,
}

/// Media pipeline consumed before encryption: EXIF stripping, thumbnail
/// generation and dimension probing. Implemented by the application
/// layer; the core never decodes media itself.
pub trait MediaProcessor: Send + Sync {
    fn strip_metadata(&self, bytes: &[u8], mime: &str) -> KeyVaultResult<Vec<u8>>;

    fn make_thumbnail(
        &self,
        bytes: &[u8],
        mime: &str,
        opts: ThumbnailOptions,
    ) -> KeyVaultResult<Vec<u8>>;

    fn dimensions(&self, bytes: &[u8], mime: &str) -> KeyVaultResult<Dimensions>;
}

// ═══════════════════════════════════════════════════════════════════════════
// PLATFORM AUTHENTICATOR (biometric gate)
// ═══════════════════════════════════════════════════════════════════════════

/// A registered platform credential
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCredential {
    pub credential_id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Biometric/platform authentication gate
pub trait PlatformAuthenticator: Send + Sync {
    fn available(&self) -> bool;

    fn register(&self, user_id: &str, name: &str) -> KeyVaultResult<PlatformCredential>;

    /// Returns an authentication signature on success
    fn authenticate(&self, credential_id: &str) -> KeyVaultResult<Vec<u8>>;
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY STAND-INS
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory document store
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> KeyVaultResult<Option<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> KeyVaultResult<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> KeyVaultResult<()> {
        let mut collections = self.collections.write();
        let doc = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| {
                KeyVaultError::StorageError(format!("No document {}/{}", collection, id))
            })?;

        let Value::Object(target) = doc else {
            return Err(KeyVaultError::StorageError(
                "Update requires object documents".into(),
            ));
        };
        let Value::Object(updates) = fields else {
            return Err(KeyVaultError::StorageError(
                "Update requires object documents".into(),
            ));
        };
        for (k, v) in updates {
            target.insert(k, v);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> KeyVaultResult<()> {
        self.collections
            .write()
            .get_mut(collection)
            .map(|c| c.remove(id));
        Ok(())
    }

    async fn find_by(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> KeyVaultResult<Vec<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|doc| doc.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// In-memory blob store
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, data: &[u8]) -> KeyVaultResult<()> {
        self.blobs.write().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn download(&self, path: &str) -> KeyVaultResult<Vec<u8>> {
        self.blobs
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| KeyVaultError::StorageError(format!("No blob at {}", path)))
    }

    async fn delete(&self, path: &str) -> KeyVaultResult<()> {
        self.blobs.write().remove(path);
        Ok(())
    }
}

/// Software authenticator: HMAC signatures over challenge ids, with the
/// attempt counting and lockout semantics a platform gate enforces.
pub struct SoftwareAuthenticator {
    key: SecretKey,
    credentials: RwLock<HashMap<String, PlatformCredential>>,
    failed_attempts: RwLock<u8>,
    max_attempts: u8,
    /// Simulate an unavailable platform (tests)
    available: bool,
}

impl SoftwareAuthenticator {
    pub fn new() -> Self {
        Self {
            key: SecretKey::generate(),
            credentials: RwLock::new(HashMap::new()),
            failed_attempts: RwLock::new(0),
            max_attempts: 5,
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn remaining_attempts(&self) -> u8 {
        self.max_attempts.saturating_sub(*self.failed_attempts.read())
    }
}

impl Default for SoftwareAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAuthenticator for SoftwareAuthenticator {
    fn available(&self) -> bool {
        self.available
    }

    fn register(&self, user_id: &str, name: &str) -> KeyVaultResult<PlatformCredential> {
        if !self.available {
            return Err(KeyVaultError::BiometricNotAvailable);
        }

        let credential = PlatformCredential {
            credential_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        self.credentials
            .write()
            .insert(credential.credential_id.clone(), credential.clone());
        Ok(credential)
    }

    fn authenticate(&self, credential_id: &str) -> KeyVaultResult<Vec<u8>> {
        if !self.available {
            return Err(KeyVaultError::BiometricNotAvailable);
        }

        let mut attempts = self.failed_attempts.write();
        if *attempts >= self.max_attempts {
            return Err(KeyVaultError::BiometricAuthFailed(
                "Too many failed attempts".into(),
            ));
        }

        if !self.credentials.read().contains_key(credential_id) {
            *attempts += 1;
            return Err(KeyVaultError::BiometricAuthFailed(format!(
                "Unknown credential: {}",
                credential_id
            )));
        }

        *attempts = 0;
        Ok(crypto::hmac_sha256(&self.key, credential_id.as_bytes()).to_vec())
    }
}
