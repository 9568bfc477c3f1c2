//! AlbumVault - Key Handle Store
//!
//! Opaque handles over key material the caller can only use indirectly.
//! Keys generated non-extractable never leave the store; callers encrypt
//! and decrypt *with* a handle, never *holding* the key.
//!
//! Handles are memory-resident and do not survive process restart. That
//! is a documented durability limitation of non-extractable keys, not a
//! bug: after restart `KeyNotFound` is the correct answer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{self, EncryptedParts, SecretKey, KEY_LEN};
use crate::error::{KeyVaultError, KeyVaultResult};

/// Opaque reference to a stored key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyHandle(String);

impl KeyHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stored key category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyType {
    /// Device-bound key used to wrap the master key
    Device,
    /// Per-member album wrapping key
    Wrapping,
    /// Album content key
    Album,
    /// Uncategorized
    General,
}

/// Supported key algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyAlgorithm {
    Aes256Gcm,
}

/// Metadata tracked per stored key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredKeyMetadata {
    pub key_id: String,
    pub key_type: KeyType,
    pub algorithm: KeyAlgorithm,
    pub key_size: usize,
    pub hardware_backed: bool,
    pub requires_biometric: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

struct StoredKey {
    key: SecretKey,
    extractable: bool,
    meta: StoredKeyMetadata,
}

/// In-memory store of opaque key handles
pub struct KeyHandleStore {
    keys: RwLock<HashMap<String, StoredKey>>,
}

impl Default for KeyHandleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyHandleStore {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Generate a new key behind an opaque handle.
    ///
    /// `extractable` defaults to false everywhere this store is used for
    /// device and wrapping keys; extractable keys exist for flows that
    /// must export material (e.g. share splitting).
    pub fn generate(
        &self,
        key_type: KeyType,
        algorithm: KeyAlgorithm,
        extractable: bool,
    ) -> (KeyHandle, StoredKeyMetadata) {
        let key_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let meta = StoredKeyMetadata {
            key_id: key_id.clone(),
            key_type,
            algorithm,
            key_size: KEY_LEN * 8,
            hardware_backed: false,
            requires_biometric: false,
            created_at: now,
            last_used: now,
        };

        let stored = StoredKey {
            key: SecretKey::generate(),
            extractable,
            meta: meta.clone(),
        };

        self.keys.write().insert(key_id.clone(), stored);
        tracing::debug!(key_id = %key_id, ?key_type, "generated key handle");

        (KeyHandle(key_id), meta)
    }

    /// Import existing key material behind a handle (always non-extractable)
    pub fn import(&self, key: SecretKey, key_type: KeyType) -> (KeyHandle, StoredKeyMetadata) {
        let key_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let meta = StoredKeyMetadata {
            key_id: key_id.clone(),
            key_type,
            algorithm: KeyAlgorithm::Aes256Gcm,
            key_size: KEY_LEN * 8,
            hardware_backed: false,
            requires_biometric: false,
            created_at: now,
            last_used: now,
        };

        self.keys.write().insert(
            key_id.clone(),
            StoredKey {
                key,
                extractable: false,
                meta: meta.clone(),
            },
        );

        (KeyHandle(key_id), meta)
    }

    /// Encrypt with the key behind a handle. Updates `last_used`.
    pub fn encrypt_with(
        &self,
        handle: &KeyHandle,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> KeyVaultResult<EncryptedParts> {
        let mut keys = self.keys.write();
        let stored = keys
            .get_mut(&handle.0)
            .ok_or_else(|| KeyVaultError::KeyNotFound(handle.0.clone()))?;

        stored.meta.last_used = Utc::now();
        crypto::aead::encrypt(&stored.key, plaintext, aad)
    }

    /// Decrypt with the key behind a handle. Updates `last_used`.
    pub fn decrypt_with(
        &self,
        handle: &KeyHandle,
        parts: &EncryptedParts,
        aad: Option<&[u8]>,
    ) -> KeyVaultResult<Vec<u8>> {
        let mut keys = self.keys.write();
        let stored = keys
            .get_mut(&handle.0)
            .ok_or_else(|| KeyVaultError::KeyNotFound(handle.0.clone()))?;

        stored.meta.last_used = Utc::now();
        crypto::aead::decrypt(&stored.key, parts, aad)
    }

    /// Export raw key bytes. Only permitted for keys generated extractable.
    pub fn export(&self, handle: &KeyHandle) -> KeyVaultResult<SecretKey> {
        let keys = self.keys.read();
        let stored = keys
            .get(&handle.0)
            .ok_or_else(|| KeyVaultError::KeyNotFound(handle.0.clone()))?;

        if !stored.extractable {
            return Err(KeyVaultError::OperationNotAllowed(format!(
                "Key {} is not extractable",
                handle.0
            )));
        }

        Ok(stored.key.clone())
    }

    /// Metadata for a handle
    pub fn metadata(&self, handle: &KeyHandle) -> KeyVaultResult<StoredKeyMetadata> {
        self.keys
            .read()
            .get(&handle.0)
            .map(|s| s.meta.clone())
            .ok_or_else(|| KeyVaultError::KeyNotFound(handle.0.clone()))
    }

    /// List metadata for all stored keys
    pub fn list(&self) -> Vec<StoredKeyMetadata> {
        self.keys.read().values().map(|s| s.meta.clone()).collect()
    }

    /// List metadata for keys of one type
    pub fn list_by_type(&self, key_type: KeyType) -> Vec<StoredKeyMetadata> {
        self.keys
            .read()
            .values()
            .filter(|s| s.meta.key_type == key_type)
            .map(|s| s.meta.clone())
            .collect()
    }

    /// Delete a key. The material is zeroized on drop.
    pub fn delete(&self, handle: &KeyHandle) -> KeyVaultResult<()> {
        self.keys
            .write()
            .remove(&handle.0)
            .map(|_| tracing::info!(key_id = %handle.0, "deleted key handle"))
            .ok_or_else(|| KeyVaultError::KeyNotFound(handle.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_existing_material() {
        // Material provisioned elsewhere (e.g. a key agreed over the
        // asymmetric wrap channel) can be adopted behind a handle
        let key = SecretKey::generate();
        let sealed = crypto::aead::encrypt(&key, b"wrapped album key", None).unwrap();

        let store = KeyHandleStore::new();
        let (handle, meta) = store.import(key, KeyType::Wrapping);
        assert_eq!(meta.key_type, KeyType::Wrapping);

        // The imported key decrypts data encrypted with the original
        let opened = store.decrypt_with(&handle, &sealed, None).unwrap();
        assert_eq!(opened, b"wrapped album key");

        // Imported keys are never extractable
        assert!(matches!(
            store.export(&handle),
            Err(KeyVaultError::OperationNotAllowed(_))
        ));
    }

    #[test]
    fn test_generate_and_use() {
        let store = KeyHandleStore::new();
        let (handle, meta) = store.generate(KeyType::Device, KeyAlgorithm::Aes256Gcm, false);

        assert_eq!(meta.key_size, 256);
        assert_eq!(meta.key_type, KeyType::Device);

        let parts = store.encrypt_with(&handle, b"wrapped master", None).unwrap();
        let plain = store.decrypt_with(&handle, &parts, None).unwrap();
        assert_eq!(plain, b"wrapped master");
    }

    #[test]
    fn test_unknown_handle() {
        let store = KeyHandleStore::new();
        let ghost = KeyHandle("no-such-key".into());

        assert!(matches!(
            store.encrypt_with(&ghost, b"data", None),
            Err(KeyVaultError::KeyNotFound(_))
        ));
        assert!(matches!(store.metadata(&ghost), Err(KeyVaultError::KeyNotFound(_))));
        assert!(matches!(store.delete(&ghost), Err(KeyVaultError::KeyNotFound(_))));
    }

    #[test]
    fn test_non_extractable() {
        let store = KeyHandleStore::new();
        let (handle, _) = store.generate(KeyType::Device, KeyAlgorithm::Aes256Gcm, false);

        assert!(matches!(
            store.export(&handle),
            Err(KeyVaultError::OperationNotAllowed(_))
        ));

        let (handle, _) = store.generate(KeyType::General, KeyAlgorithm::Aes256Gcm, true);
        assert!(store.export(&handle).is_ok());
    }

    #[test]
    fn test_last_used_updates() {
        let store = KeyHandleStore::new();
        let (handle, meta) = store.generate(KeyType::Album, KeyAlgorithm::Aes256Gcm, false);

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.encrypt_with(&handle, b"x", None).unwrap();

        let after = store.metadata(&handle).unwrap();
        assert!(after.last_used > meta.last_used);
    }

    #[test]
    fn test_list_by_type() {
        let store = KeyHandleStore::new();
        store.generate(KeyType::Device, KeyAlgorithm::Aes256Gcm, false);
        store.generate(KeyType::Wrapping, KeyAlgorithm::Aes256Gcm, false);
        store.generate(KeyType::Wrapping, KeyAlgorithm::Aes256Gcm, false);

        assert_eq!(store.list().len(), 3);
        assert_eq!(store.list_by_type(KeyType::Wrapping).len(), 2);
        assert_eq!(store.list_by_type(KeyType::Album).len(), 0);
    }

    #[test]
    fn test_delete_then_use_fails() {
        let store = KeyHandleStore::new();
        let (handle, _) = store.generate(KeyType::Device, KeyAlgorithm::Aes256Gcm, false);

        store.delete(&handle).unwrap();
        assert!(matches!(
            store.encrypt_with(&handle, b"data", None),
            Err(KeyVaultError::KeyNotFound(_))
        ));
    }
}
