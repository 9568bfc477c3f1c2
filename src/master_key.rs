//! AlbumVault - Master Key
//!
//! The user's root secret: 32 random bytes that exist only in memory or
//! inside derivations. It is never persisted raw. Three protections run
//! in parallel: a device-key wrap (this module), Shamir shares
//! (`recovery::shamir`) and an independently derivable mnemonic
//! (`recovery::mnemonic`).

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{EncryptedParts, EncryptedRecord};
use crate::error::{KeyVaultError, KeyVaultResult};
use crate::keystore::{KeyAlgorithm, KeyHandle, KeyHandleStore, KeyType};

const MASTER_KEY_LEN: usize = 32;

/// AAD binding a wrapped master key to its purpose
const WRAP_AAD: &[u8] = b"albumvault:master-key:v1";

/// The user's 256-bit root secret
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; MASTER_KEY_LEN],
}

impl MasterKey {
    /// Generate a fresh random master key
    pub fn generate() -> Self {
        let mut key = [0u8; MASTER_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Reconstruct from raw bytes (recovery paths)
    pub fn from_bytes(bytes: &[u8]) -> KeyVaultResult<Self> {
        if bytes.len() != MASTER_KEY_LEN {
            return Err(KeyVaultError::InvalidKeyLength {
                expected: MASTER_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; MASTER_KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Master key wrapped under a device key, safe to persist locally
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedMasterKey {
    /// Handle id of the device key that wrapped this
    pub device_key_id: String,
    #[serde(flatten)]
    pub encrypted: EncryptedRecord,
}

/// Create a device key and wrap the master key under it.
///
/// The device key is non-extractable and lives only in the handle store;
/// it is created once at device setup and destroyed only on explicit
/// device removal.
pub fn wrap_for_device(
    store: &KeyHandleStore,
    master: &MasterKey,
) -> KeyVaultResult<(KeyHandle, WrappedMasterKey)> {
    let (handle, meta) = store.generate(KeyType::Device, KeyAlgorithm::Aes256Gcm, false);

    let parts = store.encrypt_with(&handle, master.as_bytes(), Some(WRAP_AAD))?;
    tracing::info!(device_key_id = %meta.key_id, "wrapped master key for device");

    Ok((
        handle,
        WrappedMasterKey {
            device_key_id: meta.key_id,
            encrypted: parts.to_record(),
        },
    ))
}

/// Unwrap the master key with the device key (local unlock without a
/// passphrase).
pub fn unwrap_with_device(
    store: &KeyHandleStore,
    handle: &KeyHandle,
    wrapped: &WrappedMasterKey,
) -> KeyVaultResult<MasterKey> {
    let parts = EncryptedParts::from_record(&wrapped.encrypted)?;
    let mut plain = store.decrypt_with(handle, &parts, Some(WRAP_AAD))?;

    let master = MasterKey::from_bytes(&plain);
    plain.zeroize();
    master
}

/// Destroy the device key. Any master-key wrap under it becomes
/// permanently unreadable; recovery paths remain.
pub fn remove_device(store: &KeyHandleStore, handle: &KeyHandle) -> KeyVaultResult<()> {
    store.delete(handle)
}
