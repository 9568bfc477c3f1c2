//! AlbumVault - Album Record Shapes
//!
//! Persisted document shapes and the album tier sum type. Field names are
//! part of the compatibility surface; binary fields travel as base64.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::EncryptedRecord;
use crate::error::{KeyVaultError, KeyVaultResult};

/// Storage collection names
pub mod collections {
    pub const ALBUMS: &str = "albums";
    pub const ALBUM_KEYS: &str = "album_keys";
    pub const PHOTOS: &str = "photos";
    pub const CONSENT: &str = "album_consent";
    pub const AUDIT: &str = "key_audit";
}

/// Album trust tier. The two tiers have distinct key lifecycles:
/// Family keys are random and wrapped per member, Private keys only ever
/// exist as derivations of the master key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumType {
    Family,
    Private,
}

/// Normalize an album document's tier, handling the legacy `privacy`
/// field written by older clients ("shared"/"locked"). Belongs here at
/// the storage-adapter boundary; the core only ever sees `AlbumType`.
pub fn album_type_from_doc(doc: &Value) -> KeyVaultResult<AlbumType> {
    if let Some(t) = doc.get("type").and_then(Value::as_str) {
        return match t {
            "family" => Ok(AlbumType::Family),
            "private" => Ok(AlbumType::Private),
            other => Err(KeyVaultError::InvalidAlbumType(other.to_string())),
        };
    }

    // Legacy records carry a `privacy` string instead of `type`
    match doc.get("privacy").and_then(Value::as_str) {
        Some("shared") => Ok(AlbumType::Family),
        Some("locked") => Ok(AlbumType::Private),
        Some(other) => Err(KeyVaultError::InvalidAlbumType(other.to_string())),
        None => Err(KeyVaultError::InvalidAlbumType("missing type field".into())),
    }
}

/// Persisted album metadata. Never contains key material; for Private
/// albums `salt` is the only derivation input stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumMetadata {
    pub album_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub album_type: AlbumType,
    pub owner_id: String,
    /// Base64 derivation salt (Private tier only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Current key version (Family tier; bumped by rotation)
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

/// One wrapped-key row per Family album member
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyAlbumKeyStorage {
    pub album_id: String,
    pub user_id: String,
    /// Base64 ciphertext of the album key under the member's wrap key
    pub encrypted_key: String,
    pub iv: String,
    pub auth_tag: String,
    pub salt: String,
    pub version: u32,
}

impl FamilyAlbumKeyStorage {
    /// Storage document id: one row per (album, member)
    pub fn doc_id(album_id: &str, user_id: &str) -> String {
        format!("{}:{}", album_id, user_id)
    }

    pub fn encrypted(&self) -> EncryptedRecord {
        EncryptedRecord {
            ciphertext: self.encrypted_key.clone(),
            iv: self.iv.clone(),
            auth_tag: self.auth_tag.clone(),
        }
    }
}

/// Persisted derivation metadata for a Private album. No key material:
/// the key is always re-derived from master key + salt + info.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateAlbumKeyMetadata {
    pub album_id: String,
    pub salt: String,
    pub derivation_info: String,
}

/// Per-photo IVs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoIvs {
    pub photo: String,
    pub thumbnail: String,
    pub metadata: String,
}

/// Per-photo auth tags (metadata carries its own inside `encryptedMetadata`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAuthTags {
    pub photo: String,
    pub thumbnail: String,
}

/// Blob paths for one photo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePaths {
    pub photo: String,
    pub thumbnail: String,
}

/// Persisted photo record; the ciphertext blobs live in the blob store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPhotoRecord {
    pub photo_id: String,
    pub album_id: String,
    pub storage_paths: StoragePaths,
    pub encrypted_metadata: EncryptedRecord,
    pub ivs: PhotoIvs,
    pub auth_tags: PhotoAuthTags,
    pub key_version: u32,
}

/// Outcome of a completed Family album rotation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRotationResult {
    pub album_id: String,
    pub new_version: u32,
    pub items_reencrypted: usize,
    pub members_updated: usize,
    pub rotated_at: DateTime<Utc>,
    pub duration_ms: u64,
}
