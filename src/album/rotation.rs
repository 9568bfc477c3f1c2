//! AlbumVault - Family Album Key Rotation
//!
//! Re-keys a Family album in place: fresh key, every photo blob,
//! thumbnail and metadata record re-encrypted, every member's wrapped
//! row re-issued, album version bumped by one.
//!
//! Rotation is resumable rather than transactional. The replacement key
//! is wrapped for the owner and persisted as a staged row before any
//! content is touched, so it survives a crash. New ciphertext lands on
//! version-suffixed blob paths and each photo record flips to them in a
//! single write, so a record is always consistent with the blobs it
//! points at. A re-run unwraps the staged key instead of generating a
//! fresh one, skips records already at the target version and finishes
//! the rest.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use serde_json::{json, Value};

use crate::album::manager::{row_aad, AlbumKeyManager};
use crate::album::types::{
    collections, AlbumType, FamilyAlbumKeyStorage, KeyRotationResult, StoragePaths,
    StoredPhotoRecord,
};
use crate::crypto::{self, EncryptedParts, SecretKey};
use crate::error::{KeyVaultError, KeyVaultResult};

/// Photo records re-encrypted per batch
pub const ROTATION_BATCH_SIZE: usize = 500;

impl AlbumKeyManager {
    /// Rotate a Family album's key. Owner-only; Private albums have no
    /// stored key to rotate.
    ///
    /// A halted rotation is repaired by calling this again: the
    /// replacement key is recovered from its staged row, already-rotated
    /// records are skipped and the remainder is finished.
    pub async fn rotate_album_key(&self, album_id: &str) -> KeyVaultResult<KeyRotationResult> {
        let started = std::time::Instant::now();

        let meta = self.load_album(album_id).await?;
        if meta.album_type != AlbumType::Family {
            return Err(KeyVaultError::OperationNotAllowed(
                "Private album keys are derived, not stored; nothing to rotate".into(),
            ));
        }
        if meta.owner_id != self.user_id() {
            return Err(KeyVaultError::AccessDenied(format!(
                "Only the owner may rotate the key for {}",
                album_id
            )));
        }

        let old_key = self.get_album_key(album_id, None).await?;
        let target_version = meta.version + 1;

        // Phase 0: stage the replacement key before touching any
        // content. The staged row is the only durable copy until the
        // member rows are re-wrapped; without it a crash mid-rotation
        // would strand already-rotated records under a lost key.
        let new_key = self.load_or_stage_rotation_key(album_id, target_version).await?;

        tracing::info!(album_id, target_version, "starting key rotation");

        // Phase 1: re-encrypt content batch by batch. A failed batch
        // halts the rotation; the version markers and the staged key
        // make the partial state recoverable by re-running.
        let photos = self
            .store()
            .find_by(collections::PHOTOS, "albumId", &json!(album_id))
            .await?;

        let mut items_reencrypted = 0usize;
        for batch in photos.chunks(ROTATION_BATCH_SIZE) {
            for doc in batch {
                let record: StoredPhotoRecord = serde_json::from_value(doc.clone())?;
                if record.key_version >= target_version {
                    tracing::debug!(photo_id = %record.photo_id, "already rotated, skipping");
                    continue;
                }

                self.reencrypt_photo(record, &old_key, &new_key, target_version)
                    .await
                    .map_err(|e| {
                        KeyVaultError::RotationFailed(format!(
                            "Batch failed at album {}: {}",
                            album_id, e
                        ))
                    })?;
                items_reencrypted += 1;
            }
        }

        // Phase 2: re-wrap the new key for every member row
        let rows = self
            .store()
            .find_by(collections::ALBUM_KEYS, "albumId", &json!(album_id))
            .await?;

        let mut members_updated = 0usize;
        for doc in &rows {
            if doc.get("staged").and_then(Value::as_bool).unwrap_or(false) {
                continue;
            }
            let user_id = doc
                .get("userId")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| {
                    KeyVaultError::RotationFailed(format!(
                        "Malformed wrapped-key row for album {}",
                        album_id
                    ))
                })?;

            let row = self.wrap_for_member(album_id, user_id, &new_key, target_version)?;
            self.store()
                .set(
                    collections::ALBUM_KEYS,
                    &FamilyAlbumKeyStorage::doc_id(album_id, user_id),
                    serde_json::to_value(&row)?,
                )
                .await?;
            members_updated += 1;
        }

        // Phase 3: bump the album version, then drop the staged row.
        // This order matters: bumping first means a crash in between
        // leaves only a harmless stale staged row, never a completed
        // rotation whose key a re-run would regenerate.
        self.store()
            .update(
                collections::ALBUMS,
                album_id,
                json!({ "version": target_version }),
            )
            .await?;
        self.store()
            .delete(
                collections::ALBUM_KEYS,
                &staged_doc_id(album_id, target_version),
            )
            .await?;

        self.cache().invalidate(album_id);
        self.cache()
            .insert(album_id, AlbumType::Family, new_key);

        let result = KeyRotationResult {
            album_id: album_id.to_string(),
            new_version: target_version,
            items_reencrypted,
            members_updated,
            rotated_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        self.write_audit_record(&result).await;

        tracing::info!(
            album_id,
            new_version = result.new_version,
            items = result.items_reencrypted,
            members = result.members_updated,
            ms = result.duration_ms,
            "key rotation complete"
        );

        Ok(result)
    }

    /// Recover the staged replacement key for an interrupted rotation,
    /// or generate one and persist it wrapped for the owner.
    async fn load_or_stage_rotation_key(
        &self,
        album_id: &str,
        target_version: u32,
    ) -> KeyVaultResult<SecretKey> {
        let doc_id = staged_doc_id(album_id, target_version);

        if let Some(doc) = self.store().get(collections::ALBUM_KEYS, &doc_id).await? {
            let row: FamilyAlbumKeyStorage = serde_json::from_value(doc)?;
            let wrap_key = self.wrap_keys().wrapping_key(self.user_id())?;
            let parts = EncryptedParts::from_record(&row.encrypted())?;
            let aad = row_aad(album_id, self.user_id());
            let key_bytes = crypto::aead::decrypt(&wrap_key, &parts, Some(aad.as_bytes()))?;

            tracing::info!(album_id, target_version, "resuming interrupted rotation");
            return SecretKey::from_slice(&key_bytes);
        }

        let key = SecretKey::generate();
        let row = self.wrap_for_member(album_id, self.user_id(), &key, target_version)?;
        let mut doc = serde_json::to_value(&row)?;
        doc["staged"] = json!(true);
        self.store()
            .set(collections::ALBUM_KEYS, &doc_id, doc)
            .await?;

        Ok(key)
    }

    /// Re-encrypt one photo's blobs and metadata record under the new key.
    ///
    /// New ciphertext goes to version-suffixed paths, and the record
    /// flips to the new paths, IVs, tags and version in a single write.
    /// A crash at any point leaves the record consistent with whichever
    /// blobs it references; a stale versioned blob from an interrupted
    /// run is simply overwritten on the next attempt.
    async fn reencrypt_photo(
        &self,
        record: StoredPhotoRecord,
        old_key: &SecretKey,
        new_key: &SecretKey,
        target_version: u32,
    ) -> KeyVaultResult<()> {
        let mut record = record;
        let old_paths = record.storage_paths.clone();

        let new_photo_path = versioned_path(&old_paths.photo, target_version);
        let new_thumb_path = versioned_path(&old_paths.thumbnail, target_version);

        let photo_ct = self.blobs().download(&old_paths.photo).await?;
        let new_photo = reencrypt_blob(
            &photo_ct,
            &record.ivs.photo,
            &record.auth_tags.photo,
            old_key,
            new_key,
        )?;
        self.blobs()
            .upload(&new_photo_path, &new_photo.ciphertext)
            .await?;

        let thumb_ct = self.blobs().download(&old_paths.thumbnail).await?;
        let new_thumb = reencrypt_blob(
            &thumb_ct,
            &record.ivs.thumbnail,
            &record.auth_tags.thumbnail,
            old_key,
            new_key,
        )?;
        self.blobs()
            .upload(&new_thumb_path, &new_thumb.ciphertext)
            .await?;

        let meta_parts = EncryptedParts::from_record(&record.encrypted_metadata)?;
        let meta_plain = crypto::aead::decrypt(old_key, &meta_parts, None)?;
        let meta_sealed = crypto::aead::encrypt(new_key, &meta_plain, None)?;

        record.storage_paths = StoragePaths {
            photo: new_photo_path,
            thumbnail: new_thumb_path,
        };
        record.ivs.photo = BASE64.encode(new_photo.iv);
        record.auth_tags.photo = BASE64.encode(new_photo.auth_tag);
        record.ivs.thumbnail = BASE64.encode(new_thumb.iv);
        record.auth_tags.thumbnail = BASE64.encode(new_thumb.auth_tag);
        record.encrypted_metadata = meta_sealed.to_record();
        record.ivs.metadata = record.encrypted_metadata.iv.clone();
        record.key_version = target_version;

        self.store()
            .set(
                collections::PHOTOS,
                &record.photo_id.clone(),
                serde_json::to_value(&record)?,
            )
            .await?;

        // The old blobs are dead once the record flipped; a failed
        // delete only leaves an orphan behind
        for path in [&old_paths.photo, &old_paths.thumbnail] {
            if let Err(e) = self.blobs().delete(path).await {
                tracing::warn!(
                    photo_id = %record.photo_id,
                    path = %path,
                    error = %e,
                    "orphaned blob after rotation"
                );
            }
        }

        Ok(())
    }

    /// Audit writes never fail a rotation that already completed
    async fn write_audit_record(&self, result: &KeyRotationResult) {
        let id = format!("{}:v{}", result.album_id, result.new_version);
        let doc = json!({
            "event": "key_rotation",
            "albumId": result.album_id,
            "newVersion": result.new_version,
            "itemsReencrypted": result.items_reencrypted,
            "membersUpdated": result.members_updated,
            "rotatedAt": result.rotated_at,
            "actorId": self.user_id(),
        });

        if let Err(e) = self.store().set(collections::AUDIT, &id, doc).await {
            tracing::warn!(album_id = %result.album_id, error = %e, "audit write failed");
        }
    }
}

/// Decrypt a blob under the old key using its stored IV and tag, then
/// encrypt under the new key with a fresh IV.
fn reencrypt_blob(
    ciphertext: &[u8],
    iv_b64: &str,
    tag_b64: &str,
    old_key: &SecretKey,
    new_key: &SecretKey,
) -> KeyVaultResult<EncryptedParts> {
    let iv = BASE64
        .decode(iv_b64)
        .map_err(|_| KeyVaultError::SerializationError("Invalid IV encoding".into()))?;
    let tag = BASE64
        .decode(tag_b64)
        .map_err(|_| KeyVaultError::SerializationError("Invalid tag encoding".into()))?;

    let parts = EncryptedParts {
        ciphertext: ciphertext.to_vec(),
        iv: iv
            .try_into()
            .map_err(|_| KeyVaultError::SerializationError("IV must be 12 bytes".into()))?,
        auth_tag: tag
            .try_into()
            .map_err(|_| KeyVaultError::SerializationError("Tag must be 16 bytes".into()))?,
    };

    let plaintext = crypto::aead::decrypt(old_key, &parts, None)?;
    crypto::aead::encrypt(new_key, &plaintext, None)
}

fn staged_doc_id(album_id: &str, target_version: u32) -> String {
    format!("{}:staged:v{}", album_id, target_version)
}

/// Blob path for one key version: base path plus a `.v<N>` suffix,
/// replacing any suffix a previous rotation left.
fn versioned_path(path: &str, version: u32) -> String {
    let base = match path.rfind(".v") {
        Some(idx)
            if idx + 2 < path.len()
                && path[idx + 2..].chars().all(|c| c.is_ascii_digit()) =>
        {
            &path[..idx]
        }
        _ => path,
    };
    format!("{}.v{}", base, version)
}
