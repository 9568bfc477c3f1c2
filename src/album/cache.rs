//! AlbumVault - Session Key Cache
//!
//! Explicit session-scoped cache for unwrapped/derived album keys,
//! passed into the manager by dependency injection. `clear()` is tied to
//! sign-out; entries are never serialized.
//!
//! Concurrent lookups that race on the same album are safe: Private
//! derivation is deterministic and Family unwrap is a pure function of
//! the stored row, so duplicated work only wastes cycles.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::album::types::AlbumType;
use crate::crypto::SecretKey;

/// One cached album key
pub struct CachedAlbumKey {
    pub album_id: String,
    pub tier: AlbumType,
    pub key: SecretKey,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Session-scoped album key cache
#[derive(Default)]
pub struct SessionKeyCache {
    entries: RwLock<HashMap<String, CachedAlbumKey>>,
}

impl SessionKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached key, touching `last_used`
    pub fn get(&self, album_id: &str) -> Option<SecretKey> {
        let mut entries = self.entries.write();
        entries.get_mut(album_id).map(|e| {
            e.last_used = Utc::now();
            e.key.clone()
        })
    }

    pub fn insert(&self, album_id: &str, tier: AlbumType, key: SecretKey) {
        let now = Utc::now();
        self.entries.write().insert(
            album_id.to_string(),
            CachedAlbumKey {
                album_id: album_id.to_string(),
                tier,
                key,
                created_at: now,
                last_used: now,
            },
        );
    }

    /// Drop one album's key (e.g. after rotation or membership change)
    pub fn invalidate(&self, album_id: &str) {
        self.entries.write().remove(album_id);
    }

    /// Drop everything. Called on sign-out; keys zeroize on drop.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
