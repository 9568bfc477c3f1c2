//! AlbumVault - AI Consent Gate
//!
//! Per-album consent for AI features on Family albums. The gate owns the
//! consent records; AlbumKeyManager's policy layer consults it, the UI
//! never does directly. Private albums are never AI-eligible regardless
//! of any record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::album::types::{collections, AlbumType};
use crate::error::KeyVaultResult;
use crate::external::PersistentStore;

/// Current consent policy version. Bumping this invalidates every
/// existing record and forces re-consent after a policy change.
pub const CONSENT_POLICY_VERSION: u32 = 2;

/// AI features a member can consent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AiFeature {
    FaceGrouping,
    ObjectSearch,
    AutoCaptioning,
}

/// Persisted per-album consent record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub album_id: String,
    pub features: Vec<AiFeature>,
    pub consented_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub consent_version: u32,
}

/// Consent gate over persisted records
pub struct ConsentGate {
    store: Arc<dyn PersistentStore>,
}

impl ConsentGate {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Record consent for a set of features at the current policy version
    pub async fn grant(
        &self,
        album_id: &str,
        features: &[AiFeature],
        expires_at: Option<DateTime<Utc>>,
    ) -> KeyVaultResult<ConsentRecord> {
        let record = ConsentRecord {
            album_id: album_id.to_string(),
            features: features.to_vec(),
            consented_at: Utc::now(),
            revoked_at: None,
            expires_at,
            consent_version: CONSENT_POLICY_VERSION,
        };

        self.store
            .set(
                collections::CONSENT,
                album_id,
                serde_json::to_value(&record)?,
            )
            .await?;

        tracing::info!(album_id, ?features, "AI consent granted");
        Ok(record)
    }

    /// Revoke consent for an album
    pub async fn revoke(&self, album_id: &str) -> KeyVaultResult<()> {
        let Some(doc) = self.store.get(collections::CONSENT, album_id).await? else {
            return Ok(());
        };

        let mut record: ConsentRecord = serde_json::from_value(doc)?;
        record.revoked_at = Some(Utc::now());

        self.store
            .set(
                collections::CONSENT,
                album_id,
                serde_json::to_value(&record)?,
            )
            .await?;

        tracing::info!(album_id, "AI consent revoked");
        Ok(())
    }

    /// Fetch the stored record, if any
    pub async fn get(&self, album_id: &str) -> KeyVaultResult<Option<ConsentRecord>> {
        match self.store.get(collections::CONSENT, album_id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// A record is valid only if not revoked, not expired and issued
    /// under the current policy version.
    pub fn is_valid(&self, record: &ConsentRecord) -> bool {
        if record.revoked_at.is_some() {
            return false;
        }
        if let Some(expires) = record.expires_at {
            if Utc::now() >= expires {
                return false;
            }
        }
        record.consent_version == CONSENT_POLICY_VERSION
    }

    /// Whether an AI feature may run on this album. Private albums are
    /// unconditionally ineligible.
    pub async fn can_use_ai(
        &self,
        album_id: &str,
        tier: AlbumType,
        feature: AiFeature,
    ) -> KeyVaultResult<bool> {
        if tier == AlbumType::Private {
            return Ok(false);
        }

        let Some(record) = self.get(album_id).await? else {
            return Ok(false);
        };

        Ok(self.is_valid(&record) && record.features.contains(&feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::MemoryStore;
    use chrono::Duration;

    fn gate() -> ConsentGate {
        ConsentGate::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_grant_and_check() {
        let gate = gate();
        gate.grant("a1", &[AiFeature::FaceGrouping], None)
            .await
            .unwrap();

        assert!(gate
            .can_use_ai("a1", AlbumType::Family, AiFeature::FaceGrouping)
            .await
            .unwrap());
        // Feature-specific: ungranted features stay off
        assert!(!gate
            .can_use_ai("a1", AlbumType::Family, AiFeature::ObjectSearch)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_private_always_denied() {
        let gate = gate();
        gate.grant("a1", &[AiFeature::FaceGrouping], None)
            .await
            .unwrap();

        assert!(!gate
            .can_use_ai("a1", AlbumType::Private, AiFeature::FaceGrouping)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_revoked_invalid() {
        let gate = gate();
        gate.grant("a1", &[AiFeature::FaceGrouping], None)
            .await
            .unwrap();
        gate.revoke("a1").await.unwrap();

        assert!(!gate
            .can_use_ai("a1", AlbumType::Family, AiFeature::FaceGrouping)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_expired_invalid() {
        let gate = gate();
        gate.grant(
            "a1",
            &[AiFeature::FaceGrouping],
            Some(Utc::now() - Duration::seconds(1)),
        )
        .await
        .unwrap();

        assert!(!gate
            .can_use_ai("a1", AlbumType::Family, AiFeature::FaceGrouping)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_stale_policy_version_invalid() {
        let gate = gate();
        let mut record = gate
            .grant("a1", &[AiFeature::FaceGrouping], None)
            .await
            .unwrap();

        record.consent_version = CONSENT_POLICY_VERSION - 1;
        assert!(!gate.is_valid(&record));
    }

    #[tokio::test]
    async fn test_no_record_denied() {
        let gate = gate();
        assert!(!gate
            .can_use_ai("a1", AlbumType::Family, AiFeature::FaceGrouping)
            .await
            .unwrap());
    }
}
