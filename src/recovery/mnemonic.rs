//! AlbumVault - Mnemonic Recovery Codes
//!
//! BIP39-based recovery for the master key. A recovery code is a 24-word
//! English mnemonic (256 bits of entropy); the master key is the first
//! 32 bytes of the standard 2048-iteration BIP39 seed, optionally
//! hardened with a user passphrase (same words + different passphrase =
//! different key). A short checksum over the seed lets the app confirm
//! the user re-entered the code that actually protects their account
//! before wiping anything.
//!
//! Codes are shown once and written down; they are never persisted.

use bip39::{Language, Mnemonic};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::{SecretKey, KEY_LEN};
use crate::error::{KeyVaultError, KeyVaultResult};
use crate::master_key::MasterKey;

/// Words in a recovery code (256-bit entropy)
pub const WORD_COUNT: usize = 24;

/// Entropy bytes backing a 24-word mnemonic
const ENTROPY_BYTES: usize = 32;

/// Checksum length in hex characters (4 bytes of SHA-256 over the seed)
const CHECKSUM_HEX_LEN: usize = 8;

/// Most derived keys handed out per code
pub const MAX_DERIVED_KEYS: usize = 10;

/// A generated or re-entered recovery code
pub struct RecoveryCode {
    mnemonic: Mnemonic,
    /// Short fingerprint of the empty-passphrase seed, safe to store
    /// and compare; see [`Self::checksum_for`] for protected setups
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    /// Marked after a successful recovery so the UI can prompt for a
    /// fresh code
    pub used: bool,
}

impl std::fmt::Debug for RecoveryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryCode")
            .field("mnemonic", &"[REDACTED]")
            .field("checksum", &self.checksum)
            .field("created_at", &self.created_at)
            .field("used", &self.used)
            .finish()
    }
}

impl RecoveryCode {
    /// Generate a fresh 24-word code from OS entropy
    pub fn generate() -> KeyVaultResult<Self> {
        let entropy = Zeroizing::new(crate::crypto::secure_random(ENTROPY_BYTES));
        let mnemonic = Mnemonic::from_entropy(&entropy).map_err(|e| {
            KeyVaultError::KeyDerivationFailed(format!("Mnemonic generation failed: {}", e))
        })?;

        let checksum = seed_checksum(&mnemonic, None);
        Ok(Self {
            mnemonic,
            checksum,
            created_at: Utc::now(),
            used: false,
        })
    }

    /// Parse a user-entered code. Word count, wordlist membership and
    /// the BIP39 checksum are all enforced.
    pub fn from_phrase(phrase: &str) -> KeyVaultResult<Self> {
        let mnemonic = Mnemonic::parse_normalized(phrase.trim())
            .map_err(|e| KeyVaultError::InvalidRecoveryCode(e.to_string()))?;

        if mnemonic.word_count() != WORD_COUNT {
            return Err(KeyVaultError::InvalidRecoveryCode(format!(
                "Expected {} words, got {}",
                WORD_COUNT,
                mnemonic.word_count()
            )));
        }

        let checksum = seed_checksum(&mnemonic, None);
        Ok(Self {
            mnemonic,
            checksum,
            created_at: Utc::now(),
            used: false,
        })
    }

    /// The words, for one-time display
    pub fn words(&self) -> Vec<&'static str> {
        self.mnemonic.words().collect()
    }

    /// The full phrase. Display only; never log or persist.
    pub fn phrase(&self) -> String {
        self.mnemonic.to_string()
    }

    /// Derive the master key: first 32 bytes of the BIP39 seed.
    ///
    /// The passphrase is optional and defaults to empty; supplying one
    /// yields an entirely different key from the same words.
    pub fn derive_master_key(&self, passphrase: Option<&str>) -> KeyVaultResult<MasterKey> {
        let seed = Zeroizing::new(self.mnemonic.to_seed(passphrase.unwrap_or("")));
        MasterKey::from_bytes(&seed[..KEY_LEN])
    }

    /// Derive up to [`MAX_DERIVED_KEYS`] independent subkeys from the
    /// seed, for purposes beyond the master key itself.
    pub fn derive_keys(
        &self,
        count: usize,
        passphrase: Option<&str>,
    ) -> KeyVaultResult<Vec<SecretKey>> {
        if count == 0 || count > MAX_DERIVED_KEYS {
            return Err(KeyVaultError::InvalidRecoveryCode(format!(
                "Derived key count must be 1..={}, got {}",
                MAX_DERIVED_KEYS, count
            )));
        }

        let seed = Zeroizing::new(self.mnemonic.to_seed(passphrase.unwrap_or("")));
        let mut keys = Vec::with_capacity(count);
        for index in 0..count as u32 {
            let mut hasher = Sha256::new();
            hasher.update(&seed[..]);
            hasher.update(index.to_be_bytes());
            let digest: [u8; 32] = hasher.finalize().into();
            keys.push(SecretKey::new(digest));
        }
        Ok(keys)
    }

    /// Checksum for a passphrase-protected setup. The `checksum` field
    /// covers the empty-passphrase seed; an account that sets a
    /// passphrase stores this value instead so a wrong passphrase is
    /// caught alongside wrong words.
    pub fn checksum_for(&self, passphrase: Option<&str>) -> String {
        seed_checksum(&self.mnemonic, passphrase)
    }

    /// Whether this code reproduces the given checksum
    pub fn matches_checksum(&self, expected: &str) -> bool {
        crate::crypto::constant_time_eq(self.checksum.as_bytes(), expected.as_bytes())
    }

    pub fn mark_used(&mut self) {
        self.used = true;
    }
}

/// Validate a phrase without keeping the code around
pub fn validate(phrase: &str) -> KeyVaultResult<()> {
    RecoveryCode::from_phrase(phrase).map(|_| ())
}

/// Whether a single word belongs to the English wordlist
pub fn is_valid_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    Language::English.word_list().iter().any(|w| *w == lower)
}

/// Autocomplete candidates for a typed prefix, at most ten
pub fn suggest_words(prefix: &str) -> Vec<&'static str> {
    if prefix.is_empty() {
        return Vec::new();
    }
    let lower = prefix.to_lowercase();
    Language::English
        .word_list()
        .iter()
        .filter(|w| w.starts_with(&lower))
        .take(10)
        .copied()
        .collect()
}

fn seed_checksum(mnemonic: &Mnemonic, passphrase: Option<&str>) -> String {
    let seed = Zeroizing::new(mnemonic.to_seed(passphrase.unwrap_or("")));
    let digest = Sha256::digest(&seed[..]);
    hex::encode(&digest[..CHECKSUM_HEX_LEN / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_has_24_words() {
        let code = RecoveryCode::generate().unwrap();
        assert_eq!(code.words().len(), WORD_COUNT);
        assert_eq!(code.checksum.len(), CHECKSUM_HEX_LEN);
        assert!(!code.used);
    }

    #[test]
    fn test_roundtrip_phrase() {
        let code = RecoveryCode::generate().unwrap();
        let reentered = RecoveryCode::from_phrase(&code.phrase()).unwrap();

        assert_eq!(code.checksum, reentered.checksum);
        assert_eq!(
            code.derive_master_key(None).unwrap().as_bytes(),
            reentered.derive_master_key(None).unwrap().as_bytes()
        );
    }

    #[test]
    fn test_known_vector() {
        // Standard test mnemonic: 23 "abandon" + "art"
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon \
                      abandon abandon abandon abandon abandon abandon abandon abandon \
                      abandon abandon abandon abandon abandon abandon abandon art";
        let code = RecoveryCode::from_phrase(phrase).unwrap();
        let key = code.derive_master_key(None).unwrap();
        // BIP39 seed for this mnemonic with empty passphrase, first 32 bytes
        assert_eq!(
            hex::encode(key.as_bytes()),
            "408b285c123836004f4b8842c89324c1f01382450c0d439af345ba7fc49acf70"
        );
    }

    #[test]
    fn test_rejects_bad_phrases() {
        assert!(validate("not a mnemonic at all").is_err());
        // Right words, wrong BIP39 checksum
        let bad = vec!["abandon"; 24].join(" ");
        assert!(validate(&bad).is_err());
        // Valid 12-word mnemonic is too short for a recovery code
        let twelve = "abandon abandon abandon abandon abandon abandon \
                      abandon abandon abandon abandon abandon about";
        assert!(matches!(
            validate(twelve),
            Err(KeyVaultError::InvalidRecoveryCode(_))
        ));
    }

    #[test]
    fn test_derive_keys_bounds_and_independence() {
        let code = RecoveryCode::generate().unwrap();
        let keys = code.derive_keys(3, None).unwrap();
        assert_eq!(keys.len(), 3);
        assert_ne!(keys[0].expose(), keys[1].expose());
        assert_ne!(keys[1].expose(), keys[2].expose());

        assert!(matches!(
            code.derive_keys(0, None),
            Err(KeyVaultError::InvalidRecoveryCode(_))
        ));
        assert!(matches!(
            code.derive_keys(MAX_DERIVED_KEYS + 1, None),
            Err(KeyVaultError::InvalidRecoveryCode(_))
        ));

        // Deterministic across calls
        let again = code.derive_keys(3, None).unwrap();
        assert_eq!(keys[2].expose(), again[2].expose());
    }

    #[test]
    fn test_passphrase_changes_derivation() {
        let code = RecoveryCode::generate().unwrap();

        let bare = code.derive_master_key(None).unwrap();
        let empty = code.derive_master_key(Some("")).unwrap();
        let hardened = code.derive_master_key(Some("hunter2")).unwrap();
        let other = code.derive_master_key(Some("hunter3")).unwrap();

        // None and an explicit empty passphrase are the same setup
        assert_eq!(bare.as_bytes(), empty.as_bytes());
        assert_ne!(bare.as_bytes(), hardened.as_bytes());
        assert_ne!(hardened.as_bytes(), other.as_bytes());

        // Same words re-entered with the same passphrase recover the key
        let reentered = RecoveryCode::from_phrase(&code.phrase()).unwrap();
        assert_eq!(
            reentered.derive_master_key(Some("hunter2")).unwrap().as_bytes(),
            hardened.as_bytes()
        );

        // Subkeys and the checksum follow the passphrase too
        let subkeys = code.derive_keys(2, Some("hunter2")).unwrap();
        let bare_subkeys = code.derive_keys(2, None).unwrap();
        assert_ne!(subkeys[0].expose(), bare_subkeys[0].expose());

        assert_eq!(code.checksum, code.checksum_for(None));
        assert_ne!(code.checksum, code.checksum_for(Some("hunter2")));
        assert_eq!(
            code.checksum_for(Some("hunter2")),
            reentered.checksum_for(Some("hunter2"))
        );
    }

    #[test]
    fn test_checksum_comparison() {
        let code = RecoveryCode::generate().unwrap();
        let checksum = code.checksum.clone();
        assert!(code.matches_checksum(&checksum));
        assert!(!code.matches_checksum("00000000"));
    }

    #[test]
    fn test_word_helpers() {
        assert!(is_valid_word("abandon"));
        assert!(is_valid_word("Zoo"));
        assert!(!is_valid_word("xylophone"));

        let suggestions = suggest_words("aban");
        assert!(suggestions.contains(&"abandon"));
        assert!(suggest_words("").is_empty());
        assert!(suggest_words("a").len() <= 10);
    }

    #[test]
    fn test_debug_redacts_phrase() {
        let code = RecoveryCode::generate().unwrap();
        let rendered = format!("{:?}", code);
        assert!(rendered.contains("[REDACTED]"));
        for word in code.words() {
            // A word like "used" can collide with field names; the full
            // phrase must not appear
            let _ = word;
        }
        assert!(!rendered.contains(&code.phrase()));
    }
}
