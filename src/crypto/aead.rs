//! AlbumVault - AEAD Encryption
//!
//! AES-256-GCM for album content, metadata and key wrapping. Every call
//! draws a fresh random 96-bit IV; the 128-bit tag is kept separate from
//! the ciphertext body so persisted records can carry it as its own field.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use super::{generate_iv, SecretKey, IV_LEN, TAG_LEN};
use crate::error::{KeyVaultError, KeyVaultResult};

/// Output of an AEAD encryption: ciphertext body, IV and auth tag
#[derive(Clone)]
pub struct EncryptedParts {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LEN],
    pub auth_tag: [u8; TAG_LEN],
}

/// Base64 form of `EncryptedParts` as persisted in storage documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRecord {
    pub ciphertext: String,
    pub iv: String,
    pub auth_tag: String,
}

impl EncryptedParts {
    /// Serialize to bytes (iv || ciphertext || tag)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_LEN + self.ciphertext.len() + TAG_LEN);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.auth_tag);
        out
    }

    /// Deserialize from bytes (iv || ciphertext || tag)
    pub fn from_bytes(data: &[u8]) -> KeyVaultResult<Self> {
        if data.len() < IV_LEN + TAG_LEN {
            return Err(KeyVaultError::DecryptionFailed("Data too short".into()));
        }

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&data[..IV_LEN]);

        let tag_start = data.len() - TAG_LEN;
        let mut auth_tag = [0u8; TAG_LEN];
        auth_tag.copy_from_slice(&data[tag_start..]);

        Ok(Self {
            iv,
            ciphertext: data[IV_LEN..tag_start].to_vec(),
            auth_tag,
        })
    }

    /// Convert to the base64 record shape used in persisted documents
    pub fn to_record(&self) -> EncryptedRecord {
        EncryptedRecord {
            ciphertext: BASE64.encode(&self.ciphertext),
            iv: BASE64.encode(self.iv),
            auth_tag: BASE64.encode(self.auth_tag),
        }
    }

    /// Parse from the base64 record shape
    pub fn from_record(record: &EncryptedRecord) -> KeyVaultResult<Self> {
        let decode = |field: &str, value: &str| {
            BASE64.decode(value).map_err(|_| {
                KeyVaultError::SerializationError(format!("Invalid base64 in field {}", field))
            })
        };

        let iv_bytes = decode("iv", &record.iv)?;
        let tag_bytes = decode("authTag", &record.auth_tag)?;

        let iv: [u8; IV_LEN] = iv_bytes
            .try_into()
            .map_err(|_| KeyVaultError::DecryptionFailed("Invalid IV length".into()))?;
        let auth_tag: [u8; TAG_LEN] = tag_bytes
            .try_into()
            .map_err(|_| KeyVaultError::DecryptionFailed("Invalid tag length".into()))?;

        Ok(Self {
            ciphertext: decode("ciphertext", &record.ciphertext)?,
            iv,
            auth_tag,
        })
    }
}

/// Encrypt with AES-256-GCM. AAD is optional and must match on decrypt.
pub fn encrypt(
    key: &SecretKey,
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> KeyVaultResult<EncryptedParts> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| KeyVaultError::EncryptionFailed(e.to_string()))?;

    let iv = generate_iv();
    let nonce = Nonce::from_slice(&iv);

    let payload = Payload {
        msg: plaintext,
        aad: aad.unwrap_or(b""),
    };

    // aes-gcm appends the tag to the ciphertext; split it off
    let mut combined = cipher
        .encrypt(nonce, payload)
        .map_err(|e| KeyVaultError::EncryptionFailed(e.to_string()))?;

    let tag_start = combined.len() - TAG_LEN;
    let mut auth_tag = [0u8; TAG_LEN];
    auth_tag.copy_from_slice(&combined[tag_start..]);
    combined.truncate(tag_start);

    Ok(EncryptedParts {
        ciphertext: combined,
        iv,
        auth_tag,
    })
}

/// Decrypt with AES-256-GCM. Fails if ciphertext, IV, tag or AAD were
/// altered; never returns partial plaintext.
pub fn decrypt(
    key: &SecretKey,
    parts: &EncryptedParts,
    aad: Option<&[u8]>,
) -> KeyVaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| KeyVaultError::DecryptionFailed(e.to_string()))?;

    let nonce = Nonce::from_slice(&parts.iv);

    let mut combined = Vec::with_capacity(parts.ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(&parts.ciphertext);
    combined.extend_from_slice(&parts.auth_tag);

    let payload = Payload {
        msg: &combined,
        aad: aad.unwrap_or(b""),
    };

    cipher
        .decrypt(nonce, payload)
        .map_err(|_| KeyVaultError::DecryptionFailed("Authentication failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = SecretKey::generate();
        let plaintext = b"Trip to the lake, June 2025";

        let parts = encrypt(&key, plaintext, None).unwrap();
        let decrypted = decrypt(&key, &parts, None).unwrap();

        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn test_roundtrip_with_aad() {
        let key = SecretKey::generate();

        let parts = encrypt(&key, b"album name", Some(b"album-42")).unwrap();
        let decrypted = decrypt(&key, &parts, Some(b"album-42")).unwrap();
        assert_eq!(decrypted, b"album name");

        // Mismatched AAD must fail
        assert!(decrypt(&key, &parts, Some(b"album-43")).is_err());
        assert!(decrypt(&key, &parts, None).is_err());
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = SecretKey::generate();
        let a = encrypt(&key, b"same plaintext", None).unwrap();
        let b = encrypt(&key, b"same plaintext", None).unwrap();

        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_single_bit_flip_fails() {
        let key = SecretKey::generate();
        let parts = encrypt(&key, b"integrity matters", None).unwrap();

        let mut tampered = parts.clone();
        tampered.ciphertext[0] ^= 0x01;
        assert!(decrypt(&key, &tampered, None).is_err());

        let mut tampered = parts.clone();
        tampered.iv[0] ^= 0x01;
        assert!(decrypt(&key, &tampered, None).is_err());

        let mut tampered = parts.clone();
        tampered.auth_tag[0] ^= 0x01;
        assert!(decrypt(&key, &tampered, None).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let parts = encrypt(&SecretKey::generate(), b"secret", None).unwrap();
        assert!(decrypt(&SecretKey::generate(), &parts, None).is_err());
    }

    #[test]
    fn test_record_conversion() {
        let key = SecretKey::generate();
        let parts = encrypt(&key, b"persisted blob", None).unwrap();

        let record = parts.to_record();
        let restored = EncryptedParts::from_record(&record).unwrap();

        assert_eq!(decrypt(&key, &restored, None).unwrap(), b"persisted blob");
    }

    #[test]
    fn test_bytes_roundtrip() {
        let key = SecretKey::generate();
        let parts = encrypt(&key, b"wire form", None).unwrap();

        let restored = EncryptedParts::from_bytes(&parts.to_bytes()).unwrap();
        assert_eq!(decrypt(&key, &restored, None).unwrap(), b"wire form");
    }

    #[test]
    fn test_from_bytes_too_short() {
        assert!(EncryptedParts::from_bytes(&[0u8; 10]).is_err());
    }
}
