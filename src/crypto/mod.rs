//! AlbumVault - Cryptographic Core
//!
//! Primitives for the key management subsystem: AEAD, password and HKDF
//! derivation, asymmetric key wrapping, hashing/HMAC and secure random.

pub mod aead;
pub mod asym;
pub mod kdf;

pub use aead::{decrypt, encrypt, EncryptedParts, EncryptedRecord};
pub use asym::{generate_keypair, seal, unseal, MAX_SEAL_PLAINTEXT};
pub use kdf::{derive_key_hkdf, derive_key_password};

use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeyVaultError, KeyVaultResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// IV length for AES-GCM (96 bits)
pub const IV_LEN: usize = 12;

/// Authentication tag length for AES-GCM (128 bits)
pub const TAG_LEN: usize = 16;

/// Minimum salt length for derivation records
pub const SALT_LEN: usize = 16;

/// Secure 256-bit key wrapper with automatic zeroization
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecretKey {
    #[zeroize(skip)]
    inner: Secret<[u8; KEY_LEN]>,
}

impl SecretKey {
    /// Create a key from raw bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Create a key from a slice, rejecting wrong lengths
    pub fn from_slice(bytes: &[u8]) -> KeyVaultResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(KeyVaultError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self::new(key))
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }
}

// Prevent accidental logging of key material
impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 hash
pub fn hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// HMAC-SHA256 over data
pub fn hmac_sha256(key: &SecretKey, data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key.expose())
        .expect("HMAC key length is always valid");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Constant-time equality. Length mismatch returns false early;
/// lengths are not secret here, only contents.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Generate n cryptographically secure random bytes
pub fn secure_random(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a random salt for derivation records
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Generate a random IV for AES-GCM
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Best-effort wipe of a byte buffer
pub fn wipe(bytes: &mut [u8]) {
    bytes.zeroize();
}
