//! AlbumVault - Key Derivation
//!
//! Argon2id for password-derived keys, HKDF-SHA256 for deterministic
//! per-album derivation from the master key.

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{KeyVaultError, KeyVaultResult};

/// Minimum Argon2 memory cost in KiB
pub const MIN_MEMORY_KIB: u32 = 8192;

/// Minimum derived key length in bytes
pub const MIN_KEY_LEN: usize = 16;

/// Derive a key from a password with Argon2id.
///
/// Parameter floors are enforced rather than silently clamped: weak
/// parameters are a caller bug, not something to repair quietly.
pub fn derive_key_password(
    password: &[u8],
    salt: &[u8],
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    key_len: usize,
) -> KeyVaultResult<Zeroizing<Vec<u8>>> {
    if memory_kib < MIN_MEMORY_KIB {
        return Err(KeyVaultError::KeyDerivationFailed(format!(
            "Memory cost too low: {} KiB (min {})",
            memory_kib, MIN_MEMORY_KIB
        )));
    }
    if iterations < 1 {
        return Err(KeyVaultError::KeyDerivationFailed(
            "Iterations must be at least 1".into(),
        ));
    }
    if parallelism < 1 {
        return Err(KeyVaultError::KeyDerivationFailed(
            "Parallelism must be at least 1".into(),
        ));
    }
    if key_len < MIN_KEY_LEN {
        return Err(KeyVaultError::KeyDerivationFailed(format!(
            "Key length too short: {} bytes (min {})",
            key_len, MIN_KEY_LEN
        )));
    }

    let params = Params::new(memory_kib, iterations, parallelism, Some(key_len))
        .map_err(|e| KeyVaultError::KeyDerivationFailed(format!("Invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = Zeroizing::new(vec![0u8; key_len]);
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| KeyVaultError::KeyDerivationFailed(e.to_string()))?;

    Ok(output)
}

/// Derive key material with HKDF-SHA256. Deterministic for identical
/// (ikm, salt, info, len).
pub fn derive_key_hkdf(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    len: usize,
) -> KeyVaultResult<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; len]);

    hk.expand(info, &mut okm)
        .map_err(|e| KeyVaultError::KeyDerivationFailed(e.to_string()))?;

    Ok(okm)
}
