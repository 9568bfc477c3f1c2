//! AlbumVault - Asymmetric Key Wrapping
//!
//! X25519 ephemeral-static sealed box: DH against the recipient's static
//! public key, HKDF-SHA256 to an AEAD key, AES-256-GCM over the payload.
//! Intended for wrapping key material only, never bulk data; a hard
//! plaintext ceiling enforces that.

use rand::rngs::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use super::{aead, derive_key_hkdf, EncryptedParts, SecretKey, KEY_LEN};
use crate::error::{KeyVaultError, KeyVaultResult};

/// Maximum plaintext accepted by `seal` (key-wrapping ceiling)
pub const MAX_SEAL_PLAINTEXT: usize = 190;

/// X25519 public key length
pub const PUBLIC_KEY_LEN: usize = 32;

const WRAP_INFO: &[u8] = b"albumvault:asym:wrap:v1";

/// Generate a static X25519 keypair. Returns (secret, public) where the
/// public half is safe to publish for members to wrap keys to.
pub fn generate_keypair() -> (StaticSecret, [u8; PUBLIC_KEY_LEN]) {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    (secret, public.to_bytes())
}

/// Seal a small plaintext to a recipient's public key.
///
/// Output layout: ephemeral_pub(32) || iv(12) || ciphertext || tag(16).
pub fn seal(plaintext: &[u8], recipient_pub: &[u8; PUBLIC_KEY_LEN]) -> KeyVaultResult<Vec<u8>> {
    if plaintext.len() > MAX_SEAL_PLAINTEXT {
        return Err(KeyVaultError::EncryptionFailed(format!(
            "Plaintext too large for key wrapping: {} bytes (max {})",
            plaintext.len(),
            MAX_SEAL_PLAINTEXT
        )));
    }

    let eph_secret = EphemeralSecret::random_from_rng(OsRng);
    let eph_public = PublicKey::from(&eph_secret);

    let recipient = PublicKey::from(*recipient_pub);
    let shared = eph_secret.diffie_hellman(&recipient);

    let wrap_key = derive_wrap_key(shared.as_bytes(), eph_public.as_bytes(), recipient_pub)?;
    // AAD binds the ciphertext to the ephemeral key that produced it
    let parts = aead::encrypt(&wrap_key, plaintext, Some(eph_public.as_bytes()))?;

    let mut out = Vec::with_capacity(PUBLIC_KEY_LEN + parts.to_bytes().len());
    out.extend_from_slice(eph_public.as_bytes());
    out.extend_from_slice(&parts.to_bytes());
    Ok(out)
}

/// Open a sealed payload with the recipient's static secret.
pub fn unseal(sealed: &[u8], secret: &StaticSecret) -> KeyVaultResult<Vec<u8>> {
    if sealed.len() < PUBLIC_KEY_LEN {
        return Err(KeyVaultError::DecryptionFailed("Sealed data too short".into()));
    }

    let mut eph_pub_bytes = [0u8; PUBLIC_KEY_LEN];
    eph_pub_bytes.copy_from_slice(&sealed[..PUBLIC_KEY_LEN]);
    let eph_public = PublicKey::from(eph_pub_bytes);

    let shared = secret.diffie_hellman(&eph_public);
    let own_public = PublicKey::from(secret);

    let wrap_key = derive_wrap_key(shared.as_bytes(), &eph_pub_bytes, own_public.as_bytes())?;
    let parts = EncryptedParts::from_bytes(&sealed[PUBLIC_KEY_LEN..])?;

    aead::decrypt(&wrap_key, &parts, Some(&eph_pub_bytes))
}

fn derive_wrap_key(
    shared: &[u8],
    eph_pub: &[u8],
    recipient_pub: &[u8],
) -> KeyVaultResult<SecretKey> {
    // Salt over both public halves so the wrap key is bound to this exchange
    let mut salt = Vec::with_capacity(eph_pub.len() + recipient_pub.len());
    salt.extend_from_slice(eph_pub);
    salt.extend_from_slice(recipient_pub);

    let okm = derive_key_hkdf(shared, &salt, WRAP_INFO, KEY_LEN)?;
    SecretKey::from_slice(&okm)
}
