//! AlbumVault - Shamir Threshold Recovery
//!
//! t-of-n secret sharing over GF(256) with the AES polynomial 0x11b,
//! one polynomial per secret byte, shares evaluated at x = share id and
//! the secret recovered by Lagrange interpolation at x = 0.
//!
//! Reconstruction from shares of a different split, or from fewer than
//! `t` distinct shares, cannot be detected at this layer when the share
//! parameters happen to agree; it yields a well-formed wrong secret.
//! Callers that need to know pair the split with an external checksum,
//! as the mnemonic recovery path does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{KeyVaultError, KeyVaultResult};

/// Smallest useful threshold; a 1-of-n split is just n copies
pub const MIN_THRESHOLD: u8 = 2;
/// Share ids are GF(256) x-coordinates starting at 1
pub const MAX_SHARES: u8 = 16;

/// One share of a split secret
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShamirShare {
    /// x-coordinate, 1-based and unique within a split
    pub share_id: u8,
    /// y-values, one byte per secret byte
    pub data: Vec<u8>,
    pub threshold: u8,
    pub total_shares: u8,
    /// What this split protects, e.g. "master-key"
    pub purpose: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for ShamirShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShamirShare")
            .field("share_id", &self.share_id)
            .field("data", &"[REDACTED]")
            .field("threshold", &self.threshold)
            .field("total_shares", &self.total_shares)
            .field("purpose", &self.purpose)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// GF(256) ARITHMETIC
// ═══════════════════════════════════════════════════════════════════════════

fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    for _ in 0..8 {
        if b & 1 == 1 {
            p ^= a;
        }
        let hi = a & 0x80;
        a <<= 1;
        if hi != 0 {
            // reduce by the AES polynomial, high bit dropped in u8
            a ^= 0x1b;
        }
        b >>= 1;
    }
    p
}

fn gf_pow(mut a: u8, mut e: u8) -> u8 {
    let mut r = 1u8;
    while e > 0 {
        if e & 1 == 1 {
            r = gf_mul(r, a);
        }
        a = gf_mul(a, a);
        e >>= 1;
    }
    r
}

/// a^254 = a^-1; zero has no inverse
fn gf_inv(a: u8) -> KeyVaultResult<u8> {
    if a == 0 {
        return Err(KeyVaultError::ReconstructionFailed(
            "Zero denominator in interpolation".into(),
        ));
    }
    Ok(gf_pow(a, 254))
}

// ═══════════════════════════════════════════════════════════════════════════
// SPLIT / RECONSTRUCT
// ═══════════════════════════════════════════════════════════════════════════

/// Split `secret` into `total` shares requiring `threshold` to recover
pub fn split(
    secret: &[u8],
    threshold: u8,
    total: u8,
    purpose: &str,
) -> KeyVaultResult<Vec<ShamirShare>> {
    if secret.is_empty() {
        return Err(KeyVaultError::InvalidShare("Secret must not be empty".into()));
    }
    if threshold < MIN_THRESHOLD || total > MAX_SHARES || threshold > total {
        return Err(KeyVaultError::InvalidShare(format!(
            "Invalid split parameters: {}-of-{}",
            threshold, total
        )));
    }

    // One random polynomial of degree threshold-1 per secret byte,
    // constant term = the secret byte
    let mut coeffs: Vec<Vec<u8>> = Vec::with_capacity(secret.len());
    for &byte in secret {
        let mut poly = crate::crypto::secure_random((threshold as usize) - 1);
        poly.insert(0, byte);
        coeffs.push(poly);
    }

    let created_at = Utc::now();
    let mut shares = Vec::with_capacity(total as usize);
    for x in 1..=total {
        let mut data = Vec::with_capacity(secret.len());
        for poly in &coeffs {
            let mut acc = 0u8;
            let mut xp = 1u8;
            for &c in poly {
                acc ^= gf_mul(c, xp);
                xp = gf_mul(xp, x);
            }
            data.push(acc);
        }
        shares.push(ShamirShare {
            share_id: x,
            data,
            threshold,
            total_shares: total,
            purpose: purpose.to_string(),
            created_at,
        });
    }

    for poly in &mut coeffs {
        crate::crypto::wipe(poly);
    }

    Ok(shares)
}

/// Recover the secret from at least `threshold` shares of one split
pub fn reconstruct(shares: &[ShamirShare]) -> KeyVaultResult<Vec<u8>> {
    let first = shares.first().ok_or(KeyVaultError::InsufficientShares {
        required: MIN_THRESHOLD as usize,
        provided: 0,
    })?;

    if shares.len() < first.threshold as usize {
        return Err(KeyVaultError::InsufficientShares {
            required: first.threshold as usize,
            provided: shares.len(),
        });
    }

    verify_shares_compatible(shares)?;

    // Lagrange interpolation at x = 0 over the first `threshold` shares
    let used = &shares[..first.threshold as usize];
    let len = first.data.len();
    let mut secret = vec![0u8; len];

    for (i, share) in used.iter().enumerate() {
        // basis_i(0) = prod_{j != i} x_j / (x_j - x_i); subtraction is XOR
        let mut basis = 1u8;
        for (j, other) in used.iter().enumerate() {
            if i == j {
                continue;
            }
            let num = other.share_id;
            let den = gf_inv(other.share_id ^ share.share_id)?;
            basis = gf_mul(basis, gf_mul(num, den));
        }
        for (b, out) in secret.iter_mut().enumerate().take(len) {
            *out ^= gf_mul(share.data[b], basis);
        }
    }

    Ok(secret)
}

/// Structural checks on one share
pub fn verify_share(share: &ShamirShare) -> KeyVaultResult<()> {
    if share.share_id == 0 || share.share_id > share.total_shares {
        return Err(KeyVaultError::InvalidShare(format!(
            "Share id {} out of range for a {}-share split",
            share.share_id, share.total_shares
        )));
    }
    if share.data.is_empty() {
        return Err(KeyVaultError::InvalidShare("Share carries no data".into()));
    }
    if share.threshold < MIN_THRESHOLD || share.threshold > share.total_shares {
        return Err(KeyVaultError::InvalidShare(format!(
            "Share declares invalid parameters: {}-of-{}",
            share.threshold, share.total_shares
        )));
    }
    Ok(())
}

/// Checks that a set of shares plausibly belongs to one split: same
/// parameters and length, distinct in-range ids.
pub fn verify_shares_compatible(shares: &[ShamirShare]) -> KeyVaultResult<()> {
    let first = shares
        .first()
        .ok_or_else(|| KeyVaultError::InvalidShare("No shares provided".into()))?;

    let mut seen = HashSet::new();
    for share in shares {
        verify_share(share)?;
        if share.threshold != first.threshold
            || share.total_shares != first.total_shares
            || share.purpose != first.purpose
            || share.data.len() != first.data.len()
        {
            return Err(KeyVaultError::ReconstructionFailed(
                "Shares belong to different splits".into(),
            ));
        }
        if !seen.insert(share.share_id) {
            return Err(KeyVaultError::ReconstructionFailed(format!(
                "Duplicate share id {}",
                share.share_id
            )));
        }
    }
    Ok(())
}
