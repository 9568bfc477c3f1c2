//! AlbumVault - Master Key Recovery
//!
//! Two independent recovery paths for the master key:
//!
//! - [`shamir`]: t-of-n threshold shares for social or multi-device
//!   recovery
//! - [`mnemonic`]: a 24-word BIP39 code the user writes down
//!
//! Both paths reproduce the exact master key bytes; neither stores key
//! material anywhere.

pub mod mnemonic;
pub mod shamir;

pub use mnemonic::{RecoveryCode, MAX_DERIVED_KEYS, WORD_COUNT};
pub use shamir::{reconstruct, split, verify_share, ShamirShare, MAX_SHARES, MIN_THRESHOLD};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master_key::MasterKey;

    #[test]
    fn test_shamir_recovers_master_key() {
        let master = MasterKey::generate();
        let shares = split(master.as_bytes(), 3, 5, "master-key").unwrap();

        let recovered = reconstruct(&shares[1..4]).unwrap();
        assert_eq!(recovered.as_slice(), master.as_bytes());
    }

    #[test]
    fn test_mnemonic_recovers_master_key() {
        let code = RecoveryCode::generate().unwrap();
        let master = code.derive_master_key(None).unwrap();

        let reentered = RecoveryCode::from_phrase(&code.phrase()).unwrap();
        assert!(reentered.matches_checksum(&code.checksum));
        assert_eq!(
            reentered.derive_master_key(None).unwrap().as_bytes(),
            master.as_bytes()
        );
    }
}
