//! # AlbumVault
//!
//! Client-side key management for an end-to-end encrypted photo
//! sharing app.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      ALBUMVAULT                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │  KEYSTORE   │  │  ALBUM KEY  │  │  RECOVERY       │  │
//! │  │  (handles)  │  │  MANAGER    │  │  shamir/bip39   │  │
//! │  └──────┬──────┘  └──────┬──────┘  └────────┬────────┘  │
//! │         │                │                   │           │
//! │  ┌──────┴────────────────┴───────────────────┴────────┐ │
//! │  │                   MASTER KEY                        │ │
//! │  │     wrapped per device / HKDF → private albums      │ │
//! │  └─────────────────────────────────────────────────────┘ │
//! │                                                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │  CRYPTO     │  │  CONSENT    │  │  EXTERNAL       │  │
//! │  │  aead/kdf/  │  │  GATE (AI)  │  │  store/blob/    │  │
//! │  │  asym       │  │             │  │  platform auth  │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - All content encrypted with AES-256-GCM, 12-byte IVs, detached tags
//! - Family albums: one random key, wrapped per member, rotatable
//! - Private albums: key derived from the master key on demand, never
//!   stored anywhere
//! - Master key recoverable by t-of-n Shamir shares or a 24-word
//!   BIP39 code
//! - AI features gated on explicit, versioned, revocable consent
//! - Key material redacted from Debug output and zeroized on drop

pub mod album;
pub mod consent;
pub mod crypto;
pub mod error;
pub mod external;
pub mod keystore;
pub mod master_key;
pub mod recovery;

pub use album::{AlbumKeyManager, AlbumType, SessionKeyCache, WrappingKeyProvider};
pub use consent::{AiFeature, ConsentGate, CONSENT_POLICY_VERSION};
pub use crypto::SecretKey;
pub use error::{KeyVaultError, KeyVaultResult};
pub use external::{BlobStore, PersistentStore, PlatformAuthenticator};
pub use keystore::{KeyHandle, KeyHandleStore};
pub use master_key::{MasterKey, WrappedMasterKey};
pub use recovery::{RecoveryCode, ShamirShare};

/// AlbumVault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
