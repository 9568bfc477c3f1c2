//! AlbumVault - Album Key Management
//!
//! Two trust tiers, two key lifecycles:
//!
//! - Family: a random album key wrapped per member, rotatable
//! - Private: a key derived on demand from the master key, never stored
//!
//! `AlbumKeyManager` is the single entry point; the persisted record
//! shapes live in [`types`] and decrypted keys are held only in the
//! in-memory [`cache`] for the session.

pub mod cache;
pub mod manager;
pub mod rotation;
pub mod types;

pub use cache::SessionKeyCache;
pub use manager::{AlbumKeyManager, WrappingKeyProvider};
pub use rotation::ROTATION_BATCH_SIZE;
pub use types::{
    AlbumMetadata, AlbumType, FamilyAlbumKeyStorage, KeyRotationResult, PhotoAuthTags, PhotoIvs,
    PrivateAlbumKeyMetadata, StoragePaths, StoredPhotoRecord,
};
