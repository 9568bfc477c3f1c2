//! AlbumVault - Error Types

use thiserror::Error;

/// Result type for key management operations
pub type KeyVaultResult<T> = Result<T, KeyVaultError>;

/// Key management error types
#[derive(Error, Debug)]
pub enum KeyVaultError {
    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    // ═══════════════════════════════════════════════════════════════
    // ALBUM KEY ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Album not found: {0}")]
    AlbumNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Master key required for private album: {0}")]
    MasterKeyRequired(String),

    #[error("Invalid album type: {0}")]
    InvalidAlbumType(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key rotation failed: {0}")]
    RotationFailed(String),

    #[error("Operation not allowed: {0}")]
    OperationNotAllowed(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    // ═══════════════════════════════════════════════════════════════
    // RECOVERY ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Insufficient shares: need {required}, got {provided}")]
    InsufficientShares { required: usize, provided: usize },

    #[error("Invalid share: {0}")]
    InvalidShare(String),

    #[error("Share reconstruction failed: {0}")]
    ReconstructionFailed(String),

    #[error("Invalid recovery code: {0}")]
    InvalidRecoveryCode(String),

    // ═══════════════════════════════════════════════════════════════
    // PLATFORM ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Biometric authentication not available")]
    BiometricNotAvailable,

    #[error("Biometric authentication failed: {0}")]
    BiometricAuthFailed(String),

    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),

    // ═══════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl KeyVaultError {
    /// Check if this is a security-critical error
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            KeyVaultError::DecryptionFailed(_)
                | KeyVaultError::AccessDenied(_)
                | KeyVaultError::BiometricAuthFailed(_)
        )
    }

    /// Check if this error is terminal for the calling operation.
    /// Authentication/tamper failures are never retried or downgraded.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            KeyVaultError::DecryptionFailed(_)
                | KeyVaultError::AccessDenied(_)
                | KeyVaultError::OperationNotAllowed(_)
                | KeyVaultError::InvalidAlbumType(_)
        )
    }
}

impl From<serde_json::Error> for KeyVaultError {
    fn from(e: serde_json::Error) -> Self {
        KeyVaultError::SerializationError(e.to_string())
    }
}
