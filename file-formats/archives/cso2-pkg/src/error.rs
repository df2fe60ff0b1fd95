//! Error handling for package archives

use cso2_bsp::BspError;
use cso2_vtf::VtfError;
use std::io;
use thiserror::Error;

/// Errors that can occur when working with package archives
#[derive(Debug, Error)]
pub enum PkgError {
    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A candidate provider's keys did not decrypt the container
    #[error("Container {container} is not a {provider} package")]
    ProviderMismatch {
        /// The provider that was tried
        provider: &'static str,
        /// The container file name
        container: String,
    },

    /// The container header or entry table is inconsistent
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// The manifest could not be parsed
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    /// Unknown cipher id
    #[error("Unsupported cipher: {0}")]
    UnsupportedCipher(u8),

    /// Unknown manifest or wrapper version
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),

    /// Key selector outside the secret table
    #[error("Invalid key selector: {0}")]
    InvalidKeySelector(u8),

    /// Decryption was asked to process an empty buffer
    #[error("Cannot decrypt an empty buffer")]
    EmptyBuffer,

    /// Declared size does not fit the data present
    #[error("Invalid file size: expected {expected}, got {actual}")]
    InvalidFileSize {
        /// Size declared by the header
        expected: u64,
        /// Size actually available
        actual: u64,
    },

    /// The block cipher backend rejected the input
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// A compressed texture failed to decode
    #[error("Texture error: {0}")]
    Texture(#[from] VtfError),

    /// A compiled map failed to transcode
    #[error("Map error: {0}")]
    Map(#[from] BspError),

    /// The job was stopped before this item ran
    #[error("Operation cancelled")]
    Cancelled,

    /// Provider name not recognised
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// A requested entry is not in its container
    #[error("Entry {path} not found in {container}")]
    EntryNotFound {
        /// Container file name
        container: String,
        /// Requested entry path
        path: String,
    },

    /// The worker thread of a background job failed
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl PkgError {
    /// Create a new MalformedContainer error
    pub fn malformed_container<S: Into<String>>(msg: S) -> Self {
        PkgError::MalformedContainer(msg.into())
    }

    /// Create a new MalformedManifest error
    pub fn malformed_manifest<S: Into<String>>(msg: S) -> Self {
        PkgError::MalformedManifest(msg.into())
    }

    /// Create a new Cipher error
    pub fn cipher<S: Into<String>>(msg: S) -> Self {
        PkgError::Cipher(msg.into())
    }

    /// Check if this error only means a provider candidate did not match
    pub fn is_provider_mismatch(&self) -> bool {
        matches!(self, PkgError::ProviderMismatch { .. })
    }

    /// Check if this error indicates corrupted input
    pub fn is_corruption(&self) -> bool {
        match self {
            PkgError::MalformedContainer(_)
            | PkgError::MalformedManifest(_)
            | PkgError::InvalidFileSize { .. }
            | PkgError::Cipher(_) => true,
            PkgError::Texture(e) => e.is_corruption(),
            PkgError::Map(e) => e.is_corruption(),
            _ => false,
        }
    }

    /// Check if a batch may continue after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PkgError::Cancelled | PkgError::Worker(_))
    }
}

/// Type alias for Results from package operations
pub type Result<T> = std::result::Result<T, PkgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PkgError::malformed_container("entry table past end of file");
        assert_eq!(
            err.to_string(),
            "Malformed container: entry table past end of file"
        );

        let err = PkgError::InvalidFileSize {
            expected: 64,
            actual: 10,
        };
        assert_eq!(err.to_string(), "Invalid file size: expected 64, got 10");
    }

    #[test]
    fn test_error_classification() {
        let miss = PkgError::ProviderMismatch {
            provider: "tiancity",
            container: "a.pkg".to_string(),
        };
        assert!(miss.is_provider_mismatch());
        assert!(!miss.is_corruption());
        assert!(miss.is_recoverable());

        assert!(PkgError::malformed_manifest("short").is_corruption());
        assert!(PkgError::Map(BspError::UnsupportedLeafVersion(4)).is_recoverable());
        assert!(!PkgError::Cancelled.is_recoverable());
        assert!(!PkgError::Worker("panicked".into()).is_recoverable());
    }
}
