//! Error types for texture and LZMA frame decoding

use std::io;
use thiserror::Error;

/// Result type alias for texture operations
pub type Result<T> = std::result::Result<T, VtfError>;

/// Errors that can occur while decoding compressed textures or LZMA frames
#[derive(Debug, Error)]
pub enum VtfError {
    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The buffer does not start with the compressed texture signature
    #[error("Invalid compressed texture signature: {0:02X?}")]
    InvalidSignature([u8; 3]),

    /// The header declares a decoded size of zero
    #[error("Compressed texture declares an original size of zero")]
    EmptyTexture,

    /// A read went past the end of the buffer
    #[error("Truncated data at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        /// Offset of the failed read
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// The LZMA frame header is not recognised
    #[error("Invalid LZMA frame: {0}")]
    InvalidLzmaFrame(String),

    /// LZMA decoding failed
    #[error("LZMA error: {0}")]
    Lzma(String),

    /// The decoded size disagrees with the declared size
    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Declared size
        expected: u64,
        /// Decoded size
        actual: u64,
    },
}

impl VtfError {
    /// Create a new Lzma error
    pub fn lzma<S: Into<String>>(msg: S) -> Self {
        VtfError::Lzma(msg.into())
    }

    /// Create a new InvalidLzmaFrame error
    pub fn invalid_frame<S: Into<String>>(msg: S) -> Self {
        VtfError::InvalidLzmaFrame(msg.into())
    }

    /// Check if this error indicates malformed input data
    pub fn is_corruption(&self) -> bool {
        !matches!(self, VtfError::Io(_))
    }
}
