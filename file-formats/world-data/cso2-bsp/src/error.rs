//! Error handling for map transcoding

use cso2_vtf::VtfError;
use std::io;
use thiserror::Error;

/// Errors that can occur while transcoding a compiled map
#[derive(Debug, Error)]
pub enum BspError {
    /// An I/O error occurred, including reads past the end of a record
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The header ident or version does not match a vendor map
    #[error("Invalid BSP header: ident 0x{ident:08X}, version {version}")]
    InvalidHeader {
        /// The ident found
        ident: u32,
        /// The version found
        version: u32,
    },

    /// A read went past the end of a buffer
    #[error("Truncated {what}: need {needed} bytes at offset {offset}, buffer holds {available}")]
    Truncated {
        /// What was being read
        what: &'static str,
        /// Offset of the read
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Size of the buffer
        available: usize,
    },

    /// A lump header points outside the file
    #[error("Lump {lump} out of bounds: offset {offset}, length {length}, file size {file_size}")]
    LumpOutOfBounds {
        /// Lump name
        lump: &'static str,
        /// Declared offset
        offset: u32,
        /// Declared length
        length: u32,
        /// Size of the map buffer
        file_size: usize,
    },

    /// A lump is flagged compressed but carries no LZMA frame
    #[error("Lump {0} is flagged compressed but has no LZMA frame")]
    MissingLzmaFrame(&'static str),

    /// An LZMA frame or compressed texture failed to decode
    #[error("Decoding error: {0}")]
    Decode(#[from] VtfError),

    /// The leaf lump declares a record layout this transcoder does not know
    #[error("Unsupported leaf lump version: {0}")]
    UnsupportedLeafVersion(u32),

    /// The game lump directory or sub-lump chain is inconsistent
    #[error("Malformed game lump: {0}")]
    MalformedGameLump(String),

    /// The pak lump holds a record that is not a local file header
    #[error("Bad ZIP signature 0x{found:08X} for entry {index} at offset {offset}")]
    BadZipSignature {
        /// Entry index
        index: usize,
        /// Offset inside the pak lump
        offset: usize,
        /// Signature found
        found: u32,
    },
}

impl BspError {
    /// Create a new MalformedGameLump error
    pub fn game_lump<S: Into<String>>(msg: S) -> Self {
        BspError::MalformedGameLump(msg.into())
    }

    /// Check if this error indicates corrupted map data
    pub fn is_corruption(&self) -> bool {
        !matches!(
            self,
            BspError::Io(_) | BspError::UnsupportedLeafVersion(_) | BspError::InvalidHeader { .. }
        )
    }
}

/// Type alias for Results from map operations
pub type Result<T> = std::result::Result<T, BspError>;
