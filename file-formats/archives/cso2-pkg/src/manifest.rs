//! Encrypted package manifest
//!
//! The manifest lists every container file of an install. It is an 8-byte
//! header followed by an encrypted body of CRLF-terminated file names:
//!
//! ```text
//! u16 version (2) | u8 cipher | u8 key selector | u32 body size | body...
//! ```
//!
//! The body key is derived from the selector and the manifest's own file name.

use crate::crypto::{Cipher, manifest_key};
use crate::{PkgError, Provider, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};
use std::path::Path;

/// Only supported manifest version
pub const MANIFEST_VERSION: u16 = 2;

/// Size of the manifest header in bytes
pub const MANIFEST_HEADER_SIZE: usize = 8;

/// Library name that only appears in Tiancity manifests
const TIANCITY_MARKER: &str = "sedata.dll";

/// Manifest header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestHeader {
    /// Format version, always 2
    pub version: u16,
    /// Raw cipher id
    pub cipher: u8,
    /// Key selector
    pub selector: u8,
    /// Size of the encrypted body
    pub file_size: u32,
}

impl ManifestHeader {
    /// Parse a header from the start of a buffer
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MANIFEST_HEADER_SIZE {
            return Err(PkgError::InvalidFileSize {
                expected: MANIFEST_HEADER_SIZE as u64,
                actual: data.len() as u64,
            });
        }

        let mut cursor = Cursor::new(data);
        Ok(Self {
            version: cursor.read_u16::<LittleEndian>()?,
            cipher: cursor.read_u8()?,
            selector: cursor.read_u8()?,
            file_size: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Serialize the header
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(MANIFEST_HEADER_SIZE);
        out.write_u16::<LittleEndian>(self.version)?;
        out.write_u8(self.cipher)?;
        out.write_u8(self.selector)?;
        out.write_u32::<LittleEndian>(self.file_size)?;
        Ok(out)
    }
}

/// A decrypted manifest
#[derive(Debug, Clone)]
pub struct PkgManifest {
    name: String,
    header: ManifestHeader,
    provider: Provider,
    filenames: Vec<String>,
}

impl PkgManifest {
    /// Read and decrypt a manifest file
    ///
    /// The key depends on the file name, so the file must keep the name it
    /// was shipped with.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PkgError::malformed_manifest(format!("bad file name: {}", path.display()))
            })?;
        let data = std::fs::read(path)?;
        Self::from_bytes(name, &data)
    }

    /// Decrypt a manifest held in memory
    pub fn from_bytes(name: &str, data: &[u8]) -> Result<Self> {
        let header = ManifestHeader::parse(data)?;
        if header.version != MANIFEST_VERSION {
            return Err(PkgError::UnsupportedVersion(header.version));
        }

        let cipher = Cipher::try_from(header.cipher)?;
        let body = &data[MANIFEST_HEADER_SIZE..];
        let declared = header.file_size as usize;
        if declared > body.len() {
            return Err(PkgError::InvalidFileSize {
                expected: declared as u64,
                actual: body.len() as u64,
            });
        }

        let key = manifest_key(header.selector, name)?;
        let mut body = body[..declared].to_vec();
        cipher.decrypt(&mut body, &key)?;

        let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
        let text = String::from_utf8_lossy(&body[..end]);

        let filenames = parse_filenames(&text, name);
        let provider = detect_provider(&text, name);

        log::debug!(
            "manifest {name}: {cipher}, selector {}, {} containers, provider {provider}",
            header.selector,
            filenames.len()
        );

        Ok(Self {
            name: name.to_string(),
            header,
            provider,
            filenames,
        })
    }

    /// Encrypt a manifest body
    ///
    /// The body is zero padded to whole cipher blocks.
    pub fn encode(name: &str, cipher: Cipher, selector: u8, body: &[u8]) -> Result<Vec<u8>> {
        let block = cipher.block_size();
        let mut encrypted = body.to_vec();
        encrypted.resize(body.len().div_ceil(block) * block, 0);

        let key = manifest_key(selector, name)?;
        cipher.encrypt(&mut encrypted, &key)?;

        let header = ManifestHeader {
            version: MANIFEST_VERSION,
            cipher: cipher.id(),
            selector,
            file_size: encrypted.len() as u32,
        };
        let mut out = header.to_bytes()?;
        out.write_all(&encrypted)?;
        Ok(out)
    }

    /// File name the manifest was read under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw header fields
    pub fn header(&self) -> &ManifestHeader {
        &self.header
    }

    /// Provider the install belongs to
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Container file names, in manifest order
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }
}

/// Lines naming a `.pkg` file, excluding the manifest itself
///
/// A trailing line without CRLF is dropped.
fn parse_filenames(text: &str, manifest_name: &str) -> Vec<String> {
    let mut filenames = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("\r\n") {
        let line = &rest[..pos];
        if line.contains(".pkg") && line != manifest_name {
            filenames.push(line.to_string());
        }
        rest = &rest[pos + 2..];
    }
    filenames
}

fn detect_provider(text: &str, manifest_name: &str) -> Provider {
    // heuristic, the manifest has no publisher field
    if text.contains(TIANCITY_MARKER) {
        return Provider::Tiancity;
    }
    Provider::from_manifest_name(manifest_name).unwrap_or(Provider::Nexon)
}
