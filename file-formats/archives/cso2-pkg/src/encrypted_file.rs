//! App-encrypted file wrapper
//!
//! Some configuration and script files inside containers carry a second
//! layer of encryption, keyed by the file's own name:
//!
//! ```text
//! u8 checksum[10] | u16 version (2) | u8 cipher | u8 key selector | u32 size | body...
//! ```

use crate::crypto::{Cipher, manifest_key};
use crate::{PkgError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// Size of the wrapper header
pub const ENCRYPTED_FILE_HEADER_SIZE: usize = 18;

/// Only supported wrapper version
pub const ENCRYPTED_FILE_VERSION: u16 = 2;

/// Wrapper header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedFileHeader {
    /// Opaque checksum bytes
    pub checksum: [u8; 10],
    /// Format version, always 2
    pub version: u16,
    /// Raw cipher id
    pub cipher: u8,
    /// Key selector
    pub selector: u8,
    /// Size of the plaintext
    pub file_size: u32,
}

impl EncryptedFileHeader {
    /// Parse a header from the start of a buffer
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ENCRYPTED_FILE_HEADER_SIZE {
            return Err(PkgError::InvalidFileSize {
                expected: ENCRYPTED_FILE_HEADER_SIZE as u64,
                actual: data.len() as u64,
            });
        }

        let mut cursor = Cursor::new(data);
        let mut checksum = [0u8; 10];
        cursor.read_exact(&mut checksum)?;
        Ok(Self {
            checksum,
            version: cursor.read_u16::<LittleEndian>()?,
            cipher: cursor.read_u8()?,
            selector: cursor.read_u8()?,
            file_size: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Serialize the header
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(ENCRYPTED_FILE_HEADER_SIZE);
        out.write_all(&self.checksum)?;
        out.write_u16::<LittleEndian>(self.version)?;
        out.write_u8(self.cipher)?;
        out.write_u8(self.selector)?;
        out.write_u32::<LittleEndian>(self.file_size)?;
        Ok(out)
    }

    fn has_valid_fields(&self) -> bool {
        self.version == ENCRYPTED_FILE_VERSION && Cipher::try_from(self.cipher).is_ok()
    }
}

/// Check the version and cipher fields of a wrapper header
///
/// Works on a payload prefix, the declared size is not checked.
pub fn is_encrypted_header(data: &[u8]) -> bool {
    EncryptedFileHeader::parse(data).is_ok_and(|h| h.has_valid_fields())
}

/// Check whether a whole buffer is an app-encrypted file
pub fn is_encrypted_file(data: &[u8]) -> bool {
    EncryptedFileHeader::parse(data).is_ok_and(|h| {
        h.has_valid_fields() && h.file_size as usize <= data.len() - ENCRYPTED_FILE_HEADER_SIZE
    })
}

/// A parsed app-encrypted file
#[derive(Debug, Clone)]
pub struct EncryptedFile<'a> {
    name: String,
    header: EncryptedFileHeader,
    cipher: Cipher,
    body: &'a [u8],
}

impl<'a> EncryptedFile<'a> {
    /// Parse a wrapper
    ///
    /// `name` is the file name the body key is derived from.
    pub fn parse(name: &str, data: &'a [u8]) -> Result<Self> {
        let header = EncryptedFileHeader::parse(data)?;
        if header.version != ENCRYPTED_FILE_VERSION {
            return Err(PkgError::UnsupportedVersion(header.version));
        }
        let cipher = Cipher::try_from(header.cipher)?;

        let body = &data[ENCRYPTED_FILE_HEADER_SIZE..];
        if header.file_size as usize > body.len() {
            return Err(PkgError::InvalidFileSize {
                expected: u64::from(header.file_size),
                actual: body.len() as u64,
            });
        }

        Ok(Self {
            name: name.to_string(),
            header,
            cipher,
            body,
        })
    }

    /// Header fields
    pub fn header(&self) -> &EncryptedFileHeader {
        &self.header
    }

    /// Decrypt the body
    ///
    /// The declared size is rounded up to whole cipher blocks, clamped to
    /// the body, and the plaintext truncated back to the declared size.
    pub fn decrypt(&self) -> Result<Vec<u8>> {
        let size = self.header.file_size as usize;
        if size == 0 {
            return Ok(Vec::new());
        }

        let block = self.cipher.block_size();
        let len = size.div_ceil(block).saturating_mul(block).min(self.body.len());
        let key = manifest_key(self.header.selector, &self.name)?;

        let mut data = self.body[..len].to_vec();
        self.cipher.decrypt(&mut data, &key)?;
        data.truncate(size);

        log::debug!(
            "{}: decrypted {size} bytes with {} (selector {})",
            self.name,
            self.cipher,
            self.header.selector
        );
        Ok(data)
    }

    /// Wrap and encrypt a plaintext
    pub fn encode(name: &str, cipher: Cipher, selector: u8, plain: &[u8]) -> Result<Vec<u8>> {
        let block = cipher.block_size();
        let mut body = plain.to_vec();
        body.resize(plain.len().div_ceil(block) * block, 0);
        if !body.is_empty() {
            cipher.encrypt(&mut body, &manifest_key(selector, name)?)?;
        }

        let header = EncryptedFileHeader {
            checksum: [0; 10],
            version: ENCRYPTED_FILE_VERSION,
            cipher: cipher.id(),
            selector,
            file_size: plain.len() as u32,
        };
        let mut out = header.to_bytes()?;
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// Drop the marker from a decrypted file's extension
///
/// Everything up to and including the first `e` of the extension goes, so
/// `script.elua` becomes `script.lua`. Extensions without an `e` are kept.
pub fn fix_decrypted_extension(path: &str) -> String {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let Some(dot) = path[name_start..].rfind('.').map(|i| name_start + i) else {
        return path.to_string();
    };
    // a leading dot names the file, it is not an extension
    if dot == name_start {
        return path.to_string();
    }

    let extension = &path[dot + 1..];
    match extension.find('e') {
        Some(pos) if pos + 1 == extension.len() => path[..dot].to_string(),
        Some(pos) => format!("{}.{}", &path[..dot], &extension[pos + 1..]),
        None => path.to_string(),
    }
}
