//! Key derivation

use crate::{PkgError, Result};
use md5::{Digest, Md5};

/// Static secrets selected by `selector / 2`
pub const KEY_SECRETS: [[u8; 16]; 4] = [
    [
        0x9A, 0xA6, 0xC7, 0x59, 0x18, 0xEA, 0xD0, 0x44, 0x83, 0xA3, 0x3A, 0x3E, 0xCE, 0xAF, 0x6F,
        0x68,
    ],
    [
        0xB6, 0xBA, 0x15, 0xC7, 0x77, 0x9D, 0x9C, 0x49, 0x84, 0x62, 0x2A, 0x9A, 0x8A, 0x61, 0x84,
        0xA6,
    ],
    [
        0x68, 0x55, 0x24, 0x24, 0x2B, 0xCB, 0x88, 0x4B, 0xA7, 0xA6, 0xD2, 0xC7, 0x94, 0xED, 0xE8,
        0xD3,
    ],
    [
        0x36, 0x24, 0xD6, 0x8C, 0x6C, 0xB8, 0xE1, 0x4A, 0xB1, 0x82, 0xC0, 0xA3, 0xDC, 0xE4, 0x16,
        0xC8,
    ],
];

const KEY_PREFIX: u32 = 2;

/// Derive the 16-byte key for a manifest or app-encrypted file
///
/// The digest covers the constant 2 (little-endian u32), then the secret and
/// the file name. Odd selectors hash the secret first, even selectors the
/// name first.
pub fn manifest_key(selector: u8, filename: &str) -> Result<[u8; 16]> {
    let secret = KEY_SECRETS
        .get(usize::from(selector / 2))
        .ok_or(PkgError::InvalidKeySelector(selector))?;

    let mut hasher = Md5::new();
    hasher.update(KEY_PREFIX.to_le_bytes());
    if selector % 2 == 1 {
        hasher.update(secret);
        hasher.update(filename.as_bytes());
    } else {
        hasher.update(filename.as_bytes());
        hasher.update(secret);
    }

    let mut key = [0u8; 16];
    key.copy_from_slice(&hasher.finalize());
    Ok(key)
}

/// Lowercase hex MD5 of a provider key followed by a file name
///
/// Container headers and entry payloads use the ASCII bytes of the result as
/// cipher key material.
pub fn md5_hex_key(secret: &[u8], name: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(secret);
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}
