//! Content providers and their key material

use crate::{PkgError, Result};
use std::fmt;
use std::str::FromStr;

/// Publisher build a package set belongs to
///
/// Each provider encrypts container headers with its own header key and
/// entry payloads with its own data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Nexon (Korea)
    Nexon,
    /// Tiancity (China)
    Tiancity,
    /// Beancity (Taiwan)
    Beancity,
    /// Nexon (Japan)
    NexonJp,
}

const NEXON_HEADER_KEY: &[u8] = b"lkgui781kl789sd!@#%89&^sd";
const NEXON_DATA_KEY: &[u8] = b"^9gErg2Sx7bnk7@#sdfjnh@";

const TIANCITY_HEADER_KEY: &[u8] = &[
    0x9B, 0x65, 0xC7, 0x9B, 0xC7, 0xDF, 0x8E, 0x7E, 0xD4, 0xC6, 0x59, 0x52, 0x5C, 0xF7, 0x22, 0xFF,
    0xF4, 0xE8, 0xFF, 0xE7, 0xB5, 0xC2, 0x77,
];
const TIANCITY_DATA_KEY: &[u8] = &[
    0x8E, 0x5C, 0xB8, 0x92, 0x45, 0xD1, 0x90, 0xBA, 0x82, 0x0F, 0xD9, 0x7A, 0x99, 0x8E, 0xB3, 0x87,
    0xF7,
];

const BEANCITY_HEADER_KEY: &[u8] = &[
    0x86, 0x39, 0x53, 0xBD, 0x16, 0x11, 0x6D, 0x06, 0x2A, 0x84, 0xF3, 0x4E, 0xE0, 0x4A, 0xA3,
];
const BEANCITY_DATA_KEY: &[u8] = &[
    0x1F, 0x9F, 0xF8, 0xF4, 0x18, 0xAC, 0x25, 0xA2, 0xBB, 0x37, 0x82, 0x6D, 0xA8, 0xAE, 0xA7, 0x28,
    0xBA, 0xDD, 0xDD, 0xE4, 0x6B,
];

impl Provider {
    /// Every provider, in detection order
    pub const ALL: [Provider; 4] = [
        Provider::Nexon,
        Provider::Tiancity,
        Provider::Beancity,
        Provider::NexonJp,
    ];

    /// Key for container headers and entry tables
    pub fn header_key(self) -> &'static [u8] {
        match self {
            Provider::Nexon | Provider::NexonJp => NEXON_HEADER_KEY,
            Provider::Tiancity => TIANCITY_HEADER_KEY,
            Provider::Beancity => BEANCITY_HEADER_KEY,
        }
    }

    /// Key for encrypted entry payloads
    pub fn data_key(self) -> &'static [u8] {
        match self {
            Provider::Nexon | Provider::NexonJp => NEXON_DATA_KEY,
            Provider::Tiancity => TIANCITY_DATA_KEY,
            Provider::Beancity => BEANCITY_DATA_KEY,
        }
    }

    /// File name of this provider's manifest
    pub fn manifest_name(self) -> &'static str {
        match self {
            Provider::Nexon => "a9a34080ecb7db1b1defb7539eaa32a4.pkg",
            Provider::Tiancity => "9aba81425766ded41499e447e36f6233.pkg",
            Provider::Beancity => "7715a87e0e7e19becae97a3a93a0d9a2.pkg",
            Provider::NexonJp => "451e91710e913436ae9f01eb3a0e010d.pkg",
        }
    }

    /// Look up a provider by its manifest file name, ignoring case
    ///
    /// Titanfall Online installs (`0a4b4196394ecf251c532f1552ccf3b3.pkg`) use
    /// another container layout and are not recognised.
    pub fn from_manifest_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.manifest_name().eq_ignore_ascii_case(name))
    }

    /// Short lowercase name, as accepted by [`FromStr`]
    pub fn name(self) -> &'static str {
        match self {
            Provider::Nexon => "nexon",
            Provider::Tiancity => "tiancity",
            Provider::Beancity => "beancity",
            Provider::NexonJp => "nexon-jp",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nexon" => Ok(Provider::Nexon),
            "tiancity" => Ok(Provider::Tiancity),
            "beancity" => Ok(Provider::Beancity),
            "nexon-jp" | "nexonjp" => Ok(Provider::NexonJp),
            _ => Err(PkgError::UnknownProvider(s.to_string())),
        }
    }
}
