//! Cryptographic operations for package archives
//!
//! Three pieces are used throughout the format:
//!
//! - **Ciphers**: DES, AES, Blowfish and the legacy Rijndael variant, all
//!   decrypted in place over whole blocks with a zero IV by default
//! - **Manifest keys**: an MD5 digest over a constant, one of four static
//!   secrets and a file name, ordered by the selector's parity
//! - **Hex keys**: the lowercase hex MD5 of a provider key and a file name,
//!   used for container headers and entry payloads
//!
//! ## Examples
//!
//! ```
//! use cso2_pkg::crypto::{Cipher, manifest_key};
//!
//! # fn main() -> Result<(), cso2_pkg::PkgError> {
//! let key = manifest_key(3, "a9a34080ecb7db1b1defb7539eaa32a4.pkg")?;
//! let mut data = *b"sixteen byte msg";
//! Cipher::Aes.encrypt(&mut data, &key)?;
//! Cipher::Aes.decrypt(&mut data, &key)?;
//! assert_eq!(&data, b"sixteen byte msg");
//! # Ok(())
//! # }
//! ```

mod cipher;
mod keys;

pub use cipher::{Cipher, ZERO_IV};
pub use keys::{KEY_SECRETS, manifest_key, md5_hex_key};
