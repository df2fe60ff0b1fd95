//! # cso2-vtf
//!
//! Decoder for the chunked LZMA texture wrapper found in Counter-Strike
//! Online 2 packages, and for the Valve LZMA frames it builds on.
//!
//! ## Examples
//!
//! ```no_run
//! use cso2_vtf::{decompress_vtf, is_compressed_vtf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("materials/brick.vtf")?;
//! if is_compressed_vtf(&data) {
//!     let decoded = decompress_vtf(&data)?;
//!     std::fs::write("brick.vtf", decoded)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Compressed BSP lumps use the same frame format:
//!
//! ```
//! use cso2_vtf::lzma;
//!
//! let frame = lzma::compress(b"lump contents").unwrap();
//! assert!(lzma::is_compressed(&frame));
//! assert_eq!(lzma::decompress(&frame).unwrap(), b"lump contents");
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod lzma;
pub mod vtf;

pub use error::{Result, VtfError};
pub use lzma::LzmaHeader;
pub use vtf::{Chunk, CompressedVtf, decompress_vtf, is_compressed_vtf};
