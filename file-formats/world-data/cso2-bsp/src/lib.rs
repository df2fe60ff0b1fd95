//! # cso2-bsp
//!
//! Transcoder from Counter-Strike Online 2 compiled maps (BSP version 100)
//! to the standard Source engine layout (BSP version 20).
//!
//! The vendor build compresses most lumps with Valve LZMA frames and widens
//! many 16-bit record fields to 32 bits. [`BspTranscoder`] undoes both: it
//! decodes every lump, narrows the affected records, rewrites the game lump
//! and repacks the embedded pak archive without compression.
//!
//! Field values too large for the narrower layout are truncated and logged
//! through the `log` facade at warning level. They never fail a transcode.
//!
//! ## Examples
//!
//! ```no_run
//! use cso2_bsp::{BspTranscoder, is_bsp_file};
//!
//! # fn main() -> Result<(), cso2_bsp::BspError> {
//! let map = std::fs::read("maps/de_dust2.bsp")?;
//! if is_bsp_file(&map) {
//!     let fixed = BspTranscoder::new().transcode(&map)?;
//!     std::fs::write("de_dust2.bsp", fixed)?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod game_lump;
pub mod header;
pub mod pakfile;
pub mod transcoder;

mod fix;
mod narrow;
mod records;

pub use error::{BspError, Result};
pub use game_lump::GameLumpEntry;
pub use header::{BspHeader, LumpHeader, is_bsp_file, lump_name};
pub use transcoder::{BspTranscoder, decompress_bsp};
