//! # cso2-pkg
//!
//! Reader and extractor for the encrypted PKG archives shipped with
//! Counter-Strike Online 2.
//!
//! A client installation has one encrypted manifest listing every
//! container, and a directory of `.pkg` containers. Each container has an
//! encrypted entry table keyed by its own file name and the publisher's
//! header key, followed by the entry payloads.
//!
//! Extracted files may carry further encodings, which the
//! [`ContentTranscoder`] undoes:
//!
//! - app-encrypted configuration files, see [`EncryptedFile`]
//! - LZMA compressed textures, via `cso2-vtf`
//! - vendor BSP maps, via `cso2-bsp`
//!
//! ## Examples
//!
//! ### Listing a container
//!
//! ```no_run
//! use cso2_pkg::{PkgContainer, PkgManifest};
//!
//! # fn main() -> Result<(), cso2_pkg::PkgError> {
//! let manifest = PkgManifest::open("Data/a9a34080ecb7db1b1defb7539eaa32a4.pkg")?;
//! println!("{} containers ({})", manifest.filenames().len(), manifest.provider());
//!
//! let container = PkgContainer::open_any("Data/pak000.pkg")?;
//! for entry in container.entries() {
//!     println!("{} {}", entry.path(), entry.unpacked_size());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Extracting
//!
//! ```no_run
//! use cso2_pkg::{DirectorySource, EntryRef, ExtractOptions, Extractor, NullProgress};
//!
//! # fn main() -> Result<(), cso2_pkg::PkgError> {
//! let options = ExtractOptions::new().replace_shadowblock(true);
//! let extractor = Extractor::new(DirectorySource::new("Data"), "out", options);
//! let report = extractor.extract(
//!     &[EntryRef::new("pak000.pkg", "maps/de_dust2.bsp")],
//!     &mut NullProgress,
//! )?;
//! for (item, error) in &report.failures {
//!     eprintln!("{item}: {error}");
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

pub mod container;
pub mod crypto;
pub mod encrypted_file;
pub mod error;
pub mod extract;
pub mod manifest;
pub mod provider;
pub mod test_utils;
pub mod transcode;

pub use container::{EntryFlags, PkgContainer, PkgEntry};
pub use crypto::Cipher;
pub use encrypted_file::{EncryptedFile, fix_decrypted_extension, is_encrypted_file};
pub use error::{PkgError, Result};
pub use extract::{
    ContainerSource, DirectorySource, EntryRef, ExtractJob, ExtractReport, Extractor, JobState,
    NullProgress, ProgressSink,
};
pub use manifest::{ManifestHeader, PkgManifest};
pub use provider::Provider;
pub use transcode::{ContentTranscoder, ExtractOptions, Transcoded};
