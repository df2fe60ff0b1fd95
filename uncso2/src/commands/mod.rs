//! Command implementations

pub mod convert;
pub mod extract;
pub mod list;
pub mod manifest;

use crate::cli::ProviderArg;
use anyhow::{Context, Result};
use cso2_pkg::PkgContainer;
use std::path::Path;

/// Open a container with a fixed provider or by trying them all
pub fn open_container(path: &Path, provider: ProviderArg) -> Result<PkgContainer> {
    let container = match provider.provider() {
        Some(provider) => PkgContainer::open(path, provider),
        None => PkgContainer::open_any(path),
    };
    container.with_context(|| format!("Failed to open container {}", path.display()))
}
