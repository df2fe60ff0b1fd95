//! Manifest listing

use anyhow::{Context, Result};
use cso2_pkg::PkgManifest;
use std::path::Path;

use crate::utils::create_spinner;

pub fn execute(path: &Path) -> Result<()> {
    let spinner = create_spinner("Decrypting manifest...");
    let manifest = PkgManifest::open(path)
        .with_context(|| format!("Failed to open manifest {}", path.display()));
    spinner.finish_and_clear();
    let manifest = manifest?;

    let header = manifest.header();
    println!("Manifest:  {}", manifest.name());
    println!("Provider:  {}", manifest.provider());
    println!(
        "Cipher:    {} (selector {})",
        cso2_pkg::Cipher::try_from(header.cipher)
            .map(|c| c.to_string())
            .unwrap_or_else(|_| header.cipher.to_string()),
        header.selector
    );
    println!("Packages:  {}", manifest.filenames().len());
    println!();
    for name in manifest.filenames() {
        println!("{name}");
    }
    Ok(())
}
