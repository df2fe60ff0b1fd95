//! Common test utilities and fixtures

#![allow(dead_code)]

use cso2_pkg::crypto::Cipher;
use cso2_pkg::test_utils::{TestContainer, create_test_manifest};
use cso2_pkg::{EncryptedFile, Provider};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Enable log output for a test run
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Create a temporary directory for tests
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Generate test data of a specific size
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// A fake client install with a manifest and two containers
pub struct TestInstall {
    pub root: TempDir,
    pub data: PathBuf,
    pub manifest: PathBuf,
}

impl TestInstall {
    pub fn output(&self) -> PathBuf {
        self.root.path().join("out")
    }
}

/// Lay out a Nexon install below a temp dir
pub fn create_test_install() -> TestInstall {
    let root = temp_dir();
    let data = root.path().join("Data");
    fs::create_dir_all(&data).expect("Failed to create data dir");

    let manifest_name = Provider::Nexon.manifest_name();
    let manifest = data.join(manifest_name);
    let body = create_test_manifest(manifest_name, Cipher::Aes, 3, &["a.pkg", "b.pkg"])
        .expect("Failed to encode manifest");
    fs::write(&manifest, body).expect("Failed to write manifest");

    let config = EncryptedFile::encode("server.ecfg", Cipher::Blowfish, 6, b"maxplayers 32\r\n")
        .expect("Failed to wrap config");

    TestContainer::new("a.pkg", Provider::Nexon)
        .file("Data/test.txt", b"hello world")
        .encrypted_file("cfg/server.ecfg", &config)
        .write_to(&data)
        .expect("Failed to write a.pkg");
    TestContainer::new("b.pkg", Provider::Nexon)
        .encrypted_file("sound/large.wav", &generate_test_data(200_000))
        .file("materials/tools/toolsshadowblock.vmt", b"\"UnlitGeneric\"\r\n{\r\n}\r\n")
        .write_to(&data)
        .expect("Failed to write b.pkg");

    TestInstall {
        root,
        data,
        manifest,
    }
}

/// Read a file below `root` given a `/` separated path
pub fn read_output(root: &Path, path: &str) -> Vec<u8> {
    fs::read(root.join(path)).expect("Failed to read output file")
}
