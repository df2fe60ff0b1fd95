//! Test utilities for package archives
//!
//! Builds encrypted manifests and containers in memory so tests never need
//! game data. Containers are laid out the way the game client ships them,
//! with every entry payload placed back to back after the entry table.

use crate::container::{
    CONTAINER_HEADER_SIZE, CONTAINER_PREFIX_SIZE, ENTRY_RECORD_SIZE, PATH_FIELD_SIZE,
    PAYLOAD_STRIDE,
};
use crate::crypto::{Cipher, md5_hex_key};
use crate::manifest::PkgManifest;
use crate::{Provider, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs;
use std::path::{Path, PathBuf};

/// A file to place in a test container
#[derive(Debug, Clone)]
pub struct TestEntry {
    /// Path inside the container, `/` or `\` separated
    pub path: String,
    /// Plain contents
    pub data: Vec<u8>,
    /// Whether the payload is encrypted with the provider's data key
    pub encrypted: bool,
}

/// Builder for encrypted test containers
#[derive(Debug, Clone)]
pub struct TestContainer {
    /// Container file name, which keys the header
    pub name: String,
    /// Provider whose keys are used
    pub provider: Provider,
    /// Directory path stored in the header
    pub directory: String,
    /// Files in table order
    pub entries: Vec<TestEntry>,
}

impl TestContainer {
    /// Start an empty container
    pub fn new(name: &str, provider: Provider) -> Self {
        Self {
            name: name.to_string(),
            provider,
            directory: "D:\\cso2\\data\\".to_string(),
            entries: Vec::new(),
        }
    }

    /// Set the directory path stored in the header
    pub fn directory(mut self, directory: &str) -> Self {
        self.directory = directory.to_string();
        self
    }

    /// Add a file stored in the clear
    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.entries.push(TestEntry {
            path: path.to_string(),
            data: data.to_vec(),
            encrypted: false,
        });
        self
    }

    /// Add a file with an encrypted payload
    pub fn encrypted_file(mut self, path: &str, data: &[u8]) -> Self {
        self.entries.push(TestEntry {
            path: path.to_string(),
            data: data.to_vec(),
            encrypted: true,
        });
        self
    }

    /// Encode the container
    pub fn build(&self) -> Result<Vec<u8>> {
        let header_key = md5_hex_key(self.provider.header_key(), &self.name);

        let mut payloads = Vec::new();
        let mut records = Vec::with_capacity(self.entries.len() * ENTRY_RECORD_SIZE);
        for entry in &self.entries {
            let stored = self.payload(entry)?;

            let mut record = path_field(&entry.path);
            record.write_u32::<LittleEndian>(payloads.len() as u32)?;
            record.write_u32::<LittleEndian>(stored.len() as u32)?;
            record.write_u32::<LittleEndian>(entry.data.len() as u32)?;
            record.write_u8(0)?;
            record.write_u8(u8::from(entry.encrypted))?;
            record.resize(ENTRY_RECORD_SIZE, 0);
            Cipher::Rijndael.encrypt(&mut record, header_key.as_bytes())?;

            records.extend_from_slice(&record);
            payloads.extend_from_slice(&stored);
        }

        let mut header = path_field(&self.directory);
        header.write_u32::<LittleEndian>(1)?;
        header.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        header.resize(CONTAINER_HEADER_SIZE, 0);
        Cipher::Rijndael.encrypt(&mut header, header_key.as_bytes())?;

        let mut out = md5_hex_key(b"", &self.name).into_bytes();
        out.resize(CONTAINER_PREFIX_SIZE, 0);
        out.extend_from_slice(&header);
        out.extend_from_slice(&records);
        out.extend_from_slice(&payloads);
        Ok(out)
    }

    /// Encode the container into `dir` under its own name
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.name);
        fs::write(&path, self.build()?)?;
        Ok(path)
    }

    fn payload(&self, entry: &TestEntry) -> Result<Vec<u8>> {
        if !entry.encrypted || entry.data.is_empty() {
            return Ok(entry.data.clone());
        }

        let file_name = entry.path.rsplit(['/', '\\']).next().unwrap_or(&entry.path);
        let key = md5_hex_key(self.provider.data_key(), file_name);
        let mut stored = entry.data.clone();
        stored.resize(entry.data.len().div_ceil(16) * 16, 0);
        for stride in stored.chunks_mut(PAYLOAD_STRIDE) {
            Cipher::Rijndael.encrypt(stride, key.as_bytes())?;
        }
        Ok(stored)
    }
}

/// Path stored with `\` separators in a NUL padded field
fn path_field(path: &str) -> Vec<u8> {
    let mut field = path.replace('/', "\\").into_bytes();
    field.truncate(PATH_FIELD_SIZE - 1);
    field.resize(PATH_FIELD_SIZE, 0);
    field
}

/// Encode a manifest listing `containers`
pub fn create_test_manifest(
    name: &str,
    cipher: Cipher,
    selector: u8,
    containers: &[&str],
) -> Result<Vec<u8>> {
    let mut body = String::new();
    for container in containers {
        body.push_str(container);
        body.push_str("\r\n");
    }
    PkgManifest::encode(name, cipher, selector, body.as_bytes())
}
