//! Package container reading
//!
//! A container starts with a 33-byte hash prefix, then a 272-byte header and
//! one 288-byte record per entry. Header and records are each encrypted on
//! their own with the container key; entry payloads follow the table.
//!
//! ```text
//! header: char path[261] | u32 unknown | u32 entry count | u8 pad[3]
//! entry:  char path[261] | u32 offset | u32 packed | u32 unpacked
//!         | u8 unknown | u8 encrypted | u8 pad[13]
//! ```

use crate::crypto::{Cipher, md5_hex_key};
use crate::encrypted_file::is_encrypted_header;
use crate::{PkgError, Provider, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use cso2_vtf::is_compressed_vtf;
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Bytes before the encrypted header
pub const CONTAINER_PREFIX_SIZE: usize = 33;

/// Size of the encrypted container header
pub const CONTAINER_HEADER_SIZE: usize = 272;

/// Size of one encrypted entry record
pub const ENTRY_RECORD_SIZE: usize = 288;

/// Payloads are decrypted in independent strides of this size
pub const PAYLOAD_STRIDE: usize = 0x10000;

/// Bytes a payload may fall short of its packed size
pub const PAYLOAD_SLACK: usize = 16;

/// Length of the fixed path fields
pub const PATH_FIELD_SIZE: usize = 261;

/// Bytes read by [`PkgEntry::detect_flags`]
const DETECT_PREFIX_SIZE: usize = 32;

/// Smallest payload [`PkgEntry::detect_flags`] inspects
const DETECT_MIN_SIZE: u32 = 18;

/// One file stored in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgEntry {
    path: String,
    offset: u64,
    packed_size: u32,
    unpacked_size: u32,
    encrypted: bool,
}

impl PkgEntry {
    /// Path inside the archive, with `/` separators
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last component of the path
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Absolute payload offset in the container file
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Stored payload size
    pub fn packed_size(&self) -> u32 {
        self.packed_size
    }

    /// Size after decryption
    pub fn unpacked_size(&self) -> u32 {
        self.unpacked_size
    }

    /// Whether the payload is encrypted with the provider's data key
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Peek at the start of the payload to find wrapped encodings
    ///
    /// Payloads shorter than an app-encrypted header report no flags.
    pub fn detect_flags(&self, container: &PkgContainer) -> Result<EntryFlags> {
        if self.packed_size < DETECT_MIN_SIZE {
            return Ok(EntryFlags::default());
        }

        let len = DETECT_PREFIX_SIZE.min(self.packed_size as usize);
        let prefix = container.read_payload(self, len)?;
        Ok(EntryFlags {
            encrypted_file: is_encrypted_header(&prefix),
            compressed_texture: is_compressed_vtf(&prefix),
        })
    }
}

/// Encodings found by [`PkgEntry::detect_flags`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFlags {
    /// The payload is wrapped in an app-encrypted header
    pub encrypted_file: bool,
    /// The payload is a chunked LZMA texture
    pub compressed_texture: bool,
}

/// Seekable storage behind a container
trait ContainerReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> ContainerReader for T {}

/// An opened container
///
/// Only the header and entry table are read up front. Payloads are read
/// from the underlying file when an entry is requested.
pub struct PkgContainer {
    name: String,
    provider: Provider,
    directory: String,
    entries: Vec<PkgEntry>,
    len: u64,
    reader: Mutex<Box<dyn ContainerReader>>,
}

impl fmt::Debug for PkgContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkgContainer")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("directory", &self.directory)
            .field("entries", &self.entries.len())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl PkgContainer {
    /// Open a container with a known provider
    pub fn open<P: AsRef<Path>>(path: P, provider: Provider) -> Result<Self> {
        let (name, file) = open_named(path.as_ref())?;
        Self::load(&name, &[provider], BufReader::new(file))
    }

    /// Open a container, trying each provider's keys in turn
    pub fn open_any<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (name, file) = open_named(path.as_ref())?;
        Self::load(&name, &Provider::ALL, BufReader::new(file))
    }

    /// Parse a container held in memory
    ///
    /// `name` is the container's file name, which keys the header.
    pub fn from_bytes(name: &str, provider: Provider, data: Vec<u8>) -> Result<Self> {
        Self::load(name, &[provider], Cursor::new(data))
    }

    /// Parse a container held in memory, trying each provider's keys
    ///
    /// The first provider whose header decrypts to a printable path and an
    /// entry table that fits the file wins.
    pub fn from_bytes_any(name: &str, data: Vec<u8>) -> Result<Self> {
        Self::load(name, &Provider::ALL, Cursor::new(data))
    }

    fn load<R: Read + Seek + Send + 'static>(
        name: &str,
        providers: &[Provider],
        mut reader: R,
    ) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        let table_start = (CONTAINER_PREFIX_SIZE + CONTAINER_HEADER_SIZE) as u64;
        if len < table_start {
            return Err(PkgError::InvalidFileSize {
                expected: table_start,
                actual: len,
            });
        }

        let mut header = [0u8; CONTAINER_HEADER_SIZE];
        reader.seek(SeekFrom::Start(CONTAINER_PREFIX_SIZE as u64))?;
        reader.read_exact(&mut header)?;

        let detecting = providers.len() > 1;
        let mut found = None;
        for &provider in providers {
            match read_table(&mut reader, name, provider, &header, len) {
                Ok(table) => {
                    found = Some((provider, table));
                    break;
                }
                Err(e @ (PkgError::ProviderMismatch { .. } | PkgError::MalformedContainer(_)))
                    if detecting =>
                {
                    log::debug!("{name}: not {provider}: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        let (provider, (directory, entries)) = found.ok_or_else(|| PkgError::ProviderMismatch {
            provider: "any",
            container: name.to_string(),
        })?;
        if detecting {
            log::debug!("{name}: detected provider {provider}");
        }

        Ok(Self {
            name: name.to_string(),
            provider,
            directory,
            entries,
            len,
            reader: Mutex::new(Box::new(reader)),
        })
    }

    /// Container file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider whose keys opened this container
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Directory path recorded in the header
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// All entries, in table order
    pub fn entries(&self) -> &[PkgEntry] {
        &self.entries
    }

    /// Find an entry by path, ignoring ASCII case and separator style
    pub fn find(&self, path: &str) -> Option<&PkgEntry> {
        let wanted = path.replace('\\', "/");
        let wanted = wanted.trim_start_matches('/');
        self.entries
            .iter()
            .find(|e| e.path.trim_start_matches('/').eq_ignore_ascii_case(wanted))
    }

    /// Read and decrypt an entry's payload, truncated to its unpacked size
    pub fn read_entry(&self, entry: &PkgEntry) -> Result<Vec<u8>> {
        let mut data = self.read_payload(entry, entry.packed_size as usize)?;
        if data.len() < entry.unpacked_size as usize {
            log::warn!(
                "{}: payload holds {} bytes, {} declared",
                entry.path,
                data.len(),
                entry.unpacked_size
            );
        }
        data.truncate(entry.unpacked_size as usize);
        Ok(data)
    }

    /// Read the first `len` stored bytes of a payload and decrypt them
    fn read_payload(&self, entry: &PkgEntry, len: usize) -> Result<Vec<u8>> {
        if entry.packed_size == 0 || len == 0 {
            return Ok(Vec::new());
        }

        let available = self.len.saturating_sub(entry.offset);
        let read = usize::try_from(available).map_or(len, |available| len.min(available));
        // encrypted payloads may be stored without their final padding
        if len - read > PAYLOAD_SLACK {
            return Err(PkgError::malformed_container(format!(
                "{}: payload at {} needs {len} bytes, {available} available",
                entry.path, entry.offset
            )));
        }

        let key = entry
            .encrypted
            .then(|| md5_hex_key(self.provider.data_key(), entry.file_name()));

        let mut data = vec![0u8; read];
        let mut reader = self.reader.lock();
        reader.seek(SeekFrom::Start(entry.offset))?;
        for stride in data.chunks_mut(PAYLOAD_STRIDE) {
            reader.read_exact(stride)?;
            if let Some(key) = &key {
                Cipher::Rijndael.decrypt(stride, key.as_bytes())?;
            }
        }
        Ok(data)
    }
}

fn open_named(path: &Path) -> Result<(String, File)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PkgError::malformed_container(format!("bad file name: {}", path.display()))
        })?
        .to_string();
    let file = File::open(path)?;
    Ok((name, file))
}

/// Decrypt the header with one provider's key, then read the entry table
fn read_table<R: Read + Seek>(
    reader: &mut R,
    name: &str,
    provider: Provider,
    header: &[u8],
    len: u64,
) -> Result<(String, Vec<PkgEntry>)> {
    let key = md5_hex_key(provider.header_key(), name);

    let mut header = header.to_vec();
    Cipher::Rijndael.decrypt(&mut header, key.as_bytes())?;

    let directory = read_path(&header[..PATH_FIELD_SIZE]).ok_or(PkgError::ProviderMismatch {
        provider: provider.name(),
        container: name.to_string(),
    })?;

    let mut cursor = Cursor::new(&header[PATH_FIELD_SIZE..]);
    let unknown = cursor.read_u32::<LittleEndian>()?;
    let count = cursor.read_u32::<LittleEndian>()? as usize;

    let table_start = (CONTAINER_PREFIX_SIZE + CONTAINER_HEADER_SIZE) as u64;
    let table_len = count
        .checked_mul(ENTRY_RECORD_SIZE)
        .filter(|&n| table_start + n as u64 <= len)
        .ok_or_else(|| {
            PkgError::malformed_container(format!(
                "{name}: {count} entries do not fit in {len} bytes"
            ))
        })?;
    let payload_base = table_start + table_len as u64;

    log::debug!("{name}: directory {directory:?}, {count} entries, unknown 0x{unknown:08X}");

    let mut table = vec![0u8; table_len];
    reader.seek(SeekFrom::Start(table_start))?;
    reader.read_exact(&mut table)?;

    let mut entries = Vec::with_capacity(count);
    for (index, record) in table.chunks_exact_mut(ENTRY_RECORD_SIZE).enumerate() {
        Cipher::Rijndael.decrypt(record, key.as_bytes())?;
        let entry = parse_entry(record, payload_base).ok_or_else(|| {
            PkgError::malformed_container(format!("{name}: entry {index} has no valid path"))
        })?;
        log::trace!(
            "{}: offset {}, {} -> {} bytes{}",
            entry.path,
            entry.offset,
            entry.packed_size,
            entry.unpacked_size,
            if entry.encrypted { ", encrypted" } else { "" }
        );
        entries.push(entry);
    }

    Ok((directory, entries))
}

/// NUL-terminated, printable path with `/` separators
fn read_path(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|&b| b == 0)?;
    let bytes = &field[..end];
    if bytes.iter().any(|&b| b < 0x20 || b == 0x7F) {
        return None;
    }
    Some(String::from_utf8_lossy(bytes).replace('\\', "/"))
}

fn parse_entry(record: &[u8], payload_base: u64) -> Option<PkgEntry> {
    let path = read_path(&record[..PATH_FIELD_SIZE])?;
    let mut cursor = Cursor::new(&record[PATH_FIELD_SIZE..]);
    let offset = cursor.read_u32::<LittleEndian>().ok()?;
    let packed_size = cursor.read_u32::<LittleEndian>().ok()?;
    let unpacked_size = cursor.read_u32::<LittleEndian>().ok()?;
    let _unknown = cursor.read_u8().ok()?;
    let encrypted = cursor.read_u8().ok()? != 0;
    Some(PkgEntry {
        path,
        offset: payload_base + u64::from(offset),
        packed_size,
        unpacked_size,
        encrypted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestContainer;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts the bytes pulled through `Read`
    struct CountingReader {
        inner: Cursor<Vec<u8>>,
        read: Arc<AtomicUsize>,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.read.fetch_add(n, Ordering::SeqCst);
            Ok(n)
        }
    }

    impl Seek for CountingReader {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn sample() -> TestContainer {
        TestContainer::new("sample.pkg", Provider::Nexon)
            .directory("D:\\build\\cstrike")
            .file("Data/test.txt", b"hello world")
            .encrypted_file("materials/brick.vmt", b"\"LightmappedGeneric\" {}")
    }

    #[test]
    fn test_parse_entries() {
        let data = sample().build().unwrap();
        let container = PkgContainer::from_bytes("sample.pkg", Provider::Nexon, data).unwrap();

        assert_eq!(container.directory(), "D:/build/cstrike");
        assert_eq!(container.entries().len(), 2);

        let table_end =
            (CONTAINER_PREFIX_SIZE + CONTAINER_HEADER_SIZE + 2 * ENTRY_RECORD_SIZE) as u64;
        let first = &container.entries()[0];
        assert_eq!(first.path(), "Data/test.txt");
        assert_eq!(first.file_name(), "test.txt");
        assert_eq!(first.offset(), table_end);
        assert_eq!(first.packed_size(), 11);
        assert!(!first.is_encrypted());

        let second = &container.entries()[1];
        assert_eq!(second.offset(), table_end + 11);
        assert_eq!(second.packed_size(), 32);
        assert_eq!(second.unpacked_size(), 23);
        assert!(second.is_encrypted());
    }

    #[test]
    fn test_read_entries() {
        let data = sample().build().unwrap();
        let container = PkgContainer::from_bytes("sample.pkg", Provider::Nexon, data).unwrap();

        let plain = container.find("data\\TEST.txt").unwrap();
        assert_eq!(container.read_entry(plain).unwrap(), b"hello world");

        let secret = container.find("materials/brick.vmt").unwrap();
        assert_eq!(
            container.read_entry(secret).unwrap(),
            b"\"LightmappedGeneric\" {}"
        );
    }

    #[test]
    fn test_large_payload_uses_independent_strides() {
        let payload: Vec<u8> = (0..PAYLOAD_STRIDE * 2 + 100).map(|i| (i % 251) as u8).collect();
        let data = TestContainer::new("big.pkg", Provider::Tiancity)
            .encrypted_file("maps/big.bsp", &payload)
            .build()
            .unwrap();
        let container = PkgContainer::from_bytes("big.pkg", Provider::Tiancity, data).unwrap();
        let entry = &container.entries()[0];
        assert_eq!(container.read_entry(entry).unwrap(), payload);
    }

    #[test]
    fn test_open_reads_only_header_and_table() {
        let payload = vec![0x5Au8; PAYLOAD_STRIDE + 40];
        let data = TestContainer::new("lazy.pkg", Provider::Nexon)
            .file("Data/small.txt", b"tiny")
            .encrypted_file("sound/big.wav", &payload)
            .build()
            .unwrap();
        let read = Arc::new(AtomicUsize::new(0));
        let reader = CountingReader {
            inner: Cursor::new(data),
            read: Arc::clone(&read),
        };

        let container = PkgContainer::load("lazy.pkg", &[Provider::Nexon], reader).unwrap();
        let table_bytes = CONTAINER_HEADER_SIZE + 2 * ENTRY_RECORD_SIZE;
        assert_eq!(read.load(Ordering::SeqCst), table_bytes);

        let entry = container.find("sound/big.wav").unwrap();
        assert_eq!(container.read_entry(entry).unwrap(), payload);
        assert_eq!(
            read.load(Ordering::SeqCst),
            table_bytes + entry.packed_size() as usize
        );
    }

    #[test]
    fn test_open_any_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let payload: Vec<u8> = (0..PAYLOAD_STRIDE * 3 + 7).map(|i| (i % 241) as u8).collect();
        let path = TestContainer::new("disk.pkg", Provider::Tiancity)
            .file("Data/readme.txt", b"on disk")
            .encrypted_file("maps/disk.bsp", &payload)
            .write_to(dir.path())
            .unwrap();

        let container = PkgContainer::open_any(&path).unwrap();
        assert_eq!(container.provider(), Provider::Tiancity);
        assert_eq!(container.name(), "disk.pkg");

        // read out of table order to exercise seeking
        let map = container.find("maps/disk.bsp").unwrap();
        assert_eq!(container.read_entry(map).unwrap(), payload);
        let readme = container.find("Data/readme.txt").unwrap();
        assert_eq!(container.read_entry(readme).unwrap(), b"on disk");
        assert_eq!(container.read_entry(map).unwrap(), payload);
    }

    #[test]
    fn test_wrong_provider_is_a_mismatch() {
        let data = sample().build().unwrap();
        let err = PkgContainer::from_bytes("sample.pkg", Provider::Beancity, data).unwrap_err();
        assert!(err.is_provider_mismatch(), "{err}");
    }

    #[test]
    fn test_renamed_container_does_not_decrypt() {
        let data = sample().build().unwrap();
        let err = PkgContainer::from_bytes("renamed.pkg", Provider::Nexon, data).unwrap_err();
        assert!(err.is_provider_mismatch(), "{err}");
    }

    #[test]
    fn test_detects_provider() {
        let data = TestContainer::new("cn.pkg", Provider::Beancity)
            .file("a.txt", b"a")
            .build()
            .unwrap();
        let container = PkgContainer::from_bytes_any("cn.pkg", data).unwrap();
        assert_eq!(container.provider(), Provider::Beancity);
    }

    #[test]
    fn test_truncated_table() {
        let mut data = sample().build().unwrap();
        data.truncate(CONTAINER_PREFIX_SIZE + CONTAINER_HEADER_SIZE + ENTRY_RECORD_SIZE);
        assert!(matches!(
            PkgContainer::from_bytes("sample.pkg", Provider::Nexon, data),
            Err(PkgError::MalformedContainer(_))
        ));
    }

    #[test]
    fn test_short_payload_slack() {
        let mut data = sample().build().unwrap();
        // drop the last 10 bytes of the encrypted payload
        data.truncate(data.len() - 10);
        let container = PkgContainer::from_bytes("sample.pkg", Provider::Nexon, data).unwrap();
        let entry = container.find("materials/brick.vmt").unwrap();
        assert!(container.read_entry(entry).is_ok());

        let mut data = sample().build().unwrap();
        data.truncate(data.len() - 20);
        let container = PkgContainer::from_bytes("sample.pkg", Provider::Nexon, data).unwrap();
        let entry = container.find("materials/brick.vmt").unwrap();
        assert!(matches!(
            container.read_entry(entry),
            Err(PkgError::MalformedContainer(_))
        ));
    }

    #[test]
    fn test_empty_entry() {
        let data = TestContainer::new("e.pkg", Provider::Nexon)
            .file("empty.txt", b"")
            .build()
            .unwrap();
        let container = PkgContainer::from_bytes("e.pkg", Provider::Nexon, data).unwrap();
        let entry = &container.entries()[0];
        assert!(container.read_entry(entry).unwrap().is_empty());
        assert_eq!(entry.detect_flags(&container).unwrap(), EntryFlags::default());
    }

    #[test]
    fn test_detect_flags() {
        let wrapped =
            crate::EncryptedFile::encode("a.etxt", Cipher::Aes, 1, b"some configuration text")
                .unwrap();
        let data = TestContainer::new("f.pkg", Provider::Nexon)
            .encrypted_file("cfg/a.etxt", &wrapped)
            .file("cfg/b.txt", b"just plain text, long enough")
            .build()
            .unwrap();
        let container = PkgContainer::from_bytes("f.pkg", Provider::Nexon, data).unwrap();

        let flags = container.entries()[0].detect_flags(&container).unwrap();
        assert!(flags.encrypted_file);
        assert!(!flags.compressed_texture);

        let flags = container.entries()[1].detect_flags(&container).unwrap();
        assert_eq!(flags, EntryFlags::default());
    }
}
