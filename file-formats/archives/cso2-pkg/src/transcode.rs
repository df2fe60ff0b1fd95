//! Unwrapping of encoded entry contents
//!
//! Entries can carry up to three nested encodings. They are undone in a
//! fixed order: the app-encrypted wrapper, then compressed textures, then
//! vendor maps. Each stage can be switched off through [`ExtractOptions`].

use crate::encrypted_file::{EncryptedFile, fix_decrypted_extension, is_encrypted_file};
use crate::{PkgError, Result};
use cso2_bsp::{BspTranscoder, is_bsp_file};
use cso2_vtf::{decompress_vtf, is_compressed_vtf};
use std::fs;
use std::path::{Path, PathBuf};

/// Material swapped out when [`ExtractOptions::replace_shadowblock`] is set
pub const SHADOWBLOCK_MATERIAL: &str = "toolsshadowblock.vmt";

/// Invisible material written in place of the shadow block
pub const SHADOWBLOCK_REPLACEMENT: &[u8] =
    b"\"LightmappedGeneric\"\r\n{\r\n\t\"$translucent\"\t\"1\"\r\n\t\"$alpha\"\t\"0\"\r\n}\r\n";

/// Options controlling extraction and content transcoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Unwrap app-encrypted files
    pub allow_decrypt: bool,
    /// Decompress textures and maps
    pub allow_decompress: bool,
    /// Narrow map lump records after decompression
    pub fix_bsp_lumps: bool,
    /// Drop the marker from decrypted files' extensions
    pub rename_decrypted: bool,
    /// Replace the shadow block material with an invisible one
    pub replace_shadowblock: bool,
    /// Abort the job on the first failure
    pub stop_on_error: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create new default options
    ///
    /// Every transcoding stage is on, the shadow block is kept and failures
    /// are recorded without stopping the job.
    pub fn new() -> Self {
        Self {
            allow_decrypt: true,
            allow_decompress: true,
            fix_bsp_lumps: true,
            rename_decrypted: true,
            replace_shadowblock: false,
            stop_on_error: false,
        }
    }

    /// Set whether app-encrypted files are unwrapped
    pub fn allow_decrypt(mut self, allow: bool) -> Self {
        self.allow_decrypt = allow;
        self
    }

    /// Set whether textures and maps are decompressed
    pub fn allow_decompress(mut self, allow: bool) -> Self {
        self.allow_decompress = allow;
        self
    }

    /// Set whether map lump records are narrowed
    pub fn fix_bsp_lumps(mut self, fix: bool) -> Self {
        self.fix_bsp_lumps = fix;
        self
    }

    /// Set whether decrypted files are renamed
    pub fn rename_decrypted(mut self, rename: bool) -> Self {
        self.rename_decrypted = rename;
        self
    }

    /// Set whether the shadow block material is replaced
    pub fn replace_shadowblock(mut self, replace: bool) -> Self {
        self.replace_shadowblock = replace;
        self
    }

    /// Set whether the first failure aborts the job
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }
}

/// Result of transcoding one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    /// Output path, possibly renamed
    pub path: String,
    /// Output contents
    pub data: Vec<u8>,
}

/// Applies the decrypt and decompress stages to file contents
#[derive(Debug, Clone, Default)]
pub struct ContentTranscoder {
    options: ExtractOptions,
}

impl ContentTranscoder {
    /// Create a transcoder
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Options in use
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Transcode the contents of the file at `path`
    ///
    /// `path` uses `/` separators. Its last component keys the app-encrypted
    /// wrapper. A failing stage fails the whole file.
    pub fn transcode(&self, path: &str, data: Vec<u8>) -> Result<Transcoded> {
        let file_name = path.rsplit('/').next().unwrap_or(path);

        if self.options.replace_shadowblock && file_name.eq_ignore_ascii_case(SHADOWBLOCK_MATERIAL)
        {
            log::debug!("{path}: replacing shadow block material");
            return Ok(Transcoded {
                path: path.to_string(),
                data: SHADOWBLOCK_REPLACEMENT.to_vec(),
            });
        }

        let mut out_path = path.to_string();
        let mut data = data;

        if self.options.allow_decrypt && is_encrypted_file(&data) {
            data = EncryptedFile::parse(file_name, &data)?.decrypt()?;
            if self.options.rename_decrypted {
                out_path = fix_decrypted_extension(&out_path);
            }
            log::debug!("{path}: decrypted to {out_path}");
        }

        if self.options.allow_decompress && is_compressed_vtf(&data) {
            data = decompress_vtf(&data)?;
            log::debug!("{path}: decompressed texture, {} bytes", data.len());
        }

        if self.options.allow_decompress && is_bsp_file(&data) {
            data = BspTranscoder::new()
                .fix_lumps(self.options.fix_bsp_lumps)
                .transcode(&data)?;
            log::debug!("{path}: transcoded map, {} bytes", data.len());
        }

        Ok(Transcoded {
            path: out_path,
            data,
        })
    }

    /// Transcode a loose file into `output`
    ///
    /// When the input was decrypted and renaming is on, the output file
    /// name gets the same extension fix. Returns the path written.
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        let in_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PkgError::Io(std::io::Error::other("input has no file name")))?;
        let out_name = output
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PkgError::Io(std::io::Error::other("output has no file name")))?;

        let data = fs::read(input)?;
        let transcoded = self.transcode(in_name, data)?;

        let target = if transcoded.path != in_name {
            output.with_file_name(fix_decrypted_extension(out_name))
        } else {
            output.to_path_buf()
        };
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &transcoded.data)?;
        Ok(target)
    }
}
