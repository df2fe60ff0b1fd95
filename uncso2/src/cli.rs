//! Root CLI structure for uncso2

use clap::{Args, Parser, Subcommand, ValueEnum};
use cso2_pkg::{ExtractOptions, Provider};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "uncso2")]
#[command(about = "Extract and convert Counter-Strike Online 2 package archives", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the containers named by an encrypted manifest
    Manifest {
        /// Path to the manifest file
        path: PathBuf,
    },

    /// List the entries of a container
    List(ListArgs),

    /// Extract containers or single entries
    Extract(ExtractArgs),

    /// Decrypt and decompress a loose file
    Convert(ConvertArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Publisher whose keys open the containers
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProviderArg {
    /// Try every known publisher
    #[default]
    Auto,
    Nexon,
    Tiancity,
    Beancity,
    NexonJp,
}

impl ProviderArg {
    pub fn provider(self) -> Option<Provider> {
        match self {
            ProviderArg::Auto => None,
            ProviderArg::Nexon => Some(Provider::Nexon),
            ProviderArg::Tiancity => Some(Provider::Tiancity),
            ProviderArg::Beancity => Some(Provider::Beancity),
            ProviderArg::NexonJp => Some(Provider::NexonJp),
        }
    }
}

#[derive(Args)]
pub struct ListArgs {
    /// Path to the container
    pub container: PathBuf,

    /// Publisher keys
    #[arg(short, long, value_enum, default_value_t)]
    pub provider: ProviderArg,

    /// Show sizes and offsets
    #[arg(short, long)]
    pub long: bool,

    /// Peek at each payload to flag encrypted files and compressed textures
    #[arg(short, long)]
    pub detect: bool,

    /// Filter entries by pattern (supports wildcards)
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Switches shared by extract and convert
#[derive(Args, Clone, Debug)]
pub struct TranscodeArgs {
    /// Keep app-encrypted files as they are
    #[arg(long)]
    pub no_decrypt: bool,

    /// Keep compressed textures and maps as they are
    #[arg(long)]
    pub no_decompress: bool,

    /// Skip narrowing map lump records
    #[arg(long)]
    pub no_fix_lumps: bool,

    /// Keep the original extension of decrypted files
    #[arg(long)]
    pub keep_names: bool,

    /// Replace the shadow block material with an invisible one
    #[arg(long)]
    pub replace_shadowblock: bool,
}

impl TranscodeArgs {
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions::new()
            .allow_decrypt(!self.no_decrypt)
            .allow_decompress(!self.no_decompress)
            .fix_bsp_lumps(!self.no_fix_lumps)
            .rename_decrypted(!self.keep_names)
            .replace_shadowblock(self.replace_shadowblock)
    }
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Containers to extract, or a manifest with --manifest
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Treat the input as a manifest and extract every container it lists
    #[arg(short, long)]
    pub manifest: bool,

    /// Only extract these entries (all entries if not specified)
    #[arg(short = 'e', long = "entry")]
    pub entries: Vec<String>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Publisher keys
    #[arg(short, long, value_enum, default_value_t)]
    pub provider: ProviderArg,

    /// Abort on the first failure
    #[arg(long)]
    pub stop_on_error: bool,

    #[command(flatten)]
    pub transcode: TranscodeArgs,
}

impl ExtractArgs {
    pub fn options(&self) -> ExtractOptions {
        self.transcode.options().stop_on_error(self.stop_on_error)
    }
}

#[derive(Args)]
pub struct ConvertArgs {
    /// File to convert
    pub input: PathBuf,

    /// Where to write the result
    pub output: PathBuf,

    #[command(flatten)]
    pub transcode: TranscodeArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_map_onto_options() {
        let cli = Cli::parse_from([
            "uncso2",
            "extract",
            "a.pkg",
            "--no-decrypt",
            "--keep-names",
            "--stop-on-error",
            "--provider",
            "nexon-jp",
        ]);
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.provider.provider(), Some(Provider::NexonJp));
        let options = args.options();
        assert!(!options.allow_decrypt);
        assert!(options.allow_decompress);
        assert!(!options.rename_decrypted);
        assert!(options.stop_on_error);
        assert!(!options.replace_shadowblock);
    }
}
