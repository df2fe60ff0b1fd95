//! Loose file conversion

use anyhow::{Context, Result};
use cso2_pkg::ContentTranscoder;

use crate::cli::ConvertArgs;

pub fn execute(args: ConvertArgs) -> Result<()> {
    let transcoder = ContentTranscoder::new(args.transcode.options());
    let written = transcoder
        .convert_file(&args.input, &args.output)
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;
    println!("{} -> {}", args.input.display(), written.display());
    Ok(())
}
