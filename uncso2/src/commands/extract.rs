//! Container extraction

use anyhow::{Context, Result, bail};
use cso2_pkg::{DirectorySource, EntryRef, ExtractReport, Extractor, PkgManifest};
use std::path::Path;

use crate::cli::{ExtractArgs, ProviderArg};
use crate::utils::BarProgress;

pub fn execute(args: ExtractArgs, quiet: bool) -> Result<()> {
    let options = args.options();
    let mut progress = BarProgress::new("Extracting", quiet);

    let report = if args.manifest {
        let [manifest_path] = args.inputs.as_slice() else {
            bail!("--manifest takes exactly one manifest path");
        };
        if !args.entries.is_empty() {
            bail!("--entry selects files of a single container, not of a manifest");
        }
        let manifest = PkgManifest::open(manifest_path)
            .with_context(|| format!("Failed to open manifest {}", manifest_path.display()))?;
        log::info!(
            "{} lists {} packages",
            manifest.name(),
            manifest.filenames().len()
        );
        log::debug!("manifest suggests provider {}", manifest.provider());

        let extractor = Extractor::new(
            source_for(parent_dir(manifest_path), args.provider),
            &args.output,
            options,
        );
        extractor.extract_containers(manifest.filenames(), &mut progress)?
    } else {
        let mut report = ExtractReport::default();
        for input in &args.inputs {
            let name = file_name(input)?;
            let extractor = Extractor::new(
                source_for(parent_dir(input), args.provider),
                &args.output,
                options.clone(),
            );
            let part = extract(&extractor, &[name], &args.entries, &mut progress)?;
            report.written.extend(part.written);
            report.failures.extend(part.failures);
        }
        report
    };

    progress.finish("Extraction complete");

    for (item, error) in &report.failures {
        log::error!("{item}: {error}");
    }
    if !quiet {
        println!(
            "Extracted {} files to {}",
            report.written.len(),
            args.output.display()
        );
    }
    if !report.failures.is_empty() {
        bail!("{} items failed to extract", report.failures.len());
    }
    Ok(())
}

fn extract(
    extractor: &Extractor<DirectorySource>,
    containers: &[String],
    entries: &[String],
    progress: &mut BarProgress,
) -> Result<ExtractReport> {
    let report = if entries.is_empty() {
        extractor.extract_containers(containers, progress)?
    } else {
        let requests: Vec<EntryRef> = containers
            .iter()
            .flat_map(|c| entries.iter().map(move |e| EntryRef::new(c.as_str(), e.as_str())))
            .collect();
        extractor.extract(&requests, progress)?
    };
    Ok(report)
}

fn source_for(dir: &Path, provider: ProviderArg) -> DirectorySource {
    let source = DirectorySource::new(dir);
    match provider.provider() {
        Some(provider) => source.with_provider(provider),
        None => source,
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("Not a container path: {}", path.display()))
}
