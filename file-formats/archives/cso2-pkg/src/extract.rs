//! Batch extraction
//!
//! An [`Extractor`] takes a list of requested entries, groups them by
//! container and loads every container once. Each entry is read, run
//! through the [`ContentTranscoder`] and written below the output root.
//!
//! Failures are per item. Unless [`ExtractOptions::stop_on_error`] is set,
//! a failing entry or container is recorded in the [`ExtractReport`] and the
//! job moves on. Files already written stay on disk either way.
//!
//! [`ExtractJob`] runs an extractor on a worker thread and exposes its
//! progress through a shared [`JobState`] the caller polls.

use crate::container::{PkgContainer, PkgEntry};
use crate::transcode::{ContentTranscoder, ExtractOptions};
use crate::{PkgError, Provider, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Interval at which [`ExtractJob::wait`] polls the worker
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Loads containers by file name
pub trait ContainerSource {
    /// Load and parse the named container
    fn load(&self, name: &str) -> Result<PkgContainer>;
}

/// Loads containers from a directory on disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    provider: Option<Provider>,
}

impl DirectorySource {
    /// Load from `root`, detecting each container's provider
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            provider: None,
        }
    }

    /// Use a fixed provider instead of detecting one
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Directory containers are loaded from
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContainerSource for DirectorySource {
    fn load(&self, name: &str) -> Result<PkgContainer> {
        let path = self.root.join(name);
        match self.provider {
            Some(provider) => PkgContainer::open(path, provider),
            None => PkgContainer::open_any(path),
        }
    }
}

/// Receives progress updates
pub trait ProgressSink {
    /// Set the range of the progress value
    fn set_bounds(&mut self, min: usize, max: usize);
    /// Set the number of finished items
    fn set_value(&mut self, value: usize);
    /// Describe the item being worked on
    fn set_label(&mut self, label: &str);
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn set_bounds(&mut self, _min: usize, _max: usize) {}
    fn set_value(&mut self, _value: usize) {}
    fn set_label(&mut self, _label: &str) {}
}

/// An entry requested for extraction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryRef {
    /// Container file name
    pub container: String,
    /// Entry path inside the container
    pub path: String,
}

impl EntryRef {
    /// Create a new entry reference
    pub fn new<C: Into<String>, P: Into<String>>(container: C, path: P) -> Self {
        Self {
            container: container.into(),
            path: path.into(),
        }
    }
}

/// Outcome of an extraction job
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Files written, in extraction order
    pub written: Vec<PathBuf>,
    /// Entry or container names that failed, with their errors
    pub failures: Vec<(String, PkgError)>,
    /// Whether the job was stopped early
    pub cancelled: bool,
}

impl ExtractReport {
    /// Check whether every item was extracted
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Progress shared between a running job and its observers
#[derive(Debug, Clone, Default)]
pub struct JobState {
    completed: Arc<AtomicUsize>,
    current: Arc<Mutex<Option<String>>>,
    stop: Arc<AtomicBool>,
}

impl JobState {
    /// Create a fresh state
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of finished items
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Item being worked on
    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }

    /// Ask the job to stop before its next item
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Check whether a stop was requested
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn advance(&self, items: usize) -> usize {
        self.completed.fetch_add(items, Ordering::AcqRel) + items
    }

    fn set_current(&self, item: &str) {
        *self.current.lock() = Some(item.to_string());
    }
}

/// Extracts entries from containers to a directory
#[derive(Debug)]
pub struct Extractor<S> {
    source: S,
    output: PathBuf,
    transcoder: ContentTranscoder,
    state: JobState,
}

impl<S: ContainerSource> Extractor<S> {
    /// Create an extractor writing below `output`
    pub fn new<P: Into<PathBuf>>(source: S, output: P, options: ExtractOptions) -> Self {
        Self {
            source,
            output: output.into(),
            transcoder: ContentTranscoder::new(options),
            state: JobState::new(),
        }
    }

    /// Share progress through an existing state
    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = state;
        self
    }

    /// Progress state of this extractor
    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Output root
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Extract the requested entries
    ///
    /// Each distinct container is loaded exactly once. Entries of one
    /// container are extracted in request order.
    pub fn extract(
        &self,
        entries: &[EntryRef],
        progress: &mut dyn ProgressSink,
    ) -> Result<ExtractReport> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for entry in entries {
            groups
                .entry(entry.container.as_str())
                .or_default()
                .push(entry.path.as_str());
        }

        log::info!(
            "extracting {} entries from {} containers to {}",
            entries.len(),
            groups.len(),
            self.output.display()
        );
        progress.set_bounds(0, entries.len());

        let mut report = ExtractReport::default();
        'containers: for (name, paths) in groups {
            if self.should_stop(&mut report) {
                break;
            }
            let Some(container) = self.load(name, paths.len(), &mut report, progress)? else {
                continue;
            };

            for path in paths {
                if self.should_stop(&mut report) {
                    break 'containers;
                }
                self.begin_item(path, progress);
                let result = container
                    .find(path)
                    .ok_or_else(|| PkgError::EntryNotFound {
                        container: name.to_string(),
                        path: path.to_string(),
                    })
                    .and_then(|entry| self.extract_entry(&container, entry));
                self.finish_item(path, result, &mut report, progress)?;
            }
        }

        self.log_summary(&report);
        Ok(report)
    }

    /// Extract every entry of the named containers
    ///
    /// Repeated names are loaded once. The progress bound grows as each
    /// container's entry count becomes known.
    pub fn extract_containers(
        &self,
        containers: &[String],
        progress: &mut dyn ProgressSink,
    ) -> Result<ExtractReport> {
        let mut seen = BTreeSet::new();
        let mut total = 0;
        progress.set_bounds(0, total);

        let mut report = ExtractReport::default();
        'containers: for name in containers {
            if !seen.insert(name.as_str()) {
                continue;
            }
            if self.should_stop(&mut report) {
                break;
            }
            let Some(container) = self.load(name, 0, &mut report, progress)? else {
                continue;
            };

            total += container.entries().len();
            progress.set_bounds(0, total);

            for entry in container.entries() {
                if self.should_stop(&mut report) {
                    break 'containers;
                }
                self.begin_item(entry.path(), progress);
                let result = self.extract_entry(&container, entry);
                self.finish_item(entry.path(), result, &mut report, progress)?;
            }
        }

        self.log_summary(&report);
        Ok(report)
    }

    /// Read, transcode and write one entry
    fn extract_entry(&self, container: &PkgContainer, entry: &PkgEntry) -> Result<PathBuf> {
        let data = container.read_entry(entry)?;
        let transcoded = self.transcoder.transcode(entry.path(), data)?;
        let target = output_path(&self.output, &transcoded.path)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &transcoded.data)?;
        Ok(target)
    }

    fn load(
        &self,
        name: &str,
        items: usize,
        report: &mut ExtractReport,
        progress: &mut dyn ProgressSink,
    ) -> Result<Option<PkgContainer>> {
        self.state.set_current(name);
        progress.set_label(&format!("Loading {name}"));

        match self.source.load(name) {
            Ok(container) => {
                log::debug!("loaded {name}: {} entries", container.entries().len());
                Ok(Some(container))
            }
            Err(e) => {
                log::warn!("failed to load {name}: {e}");
                if self.transcoder.options().stop_on_error {
                    return Err(e);
                }
                report.failures.push((name.to_string(), e));
                progress.set_value(self.state.advance(items));
                Ok(None)
            }
        }
    }

    fn should_stop(&self, report: &mut ExtractReport) -> bool {
        if self.state.is_stop_requested() {
            report.cancelled = true;
        }
        report.cancelled
    }

    fn begin_item(&self, path: &str, progress: &mut dyn ProgressSink) {
        self.state.set_current(path);
        progress.set_label(path);
    }

    fn finish_item(
        &self,
        path: &str,
        result: Result<PathBuf>,
        report: &mut ExtractReport,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        match result {
            Ok(target) => {
                log::debug!("{path} -> {}", target.display());
                report.written.push(target);
            }
            Err(e) => {
                log::warn!("failed to extract {path}: {e}");
                if self.transcoder.options().stop_on_error {
                    return Err(e);
                }
                report.failures.push((path.to_string(), e));
            }
        }
        progress.set_value(self.state.advance(1));
        Ok(())
    }

    fn log_summary(&self, report: &ExtractReport) {
        log::info!(
            "extracted {} files, {} failures{}",
            report.written.len(),
            report.failures.len(),
            if report.cancelled { ", cancelled" } else { "" }
        );
    }
}

/// Join an archive path onto the output root
///
/// Empty and `.` components are skipped. `..` is rejected so entries cannot
/// escape the root.
fn output_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut target = root.to_path_buf();
    for part in relative.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                return Err(PkgError::malformed_container(format!(
                    "entry path escapes the output directory: {relative}"
                )));
            }
            part => target.push(part),
        }
    }
    Ok(target)
}

/// An extraction running on a worker thread
#[derive(Debug)]
pub struct ExtractJob {
    state: JobState,
    total: usize,
    handle: Option<JoinHandle<Result<ExtractReport>>>,
}

impl ExtractJob {
    /// Start extracting `entries` on a new thread
    pub fn spawn<S>(extractor: Extractor<S>, entries: Vec<EntryRef>) -> Result<Self>
    where
        S: ContainerSource + Send + 'static,
    {
        let state = extractor.state().clone();
        let total = entries.len();
        let handle = thread::Builder::new()
            .name("cso2-extract".to_string())
            .spawn(move || extractor.extract(&entries, &mut NullProgress))?;

        Ok(Self {
            state,
            total,
            handle: Some(handle),
        })
    }

    /// Shared progress state
    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Ask the worker to stop before its next item
    pub fn cancel(&self) {
        self.state.request_stop();
    }

    /// Check whether the worker has finished
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Poll the worker until it finishes, forwarding progress to `sink`
    pub fn wait(mut self, sink: &mut dyn ProgressSink) -> Result<ExtractReport> {
        sink.set_bounds(0, self.total);

        let mut last_label = None;
        loop {
            let finished = self.is_finished();
            sink.set_value(self.state.completed());
            let current = self.state.current();
            if current.is_some() && current != last_label {
                if let Some(label) = &current {
                    sink.set_label(label);
                }
                last_label = current;
            }
            if finished {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        let handle = self
            .handle
            .take()
            .ok_or_else(|| PkgError::Worker("job already joined".to_string()))?;
        handle
            .join()
            .map_err(|_| PkgError::Worker("extraction thread panicked".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestContainer;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    struct CountingSource {
        containers: Vec<TestContainer>,
        loads: Cell<usize>,
    }

    impl ContainerSource for CountingSource {
        fn load(&self, name: &str) -> Result<PkgContainer> {
            self.loads.set(self.loads.get() + 1);
            let container = self
                .containers
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| PkgError::Io(std::io::ErrorKind::NotFound.into()))?;
            PkgContainer::from_bytes(name, container.provider, container.build()?)
        }
    }

    fn source() -> CountingSource {
        CountingSource {
            containers: vec![
                TestContainer::new("one.pkg", Provider::Nexon)
                    .file("a.txt", b"a")
                    .file("dir/b.txt", b"b")
                    .encrypted_file("dir/c.txt", b"c"),
                TestContainer::new("two.pkg", Provider::Nexon).file("d.txt", b"d"),
            ],
            loads: Cell::new(0),
        }
    }

    #[derive(Default)]
    struct Recorder {
        bounds: (usize, usize),
        values: Vec<usize>,
        labels: Vec<String>,
    }

    impl ProgressSink for Recorder {
        fn set_bounds(&mut self, min: usize, max: usize) {
            self.bounds = (min, max);
        }
        fn set_value(&mut self, value: usize) {
            self.values.push(value);
        }
        fn set_label(&mut self, label: &str) {
            self.labels.push(label.to_string());
        }
    }

    #[test]
    fn test_one_load_per_container() {
        let out = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(source(), out.path(), ExtractOptions::new());
        let requests = vec![
            EntryRef::new("one.pkg", "a.txt"),
            EntryRef::new("two.pkg", "d.txt"),
            EntryRef::new("one.pkg", "dir/b.txt"),
            EntryRef::new("one.pkg", "dir/c.txt"),
        ];

        let mut progress = Recorder::default();
        let report = extractor.extract(&requests, &mut progress).unwrap();
        assert!(report.is_success());
        assert_eq!(extractor.source.loads.get(), 2);
        assert_eq!(report.written.len(), 4);
        assert_eq!(std::fs::read(out.path().join("dir/c.txt")).unwrap(), b"c");

        assert_eq!(progress.bounds, (0, 4));
        assert_eq!(progress.values, vec![1, 2, 3, 4]);
        assert_eq!(extractor.state().completed(), 4);
        assert!(progress.labels.contains(&"Loading one.pkg".to_string()));
    }

    #[test]
    fn test_three_entries_one_load() {
        let out = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(source(), out.path(), ExtractOptions::new());
        let requests = ["a.txt", "dir/b.txt", "dir/c.txt"].map(|p| EntryRef::new("one.pkg", p));

        let report = extractor.extract(&requests, &mut NullProgress).unwrap();
        assert_eq!(report.written.len(), 3);
        assert_eq!(extractor.source.loads.get(), 1);
    }

    #[test]
    fn test_failures_are_recorded() {
        let out = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(source(), out.path(), ExtractOptions::new());
        let requests = vec![
            EntryRef::new("one.pkg", "missing.txt"),
            EntryRef::new("one.pkg", "a.txt"),
            EntryRef::new("gone.pkg", "x.txt"),
            EntryRef::new("gone.pkg", "y.txt"),
        ];

        let report = extractor.extract(&requests, &mut NullProgress).unwrap();
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].0, "gone.pkg");
        assert!(matches!(
            report.failures[1].1,
            PkgError::EntryNotFound { .. }
        ));
        assert_eq!(extractor.state().completed(), 4);
    }

    #[test]
    fn test_stop_on_error() {
        let out = tempfile::tempdir().unwrap();
        let options = ExtractOptions::new().stop_on_error(true);
        let extractor = Extractor::new(source(), out.path(), options);
        let requests = vec![
            EntryRef::new("one.pkg", "a.txt"),
            EntryRef::new("one.pkg", "missing.txt"),
            EntryRef::new("one.pkg", "dir/b.txt"),
        ];

        let err = extractor.extract(&requests, &mut NullProgress).unwrap_err();
        assert!(matches!(err, PkgError::EntryNotFound { .. }));
        // earlier output is left in place
        assert!(out.path().join("a.txt").exists());
        assert!(!out.path().join("dir/b.txt").exists());
    }

    #[test]
    fn test_stop_request_cancels() {
        let out = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(source(), out.path(), ExtractOptions::new());
        extractor.state().request_stop();
        let report = extractor
            .extract(&[EntryRef::new("one.pkg", "a.txt")], &mut NullProgress)
            .unwrap();
        assert!(report.cancelled);
        assert!(report.written.is_empty());
        assert_eq!(extractor.source.loads.get(), 0);
    }

    #[test]
    fn test_extract_containers() {
        let out = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(source(), out.path(), ExtractOptions::new());
        let names = vec!["one.pkg".to_string(), "two.pkg".to_string(), "one.pkg".to_string()];

        let mut progress = Recorder::default();
        let report = extractor.extract_containers(&names, &mut progress).unwrap();
        assert_eq!(report.written.len(), 4);
        assert_eq!(extractor.source.loads.get(), 2);
        assert_eq!(progress.bounds, (0, 4));
    }

    #[test]
    fn test_output_path() {
        let root = Path::new("/out");
        assert_eq!(
            output_path(root, "maps/de_dust2.bsp").unwrap(),
            Path::new("/out/maps/de_dust2.bsp")
        );
        assert_eq!(
            output_path(root, "/./a//b.txt").unwrap(),
            Path::new("/out/a/b.txt")
        );
        assert!(output_path(root, "../etc/passwd").is_err());
    }

    #[test]
    fn test_job_polls_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let packages = dir.path().join("pkg");
        std::fs::create_dir_all(&packages).unwrap();
        TestContainer::new("one.pkg", Provider::Nexon)
            .file("a.txt", b"a")
            .encrypted_file("b.txt", b"b")
            .write_to(&packages)
            .unwrap();

        let out = dir.path().join("out");
        let extractor = Extractor::new(
            DirectorySource::new(&packages),
            &out,
            ExtractOptions::new(),
        );
        let job = ExtractJob::spawn(
            extractor,
            vec![EntryRef::new("one.pkg", "a.txt"), EntryRef::new("one.pkg", "b.txt")],
        )
        .unwrap();

        let mut progress = Recorder::default();
        let report = job.wait(&mut progress).unwrap();
        assert!(report.is_success());
        assert_eq!(progress.bounds, (0, 2));
        assert_eq!(progress.values.last(), Some(&2));
        assert_eq!(std::fs::read(out.join("b.txt")).unwrap(), b"b");
    }
}
