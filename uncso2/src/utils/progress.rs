//! Progress bar utilities

use cso2_pkg::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};

/// Create a standard progress bar
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message(message.to_string());
    pb
}

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Forwards extraction progress to a progress bar
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// Drive a bar, hidden when `quiet` is set
    pub fn new(message: &str, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            create_progress_bar(0, message)
        };
        Self { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl ProgressSink for BarProgress {
    fn set_bounds(&mut self, min: usize, max: usize) {
        self.bar.set_length(max.saturating_sub(min) as u64);
    }

    fn set_value(&mut self, value: usize) {
        self.bar.set_position(value as u64);
    }

    fn set_label(&mut self, label: &str) {
        self.bar.set_message(label.to_string());
    }
}
