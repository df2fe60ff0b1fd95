//! Shared utilities for the uncso2 CLI

pub mod format;
pub mod io;
pub mod progress;

pub use format::*;
pub use io::*;
pub use progress::*;
