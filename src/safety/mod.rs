//! Safety analysis: per-word scanner and whole-tree classifier.

pub mod classify;
pub mod scan;

pub use classify::safe_command;
pub use scan::{Verdict, scan_text, scan_word};
