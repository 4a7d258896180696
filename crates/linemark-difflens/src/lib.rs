//! Line-level diff computation and reporting.
//!
//! Aligns two versions of a text with a minimal edit script (via `similar`),
//! folds the edit script into classified [`linemark_core::DiffBlock`]s, and
//! renders them as text, JSON or Markdown reports.

pub mod engine;
pub mod report;

pub use engine::{split_lines, DiffEngine};
pub use report::DiffReport;
