//! Git-backed baselines for diff annotations.
//!
//! Resolves the committed version of a file with git2 so the live buffer can
//! be diffed against it.

pub mod provider;

pub use provider::GitVersionProvider;
