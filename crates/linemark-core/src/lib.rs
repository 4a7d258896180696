//! Core types, configuration, and error handling for linemark.
//!
//! This crate provides the shared foundation used by the other linemark crates:
//! - [`LinemarkError`]: unified error type using `thiserror`
//! - [`LinemarkConfig`]: configuration loaded from `.linemark.toml`
//! - Shared types: [`DiffBlock`], [`BlockKind`], [`BlockStyle`], [`DiffSummary`],
//!   [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{DiffAlgorithm, EngineConfig, GitConfig, LinemarkConfig, SyncConfig};
pub use error::LinemarkError;
pub use types::{BlockKind, BlockStyle, DiffBlock, DiffSummary, OutputFormat, Rgb};

/// A convenience `Result` type for linemark operations.
pub type Result<T> = std::result::Result<T, LinemarkError>;
