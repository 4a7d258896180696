use std::path::PathBuf;

/// Errors that can occur across the linemark crates.
///
/// Library crates return this type directly; the binary reports it through
/// `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use linemark_core::LinemarkError;
///
/// let err = LinemarkError::Config("unknown algorithm".into());
/// assert!(err.to_string().contains("unknown algorithm"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LinemarkError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The baseline or current text of a file could not be obtained.
    #[error("input unavailable: {0}")]
    InputUnavailable(String),

    /// The line alignment could not be computed.
    #[error("diff computation failed: {0}")]
    DiffFailed(String),

    /// A block's line range does not fit the current document.
    #[error("block {block_id} (lines {start_line}-{end_line}) is out of range for the current document")]
    OffsetOutOfRange {
        /// Identifier of the offending block.
        block_id: String,
        /// First line of the block.
        start_line: usize,
        /// Exclusive end line of the block.
        end_line: usize,
    },

    /// A block's span no longer holds the lines it was computed from.
    #[error("block {0} no longer matches the document")]
    #[diagnostic(help("recompute the diff and try again"))]
    StaleBlock(String),

    /// A document edit was refused by the editor.
    #[error("document mutation failed: {0}")]
    #[diagnostic(help("the document was left unchanged"))]
    Mutation(String),

    /// No pending annotation exists for the requested block.
    #[error("no pending diff block with id {0}")]
    UnknownBlock(String),
}
