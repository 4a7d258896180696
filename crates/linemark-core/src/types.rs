use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LinemarkError;

/// Classification of a diff block.
///
/// # Examples
///
/// ```
/// use linemark_core::BlockKind;
///
/// let kind = BlockKind::Modified;
/// assert_eq!(format!("{kind}"), "modified");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Lines present only in the new version.
    Added,
    /// Lines present only in the baseline.
    Deleted,
    /// Baseline lines replaced by new lines at the same position.
    Modified,
}

impl BlockKind {
    /// Presentation attributes for this kind, looked up in a static table.
    ///
    /// # Examples
    ///
    /// ```
    /// use linemark_core::BlockKind;
    ///
    /// assert_eq!(BlockKind::Added.style().symbol, '+');
    /// assert_eq!(BlockKind::Deleted.style().label, "Deletion");
    /// ```
    pub fn style(self) -> &'static BlockStyle {
        match self {
            BlockKind::Added => &BLOCK_STYLES[0],
            BlockKind::Deleted => &BLOCK_STYLES[1],
            BlockKind::Modified => &BLOCK_STYLES[2],
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Added => write!(f, "added"),
            BlockKind::Deleted => write!(f, "deleted"),
            BlockKind::Modified => write!(f, "modified"),
        }
    }
}

/// An RGB color triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// How a block of a given kind is presented by a rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockStyle {
    /// Gutter symbol.
    pub symbol: char,
    /// Human-readable label.
    pub label: &'static str,
    /// Marker color.
    pub color: Rgb,
}

static BLOCK_STYLES: [BlockStyle; 3] = [
    BlockStyle {
        symbol: '+',
        label: "Addition",
        color: Rgb(76, 175, 80),
    },
    BlockStyle {
        symbol: '-',
        label: "Deletion",
        color: Rgb(244, 67, 54),
    },
    BlockStyle {
        symbol: '~',
        label: "Modification",
        color: Rgb(255, 152, 0),
    },
];

/// One classified change between a baseline and a new version of a text.
///
/// Lines are 0-indexed in new-version numbering and `end_line` is exclusive.
/// A pure deletion is collapsed to an anchor where `start_line == end_line`.
/// Blocks are immutable once built; a recomputation replaces them wholesale.
///
/// # Examples
///
/// ```
/// use linemark_core::{BlockKind, DiffBlock};
///
/// let block = DiffBlock::new(1, 2, vec!["b".into()], vec!["x".into()], "diff_block_1".into()).unwrap();
/// assert_eq!(block.kind(), BlockKind::Modified);
/// assert_eq!(block.line_span(), 1..2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffBlock {
    kind: BlockKind,
    start_line: usize,
    end_line: usize,
    old_content: Vec<String>,
    new_content: Vec<String>,
    block_id: String,
}

impl DiffBlock {
    /// Build a block, deriving its kind from which side has content.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::DiffFailed`] if both sides are empty, the
    /// range is inverted, or the span does not match the new lines (so a
    /// deletion must be collapsed).
    pub fn new(
        start_line: usize,
        end_line: usize,
        old_content: Vec<String>,
        new_content: Vec<String>,
        block_id: String,
    ) -> Result<Self, LinemarkError> {
        let kind = match (old_content.is_empty(), new_content.is_empty()) {
            (true, false) => BlockKind::Added,
            (false, true) => BlockKind::Deleted,
            (false, false) => BlockKind::Modified,
            (true, true) => {
                return Err(LinemarkError::DiffFailed(format!(
                    "block {block_id} has no content on either side"
                )))
            }
        };
        if start_line > end_line {
            return Err(LinemarkError::DiffFailed(format!(
                "block {block_id} has inverted range {start_line}..{end_line}"
            )));
        }
        // New-version lines are exactly the span; a deletion has none.
        if end_line - start_line != new_content.len() {
            return Err(LinemarkError::DiffFailed(format!(
                "block {block_id} spans {} lines but has {} new lines",
                end_line - start_line,
                new_content.len()
            )));
        }
        Ok(Self {
            kind,
            start_line,
            end_line,
            old_content,
            new_content,
            block_id,
        })
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// First line of the block in the new version.
    pub fn start_line(&self) -> usize {
        self.start_line
    }

    /// Exclusive end line in the new version.
    pub fn end_line(&self) -> usize {
        self.end_line
    }

    /// Baseline lines covered by this block.
    pub fn old_content(&self) -> &[String] {
        &self.old_content
    }

    /// New-version lines covered by this block.
    pub fn new_content(&self) -> &[String] {
        &self.new_content
    }

    /// Identifier, unique within the computation that produced the block.
    pub fn block_id(&self) -> &str {
        &self.block_id
    }

    pub fn line_span(&self) -> Range<usize> {
        self.start_line..self.end_line
    }

    pub fn is_addition(&self) -> bool {
        self.kind == BlockKind::Added
    }

    pub fn is_deletion(&self) -> bool {
        self.kind == BlockKind::Deleted
    }

    pub fn is_modification(&self) -> bool {
        self.kind == BlockKind::Modified
    }

    /// A short label such as `"Modification (lines 1-2)"`.
    pub fn describe(&self) -> String {
        format!(
            "{} (lines {}-{})",
            self.kind.style().label,
            self.start_line,
            self.end_line
        )
    }
}

/// Aggregate counts over one computation's blocks.
///
/// # Examples
///
/// ```
/// use linemark_core::{DiffBlock, DiffSummary};
///
/// let blocks = vec![
///     DiffBlock::new(2, 3, vec![], vec!["c".into()], "diff_block_1".into()).unwrap(),
/// ];
/// let summary = DiffSummary::from_blocks(&blocks);
/// assert_eq!(summary.added, 1);
/// assert_eq!(summary.lines_added, 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    /// Lines present only in the new version.
    pub lines_added: usize,
    /// Lines present only in the baseline.
    pub lines_removed: usize,
}

impl DiffSummary {
    pub fn from_blocks(blocks: &[DiffBlock]) -> Self {
        let mut summary = Self::default();
        for block in blocks {
            match block.kind() {
                BlockKind::Added => summary.added += 1,
                BlockKind::Deleted => summary.deleted += 1,
                BlockKind::Modified => summary.modified += 1,
            }
            summary.lines_added += block.new_content().len();
            summary.lines_removed += block.old_content().len();
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.added + self.deleted + self.modified
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use linemark_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable listing.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
