use std::ops::Range;
use std::time::Instant;

use linemark_core::{DiffAlgorithm, DiffBlock, EngineConfig, LinemarkError};
use similar::{Algorithm, DiffTag};

/// Prefix of every generated block identifier.
pub const BLOCK_ID_PREFIX: &str = "diff_block_";

/// Split text into lines.
///
/// Lines are separated by `\n`; a `\r` preceding the `\n` is stripped. A
/// single trailing terminator does not start an extra empty line, so
/// `"a\nb"` and `"a\nb\n"` both yield two lines and `""` yields none.
///
/// # Examples
///
/// ```
/// use linemark_difflens::engine::split_lines;
///
/// assert_eq!(split_lines("a\r\nb\n"), vec!["a", "b"]);
/// assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
/// assert!(split_lines("").is_empty());
/// ```
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let body = text.strip_suffix('\n').unwrap_or(text);
    body.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// A maximal stretch of non-equal lines: `old` lines replaced by `new` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChangeRun {
    old: Range<usize>,
    new: Range<usize>,
}

/// Computes classified line differences between two versions of a text.
///
/// The engine is pure: it performs no I/O and identical inputs always give
/// structurally identical output.
///
/// # Examples
///
/// ```
/// use linemark_core::BlockKind;
/// use linemark_difflens::engine::DiffEngine;
///
/// let engine = DiffEngine::default();
/// let blocks = engine.compute("a\nb\nc\n", "a\nx\nc\n");
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].kind(), BlockKind::Modified);
/// assert_eq!(blocks[0].line_span(), 1..2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    config: EngineConfig,
}

impl DiffEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Diff two texts, returning an empty list on any failure.
    ///
    /// Failures are logged; callers that need to tell "no differences" apart
    /// from "could not diff" should use [`DiffEngine::try_compute`].
    pub fn compute(&self, old_text: &str, new_text: &str) -> Vec<DiffBlock> {
        match self.try_compute(old_text, new_text) {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::error!(error = %e, "Failed to calculate diff");
                Vec::new()
            }
        }
    }

    /// Diff two optional texts. A missing side yields no blocks.
    ///
    /// # Examples
    ///
    /// ```
    /// use linemark_difflens::engine::DiffEngine;
    ///
    /// let engine = DiffEngine::default();
    /// assert!(engine.compute_versions(None, Some("a\n")).is_empty());
    /// ```
    pub fn compute_versions(&self, old_text: Option<&str>, new_text: Option<&str>) -> Vec<DiffBlock> {
        match (old_text, new_text) {
            (Some(old), Some(new)) => self.compute(old, new),
            _ => Vec::new(),
        }
    }

    /// Diff two texts, surfacing internal failures.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::DiffFailed`] if either input exceeds the
    /// configured line limit or the alignment is internally inconsistent.
    pub fn try_compute(&self, old_text: &str, new_text: &str) -> Result<Vec<DiffBlock>, LinemarkError> {
        let old_lines = split_lines(old_text);
        let new_lines = split_lines(new_text);

        let longest = old_lines.len().max(new_lines.len());
        if longest > self.config.max_lines {
            return Err(LinemarkError::DiffFailed(format!(
                "input has {longest} lines, limit is {}",
                self.config.max_lines
            )));
        }

        let runs = self.align(&old_lines, &new_lines)?;
        let mut blocks = Vec::with_capacity(runs.len());
        for (index, run) in runs.into_iter().enumerate() {
            let block_id = format!("{BLOCK_ID_PREFIX}{}", index + 1);
            blocks.push(DiffBlock::new(
                run.new.start,
                run.new.end,
                slice_lines(&old_lines, run.old),
                slice_lines(&new_lines, run.new),
                block_id,
            )?);
        }

        tracing::trace!(
            old_lines = old_lines.len(),
            new_lines = new_lines.len(),
            blocks = blocks.len(),
            "Computed line diff"
        );
        Ok(blocks)
    }

    fn align(&self, old_lines: &[&str], new_lines: &[&str]) -> Result<Vec<ChangeRun>, LinemarkError> {
        let algorithm = match self.config.algorithm {
            DiffAlgorithm::Myers => Algorithm::Myers,
            DiffAlgorithm::Patience => Algorithm::Patience,
        };
        let deadline = self.config.deadline().map(|budget| Instant::now() + budget);
        let ops = similar::capture_diff_slices_deadline(algorithm, old_lines, new_lines, deadline);

        let mut runs: Vec<ChangeRun> = Vec::new();
        let mut pending: Option<ChangeRun> = None;
        let mut old_cursor = 0;
        let mut new_cursor = 0;

        for op in &ops {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            if old_range.start != old_cursor || new_range.start != new_cursor {
                return Err(LinemarkError::DiffFailed(format!(
                    "alignment skipped from {old_cursor}/{new_cursor} to {}/{}",
                    old_range.start, new_range.start
                )));
            }
            old_cursor = old_range.end;
            new_cursor = new_range.end;

            if tag == DiffTag::Equal {
                runs.extend(pending.take());
                continue;
            }
            // Adjacent deletions and insertions fold into a single run.
            match pending.as_mut() {
                Some(run) => {
                    run.old.end = old_range.end;
                    run.new.end = new_range.end;
                }
                None => {
                    pending = Some(ChangeRun {
                        old: old_range,
                        new: new_range,
                    })
                }
            }
        }
        runs.extend(pending.take());

        if old_cursor != old_lines.len() || new_cursor != new_lines.len() {
            return Err(LinemarkError::DiffFailed(format!(
                "alignment covered {old_cursor}/{} old and {new_cursor}/{} new lines",
                old_lines.len(),
                new_lines.len()
            )));
        }

        runs.retain(|run| !run.old.is_empty() || !run.new.is_empty());
        Ok(runs)
    }
}

/// Copy `range` out of `lines`, clamped to the available bounds.
fn slice_lines(lines: &[&str], range: Range<usize>) -> Vec<String> {
    if range.start >= lines.len() {
        return Vec::new();
    }
    let end = range.end.min(lines.len());
    lines[range.start..end].iter().map(|line| line.to_string()).collect()
}
