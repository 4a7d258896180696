use std::fmt;
use std::path::PathBuf;

use linemark_core::{DiffBlock, DiffSummary};
use serde::Serialize;

/// Blocks of one file's diff, with aggregate counts.
///
/// # Examples
///
/// ```
/// use linemark_difflens::engine::DiffEngine;
/// use linemark_difflens::report::DiffReport;
///
/// let blocks = DiffEngine::default().compute("a\nb\n", "a\nc\n");
/// let report = DiffReport::new(Some("notes.txt".into()), blocks);
/// assert_eq!(report.summary.modified, 1);
/// assert!(report.to_string().contains("notes.txt"));
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    /// File the diff belongs to, if known.
    pub path: Option<PathBuf>,
    /// Counts over `blocks`.
    pub summary: DiffSummary,
    /// Blocks in document order.
    pub blocks: Vec<DiffBlock>,
}

impl DiffReport {
    pub fn new(path: Option<PathBuf>, blocks: Vec<DiffBlock>) -> Self {
        Self {
            path,
            summary: DiffSummary::from_blocks(&blocks),
            blocks,
        }
    }

    fn title(&self) -> String {
        match &self.path {
            Some(path) => format!("Diff Report: {}", path.display()),
            None => "Diff Report".into(),
        }
    }

    fn summary_line(&self) -> String {
        format!(
            "{} changes ({} added, {} deleted, {} modified), +{} -{} lines",
            self.summary.total(),
            self.summary.added,
            self.summary.deleted,
            self.summary.modified,
            self.summary.lines_added,
            self.summary.lines_removed,
        )
    }

    /// Render the report as a markdown string.
    ///
    /// # Examples
    ///
    /// ```
    /// use linemark_difflens::report::DiffReport;
    ///
    /// let md = DiffReport::new(None, vec![]).to_markdown();
    /// assert!(md.contains("# Diff Report"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title()));

        if !self.blocks.is_empty() {
            out.push_str("| Block | Change | Lines | +/- |\n");
            out.push_str("|-------|--------|-------|-----|\n");
            for block in &self.blocks {
                out.push_str(&format!(
                    "| {} | {} | {}-{} | +{}/-{} |\n",
                    block.block_id(),
                    block.kind(),
                    block.start_line(),
                    block.end_line(),
                    block.new_content().len(),
                    block.old_content().len(),
                ));
            }
            out.push('\n');

            out.push_str("```diff\n");
            for block in &self.blocks {
                push_block_lines(&mut out, block);
            }
            out.push_str("```\n\n");
        }

        out.push_str(&format!("**Summary:** {}\n", self.summary_line()));
        out
    }
}

fn push_block_lines(out: &mut String, block: &DiffBlock) {
    out.push_str(&format!("@@ {} {} @@\n", block.block_id(), block.describe()));
    for line in block.old_content() {
        out.push_str(&format!("-{line}\n"));
    }
    for line in block.new_content() {
        out.push_str(&format!("+{line}\n"));
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.title();
        writeln!(f, "{title}")?;
        writeln!(f, "{}", "=".repeat(title.len()))?;

        for block in &self.blocks {
            writeln!(
                f,
                "{} {:<16} {}",
                block.kind().style().symbol,
                block.block_id(),
                block.describe()
            )?;
            for line in block.old_content() {
                writeln!(f, "    - {line}")?;
            }
            for line in block.new_content() {
                writeln!(f, "    + {line}")?;
            }
        }

        writeln!(f, "\nSummary: {}", self.summary_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DiffEngine;

    fn sample() -> DiffReport {
        let blocks = DiffEngine::default().compute("a\nb\nc\nd\n", "a\nx\nc\nd\ne\n");
        DiffReport::new(Some(PathBuf::from("src/lib.rs")), blocks)
    }

    #[test]
    fn empty_report() {
        let report = DiffReport::new(None, vec![]);
        assert_eq!(report.summary.total(), 0);
        let text = report.to_string();
        assert!(text.starts_with("Diff Report\n"));
        assert!(text.contains("0 changes"));
    }

    #[test]
    fn text_lists_each_block() {
        let text = sample().to_string();
        assert!(text.contains("Diff Report: src/lib.rs"));
        assert!(text.contains("~ diff_block_1"));
        assert!(text.contains("Modification (lines 1-2)"));
        assert!(text.contains("    - b"));
        assert!(text.contains("    + x"));
        assert!(text.contains("+ diff_block_2"));
        assert!(text.contains("2 changes (1 added, 0 deleted, 1 modified), +2 -1 lines"));
    }

    #[test]
    fn markdown_has_table_and_diff_fence() {
        let md = sample().to_markdown();
        assert!(md.contains("# Diff Report: src/lib.rs"));
        assert!(md.contains("| diff_block_1 | modified | 1-2 | +1/-1 |"));
        assert!(md.contains("```diff\n"));
        assert!(md.contains("-b\n+x\n"));
        assert!(md.contains("**Summary:**"));
    }

    #[test]
    fn json_uses_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["summary"]["linesAdded"], 2);
        assert_eq!(json["blocks"][0]["blockId"], "diff_block_1");
        assert_eq!(json["path"], "src/lib.rs");
    }
}
