use std::ops::Range;

use linemark_core::{DiffBlock, LinemarkError};

use crate::host::{DocumentId, EditorHost};

/// Translate a block's line range into character offsets of the live document.
///
/// The span covers lines `[start_line, end_line)`: it starts at the first
/// character of `start_line` and ends at the start of `end_line`, or at the
/// document end when `end_line` is one past the last line. A collapsed
/// deletion yields an empty span at its anchor line.
///
/// # Errors
///
/// Returns [`LinemarkError::OffsetOutOfRange`] if the range no longer fits the
/// document, e.g. because the document shrank after the diff was computed.
pub fn block_offsets<E: EditorHost + ?Sized>(
    editor: &E,
    doc: DocumentId,
    block: &DiffBlock,
) -> Result<Range<usize>, LinemarkError> {
    let out_of_range = || LinemarkError::OffsetOutOfRange {
        block_id: block.block_id().to_string(),
        start_line: block.start_line(),
        end_line: block.end_line(),
    };

    let start = line_boundary(editor, doc, block.start_line()).ok_or_else(out_of_range)?;
    let end = if block.end_line() == block.start_line() {
        start
    } else {
        line_boundary(editor, doc, block.end_line()).ok_or_else(out_of_range)?
    };

    if start > end || end > editor.text_length(doc) {
        return Err(out_of_range());
    }
    Ok(start..end)
}

fn line_boundary<E: EditorHost + ?Sized>(editor: &E, doc: DocumentId, line: usize) -> Option<usize> {
    let line_count = editor.line_count(doc);
    if line < line_count {
        editor.line_start_offset(doc, line)
    } else if line == line_count {
        Some(editor.text_length(doc))
    } else {
        None
    }
}
