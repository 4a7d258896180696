//! Seams to the surrounding editor: version retrieval, document editing and
//! annotation rendering.

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use linemark_core::{DiffBlock, LinemarkError};

/// Identity of one editor view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditorId(pub u64);

/// Identity of one live document. Several editors may show the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

/// Opaque handle to an annotation created by an [`AnnotationHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationHandle(pub u64);

impl fmt::Display for EditorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "editor#{}", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Identity of a file as understood by a [`VersionProvider`].
///
/// # Examples
///
/// ```
/// use linemark_sync::FileId;
///
/// let file = FileId::new("src/lib.rs");
/// assert_eq!(file.to_string(), "src/lib.rs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(PathBuf);

impl FileId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Supplies the two versions of a file that get diffed.
///
/// Implementations may block (disk, git), so callers run them off the
/// confined editor context.
pub trait VersionProvider: Send + Sync {
    /// Whether the file has a baseline at all.
    fn is_tracked(&self, file: &FileId) -> bool;

    /// The reference version, e.g. the last committed snapshot.
    fn baseline_content(&self, file: &FileId) -> Option<String>;

    /// The live version.
    fn current_content(&self, file: &FileId) -> Option<String>;
}

impl<T: VersionProvider + ?Sized> VersionProvider for Arc<T> {
    fn is_tracked(&self, file: &FileId) -> bool {
        (**self).is_tracked(file)
    }

    fn baseline_content(&self, file: &FileId) -> Option<String> {
        (**self).baseline_content(file)
    }

    fn current_content(&self, file: &FileId) -> Option<String> {
        (**self).current_content(file)
    }
}

/// The editing surface. Offsets are character offsets into the document.
///
/// `line_count` follows the usual editor convention: text ending in a line
/// terminator has one more, empty, line after it.
pub trait EditorHost {
    fn line_count(&self, doc: DocumentId) -> usize;

    /// Offset of the first character of `line`, or `None` past the last line.
    fn line_start_offset(&self, doc: DocumentId, line: usize) -> Option<usize>;

    fn text_length(&self, doc: DocumentId) -> usize;

    /// Text between two offsets, or `None` if the range is invalid.
    fn slice(&self, doc: DocumentId, range: Range<usize>) -> Option<String>;

    /// Replace `range` with `text` as one undoable transaction.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::Mutation`] if the edit was not committed; the
    /// document must then be unchanged.
    fn replace_range(
        &mut self,
        doc: DocumentId,
        range: Range<usize>,
        text: &str,
    ) -> Result<(), LinemarkError>;

    /// Revert the most recent transaction. Returns `false` if there was none.
    fn undo(&mut self, doc: DocumentId) -> bool;
}

/// The rendering surface for anchored markers.
pub trait AnnotationHost {
    /// Anchor a marker for `block` over `range` in `editor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface refuses the range.
    fn add_annotation(
        &mut self,
        editor: EditorId,
        range: Range<usize>,
        block: &DiffBlock,
    ) -> Result<AnnotationHandle, LinemarkError>;

    fn remove_annotation(&mut self, editor: EditorId, handle: AnnotationHandle);

    /// The span the marker covers now, after any anchor tracking the host does.
    fn annotation_range(&self, editor: EditorId, handle: AnnotationHandle) -> Option<Range<usize>>;
}
