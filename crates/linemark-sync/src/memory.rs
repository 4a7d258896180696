//! In-memory hosts backed by `ropey`, used by the CLI and by tests.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Arc;

use linemark_core::{BlockKind, DiffBlock, LinemarkError};
use parking_lot::{Mutex, RwLock};
use ropey::Rope;

use crate::host::{AnnotationHandle, AnnotationHost, DocumentId, EditorHost, EditorId, FileId, VersionProvider};

/// A rope shared between an editor buffer and whoever reads it.
///
/// # Examples
///
/// ```
/// use linemark_sync::memory::SharedText;
///
/// let text = SharedText::new("a\nb\n");
/// let reader = text.clone();
/// text.edit(2..3, "x").unwrap();
/// assert_eq!(reader.text(), "a\nx\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedText(Arc<RwLock<Rope>>);

impl SharedText {
    pub fn new(text: &str) -> Self {
        Self(Arc::new(RwLock::new(Rope::from_str(text))))
    }

    pub fn text(&self) -> String {
        self.0.read().to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.0.read().len_chars()
    }

    /// Replace the whole text.
    pub fn set(&self, text: &str) {
        *self.0.write() = Rope::from_str(text);
    }

    /// Replace a character range, returning the removed text.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::Mutation`] if the range is out of bounds.
    pub fn edit(&self, range: Range<usize>, text: &str) -> Result<String, LinemarkError> {
        let mut rope = self.0.write();
        if range.start > range.end || range.end > rope.len_chars() {
            return Err(LinemarkError::Mutation(format!(
                "range {}..{} outside document of length {}",
                range.start,
                range.end,
                rope.len_chars()
            )));
        }
        let removed = rope.slice(range.clone()).to_string();
        rope.remove(range.clone());
        rope.insert(range.start, text);
        Ok(removed)
    }

    fn with<R>(&self, f: impl FnOnce(&Rope) -> R) -> R {
        f(&*self.0.read())
    }
}

#[derive(Debug)]
struct Transaction {
    start: usize,
    inserted_chars: usize,
    removed: String,
}

#[derive(Debug)]
struct Buffer {
    text: SharedText,
    undo: Vec<Transaction>,
    read_only: bool,
    watchers: Vec<(EditorId, MemoryAnnotations)>,
}

impl Buffer {
    /// Apply one edit and move the anchors of every watching editor.
    fn apply(&mut self, range: Range<usize>, text: &str) -> Result<String, LinemarkError> {
        let inserted = text.chars().count();
        let removed = self.text.edit(range.clone(), text)?;
        for (editor, annotations) in &self.watchers {
            annotations.track_edit(*editor, range.clone(), inserted);
        }
        Ok(removed)
    }
}

/// An [`EditorHost`] over in-memory ropes with a per-document undo stack.
///
/// Lines break on `\n` only (a preceding `\r` stays part of the line), the
/// same rule the diff engine splits by. Edits made through the host move
/// the anchors of every [`MemoryAnnotations`] registered with
/// [`MemoryEditor::watch`]; text replaced behind its back through
/// [`SharedText::set`] does not.
///
/// # Examples
///
/// ```
/// use linemark_sync::memory::{MemoryEditor, SharedText};
/// use linemark_sync::{DocumentId, EditorHost};
///
/// let mut editor = MemoryEditor::new();
/// let doc = DocumentId(1);
/// editor.open(doc, SharedText::new("a\nb\n"));
/// assert_eq!(editor.line_count(doc), 3);
/// assert_eq!(editor.line_start_offset(doc, 1), Some(2));
/// ```
#[derive(Debug, Default)]
pub struct MemoryEditor {
    buffers: HashMap<DocumentId, Buffer>,
}

impl MemoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, doc: DocumentId, text: SharedText) {
        self.buffers.insert(
            doc,
            Buffer {
                text,
                undo: Vec::new(),
                read_only: false,
                watchers: Vec::new(),
            },
        );
    }

    /// Keep `editor`'s markers in `annotations` anchored across edits of `doc`.
    pub fn watch(&mut self, doc: DocumentId, editor: EditorId, annotations: MemoryAnnotations) {
        if let Some(buffer) = self.buffers.get_mut(&doc) {
            buffer.watchers.push((editor, annotations));
        }
    }

    pub fn close(&mut self, doc: DocumentId) {
        self.buffers.remove(&doc);
    }

    pub fn text(&self, doc: DocumentId) -> Option<String> {
        self.buffers.get(&doc).map(|b| b.text.text())
    }

    /// Make every edit to `doc` fail until cleared.
    pub fn set_read_only(&mut self, doc: DocumentId, read_only: bool) {
        if let Some(buffer) = self.buffers.get_mut(&doc) {
            buffer.read_only = read_only;
        }
    }

    fn read<R>(&self, doc: DocumentId, f: impl FnOnce(&Rope) -> R) -> Option<R> {
        self.buffers.get(&doc).map(|b| b.text.with(f))
    }
}

impl EditorHost for MemoryEditor {
    fn line_count(&self, doc: DocumentId) -> usize {
        self.read(doc, |rope| rope.len_lines()).unwrap_or(0)
    }

    fn line_start_offset(&self, doc: DocumentId, line: usize) -> Option<usize> {
        self.read(doc, |rope| {
            (line < rope.len_lines()).then(|| rope.line_to_char(line))
        })
        .flatten()
    }

    fn text_length(&self, doc: DocumentId) -> usize {
        self.read(doc, |rope| rope.len_chars()).unwrap_or(0)
    }

    fn slice(&self, doc: DocumentId, range: Range<usize>) -> Option<String> {
        self.read(doc, |rope| {
            (range.start <= range.end && range.end <= rope.len_chars())
                .then(|| rope.slice(range).to_string())
        })
        .flatten()
    }

    fn replace_range(
        &mut self,
        doc: DocumentId,
        range: Range<usize>,
        text: &str,
    ) -> Result<(), LinemarkError> {
        let buffer = self
            .buffers
            .get_mut(&doc)
            .ok_or_else(|| LinemarkError::Mutation(format!("{doc} is not open")))?;
        if buffer.read_only {
            return Err(LinemarkError::Mutation(format!("{doc} is read-only")));
        }
        let start = range.start;
        let removed = buffer.apply(range, text)?;
        buffer.undo.push(Transaction {
            start,
            inserted_chars: text.chars().count(),
            removed,
        });
        Ok(())
    }

    fn undo(&mut self, doc: DocumentId) -> bool {
        let Some(buffer) = self.buffers.get_mut(&doc) else {
            return false;
        };
        let Some(tx) = buffer.undo.pop() else {
            return false;
        };
        buffer
            .apply(tx.start..tx.start + tx.inserted_chars, &tx.removed)
            .is_ok()
    }
}

/// One marker held by [`MemoryAnnotations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub editor: EditorId,
    pub range: Range<usize>,
    pub kind: BlockKind,
    pub block_id: String,
}

#[derive(Debug, Default)]
struct AnnotationTable {
    next: u64,
    live: BTreeMap<AnnotationHandle, Annotation>,
}

/// An [`AnnotationHost`] that records markers in a table.
///
/// Clones share the same table, so a test can keep one clone while a
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryAnnotations {
    table: Arc<Mutex<AnnotationTable>>,
}

impl MemoryAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live markers of `editor`, in document order.
    pub fn for_editor(&self, editor: EditorId) -> Vec<Annotation> {
        let mut out: Vec<Annotation> = self
            .table
            .lock()
            .live
            .values()
            .filter(|a| a.editor == editor)
            .cloned()
            .collect();
        out.sort_by_key(|a| (a.range.start, a.range.end));
        out
    }

    /// Total live markers across all editors.
    pub fn len(&self) -> usize {
        self.table.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move `editor`'s markers for an edit replacing `edit` with `inserted`
    /// characters.
    ///
    /// Markers behind the edit stay put and markers after it shift. Text
    /// inserted exactly at a marker's start or end lands outside it. An
    /// endpoint inside the replaced text collapses onto the edit.
    pub fn track_edit(&self, editor: EditorId, edit: Range<usize>, inserted: usize) {
        let mut table = self.table.lock();
        for annotation in table.live.values_mut().filter(|a| a.editor == editor) {
            let start = shift_start(annotation.range.start, &edit, inserted);
            let end = shift_end(annotation.range.end, &edit, inserted).max(start);
            annotation.range = start..end;
        }
    }
}

fn shift_start(offset: usize, edit: &Range<usize>, inserted: usize) -> usize {
    if offset < edit.start {
        offset
    } else if offset >= edit.end {
        offset - (edit.end - edit.start) + inserted
    } else {
        edit.start + inserted
    }
}

fn shift_end(offset: usize, edit: &Range<usize>, inserted: usize) -> usize {
    if offset <= edit.start {
        offset
    } else if offset >= edit.end {
        offset - (edit.end - edit.start) + inserted
    } else {
        edit.start
    }
}

impl AnnotationHost for MemoryAnnotations {
    fn add_annotation(
        &mut self,
        editor: EditorId,
        range: Range<usize>,
        block: &DiffBlock,
    ) -> Result<AnnotationHandle, LinemarkError> {
        let mut table = self.table.lock();
        table.next += 1;
        let handle = AnnotationHandle(table.next);
        table.live.insert(
            handle,
            Annotation {
                editor,
                range,
                kind: block.kind(),
                block_id: block.block_id().to_string(),
            },
        );
        Ok(handle)
    }

    fn remove_annotation(&mut self, editor: EditorId, handle: AnnotationHandle) {
        let mut table = self.table.lock();
        if table.live.get(&handle).is_some_and(|a| a.editor == editor) {
            table.live.remove(&handle);
        }
    }

    fn annotation_range(&self, editor: EditorId, handle: AnnotationHandle) -> Option<Range<usize>> {
        self.table
            .lock()
            .live
            .get(&handle)
            .filter(|a| a.editor == editor)
            .map(|a| a.range.clone())
    }
}

#[derive(Debug)]
struct VersionedFile {
    baseline: Option<String>,
    current: SharedText,
}

/// A [`VersionProvider`] holding baselines in memory and reading the current
/// version from live buffers.
///
/// # Examples
///
/// ```
/// use linemark_sync::memory::{MemoryVersions, SharedText};
/// use linemark_sync::{FileId, VersionProvider};
///
/// let versions = MemoryVersions::new();
/// let file = FileId::new("a.txt");
/// versions.track(file.clone(), Some("old\n"), SharedText::new("new\n"));
/// assert!(versions.is_tracked(&file));
/// assert_eq!(versions.current_content(&file).as_deref(), Some("new\n"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryVersions {
    files: Arc<RwLock<HashMap<FileId, VersionedFile>>>,
}

impl MemoryVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, file: FileId, baseline: Option<&str>, current: SharedText) {
        self.files.write().insert(
            file,
            VersionedFile {
                baseline: baseline.map(str::to_string),
                current,
            },
        );
    }

    pub fn set_baseline(&self, file: &FileId, baseline: Option<&str>) {
        if let Some(entry) = self.files.write().get_mut(file) {
            entry.baseline = baseline.map(str::to_string);
        }
    }

    pub fn untrack(&self, file: &FileId) {
        self.files.write().remove(file);
    }
}

impl VersionProvider for MemoryVersions {
    fn is_tracked(&self, file: &FileId) -> bool {
        self.files.read().contains_key(file)
    }

    fn baseline_content(&self, file: &FileId) -> Option<String> {
        self.files.read().get(file).and_then(|f| f.baseline.clone())
    }

    fn current_content(&self, file: &FileId) -> Option<String> {
        self.files.read().get(file).map(|f| f.current.text())
    }
}
