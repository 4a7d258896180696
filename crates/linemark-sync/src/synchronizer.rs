use std::fmt;
use std::ops::Range;

use linemark_core::{DiffBlock, LinemarkError};
use linemark_difflens::{split_lines, DiffEngine};

use crate::annotations::{AnnotationSet, BlockState};
use crate::host::{AnnotationHost, DocumentId, EditorHost, EditorId, FileId, VersionProvider};
use crate::offsets::block_offsets;

/// Both versions of a file, captured at one point in time.
///
/// Fetching may block, so it is kept separate from applying the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSnapshot {
    tracked: bool,
    baseline: Option<String>,
    current: Option<String>,
}

impl VersionSnapshot {
    /// Read both versions of `file`. Untracked files are not read at all.
    pub fn fetch<P: VersionProvider + ?Sized>(provider: &P, file: &FileId) -> Self {
        if !provider.is_tracked(file) {
            return Self::untracked();
        }
        Self {
            tracked: true,
            baseline: provider.baseline_content(file),
            current: provider.current_content(file),
        }
    }

    pub fn new(baseline: Option<String>, current: Option<String>) -> Self {
        Self {
            tracked: true,
            baseline,
            current,
        }
    }

    pub fn untracked() -> Self {
        Self {
            tracked: false,
            baseline: None,
            current: None,
        }
    }

    fn diff_input(&self) -> Result<(&str, &str), ClearReason> {
        if !self.tracked {
            return Err(ClearReason::Untracked);
        }
        match (self.baseline.as_deref(), self.current.as_deref()) {
            (Some(old), Some(new)) if old == new => Err(ClearReason::Identical),
            (Some(old), Some(new)) => Ok((old, new)),
            _ => Err(ClearReason::InputUnavailable),
        }
    }
}

/// Why a recomputation ended with no annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// The file has no baseline.
    Untracked,
    /// One of the two versions could not be read.
    InputUnavailable,
    /// Baseline and current text are byte-identical.
    Identical,
    /// The texts differ but not line by line, or the diff could not be computed.
    NoDifferences,
}

impl fmt::Display for ClearReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearReason::Untracked => write!(f, "untracked"),
            ClearReason::InputUnavailable => write!(f, "input unavailable"),
            ClearReason::Identical => write!(f, "identical"),
            ClearReason::NoDifferences => write!(f, "no differences"),
        }
    }
}

/// Result of one recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// Annotations were replaced with a fresh set.
    Applied {
        /// Annotations now showing.
        annotations: usize,
        /// Blocks whose offsets did not fit the current document.
        skipped: usize,
    },
    /// All annotations were removed.
    Cleared(ClearReason),
    /// A newer recomputation or a clear was started; nothing was touched.
    Stale,
}

/// Marks one in-flight recomputation so a superseded result can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeTicket {
    editor: EditorId,
    generation: u64,
}

impl RecomputeTicket {
    pub fn editor(&self) -> EditorId {
        self.editor
    }
}

/// Keeps one editor's annotations in step with the diff of its document.
///
/// Each recomputation replaces the whole [`AnnotationSet`]; nothing is
/// patched in place. Hosts are passed in explicitly on every call and all
/// calls are expected on the editor's confined context.
#[derive(Debug)]
pub struct AnnotationSynchronizer {
    editor: EditorId,
    document: DocumentId,
    file: FileId,
    engine: DiffEngine,
    set: AnnotationSet,
    generation: u64,
}

impl AnnotationSynchronizer {
    pub fn new(editor: EditorId, document: DocumentId, file: FileId, engine: DiffEngine) -> Self {
        Self {
            editor,
            document,
            file,
            engine,
            set: AnnotationSet::new(),
            generation: 0,
        }
    }

    pub fn editor(&self) -> EditorId {
        self.editor
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    pub fn file(&self) -> &FileId {
        &self.file
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.set
    }

    /// Start a recomputation, invalidating any earlier ticket.
    pub fn begin_recompute(&mut self) -> RecomputeTicket {
        self.generation += 1;
        RecomputeTicket {
            editor: self.editor,
            generation: self.generation,
        }
    }

    /// Fetch, diff and apply in one go.
    ///
    /// Retrieval runs on the calling thread; use [`begin_recompute`],
    /// [`VersionSnapshot::fetch`] and [`apply`] separately when the provider
    /// may block.
    ///
    /// [`begin_recompute`]: AnnotationSynchronizer::begin_recompute
    /// [`apply`]: AnnotationSynchronizer::apply
    pub fn recompute<P, E, A>(&mut self, provider: &P, editor: &E, annotations: &mut A) -> RecomputeOutcome
    where
        P: VersionProvider + ?Sized,
        E: EditorHost + ?Sized,
        A: AnnotationHost + ?Sized,
    {
        let ticket = self.begin_recompute();
        let snapshot = VersionSnapshot::fetch(provider, &self.file);
        self.apply(ticket, &snapshot, editor, annotations)
    }

    /// Diff `snapshot` and swap the annotation set, unless `ticket` is stale.
    ///
    /// Offsets are translated against the document as it is now. Blocks that
    /// no longer fit are skipped; the rest of the batch is still applied.
    pub fn apply<E, A>(
        &mut self,
        ticket: RecomputeTicket,
        snapshot: &VersionSnapshot,
        editor: &E,
        annotations: &mut A,
    ) -> RecomputeOutcome
    where
        E: EditorHost + ?Sized,
        A: AnnotationHost + ?Sized,
    {
        if ticket.editor != self.editor || ticket.generation != self.generation {
            tracing::debug!(editor = %self.editor, "Dropping stale diff result");
            return RecomputeOutcome::Stale;
        }

        let blocks = match snapshot.diff_input() {
            Ok((old, new)) => self.engine.compute(old, new),
            Err(reason) => {
                if reason == ClearReason::InputUnavailable {
                    tracing::warn!(editor = %self.editor, file = %self.file, "Diff input unavailable");
                }
                self.remove_all(annotations);
                return RecomputeOutcome::Cleared(reason);
            }
        };
        if blocks.is_empty() {
            self.remove_all(annotations);
            return RecomputeOutcome::Cleared(ClearReason::NoDifferences);
        }

        self.remove_all(annotations);
        let mut skipped = 0;
        for block in blocks {
            match self.anchor(&block, editor, annotations) {
                Ok((range, handle)) => self.set.insert(block, range, handle),
                Err(e) => {
                    tracing::warn!(editor = %self.editor, block = block.block_id(), error = %e, "Skipping diff block");
                    skipped += 1;
                }
            }
        }

        let applied = self.set.pending_count();
        tracing::debug!(editor = %self.editor, annotations = applied, skipped, "Replaced diff annotations");
        RecomputeOutcome::Applied {
            annotations: applied,
            skipped,
        }
    }

    fn anchor<E, A>(
        &self,
        block: &DiffBlock,
        editor: &E,
        annotations: &mut A,
    ) -> Result<(Range<usize>, crate::host::AnnotationHandle), LinemarkError>
    where
        E: EditorHost + ?Sized,
        A: AnnotationHost + ?Sized,
    {
        let range = block_offsets(editor, self.document, block)?;
        let handle = annotations.add_annotation(self.editor, range.clone(), block)?;
        Ok((range, handle))
    }

    /// Keep a block as it is: its annotation goes away, the text stays.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::UnknownBlock`] if no pending block has this id.
    pub fn accept<A: AnnotationHost + ?Sized>(&mut self, block_id: &str, annotations: &mut A) -> Result<(), LinemarkError> {
        let handle = self
            .set
            .settle(block_id, BlockState::Accepted)
            .ok_or_else(|| LinemarkError::UnknownBlock(block_id.to_string()))?;
        annotations.remove_annotation(self.editor, handle);
        tracing::debug!(editor = %self.editor, block = block_id, "Accepted diff block");
        Ok(())
    }

    /// Put the baseline lines of a block back into the document.
    ///
    /// The span the block's annotation covers now is replaced in one undoable
    /// transaction. The caller is responsible for recomputing afterwards;
    /// [`reject`](AnnotationSynchronizer::reject) does both.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::UnknownBlock`] for an unknown id,
    /// [`LinemarkError::OffsetOutOfRange`] if the span no longer fits,
    /// [`LinemarkError::StaleBlock`] if the span no longer holds the block's
    /// new lines, or the editor's [`LinemarkError::Mutation`]. On error the
    /// document is untouched and the block stays pending.
    pub fn revert<E, A>(&mut self, block_id: &str, editor: &mut E, annotations: &mut A) -> Result<(), LinemarkError>
    where
        E: EditorHost + ?Sized,
        A: AnnotationHost + ?Sized,
    {
        let entry = self
            .set
            .get(block_id)
            .filter(|e| e.state() == BlockState::Pending)
            .ok_or_else(|| LinemarkError::UnknownBlock(block_id.to_string()))?;

        let range = entry
            .handle()
            .and_then(|h| annotations.annotation_range(self.editor, h))
            .unwrap_or_else(|| entry.range());
        let text_length = editor.text_length(self.document);
        if range.start > range.end || range.end > text_length {
            return Err(LinemarkError::OffsetOutOfRange {
                block_id: block_id.to_string(),
                start_line: entry.block().start_line(),
                end_line: entry.block().end_line(),
            });
        }

        if !span_holds(&*editor, self.document, &range, entry.block()) {
            tracing::debug!(editor = %self.editor, block = block_id, ?range, "Diff block went stale");
            return Err(LinemarkError::StaleBlock(block_id.to_string()));
        }

        let (range, replacement) = restore_text(&*editor, self.document, range, entry.block().old_content());
        editor.replace_range(self.document, range, &replacement)?;

        if let Some(handle) = self.set.settle(block_id, BlockState::Rejected) {
            annotations.remove_annotation(self.editor, handle);
        }
        tracing::debug!(editor = %self.editor, block = block_id, "Rejected diff block");
        Ok(())
    }

    /// Revert a block and recompute right away.
    ///
    /// # Errors
    ///
    /// See [`revert`](AnnotationSynchronizer::revert).
    pub fn reject<P, E, A>(
        &mut self,
        block_id: &str,
        provider: &P,
        editor: &mut E,
        annotations: &mut A,
    ) -> Result<RecomputeOutcome, LinemarkError>
    where
        P: VersionProvider + ?Sized,
        E: EditorHost + ?Sized,
        A: AnnotationHost + ?Sized,
    {
        self.revert(block_id, editor, annotations)?;
        Ok(self.recompute(provider, &*editor, annotations))
    }

    /// Remove every annotation and drop any in-flight result.
    ///
    /// Returns how many annotations were removed.
    pub fn clear<A: AnnotationHost + ?Sized>(&mut self, annotations: &mut A) -> usize {
        self.generation += 1;
        self.remove_all(annotations)
    }

    fn remove_all<A: AnnotationHost + ?Sized>(&mut self, annotations: &mut A) -> usize {
        let mut removed = 0;
        for entry in self.set.take_all() {
            if let Some(handle) = entry.handle() {
                annotations.remove_annotation(self.editor, handle);
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::trace!(editor = %self.editor, removed, "Removed diff annotations");
        }
        removed
    }
}

/// Whether `range` still covers whole lines equal to the block's new lines.
fn span_holds<E: EditorHost + ?Sized>(editor: &E, doc: DocumentId, range: &Range<usize>, block: &DiffBlock) -> bool {
    let text_length = editor.text_length(doc);
    let Some(covered) = editor.slice(doc, range.clone()) else {
        return false;
    };
    let starts_line = range.start == 0
        || range.start == text_length
        || editor.slice(doc, range.start - 1..range.start).as_deref() == Some("\n");
    let ends_line = range.is_empty() || range.end == text_length || covered.ends_with('\n');

    starts_line && ends_line && split_lines(&covered) == block.new_content()
}

/// Baseline lines as text for `range`, matching the terminator layout there.
///
/// Lines are written with a trailing `\n` each, except where the span runs to
/// the end of a document whose last line is unterminated. Emptying such a
/// span also takes the terminator before it, so the document ends where the
/// kept line does.
fn restore_text<E: EditorHost + ?Sized>(
    editor: &E,
    doc: DocumentId,
    range: Range<usize>,
    old_lines: &[String],
) -> (Range<usize>, String) {
    let text_length = editor.text_length(doc);
    let unterminated_end = range.end == text_length
        && text_length > 0
        && editor.slice(doc, text_length - 1..text_length).as_deref() != Some("\n");

    if !unterminated_end {
        let text = old_lines.iter().map(|line| format!("{line}\n")).collect();
        return (range, text);
    }

    if old_lines.is_empty() {
        let before = |n: usize| {
            range
                .start
                .checked_sub(n)
                .and_then(|from| editor.slice(doc, from..range.start))
        };
        let start = match (before(2).as_deref(), before(1).as_deref()) {
            (Some("\r\n"), _) => range.start - 2,
            (_, Some("\n")) => range.start - 1,
            _ => range.start,
        };
        return (start..range.end, String::new());
    }

    let joined = old_lines.join("\n");
    let text = if range.is_empty() { format!("\n{joined}") } else { joined };
    (range, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryAnnotations, MemoryEditor, MemoryVersions, SharedText};

    struct Fixture {
        sync: AnnotationSynchronizer,
        versions: MemoryVersions,
        editor: MemoryEditor,
        annotations: MemoryAnnotations,
        text: SharedText,
    }

    fn fixture(baseline: &str, current: &str) -> Fixture {
        let mut fx = unwatched_fixture(baseline, current);
        fx.editor.watch(DocumentId(1), EditorId(1), fx.annotations.clone());
        fx
    }

    /// Annotations stay where they were put, whatever the editor does.
    fn unwatched_fixture(baseline: &str, current: &str) -> Fixture {
        let doc = DocumentId(1);
        let file = FileId::new("src/lib.rs");
        let text = SharedText::new(current);
        let versions = MemoryVersions::new();
        versions.track(file.clone(), Some(baseline), text.clone());
        let mut editor = MemoryEditor::new();
        editor.open(doc, text.clone());
        Fixture {
            sync: AnnotationSynchronizer::new(EditorId(1), doc, file, DiffEngine::default()),
            versions,
            editor,
            annotations: MemoryAnnotations::new(),
            text,
        }
    }

    impl Fixture {
        fn recompute(&mut self) -> RecomputeOutcome {
            self.sync.recompute(&self.versions, &self.editor, &mut self.annotations)
        }

        fn ranges(&self) -> Vec<Range<usize>> {
            self.annotations
                .for_editor(EditorId(1))
                .into_iter()
                .map(|a| a.range)
                .collect()
        }
    }

    #[test]
    fn modified_block_is_anchored_on_its_line() {
        let mut fx = fixture("a\nb\nc\n", "a\nx\nc\n");
        assert_eq!(
            fx.recompute(),
            RecomputeOutcome::Applied {
                annotations: 1,
                skipped: 0
            }
        );
        assert_eq!(fx.ranges(), vec![2..4]);
        assert_eq!(fx.sync.annotations().state("diff_block_1"), Some(BlockState::Pending));
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut fx = fixture("a\nb\nc\nd\n", "a\nx\nc\n");
        fx.recompute();
        let first = fx.ranges();
        fx.recompute();
        assert_eq!(fx.ranges(), first);
        assert_eq!(fx.annotations.len(), first.len());
    }

    #[test]
    fn identical_text_clears() {
        let mut fx = fixture("a\nb\n", "a\nx\n");
        fx.recompute();
        fx.text.set("a\nb\n");
        assert_eq!(fx.recompute(), RecomputeOutcome::Cleared(ClearReason::Identical));
        assert!(fx.annotations.is_empty());
    }

    #[test]
    fn missing_baseline_clears_silently() {
        let mut fx = fixture("a\n", "b\n");
        fx.recompute();
        fx.versions.set_baseline(fx.sync.file(), None);
        assert_eq!(
            fx.recompute(),
            RecomputeOutcome::Cleared(ClearReason::InputUnavailable)
        );
        assert!(fx.annotations.is_empty());
    }

    #[test]
    fn untracked_file_clears() {
        let mut fx = fixture("a\n", "b\n");
        fx.versions.untrack(&FileId::new("src/lib.rs"));
        assert_eq!(fx.recompute(), RecomputeOutcome::Cleared(ClearReason::Untracked));
    }

    #[test]
    fn terminator_only_difference_has_no_blocks() {
        let mut fx = fixture("a\nb", "a\nb\n");
        assert_eq!(
            fx.recompute(),
            RecomputeOutcome::Cleared(ClearReason::NoDifferences)
        );
    }

    #[test]
    fn stale_ticket_is_dropped() {
        let mut fx = fixture("a\n", "b\n");
        let stale = fx.sync.begin_recompute();
        let fresh = fx.sync.begin_recompute();
        let snapshot = VersionSnapshot::fetch(&fx.versions, fx.sync.file());
        assert_eq!(
            fx.sync.apply(stale, &snapshot, &fx.editor, &mut fx.annotations),
            RecomputeOutcome::Stale
        );
        assert!(fx.annotations.is_empty());
        assert!(matches!(
            fx.sync.apply(fresh, &snapshot, &fx.editor, &mut fx.annotations),
            RecomputeOutcome::Applied { .. }
        ));
    }

    #[test]
    fn clear_invalidates_in_flight_results() {
        let mut fx = fixture("a\n", "b\n");
        let ticket = fx.sync.begin_recompute();
        let snapshot = VersionSnapshot::fetch(&fx.versions, fx.sync.file());
        fx.sync.clear(&mut fx.annotations);
        assert_eq!(
            fx.sync.apply(ticket, &snapshot, &fx.editor, &mut fx.annotations),
            RecomputeOutcome::Stale
        );
        assert!(fx.annotations.is_empty());
    }

    #[test]
    fn blocks_outside_shrunk_document_are_skipped() {
        let mut fx = fixture("a\nb\nc\nd\n", "a\nx\nc\nd\ny\nz\n");
        let ticket = fx.sync.begin_recompute();
        let snapshot = VersionSnapshot::fetch(&fx.versions, fx.sync.file());
        // The document shrinks between fetching and applying.
        fx.text.set("a\nx\nc\n");
        assert_eq!(
            fx.sync.apply(ticket, &snapshot, &fx.editor, &mut fx.annotations),
            RecomputeOutcome::Applied {
                annotations: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn accept_removes_annotation_without_editing() {
        let mut fx = fixture("a\nb\nc\n", "a\nx\nc\n");
        fx.recompute();
        fx.sync.accept("diff_block_1", &mut fx.annotations).unwrap();
        assert!(fx.annotations.is_empty());
        assert_eq!(fx.text.text(), "a\nx\nc\n");
        assert_eq!(fx.sync.annotations().state("diff_block_1"), Some(BlockState::Accepted));
        assert!(matches!(
            fx.sync.accept("diff_block_1", &mut fx.annotations),
            Err(LinemarkError::UnknownBlock(_))
        ));
    }

    #[test]
    fn reject_modified_restores_baseline() {
        let mut fx = fixture("a\nb\nc\n", "a\nx\nc\n");
        fx.recompute();
        let outcome = fx
            .sync
            .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap();
        assert_eq!(fx.text.text(), "a\nb\nc\n");
        assert_eq!(outcome, RecomputeOutcome::Cleared(ClearReason::Identical));
        assert!(fx.annotations.is_empty());
    }

    #[test]
    fn reject_addition_removes_lines() {
        let mut fx = fixture("a\nb\n", "a\nb\nc\n");
        fx.recompute();
        fx.sync
            .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap();
        assert_eq!(fx.text.text(), "a\nb\n");
    }

    #[test]
    fn reject_deletion_reinserts_lines() {
        let mut fx = fixture("a\nb\nc\n", "a\nc\n");
        fx.recompute();
        fx.sync
            .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap();
        assert_eq!(fx.text.text(), "a\nb\nc\n");
    }

    #[test]
    fn reject_at_unterminated_end() {
        let mut fx = fixture("a\nb", "a\nx");
        fx.recompute();
        fx.sync
            .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap();
        assert_eq!(fx.text.text(), "a\nb");

        let mut fx = fixture("a\nb", "a");
        fx.recompute();
        fx.sync
            .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap();
        assert_eq!(fx.text.text(), "a\nb");
    }

    #[test]
    fn reject_of_trailing_addition_drops_its_terminator() {
        let mut fx = fixture("a", "a\nb");
        fx.recompute();
        let outcome = fx
            .sync
            .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap();
        assert_eq!(fx.text.text(), "a");
        assert_eq!(outcome, RecomputeOutcome::Cleared(ClearReason::Identical));

        let mut fx = fixture("a", "a\r\nb");
        fx.recompute();
        fx.sync.revert("diff_block_1", &mut fx.editor, &mut fx.annotations).unwrap();
        assert_eq!(fx.text.text(), "a");
    }

    #[test]
    fn form_feed_and_lone_carriage_return_stay_inside_lines() {
        for (baseline, current) in [("a\u{c}b\nc\n", "a\u{c}b\nX\n"), ("a\rb\nc\n", "a\rb\nX\n")] {
            let mut fx = fixture(baseline, current);
            fx.recompute();
            assert_eq!(fx.ranges(), vec![4..6]);
            let outcome = fx
                .sync
                .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
                .unwrap();
            assert_eq!(fx.text.text(), baseline);
            assert_eq!(outcome, RecomputeOutcome::Cleared(ClearReason::Identical));
        }
    }

    #[test]
    fn edit_behind_the_editor_makes_reject_stale() {
        let mut fx = fixture("a\nb\nc\n", "a\nX\nc\n");
        fx.recompute();
        fx.text.set("new\na\nX\nc\n");

        let err = fx
            .sync
            .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap_err();
        assert!(matches!(err, LinemarkError::StaleBlock(ref id) if id == "diff_block_1"));
        assert_eq!(fx.text.text(), "new\na\nX\nc\n");
        assert_eq!(fx.sync.annotations().state("diff_block_1"), Some(BlockState::Pending));

        fx.recompute();
        fx.sync
            .reject("diff_block_2", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap();
        assert_eq!(fx.text.text(), "new\na\nb\nc\n");
    }

    #[test]
    fn edit_through_the_editor_moves_the_span() {
        let mut fx = fixture("a\nb\nc\n", "a\nX\nc\n");
        fx.recompute();
        fx.editor.replace_range(DocumentId(1), 0..0, "new\n").unwrap();
        assert_eq!(fx.ranges(), vec![6..8]);

        fx.sync.revert("diff_block_1", &mut fx.editor, &mut fx.annotations).unwrap();
        assert_eq!(fx.text.text(), "new\na\nb\nc\n");
    }

    #[test]
    fn back_to_back_reverts_restore_baseline() {
        let mut fx = fixture("a\nbbbb\nc\n", "a\nX\nc\nd\n");
        fx.recompute();
        fx.sync.revert("diff_block_1", &mut fx.editor, &mut fx.annotations).unwrap();
        fx.sync.revert("diff_block_2", &mut fx.editor, &mut fx.annotations).unwrap();
        assert_eq!(fx.text.text(), "a\nbbbb\nc\n");
        assert!(fx.annotations.is_empty());
    }

    #[test]
    fn unmoved_span_is_refused_after_earlier_revert() {
        let mut fx = unwatched_fixture("a\nbbbb\nc\n", "a\nX\nc\nd\n");
        fx.recompute();
        fx.sync.revert("diff_block_1", &mut fx.editor, &mut fx.annotations).unwrap();
        let err = fx
            .sync
            .revert("diff_block_2", &mut fx.editor, &mut fx.annotations)
            .unwrap_err();
        assert!(matches!(err, LinemarkError::StaleBlock(_)));
        assert_eq!(fx.text.text(), "a\nbbbb\nc\nd\n");
        assert_eq!(fx.sync.annotations().state("diff_block_2"), Some(BlockState::Pending));
    }

    #[test]
    fn reject_keeps_other_blocks_after_recompute() {
        let mut fx = fixture("a\nb\nc\nd\n", "a\nx\nc\nd\ne\n");
        fx.recompute();
        let outcome = fx
            .sync
            .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap();
        assert_eq!(
            outcome,
            RecomputeOutcome::Applied {
                annotations: 1,
                skipped: 0
            }
        );
        let remaining = fx.annotations.for_editor(EditorId(1));
        assert_eq!(remaining[0].kind, linemark_core::BlockKind::Added);
    }

    #[test]
    fn reject_is_undoable() {
        let mut fx = fixture("a\nb\nc\n", "a\nx\nc\n");
        fx.recompute();
        fx.sync.revert("diff_block_1", &mut fx.editor, &mut fx.annotations).unwrap();
        assert!(fx.editor.undo(DocumentId(1)));
        assert_eq!(fx.text.text(), "a\nx\nc\n");
    }

    #[test]
    fn failed_reject_leaves_document_and_block() {
        let mut fx = fixture("a\nb\nc\n", "a\nx\nc\n");
        fx.recompute();
        fx.editor.set_read_only(DocumentId(1), true);
        let err = fx
            .sync
            .reject("diff_block_1", &fx.versions, &mut fx.editor, &mut fx.annotations)
            .unwrap_err();
        assert!(matches!(err, LinemarkError::Mutation(_)));
        assert_eq!(fx.text.text(), "a\nx\nc\n");
        assert_eq!(fx.sync.annotations().state("diff_block_1"), Some(BlockState::Pending));
        assert_eq!(fx.annotations.len(), 1);
    }

    #[test]
    fn recompute_supersedes_previous_set() {
        let mut fx = fixture("a\nb\nc\n", "a\nx\nc\n");
        fx.recompute();
        fx.text.set("a\nx\nc\nnew\n");
        fx.recompute();
        assert_eq!(fx.annotations.len(), 2);
        assert_eq!(fx.sync.annotations().pending_count(), 2);
    }

    #[test]
    fn clear_removes_everything() {
        let mut fx = fixture("a\nb\nc\n", "x\nb\ny\n");
        fx.recompute();
        assert_eq!(fx.sync.clear(&mut fx.annotations), 2);
        assert!(fx.annotations.is_empty());
        assert!(fx.sync.annotations().is_empty());
    }
}
