//! The confined event loop that ties edits, debouncing, retrieval and
//! annotation updates together.

use std::collections::BTreeMap;
use std::sync::Arc;

use linemark_core::{LinemarkConfig, LinemarkError};
use linemark_difflens::DiffEngine;
use tokio::sync::{mpsc, oneshot};

use crate::host::{AnnotationHost, DocumentId, EditorHost, EditorId, FileId, VersionProvider};
use crate::scheduler::ChangeScheduler;
use crate::synchronizer::{AnnotationSynchronizer, RecomputeOutcome, RecomputeTicket, VersionSnapshot};

type Reply<T> = oneshot::Sender<Result<T, LinemarkError>>;

enum Event {
    Open {
        editor: EditorId,
        document: DocumentId,
        file: FileId,
    },
    Close(EditorId),
    Mutated(DocumentId),
    Refresh(EditorId),
    Toggle(EditorId),
    Clear(EditorId),
    Accept {
        editor: EditorId,
        block_id: String,
        reply: Reply<()>,
    },
    Reject {
        editor: EditorId,
        block_id: String,
        reply: Reply<()>,
    },
    Shutdown,
    Fired(DocumentId),
    Fetched {
        ticket: RecomputeTicket,
        snapshot: VersionSnapshot,
    },
}

/// Cloneable sender half of a [`Session`].
///
/// Methods are cheap and never block; they only enqueue work for the
/// session's loop.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl SessionHandle {
    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Session already shut down");
        }
    }

    /// Start tracking `editor`, which shows `document` backed by `file`.
    pub fn open(&self, editor: EditorId, document: DocumentId, file: FileId) {
        self.send(Event::Open {
            editor,
            document,
            file,
        });
    }

    /// End the editing session of `editor`; its annotations are removed.
    pub fn close(&self, editor: EditorId) {
        self.send(Event::Close(editor));
    }

    /// Report that `document` was edited.
    pub fn document_changed(&self, document: DocumentId) {
        self.send(Event::Mutated(document));
    }

    /// Recompute `editor` now, without waiting for a quiet period.
    pub fn refresh(&self, editor: EditorId) {
        self.send(Event::Refresh(editor));
    }

    /// Hide annotations if any are showing, otherwise recompute.
    pub fn toggle(&self, editor: EditorId) {
        self.send(Event::Toggle(editor));
    }

    pub fn clear(&self, editor: EditorId) {
        self.send(Event::Clear(editor));
    }

    /// Accept a block shown in `editor`.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::UnknownBlock`] if the block is not pending or
    /// the session is gone.
    pub async fn accept(&self, editor: EditorId, block_id: &str) -> Result<(), LinemarkError> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::Accept {
            editor,
            block_id: block_id.to_string(),
            reply,
        });
        rx.await
            .unwrap_or_else(|_| Err(LinemarkError::UnknownBlock(block_id.to_string())))
    }

    /// Reject a block shown in `editor`, reverting its text.
    ///
    /// # Errors
    ///
    /// Returns the mutation error if the document could not be edited.
    pub async fn reject(&self, editor: EditorId, block_id: &str) -> Result<(), LinemarkError> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::Reject {
            editor,
            block_id: block_id.to_string(),
            reply,
        });
        rx.await
            .unwrap_or_else(|_| Err(LinemarkError::UnknownBlock(block_id.to_string())))
    }

    /// Stop the session loop. Pending recomputations are cancelled.
    pub fn shutdown(&self) {
        self.send(Event::Shutdown);
    }
}

/// Owns the editor-side state and processes events one at a time.
///
/// Run it on the editor's confined context, e.g. a current-thread runtime
/// or a `LocalSet`. Version retrieval is pushed to the blocking pool and its
/// result comes back as an event, so annotation state is only ever touched
/// from [`Session::run`].
pub struct Session<P, E, A> {
    provider: Arc<P>,
    editor_host: E,
    annotation_host: A,
    engine: DiffEngine,
    scheduler: ChangeScheduler<DocumentId>,
    editors: BTreeMap<EditorId, AnnotationSynchronizer>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl<P, E, A> Session<P, E, A>
where
    P: VersionProvider + 'static,
    E: EditorHost,
    A: AnnotationHost,
{
    pub fn new(provider: Arc<P>, editor_host: E, annotation_host: A, config: &LinemarkConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            provider,
            editor_host,
            annotation_host,
            engine: DiffEngine::new(config.engine.clone()),
            scheduler: ChangeScheduler::new(config.sync.quiet_period()),
            editors: BTreeMap::new(),
            tx,
            rx,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle { tx: self.tx.clone() }
    }

    /// Process events until [`SessionHandle::shutdown`] is called.
    ///
    /// Returns the hosts so their final state can be inspected.
    pub async fn run(mut self) -> (E, A) {
        while let Some(event) = self.rx.recv().await {
            if matches!(event, Event::Shutdown) {
                break;
            }
            self.handle_event(event);
        }

        self.scheduler.cancel_all();
        for sync in self.editors.values_mut() {
            sync.clear(&mut self.annotation_host);
        }
        tracing::debug!(editors = self.editors.len(), "Session stopped");
        (self.editor_host, self.annotation_host)
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Open {
                editor,
                document,
                file,
            } => {
                tracing::debug!(%editor, %document, %file, "Opened editor");
                let sync = AnnotationSynchronizer::new(editor, document, file, self.engine.clone());
                if let Some(mut previous) = self.editors.insert(editor, sync) {
                    previous.clear(&mut self.annotation_host);
                }
                self.start_recompute(editor);
            }
            Event::Close(editor) => {
                if let Some(mut sync) = self.editors.remove(&editor) {
                    sync.clear(&mut self.annotation_host);
                    let document = sync.document();
                    if !self.editors.values().any(|s| s.document() == document) {
                        self.scheduler.cancel(&document);
                    }
                    tracing::debug!(%editor, "Closed editor");
                }
            }
            Event::Mutated(document) => {
                let tx = self.tx.clone();
                self.scheduler.schedule(document, move || {
                    let _ = tx.send(Event::Fired(document));
                });
            }
            Event::Fired(document) => self.recompute_document(document),
            Event::Refresh(editor) => self.start_recompute(editor),
            Event::Toggle(editor) => {
                let showing = self
                    .editors
                    .get(&editor)
                    .is_some_and(|s| !s.annotations().is_empty());
                if showing {
                    self.clear(editor);
                } else {
                    self.start_recompute(editor);
                }
            }
            Event::Clear(editor) => self.clear(editor),
            Event::Accept {
                editor,
                block_id,
                reply,
            } => {
                let result = match self.editors.get_mut(&editor) {
                    Some(sync) => sync.accept(&block_id, &mut self.annotation_host),
                    None => Err(LinemarkError::UnknownBlock(block_id)),
                };
                let _ = reply.send(result);
            }
            Event::Reject {
                editor,
                block_id,
                reply,
            } => {
                let result = match self.editors.get_mut(&editor) {
                    Some(sync) => sync
                        .revert(&block_id, &mut self.editor_host, &mut self.annotation_host)
                        .map(|()| sync.document()),
                    None => Err(LinemarkError::UnknownBlock(block_id)),
                };
                match &result {
                    Ok(document) => self.recompute_document(*document),
                    Err(e) => tracing::warn!(%editor, error = %e, "Failed to reject changes"),
                }
                let _ = reply.send(result.map(|_| ()));
            }
            Event::Fetched { ticket, snapshot } => {
                let Some(sync) = self.editors.get_mut(&ticket.editor()) else {
                    return;
                };
                let outcome = sync.apply(ticket, &snapshot, &self.editor_host, &mut self.annotation_host);
                if let RecomputeOutcome::Cleared(reason) = outcome {
                    tracing::debug!(editor = %ticket.editor(), %reason, "Cleared diff annotations");
                }
            }
            Event::Shutdown => {}
        }
    }

    fn clear(&mut self, editor: EditorId) {
        if let Some(sync) = self.editors.get_mut(&editor) {
            sync.clear(&mut self.annotation_host);
        }
    }

    /// Recompute every editor showing `document`.
    fn recompute_document(&mut self, document: DocumentId) {
        let editors: Vec<EditorId> = self
            .editors
            .values()
            .filter(|s| s.document() == document)
            .map(|s| s.editor())
            .collect();
        for editor in editors {
            self.start_recompute(editor);
        }
    }

    /// Fetch both versions off the confined context, then apply on return.
    fn start_recompute(&mut self, editor: EditorId) {
        let Some(sync) = self.editors.get_mut(&editor) else {
            return;
        };
        let ticket = sync.begin_recompute();
        let file = sync.file().clone();
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || {
            let snapshot = VersionSnapshot::fetch(provider.as_ref(), &file);
            let _ = tx.send(Event::Fetched { ticket, snapshot });
        });
    }
}
