//! Keeps an editor's diff annotations in step with its document.
//!
//! Edits are debounced per document by [`ChangeScheduler`]; when a quiet
//! period ends, [`AnnotationSynchronizer`] re-reads both versions of the
//! file, diffs them and swaps the annotation set. [`Session`] wires the two
//! together on one confined event loop.

mod annotations;
mod host;
pub mod memory;
mod offsets;
mod scheduler;
mod session;
mod synchronizer;

pub use annotations::{AnchoredBlock, AnnotationSet, BlockState};
pub use host::{AnnotationHandle, AnnotationHost, DocumentId, EditorHost, EditorId, FileId, VersionProvider};
pub use offsets::block_offsets;
pub use scheduler::ChangeScheduler;
pub use session::{Session, SessionHandle};
pub use synchronizer::{AnnotationSynchronizer, ClearReason, RecomputeOutcome, RecomputeTicket, VersionSnapshot};
