use std::sync::Arc;
use std::time::Duration;

use linemark_core::{BlockKind, LinemarkConfig};
use linemark_sync::memory::{MemoryAnnotations, MemoryEditor, MemoryVersions, SharedText};
use linemark_sync::{DocumentId, EditorId, FileId, Session};

const DOC: DocumentId = DocumentId(1);

fn config() -> LinemarkConfig {
    LinemarkConfig::from_toml("[sync]\nquiet_period_ms = 50\n").unwrap()
}

struct Harness {
    session: Session<MemoryVersions, MemoryEditor, MemoryAnnotations>,
    text: SharedText,
    annotations: MemoryAnnotations,
}

fn harness(baseline: &str, current: &str) -> Harness {
    let text = SharedText::new(current);
    let versions = MemoryVersions::new();
    versions.track(FileId::new("lib.rs"), Some(baseline), text.clone());
    let mut editor = MemoryEditor::new();
    editor.open(DOC, text.clone());
    let annotations = MemoryAnnotations::new();
    for id in [EditorId(1), EditorId(2)] {
        editor.watch(DOC, id, annotations.clone());
    }
    let session = Session::new(Arc::new(versions), editor, annotations.clone(), &config());
    Harness {
        session,
        text,
        annotations,
    }
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within a second");
}

#[tokio::test]
async fn typing_burst_settles_on_final_text() {
    let Harness {
        session,
        text,
        annotations,
    } = harness("fn main() {\n}\n", "fn main() {\n}\n");
    let handle = session.handle();
    let running = tokio::spawn(session.run());
    handle.open(EditorId(1), DOC, FileId::new("lib.rs"));

    let mut typed = String::from("fn main() {\n");
    for ch in "    run();\n".chars() {
        typed.push(ch);
        text.set(&format!("{typed}}}\n"));
        handle.document_changed(DOC);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    wait_for(|| {
        let shown = annotations.for_editor(EditorId(1));
        shown.len() == 1 && shown[0].kind == BlockKind::Added && shown[0].range == (12..23)
    })
    .await;
    assert_eq!(annotations.for_editor(EditorId(1))[0].block_id, "diff_block_1");

    handle.shutdown();
    running.await.unwrap();
}

#[tokio::test]
async fn editors_on_one_document_update_together() {
    let Harness {
        session,
        text,
        annotations,
    } = harness("a\nb\n", "a\nb\n");
    let handle = session.handle();
    let running = tokio::spawn(session.run());
    handle.open(EditorId(1), DOC, FileId::new("lib.rs"));
    handle.open(EditorId(2), DOC, FileId::new("lib.rs"));

    text.set("a\nB\n");
    handle.document_changed(DOC);
    wait_for(|| annotations.len() == 2).await;
    assert_eq!(annotations.for_editor(EditorId(1)).len(), 1);
    assert_eq!(annotations.for_editor(EditorId(2)).len(), 1);

    handle.close(EditorId(2));
    wait_for(|| annotations.len() == 1).await;

    text.set("a\nb\n");
    handle.document_changed(DOC);
    wait_for(|| annotations.is_empty()).await;

    handle.shutdown();
    running.await.unwrap();
}

#[tokio::test]
async fn reverting_every_block_restores_baseline() {
    let baseline = "one\ntwo\nthree\nfour\n";
    let Harness {
        session,
        text,
        annotations,
    } = harness(baseline, "one\nTWO\nthree\nfour\nfive\n");
    let handle = session.handle();
    let running = tokio::spawn(session.run());
    handle.open(EditorId(1), DOC, FileId::new("lib.rs"));
    wait_for(|| annotations.len() == 2).await;

    handle.reject(EditorId(1), "diff_block_1").await.unwrap();
    assert_eq!(text.text(), "one\ntwo\nthree\nfour\nfive\n");

    // The remaining addition is renumbered once the recompute lands.
    wait_for(|| {
        let shown = annotations.for_editor(EditorId(1));
        shown.len() == 1 && shown[0].block_id == "diff_block_1"
    })
    .await;
    handle.reject(EditorId(1), "diff_block_1").await.unwrap();
    assert_eq!(text.text(), baseline);
    wait_for(|| annotations.is_empty()).await;
    handle.shutdown();
    running.await.unwrap();
}

#[tokio::test]
async fn reject_during_typing_uses_the_live_text() {
    let Harness {
        session,
        text,
        annotations,
    } = harness("a\nb\nc\n", "a\nX\nc\n");
    let handle = session.handle();
    let running = tokio::spawn(session.run());
    handle.open(EditorId(1), DOC, FileId::new("lib.rs"));
    wait_for(|| annotations.len() == 1).await;

    // Typing below the block leaves its span intact.
    text.set("a\nX\nc\nd\n");
    handle.document_changed(DOC);
    handle.reject(EditorId(1), "diff_block_1").await.unwrap();
    assert_eq!(text.text(), "a\nb\nc\nd\n");

    // Typing above it does not; the block is refused until recomputed.
    wait_for(|| {
        let shown = annotations.for_editor(EditorId(1));
        shown.len() == 1 && shown[0].kind == BlockKind::Added
    })
    .await;
    text.set("z\na\nb\nc\nd\n");
    handle.document_changed(DOC);
    assert!(handle.reject(EditorId(1), "diff_block_1").await.is_err());
    assert_eq!(text.text(), "z\na\nb\nc\nd\n");

    wait_for(|| annotations.for_editor(EditorId(1)).len() == 2).await;
    handle.reject(EditorId(1), "diff_block_2").await.unwrap();
    handle.reject(EditorId(1), "diff_block_1").await.unwrap();
    assert_eq!(text.text(), "a\nb\nc\n");

    handle.shutdown();
    running.await.unwrap();
}

#[tokio::test]
async fn rejects_sent_together_restore_baseline() {
    let baseline = "a\nbbbb\nc\n";
    let Harness {
        session,
        text,
        annotations,
    } = harness(baseline, "a\nX\nc\nd\n");
    let handle = session.handle();
    let running = tokio::spawn(session.run());
    handle.open(EditorId(1), DOC, FileId::new("lib.rs"));
    handle.open(EditorId(2), DOC, FileId::new("lib.rs"));
    wait_for(|| annotations.len() == 4).await;

    let (first, second) = tokio::join!(
        handle.reject(EditorId(1), "diff_block_2"),
        handle.reject(EditorId(1), "diff_block_1"),
    );
    first.unwrap();
    second.unwrap();
    assert_eq!(text.text(), baseline);

    // The other editor's stale markers go away with its recompute.
    wait_for(|| annotations.is_empty()).await;
    handle.shutdown();
    running.await.unwrap();
}
