//! End-to-end tests against an in-process `kanban-store`.
//!
//! Each test starts a store server on an ephemeral port and drives a
//! `BoardSession` through the WebSocket client.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use kanban::auth::AuthProvider;
use kanban::board::{BoardError, BoardSession, DragOutcome, NewTask};
use kanban::notify::{Notification, Notifier};
use kanban::store::StoreError;
use kanban::store::remote::WsStore;
use kanban_proto::model::TaskPatch;
use tokio::sync::mpsc;

const TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

async fn start_store() -> String {
    let (addr, _handle) = kanban_store::server::start_server("127.0.0.1:0")
        .await
        .unwrap();
    format!("ws://{addr}/ws")
}

/// Connects, signs in as `email` and opens the default board.
async fn open_session(
    url: &str,
    email: &str,
) -> (BoardSession<WsStore>, AuthProvider, mpsc::Receiver<Notification>) {
    let store = WsStore::connect(url, TIMEOUT).await.unwrap();
    let auth = AuthProvider::new();
    let user = auth.sign_in(&store, email, None).await.unwrap();
    let (notifier, rx) = Notifier::channel(32);
    let session = BoardSession::new(store, user, notifier);
    session.ensure_default_board().await.unwrap();
    (session, auth, rx)
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn first_sign_in_provisions_default_board() {
    let url = start_store().await;
    let (session, auth, _rx) = open_session(&url, "ada@example.com").await;

    assert_eq!(auth.user().unwrap().email, "ada@example.com");
    assert_eq!(session.board().unwrap().name, "My Board");
    let names: Vec<String> = session.with_cache(|c| c.columns().iter().map(|col| col.name.clone()).collect());
    assert_eq!(names, ["To Do", "In Progress", "Done"]);
}

#[tokio::test]
async fn create_move_and_toggle_round_trip() {
    let url = start_store().await;
    let (session, _auth, mut rx) = open_session(&url, "ada@example.com").await;

    let task_id = session
        .create_task(NewTask::titled("Ship the store"))
        .await
        .unwrap();
    let subtask_id = session.create_subtask(&task_id, "Write tests").await.unwrap();

    let done = session.resolve_column("done").unwrap();
    let outcome = session.move_task(&task_id, &done).await.unwrap();
    assert!(matches!(outcome, DragOutcome::Moved { .. }));

    assert!(session.toggle_subtask(&subtask_id).await.unwrap());
    session
        .update_task(&task_id, TaskPatch::now().completed(true))
        .await
        .unwrap();

    let task = session.with_cache(|c| c.task(&task_id).cloned()).unwrap();
    assert_eq!(task.column_id, done);
    assert!(task.completed);
    assert_eq!(session.with_cache(|c| c.subtask_progress(&task_id)), (1, 1));

    let mut titles = Vec::new();
    while let Ok(n) = rx.try_recv() {
        assert!(!n.is_error(), "unexpected error: {n}");
        titles.push(n.title);
    }
    assert_eq!(
        titles,
        ["Task created", "Subtask added", "Subtask completed", "Task updated"]
    );
}

#[tokio::test]
async fn second_connection_sees_the_same_board() {
    let url = start_store().await;
    let (first, _auth, _rx) = open_session(&url, "ada@example.com").await;
    let task_id = first.create_task(NewTask::titled("Shared state")).await.unwrap();

    let (second, _auth2, _rx2) = open_session(&url, "ADA@example.com").await;
    assert_eq!(second.board().unwrap().id, first.board().unwrap().id);
    assert!(second.with_cache(|c| c.task(&task_id).is_some()));
}

#[tokio::test]
async fn other_users_board_is_forbidden() {
    let url = start_store().await;
    let (ada, _auth, _rx) = open_session(&url, "ada@example.com").await;
    let (bob, _auth2, mut rx2) = open_session(&url, "bob@example.com").await;

    let result = bob.select_board(&ada.board().unwrap().id).await;
    assert!(matches!(
        result,
        Err(BoardError::Store(StoreError::Forbidden(_)))
    ));
    assert_eq!(rx2.try_recv().unwrap().title, "Failed to load board");
    // Bob keeps his own board.
    assert_ne!(bob.board().unwrap().id, ada.board().unwrap().id);
}

#[tokio::test]
async fn shared_board_is_visible_to_others() {
    let url = start_store().await;
    let (ada, _auth, _rx) = open_session(&url, "ada@example.com").await;
    ada.update_board(kanban_proto::model::BoardPatch {
        is_shared: Some(true),
        ..Default::default()
    })
    .await
    .unwrap();
    assert!(ada.board().unwrap().is_shared);

    let (bob, _auth2, _rx2) = open_session(&url, "bob@example.com").await;
    assert_eq!(bob.boards().await.unwrap().len(), 2);
    bob.select_board(&ada.board().unwrap().id).await.unwrap();
    assert_eq!(bob.with_cache(|c| c.columns().len()), 3);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let url = start_store().await;
    let (session, auth, _rx) = open_session(&url, "ada@example.com").await;

    auth.logout(session.store()).await.unwrap();
    assert!(auth.user().is_none());

    let result = session.reconcile().await;
    assert!(matches!(
        result,
        Err(BoardError::Store(StoreError::Forbidden(_)))
    ));
}
