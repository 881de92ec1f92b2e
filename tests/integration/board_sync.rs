//! Integration tests for board synchronization.
//!
//! Drives a `BoardSession` over an `InMemoryStore` with injected faults and
//! checks that the cache always settles on what the store holds.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use kanban::board::drag::DropTarget;
use kanban::board::{BoardError, BoardSession, DragOutcome, NewTask};
use kanban::notify::{Notification, Notifier, Severity};
use kanban::store::memory::InMemoryStore;
use kanban::store::{AuthBackend, RemoteStore, StoreError};
use kanban_proto::model::{
    Board, BoardId, BoardPatch, Column, ColumnId, Subtask, SubtaskId, TaskId, TaskPatch, TaskRecord,
    Timestamp, TitleError, User,
};
use kanban_proto::wire::{ListQuery, StoreOp, StoreValue};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn board_id() -> BoardId {
    BoardId::from("b1")
}

fn record(id: &str, column: &str, position: u32, user: &User) -> TaskRecord {
    TaskRecord {
        id: TaskId::from(id),
        title: format!("Task {id}"),
        description: None,
        column_id: ColumnId::from(column),
        board_id: board_id(),
        owner_id: user.id.clone(),
        position,
        due_date: None,
        completed: false,
        tags: None,
        created_at: Timestamp::from_millis(1_000),
        updated_at: Timestamp::from_millis(1_000),
    }
}

fn subtask(id: &str, task: &str, position: u32) -> Subtask {
    Subtask {
        id: SubtaskId::from(id),
        title: format!("Subtask {id}"),
        task_id: TaskId::from(task),
        completed: false,
        position,
    }
}

/// Board `b1` with columns `col_todo`, `col_doing`, `col_done`; tasks `t1`,
/// `t2` in `col_todo` and `t3` in `col_done`. The session has `b1` loaded.
async fn fixture() -> (BoardSession<InMemoryStore>, mpsc::Receiver<Notification>) {
    let store = InMemoryStore::new();
    let user = store.sign_in("ada@example.com", None).await.unwrap();

    store
        .create_board(Board {
            id: board_id(),
            name: "Sprint".into(),
            description: None,
            owner_id: user.id.clone(),
            is_shared: false,
            is_archived: false,
        })
        .await
        .unwrap();
    for (id, name, position) in [("col_todo", "To Do", 0), ("col_doing", "Doing", 1), ("col_done", "Done", 2)] {
        store
            .create_column(Column {
                id: ColumnId::from(id),
                name: name.into(),
                board_id: board_id(),
                position,
                color: "#94a3b8".into(),
            })
            .await
            .unwrap();
    }
    for (id, column, position) in [("t1", "col_todo", 0), ("t2", "col_todo", 1), ("t3", "col_done", 0)] {
        store.create_task(record(id, column, position, &user)).await.unwrap();
    }

    let (notifier, rx) = Notifier::channel(64);
    let session = BoardSession::new(store, user, notifier);
    session.select_board(&board_id()).await.unwrap();
    (session, rx)
}

fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

fn column_of(session: &BoardSession<InMemoryStore>, task: &str) -> ColumnId {
    session
        .with_cache(|c| c.task(&TaskId::from(task)).map(|t| t.column_id.clone()))
        .unwrap()
}

/// Task-to-column assignment as the store has it.
async fn stored_columns(session: &BoardSession<InMemoryStore>) -> Vec<(TaskId, ColumnId)> {
    let mut rows: Vec<_> = session
        .store()
        .list_tasks(ListQuery::board(board_id()))
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.id, r.column_id))
        .collect();
    rows.sort();
    rows
}

fn cached_columns(session: &BoardSession<InMemoryStore>) -> Vec<(TaskId, ColumnId)> {
    let mut rows: Vec<_> = session.with_cache(|c| {
        c.tasks_filtered(|_| true)
            .into_iter()
            .map(|t| (t.id.clone(), t.column_id.clone()))
            .collect()
    });
    rows.sort();
    rows
}

// ===========================================================================
// Drag and drop
// ===========================================================================

#[tokio::test]
async fn failed_drag_is_rolled_back_by_reconciliation() {
    let (session, mut rx) = fixture().await;
    drain(&mut rx);

    session.begin_drag(&TaskId::from("t1")).unwrap();
    let done = DropTarget::Column(ColumnId::from("col_done"));
    assert!(session.drag_over(&done));
    assert_eq!(column_of(&session, "t1"), ColumnId::from("col_done"));

    session.store().fail_writes(true);
    let result = session.end_drag(Some(&done)).await;

    assert!(matches!(
        result,
        Err(BoardError::Store(StoreError::Unavailable(_)))
    ));
    assert_eq!(column_of(&session, "t1"), ColumnId::from("col_todo"));
    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Failed to move task");
    assert_eq!(notes[0].severity, Severity::Error);
}

#[tokio::test]
async fn successful_drag_takes_store_position() {
    let (session, _rx) = fixture().await;

    let outcome = session
        .move_task(&TaskId::from("t1"), &ColumnId::from("col_done"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DragOutcome::Moved {
            task_id: TaskId::from("t1"),
            column_id: ColumnId::from("col_done"),
        }
    );
    let position = session.with_cache(|c| c.task(&TaskId::from("t1")).unwrap().position);
    assert_eq!(position, 1, "appended after t3");
    assert_eq!(cached_columns(&session), stored_columns(&session).await);
}

#[tokio::test]
async fn hovering_same_column_twice_is_idempotent() {
    let (session, _rx) = fixture().await;
    session.begin_drag(&TaskId::from("t1")).unwrap();

    assert!(session.drag_over(&DropTarget::Column(ColumnId::from("col_done"))));
    let after_first = session.snapshot();

    assert!(!session.drag_over(&DropTarget::Column(ColumnId::from("col_done"))));
    // A task in the same column resolves to the same column.
    assert!(!session.drag_over(&DropTarget::Task(TaskId::from("t3"))));
    assert_eq!(session.snapshot(), after_first);
}

#[tokio::test]
async fn dropping_on_origin_writes_nothing() {
    let (session, _rx) = fixture().await;
    let writes = session.store().write_count();

    session.begin_drag(&TaskId::from("t1")).unwrap();
    session.drag_over(&DropTarget::Column(ColumnId::from("col_doing")));
    let outcome = session
        .end_drag(Some(&DropTarget::Column(ColumnId::from("col_todo"))))
        .await
        .unwrap();

    assert_eq!(outcome, DragOutcome::Unchanged);
    assert_eq!(session.store().write_count(), writes);
    assert_eq!(column_of(&session, "t1"), ColumnId::from("col_todo"));
}

#[tokio::test]
async fn excursion_back_to_origin_keeps_column_order() {
    let (session, _rx) = fixture().await;

    session.begin_drag(&TaskId::from("t1")).unwrap();
    session.drag_over(&DropTarget::Column(ColumnId::from("col_doing")));
    let outcome = session
        .end_drag(Some(&DropTarget::Column(ColumnId::from("col_todo"))))
        .await
        .unwrap();
    assert_eq!(outcome, DragOutcome::Unchanged);

    let todo: Vec<String> = session.with_cache(|c| {
        c.tasks_in_column(&ColumnId::from("col_todo"))
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    });
    assert_eq!(todo, ["t1", "t2"]);

    let mut stored: Vec<(TaskId, u32)> = session
        .store()
        .list_tasks(ListQuery::board(board_id()))
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.id, r.position))
        .collect();
    stored.sort();
    let mut cached: Vec<(TaskId, u32)> = session.with_cache(|c| {
        c.tasks_filtered(|_| true)
            .into_iter()
            .map(|t| (t.id.clone(), t.position))
            .collect()
    });
    cached.sort();
    assert_eq!(cached, stored);
}

#[tokio::test]
async fn release_outside_keeps_optimistic_state_without_writing() {
    let (session, _rx) = fixture().await;
    let writes = session.store().write_count();

    session.begin_drag(&TaskId::from("t1")).unwrap();
    session.drag_over(&DropTarget::Column(ColumnId::from("col_done")));
    let outcome = session.end_drag(None).await.unwrap();

    assert_eq!(outcome, DragOutcome::Discarded);
    assert_eq!(session.store().write_count(), writes);
    assert_eq!(column_of(&session, "t1"), ColumnId::from("col_done"));

    // The next reconciliation restores the durable column.
    session.reconcile().await.unwrap();
    assert_eq!(column_of(&session, "t1"), ColumnId::from("col_todo"));
}

#[tokio::test]
async fn second_drag_is_rejected_while_first_is_active() {
    let (session, _rx) = fixture().await;
    session.begin_drag(&TaskId::from("t1")).unwrap();
    assert!(matches!(
        session.begin_drag(&TaskId::from("t2")),
        Err(BoardError::Drag(_))
    ));
    assert_eq!(session.end_drag(None).await.unwrap(), DragOutcome::Discarded);
    assert_eq!(session.end_drag(None).await.unwrap(), DragOutcome::Ignored);
}

// ===========================================================================
// Mutators
// ===========================================================================

#[tokio::test]
async fn created_task_is_appended_to_its_column() {
    let (session, mut rx) = fixture().await;
    drain(&mut rx);

    let id = session
        .create_task(NewTask {
            column_id: Some(ColumnId::from("col_todo")),
            ..NewTask::titled("T3")
        })
        .await
        .unwrap();

    let task = session.with_cache(|c| c.task(&id).cloned()).unwrap();
    assert_eq!(task.position, 2);
    assert_eq!(task.owner_id, session.user().id);
    assert_eq!(drain(&mut rx)[0].title, "Task created");
}

#[tokio::test]
async fn task_without_column_lands_in_first_column() {
    let (session, _rx) = fixture().await;
    let id = session.create_task(NewTask::titled("Inbox item")).await.unwrap();
    assert_eq!(
        session.with_cache(|c| c.task(&id).unwrap().column_id.clone()),
        ColumnId::from("col_todo")
    );
}

#[tokio::test]
async fn tags_survive_storage() {
    let (session, _rx) = fixture().await;
    let tags: BTreeSet<String> = ["urgent", "q3"].into_iter().map(String::from).collect();

    let id = session
        .create_task(NewTask {
            tags: tags.clone(),
            ..NewTask::titled("Tagged")
        })
        .await
        .unwrap();

    assert_eq!(session.with_cache(|c| c.task(&id).unwrap().tags.clone()), tags);
    let stored = session
        .store()
        .list_tasks(ListQuery::board(board_id()))
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.id == id)
        .unwrap();
    assert_eq!(stored.tags.as_deref(), Some(r#"["q3","urgent"]"#));
}

#[tokio::test]
async fn malformed_stored_tags_load_as_empty() {
    let (session, _rx) = fixture().await;
    let mut broken = record("t9", "col_todo", 5, session.user());
    broken.tags = Some("{not json".into());
    session.store().create_task(broken).await.unwrap();

    session.reconcile().await.unwrap();
    assert!(session.with_cache(|c| c.task(&TaskId::from("t9")).unwrap().tags.is_empty()));
}

#[tokio::test]
async fn new_subtask_goes_to_end_of_checklist() {
    let (session, _rx) = fixture().await;
    session.store().create_subtask(subtask("s1", "t1", 0)).await.unwrap();
    session.store().create_subtask(subtask("s2", "t1", 1)).await.unwrap();
    session.reconcile().await.unwrap();

    let id = session
        .create_subtask(&TaskId::from("t1"), "Write tests")
        .await
        .unwrap();

    let created = session.with_cache(|c| c.subtask(&id).cloned()).unwrap();
    assert_eq!(created.position, 2);
    assert_eq!(created.title, "Write tests");
    assert_eq!(
        session.with_cache(|c| c.subtask_progress(&TaskId::from("t1"))),
        (0, 3)
    );
}

#[tokio::test]
async fn toggling_a_subtask_flips_it() {
    let (session, _rx) = fixture().await;
    session.store().create_subtask(subtask("s1", "t1", 0)).await.unwrap();
    session.reconcile().await.unwrap();

    assert!(session.toggle_subtask(&SubtaskId::from("s1")).await.unwrap());
    assert_eq!(
        session.with_cache(|c| c.subtask_progress(&TaskId::from("t1"))),
        (1, 1)
    );
    assert!(!session.toggle_subtask(&SubtaskId::from("s1")).await.unwrap());
}

#[tokio::test]
async fn deleting_a_task_removes_its_subtasks() {
    let (session, _rx) = fixture().await;
    session.store().create_subtask(subtask("s1", "t1", 0)).await.unwrap();
    session.reconcile().await.unwrap();

    session.delete_task(&TaskId::from("t1")).await.unwrap();

    assert!(session.with_cache(|c| c.task(&TaskId::from("t1")).is_none()));
    assert!(session.with_cache(|c| c.subtask(&SubtaskId::from("s1")).is_none()));
}

#[tokio::test]
async fn deleting_a_column_removes_its_tasks() {
    let (session, _rx) = fixture().await;
    session.delete_column(&ColumnId::from("col_todo")).await.unwrap();
    assert_eq!(session.with_cache(|c| c.task_count()), 1);
    assert!(session.with_cache(|c| c.column(&ColumnId::from("col_todo")).is_none()));
}

#[tokio::test]
async fn edit_refreshes_updated_at() {
    let (session, _rx) = fixture().await;
    session
        .update_task(&TaskId::from("t2"), TaskPatch::now().title("Renamed"))
        .await
        .unwrap();
    let task = session.with_cache(|c| c.task(&TaskId::from("t2")).cloned()).unwrap();
    assert_eq!(task.title, "Renamed");
    assert!(task.updated_at > task.created_at);
}

#[tokio::test]
async fn failed_write_leaves_cache_untouched() {
    let (session, mut rx) = fixture().await;
    drain(&mut rx);
    let before = session.snapshot();

    session.store().fail_writes(true);
    let result = session.create_task(NewTask::titled("Never stored")).await;

    assert!(matches!(result, Err(BoardError::Store(_))));
    assert_eq!(session.snapshot(), before);
    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Failed to create task");
    assert!(notes[0].is_error());
}

#[tokio::test]
async fn invalid_input_is_rejected_before_writing() {
    let (session, mut rx) = fixture().await;
    drain(&mut rx);
    let writes = session.store().write_count();

    assert!(matches!(
        session.create_task(NewTask::titled("   ")).await,
        Err(BoardError::Title(TitleError::Empty))
    ));
    assert!(matches!(
        session.create_task(NewTask::titled("x".repeat(300))).await,
        Err(BoardError::Title(TitleError::TooLong))
    ));
    assert!(matches!(
        session
            .update_task(&TaskId::from("t1"), TaskPatch::now().column(ColumnId::from("elsewhere")))
            .await,
        Err(BoardError::ColumnNotFound(_))
    ));
    assert!(matches!(
        session.delete_task(&TaskId::from("missing")).await,
        Err(BoardError::TaskNotFound(_))
    ));

    assert_eq!(session.store().write_count(), writes);
    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 4);
    assert!(notes.iter().all(Notification::is_error));
}

#[tokio::test]
async fn concurrent_mutations_both_land() {
    let (session, _rx) = fixture().await;
    let (a, b) = tokio::join!(
        session.create_task(NewTask::titled("Left")),
        session.create_task(NewTask::titled("Right")),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    session.reconcile().await.unwrap();
    assert!(session.with_cache(|c| c.task(&a).is_some() && c.task(&b).is_some()));
    assert_eq!(session.with_cache(|c| c.task_count()), 5);
}

/// Store whose board listings fail while `boards_offline` is set.
struct BoardListingOutage {
    inner: InMemoryStore,
    boards_offline: AtomicBool,
}

impl RemoteStore for BoardListingOutage {
    async fn execute(&self, op: StoreOp) -> Result<StoreValue, StoreError> {
        if self.boards_offline.load(Ordering::SeqCst) && matches!(op, StoreOp::ListBoards(_)) {
            return Err(StoreError::Unavailable("boards offline".into()));
        }
        self.inner.execute(op).await
    }
}

#[tokio::test]
async fn board_reload_failure_after_update_is_reported() {
    let inner = InMemoryStore::new();
    let user = inner.sign_in("ada@example.com", None).await.unwrap();
    let store = BoardListingOutage {
        inner,
        boards_offline: AtomicBool::new(false),
    };
    let (notifier, mut rx) = Notifier::channel(16);
    let session = BoardSession::new(store, user, notifier);
    let board = session.ensure_default_board().await.unwrap();
    drain(&mut rx);

    session.store().boards_offline.store(true, Ordering::SeqCst);
    let result = session
        .update_board(BoardPatch {
            name: Some("Renamed".into()),
            ..Default::default()
        })
        .await;

    assert!(matches!(
        result,
        Err(BoardError::Store(StoreError::Unavailable(_)))
    ));
    let notes = drain(&mut rx);
    assert_eq!(notes.last().unwrap().title, "Failed to load board");
    assert_eq!(notes.last().unwrap().severity, Severity::Error);
    // The write landed; the session keeps the board it last read.
    assert_eq!(session.board().unwrap().name, board.name);
    let stored = session
        .store()
        .inner
        .list_boards(ListQuery::board(board.id))
        .await
        .unwrap();
    assert_eq!(stored[0].name, "Renamed");
}

// ===========================================================================
// Reconciliation
// ===========================================================================

#[tokio::test]
async fn read_failure_keeps_previous_cache() {
    let (session, mut rx) = fixture().await;
    drain(&mut rx);
    let before = session.snapshot();

    session.store().fail_reads(true);
    assert!(session.reconcile().await.is_err());

    assert_eq!(session.snapshot(), before);
    let notes = drain(&mut rx);
    assert_eq!(notes[0].title, "Failed to load board");
}

#[tokio::test]
async fn default_board_is_provisioned_and_selected() {
    let store = InMemoryStore::new();
    let user = store.sign_in("grace@example.com", Some("Grace".into())).await.unwrap();
    let (notifier, _rx) = Notifier::channel(8);
    let session = BoardSession::new(store, user, notifier);

    let board = session.ensure_default_board().await.unwrap();

    assert_eq!(board.name, "My Board");
    let names: Vec<String> = session.with_cache(|c| c.columns().iter().map(|col| col.name.clone()).collect());
    assert_eq!(names, ["To Do", "In Progress", "Done"]);
    assert_eq!(session.boards().await.unwrap().len(), 1);
}

#[tokio::test]
async fn selecting_unknown_board_fails() {
    let (session, _rx) = fixture().await;
    assert!(matches!(
        session.select_board(&BoardId::from("nope")).await,
        Err(BoardError::BoardNotFound(_))
    ));
    assert_eq!(session.board().unwrap().id, board_id());
}
