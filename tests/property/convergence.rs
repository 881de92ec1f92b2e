//! Property tests for drag-and-drop convergence.
//!
//! 1. After any drop that writes, whether the write succeeds or fails, the
//!    cached task-to-column assignment equals the store's.
//! 2. Hovering the column a task already sits in never changes the cache.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use kanban::board::drag::DropTarget;
use kanban::board::{BoardSession, DragOutcome, NewTask};
use kanban::notify::Notifier;
use kanban::store::memory::InMemoryStore;
use kanban::store::{AuthBackend, RemoteStore};
use kanban_proto::model::{ColumnId, TaskId};
use kanban_proto::wire::ListQuery;
use proptest::prelude::*;

const TASKS: usize = 4;

/// One drag gesture.
#[derive(Debug, Clone)]
struct Gesture {
    task: usize,
    column: usize,
    write_fails: bool,
    released_outside: bool,
}

fn arb_gesture() -> impl Strategy<Value = Gesture> {
    (0..TASKS, 0..3_usize, any::<bool>(), prop::bool::weighted(0.2)).prop_map(
        |(task, column, write_fails, released_outside)| Gesture {
            task,
            column,
            write_fails,
            released_outside,
        },
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn seeded_session() -> (BoardSession<InMemoryStore>, Vec<TaskId>, Vec<ColumnId>) {
    let store = InMemoryStore::new();
    let user = store.sign_in("prop@example.com", None).await.unwrap();
    let (notifier, _rx) = Notifier::channel(1);
    let session = BoardSession::new(store, user, notifier);
    session.ensure_default_board().await.unwrap();

    let columns: Vec<ColumnId> =
        session.with_cache(|c| c.columns().into_iter().map(|col| col.id.clone()).collect());
    let mut tasks = Vec::new();
    for i in 0..TASKS {
        let id = session
            .create_task(NewTask {
                column_id: Some(columns[i % columns.len()].clone()),
                ..NewTask::titled(format!("task {i}"))
            })
            .await
            .unwrap();
        tasks.push(id);
    }
    (session, tasks, columns)
}

async fn assignments_match(session: &BoardSession<InMemoryStore>) -> bool {
    let board_id = session.board().unwrap().id;
    let mut stored: Vec<(TaskId, ColumnId)> = session
        .store()
        .list_tasks(ListQuery::board(board_id))
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.id, r.column_id))
        .collect();
    stored.sort();
    let mut cached: Vec<(TaskId, ColumnId)> = session.with_cache(|c| {
        c.tasks_filtered(|_| true)
            .into_iter()
            .map(|t| (t.id.clone(), t.column_id.clone()))
            .collect()
    });
    cached.sort();
    stored == cached
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every drop that reaches the store leaves the cache converged.
    #[test]
    fn drops_converge_with_store(gestures in prop::collection::vec(arb_gesture(), 1..12)) {
        runtime().block_on(async {
            let (session, tasks, columns) = seeded_session().await;

            for gesture in gestures {
                session.store().fail_writes(gesture.write_fails);
                session.begin_drag(&tasks[gesture.task]).unwrap();
                let target = DropTarget::Column(columns[gesture.column].clone());
                session.drag_over(&target);

                let drop_target = (!gesture.released_outside).then_some(&target);
                let result = session.end_drag(drop_target).await;
                match result {
                    Ok(DragOutcome::Moved { .. }) | Err(_) => {
                        prop_assert!(assignments_match(&session).await);
                    }
                    Ok(DragOutcome::Discarded) => {
                        prop_assert!(gesture.released_outside);
                        session.store().fail_writes(false);
                        session.reconcile().await.unwrap();
                    }
                    Ok(DragOutcome::Unchanged | DragOutcome::Ignored) => {}
                }
            }

            session.store().fail_writes(false);
            session.reconcile().await.unwrap();
            prop_assert!(assignments_match(&session).await);
            Ok(())
        })?;
    }

    /// Re-hovering the current column is a no-op.
    #[test]
    fn hover_is_idempotent(task in 0..TASKS, column in 0..3_usize) {
        runtime().block_on(async {
            let (session, tasks, columns) = seeded_session().await;
            session.begin_drag(&tasks[task]).unwrap();
            let target = DropTarget::Column(columns[column].clone());

            session.drag_over(&target);
            let settled = session.snapshot();
            prop_assert!(!session.drag_over(&target));
            prop_assert_eq!(session.snapshot(), settled);
            Ok(())
        })?;
    }
}
