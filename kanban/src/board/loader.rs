//! Fetching a whole board from the store.

use kanban_proto::model::{BoardId, Column, Subtask, Task};
use kanban_proto::wire::ListQuery;

use crate::store::{RemoteStore, StoreError};

/// All rows of one board, as returned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardSnapshot {
    /// Columns by position.
    pub columns: Vec<Column>,
    /// Tasks by position, tags decoded.
    pub tasks: Vec<Task>,
    /// Subtasks by position.
    pub subtasks: Vec<Subtask>,
}

/// Reads columns, tasks and subtasks of `board_id` concurrently.
///
/// Stored tag strings are decoded on the way in; a malformed tag string
/// yields an empty tag set rather than an error.
///
/// # Errors
///
/// Returns the first [`StoreError`] among the three reads.
pub async fn fetch_board<S: RemoteStore>(
    store: &S,
    board_id: &BoardId,
) -> Result<BoardSnapshot, StoreError> {
    let (columns, records, subtasks) = tokio::try_join!(
        store.list_columns(ListQuery::board(board_id.clone())),
        store.list_tasks(ListQuery::board(board_id.clone())),
        store.list_subtasks(ListQuery::board(board_id.clone())),
    )?;
    Ok(BoardSnapshot {
        columns,
        tasks: records.into_iter().map(Task::from).collect(),
        subtasks,
    })
}
