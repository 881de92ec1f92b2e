//! Remote store abstraction.
//!
//! Defines the [`RemoteStore`] trait that the board session reads from and
//! writes to, and the [`AuthBackend`] trait used by the auth provider.
//! Concrete implementations:
//! - [`memory::InMemoryStore`]: in-process store for tests and offline use
//! - [`remote::WsStore`]: WebSocket client of the hosted `kanban-store`

pub mod memory;
pub mod remote;

use std::future::Future;
use std::sync::Arc;

use kanban_proto::model::{
    Board, BoardId, BoardPatch, Column, ColumnId, ColumnPatch, Subtask, SubtaskId, SubtaskPatch,
    TaskId, TaskPatch, TaskRecord, User,
};
use kanban_proto::wire::{CodecError, ListQuery, StoreFault, StoreOp, StoreValue};

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached or the connection was lost.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Not signed in, or the row belongs to someone else.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The store refused the operation as invalid.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Connecting to the store timed out.
    #[error("store connection timed out")]
    Timeout,

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The store answered with a value of the wrong shape.
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

impl From<StoreFault> for StoreError {
    fn from(fault: StoreFault) -> Self {
        match fault {
            StoreFault::NotFound(what) => Self::NotFound(what),
            StoreFault::Forbidden(what) => Self::Forbidden(what),
            StoreFault::Invalid(what) => Self::Invalid(what),
            StoreFault::Unavailable(what) => Self::Unavailable(what),
        }
    }
}

impl From<CodecError> for StoreError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Async access to board data.
///
/// Implementors provide [`RemoteStore::execute`]; the typed helpers map
/// each operation's [`StoreValue`] to concrete rows. All writes are
/// independent; there are no transactions.
pub trait RemoteStore: Send + Sync {
    /// Executes one store operation.
    fn execute(&self, op: StoreOp) -> impl Future<Output = Result<StoreValue, StoreError>> + Send;

    /// Lists boards matching `query`.
    fn list_boards(
        &self,
        query: ListQuery,
    ) -> impl Future<Output = Result<Vec<Board>, StoreError>> + Send {
        async move {
            match self.execute(StoreOp::ListBoards(query)).await? {
                StoreValue::Boards(rows) => Ok(rows),
                _ => Err(StoreError::UnexpectedReply("list_boards")),
            }
        }
    }

    /// Creates a board.
    fn create_board(&self, board: Board) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::CreateBoard(board))
    }

    /// Updates a board.
    fn update_board(
        &self,
        id: BoardId,
        patch: BoardPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::UpdateBoard { id, patch })
    }

    /// Lists columns matching `query`.
    fn list_columns(
        &self,
        query: ListQuery,
    ) -> impl Future<Output = Result<Vec<Column>, StoreError>> + Send {
        async move {
            match self.execute(StoreOp::ListColumns(query)).await? {
                StoreValue::Columns(rows) => Ok(rows),
                _ => Err(StoreError::UnexpectedReply("list_columns")),
            }
        }
    }

    /// Creates a column.
    fn create_column(&self, column: Column) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::CreateColumn(column))
    }

    /// Updates a column.
    fn update_column(
        &self,
        id: ColumnId,
        patch: ColumnPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::UpdateColumn { id, patch })
    }

    /// Deletes a column with its tasks and their subtasks.
    fn delete_column(&self, id: ColumnId) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::DeleteColumn { id })
    }

    /// Lists stored task records matching `query`.
    fn list_tasks(
        &self,
        query: ListQuery,
    ) -> impl Future<Output = Result<Vec<TaskRecord>, StoreError>> + Send {
        async move {
            match self.execute(StoreOp::ListTasks(query)).await? {
                StoreValue::Tasks(rows) => Ok(rows),
                _ => Err(StoreError::UnexpectedReply("list_tasks")),
            }
        }
    }

    /// Creates a task.
    fn create_task(&self, record: TaskRecord) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::CreateTask(record))
    }

    /// Updates a task.
    fn update_task(
        &self,
        id: TaskId,
        patch: TaskPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::UpdateTask { id, patch })
    }

    /// Deletes a task with its subtasks.
    fn delete_task(&self, id: TaskId) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::DeleteTask { id })
    }

    /// Lists subtasks matching `query`.
    fn list_subtasks(
        &self,
        query: ListQuery,
    ) -> impl Future<Output = Result<Vec<Subtask>, StoreError>> + Send {
        async move {
            match self.execute(StoreOp::ListSubtasks(query)).await? {
                StoreValue::Subtasks(rows) => Ok(rows),
                _ => Err(StoreError::UnexpectedReply("list_subtasks")),
            }
        }
    }

    /// Creates a subtask.
    fn create_subtask(&self, subtask: Subtask) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::CreateSubtask(subtask))
    }

    /// Updates a subtask.
    fn update_subtask(
        &self,
        id: SubtaskId,
        patch: SubtaskPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::UpdateSubtask { id, patch })
    }

    /// Deletes a subtask.
    fn delete_subtask(&self, id: SubtaskId) -> impl Future<Output = Result<(), StoreError>> + Send {
        write(self, StoreOp::DeleteSubtask { id })
    }
}

/// Sign-in and sign-out against a store.
pub trait AuthBackend: Send + Sync {
    /// Authenticates by email and returns the signed-in user.
    fn sign_in(
        &self,
        email: &str,
        display_name: Option<String>,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Ends the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Executes a write and checks that it acknowledged with [`StoreValue::Done`].
async fn write<S: RemoteStore + ?Sized>(store: &S, op: StoreOp) -> Result<(), StoreError> {
    let name = op.name();
    match store.execute(op).await? {
        StoreValue::Done => Ok(()),
        _ => Err(StoreError::UnexpectedReply(name)),
    }
}

/// Signs in through a store that speaks the session operations.
async fn sign_in_with<S: RemoteStore + ?Sized>(
    store: &S,
    email: &str,
    display_name: Option<String>,
) -> Result<User, StoreError> {
    let op = StoreOp::SignIn {
        email: email.to_string(),
        display_name,
    };
    match store.execute(op).await? {
        StoreValue::User(user) => Ok(user),
        _ => Err(StoreError::UnexpectedReply("sign_in")),
    }
}

impl<S: RemoteStore> RemoteStore for Arc<S> {
    fn execute(&self, op: StoreOp) -> impl Future<Output = Result<StoreValue, StoreError>> + Send {
        S::execute(self, op)
    }
}

impl<B: AuthBackend> AuthBackend for Arc<B> {
    fn sign_in(
        &self,
        email: &str,
        display_name: Option<String>,
    ) -> impl Future<Output = Result<User, StoreError>> + Send {
        B::sign_in(self, email, display_name)
    }

    fn sign_out(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        B::sign_out(self)
    }
}
