//! Store wire protocol.
//!
//! Clients and the hosted store exchange postcard-encoded [`StoreMessage`]s
//! over WebSocket binary frames. Every [`StoreMessage::Request`] carries a
//! client-chosen id that the server echoes in the matching
//! [`StoreMessage::Reply`], so several requests may be in flight on one
//! connection.

use serde::{Deserialize, Serialize};

use crate::model::{
    Board, BoardId, BoardPatch, Column, ColumnId, ColumnPatch, Subtask, SubtaskId, SubtaskPatch,
    TaskId, TaskPatch, TaskRecord, User, UserId,
};

/// Which rows a list operation selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Rows belonging to a board (for subtasks: via their parent task).
    Board(BoardId),
    /// Boards owned by (or shared with) a user.
    Owner(UserId),
    /// Subtasks of one task.
    Task(TaskId),
}

/// Sort order of a list operation. Sorts are stable: ties keep creation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBy {
    /// Ascending `position` (boards have none and keep creation order).
    #[default]
    Position,
    /// Creation order.
    CreatedAt,
    /// Ascending name / title, case-insensitive.
    Name,
}

/// A filtered, ordered list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Row selection.
    pub filter: Filter,
    /// Sort order.
    pub order: OrderBy,
}

impl ListQuery {
    /// All rows of a board, by position.
    #[must_use]
    pub const fn board(board_id: BoardId) -> Self {
        Self {
            filter: Filter::Board(board_id),
            order: OrderBy::Position,
        }
    }

    /// Boards visible to a user, in creation order.
    #[must_use]
    pub const fn owner(user_id: UserId) -> Self {
        Self {
            filter: Filter::Owner(user_id),
            order: OrderBy::CreatedAt,
        }
    }

    /// Subtasks of one task, by position.
    #[must_use]
    pub const fn task(task_id: TaskId) -> Self {
        Self {
            filter: Filter::Task(task_id),
            order: OrderBy::Position,
        }
    }
}

/// An operation against the hosted store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreOp {
    /// Authenticate; the first contact provisions the user and a default board.
    SignIn {
        /// Sign-in email.
        email: String,
        /// Optional display name.
        display_name: Option<String>,
    },
    /// End the authenticated session.
    SignOut,
    /// List boards.
    ListBoards(ListQuery),
    /// Create a board (owner is forced to the signed-in user).
    CreateBoard(Board),
    /// Update a board.
    UpdateBoard {
        /// Target board.
        id: BoardId,
        /// Fields to change.
        patch: BoardPatch,
    },
    /// List columns.
    ListColumns(ListQuery),
    /// Create a column.
    CreateColumn(Column),
    /// Update a column.
    UpdateColumn {
        /// Target column.
        id: ColumnId,
        /// Fields to change.
        patch: ColumnPatch,
    },
    /// Delete a column together with its tasks and their subtasks.
    DeleteColumn {
        /// Target column.
        id: ColumnId,
    },
    /// List tasks.
    ListTasks(ListQuery),
    /// Create a task (owner is forced to the signed-in user).
    CreateTask(TaskRecord),
    /// Update a task.
    UpdateTask {
        /// Target task.
        id: TaskId,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Delete a task together with its subtasks.
    DeleteTask {
        /// Target task.
        id: TaskId,
    },
    /// List subtasks.
    ListSubtasks(ListQuery),
    /// Create a subtask.
    CreateSubtask(Subtask),
    /// Update a subtask.
    UpdateSubtask {
        /// Target subtask.
        id: SubtaskId,
        /// Fields to change.
        patch: SubtaskPatch,
    },
    /// Delete a subtask.
    DeleteSubtask {
        /// Target subtask.
        id: SubtaskId,
    },
}

impl StoreOp {
    /// Short operation name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SignIn { .. } => "sign_in",
            Self::SignOut => "sign_out",
            Self::ListBoards(_) => "list_boards",
            Self::CreateBoard(_) => "create_board",
            Self::UpdateBoard { .. } => "update_board",
            Self::ListColumns(_) => "list_columns",
            Self::CreateColumn(_) => "create_column",
            Self::UpdateColumn { .. } => "update_column",
            Self::DeleteColumn { .. } => "delete_column",
            Self::ListTasks(_) => "list_tasks",
            Self::CreateTask(_) => "create_task",
            Self::UpdateTask { .. } => "update_task",
            Self::DeleteTask { .. } => "delete_task",
            Self::ListSubtasks(_) => "list_subtasks",
            Self::CreateSubtask(_) => "create_subtask",
            Self::UpdateSubtask { .. } => "update_subtask",
            Self::DeleteSubtask { .. } => "delete_subtask",
        }
    }

    /// Returns `true` for operations that only read.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(
            self,
            Self::ListBoards(_) | Self::ListColumns(_) | Self::ListTasks(_) | Self::ListSubtasks(_)
        )
    }
}

/// Successful result of a [`StoreOp`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreValue {
    /// The signed-in user.
    User(User),
    /// Rows of a board list.
    Boards(Vec<Board>),
    /// Rows of a column list.
    Columns(Vec<Column>),
    /// Rows of a task list.
    Tasks(Vec<TaskRecord>),
    /// Rows of a subtask list.
    Subtasks(Vec<Subtask>),
    /// A write completed.
    Done,
}

/// Store-level failure of a [`StoreOp`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreFault {
    /// The referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Not signed in, or the row belongs to someone else.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The operation would violate a data-model invariant.
    #[error("invalid: {0}")]
    Invalid(String),
    /// The store cannot serve requests right now.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Messages exchanged between store clients and the hosted store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreMessage {
    /// Client request.
    Request {
        /// Correlation id chosen by the client.
        id: u64,
        /// The operation.
        op: StoreOp,
    },
    /// Server reply to the request with the same id.
    Reply {
        /// Correlation id of the request.
        id: u64,
        /// Outcome of the operation.
        result: Result<StoreValue, StoreFault>,
    },
    /// Connection-level error not tied to a request (undecodable frame).
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a [`StoreMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the message cannot be serialized.
pub fn encode(msg: &StoreMessage) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`StoreMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes cannot be deserialized.
pub fn decode(bytes: &[u8]) -> Result<StoreMessage, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Reads the id of a [`StoreMessage::Request`] from the head of a frame
/// without decoding its operation.
///
/// Returns `None` if the frame does not start with a request header.
#[must_use]
pub fn peek_request_id(bytes: &[u8]) -> Option<u64> {
    // Variant index, then the first field. `Request` is variant 0.
    match postcard::take_from_bytes::<(u32, u64)>(bytes) {
        Ok(((0, id), _rest)) => Some(id),
        _ => None,
    }
}
