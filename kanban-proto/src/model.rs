//! Entity types for boards, columns, tasks and subtasks.
//!
//! Identifiers are opaque strings. Freshly minted identifiers are UUID v7
//! strings so they sort by creation time, but any string (e.g. `"col_todo"`)
//! is a valid identifier.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tags;

/// Maximum allowed title length in characters (boards, columns, tasks, subtasks).
pub const MAX_TITLE_LENGTH: usize = 256;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Mints a new time-ordered identifier (UUID v7).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifies a signed-in user.
    UserId
);
string_id!(
    /// Identifies a board.
    BoardId
);
string_id!(
    /// Identifies a column within a board.
    ColumnId
);
string_id!(
    /// Identifies a task.
    TaskId
);
string_id!(
    /// Identifies a subtask (checklist item) of a task.
    SubtaskId
);

/// Millisecond-precision UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Creates a timestamp from milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// An authenticated user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier.
    pub id: UserId,
    /// Sign-in email address.
    pub email: String,
    /// Optional human-readable name.
    pub display_name: Option<String>,
}

impl User {
    /// Name to show for this user: the display name if set, else the email.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Top-level task collection owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Board identifier.
    pub id: BoardId,
    /// Board name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Owning user.
    pub owner_id: UserId,
    /// Whether other users may read and edit this board.
    pub is_shared: bool,
    /// Archived boards are hidden from the default board picker.
    pub is_archived: bool,
}

/// Ordered bucket of tasks within a board (e.g. "To Do").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column identifier.
    pub id: ColumnId,
    /// Display name.
    pub name: String,
    /// Board this column belongs to.
    pub board_id: BoardId,
    /// Relative sort key among the board's columns.
    pub position: u32,
    /// Display color (free-form, e.g. `"#3b82f6"` or `"blue"`).
    pub color: String,
}

/// A unit of work, in its in-memory form with decoded tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// Short title.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Column currently holding the task.
    pub column_id: ColumnId,
    /// Board the task belongs to (denormalized from the column).
    pub board_id: BoardId,
    /// User who created the task.
    pub owner_id: UserId,
    /// Relative sort key within the column.
    pub position: u32,
    /// Optional due date.
    pub due_date: Option<Timestamp>,
    /// Whether the task is done.
    pub completed: bool,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time, never earlier than `created_at`.
    pub updated_at: Timestamp,
}

/// A task in its storage form: tags travel as an encoded string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task identifier.
    pub id: TaskId,
    /// Short title.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Column currently holding the task.
    pub column_id: ColumnId,
    /// Board the task belongs to.
    pub board_id: BoardId,
    /// User who created the task.
    pub owner_id: UserId,
    /// Relative sort key within the column.
    pub position: u32,
    /// Optional due date.
    pub due_date: Option<Timestamp>,
    /// Whether the task is done.
    pub completed: bool,
    /// Encoded tag list, see [`crate::tags`].
    pub tags: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            column_id: task.column_id.clone(),
            board_id: task.board_id.clone(),
            owner_id: task.owner_id.clone(),
            position: task.position,
            due_date: task.due_date,
            completed: task.completed,
            tags: (!task.tags.is_empty()).then(|| tags::encode(&task.tags)),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        let tags = tags::decode(record.tags.as_deref());
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            column_id: record.column_id,
            board_id: record.board_id,
            owner_id: record.owner_id,
            position: record.position,
            due_date: record.due_date,
            completed: record.completed,
            tags,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// A checklist item belonging to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Subtask identifier.
    pub id: SubtaskId,
    /// Checklist text.
    pub title: String,
    /// Parent task.
    pub task_id: TaskId,
    /// Whether the item is checked.
    pub completed: bool,
    /// Relative sort key within the parent task.
    pub position: u32,
}

/// Partial update of a board; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPatch {
    /// New name.
    pub name: Option<String>,
    /// New description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
    /// New sharing flag.
    pub is_shared: Option<bool>,
    /// New archive flag.
    pub is_archived: Option<bool>,
}

/// Partial update of a column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPatch {
    /// New name.
    pub name: Option<String>,
    /// New position.
    pub position: Option<u32>,
    /// New color.
    pub color: Option<String>,
}

/// Partial update of a task.
///
/// `updated_at` is always carried: every mutation refreshes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
    /// Move to another column of the same board.
    pub column_id: Option<ColumnId>,
    /// New position within the (new) column.
    pub position: Option<u32>,
    /// New due date (`Some(None)` clears it).
    pub due_date: Option<Option<Timestamp>>,
    /// New completion flag.
    pub completed: Option<bool>,
    /// New encoded tag list.
    pub tags: Option<String>,
    /// Modification time of this patch.
    pub updated_at: Timestamp,
}

impl TaskPatch {
    /// An empty patch stamped with the given modification time.
    #[must_use]
    pub const fn at(updated_at: Timestamp) -> Self {
        Self {
            title: None,
            description: None,
            column_id: None,
            position: None,
            due_date: None,
            completed: None,
            tags: None,
            updated_at,
        }
    }

    /// An empty patch stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Timestamp::now())
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets or clears the description.
    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Moves the task to another column.
    #[must_use]
    pub fn column(mut self, column_id: ColumnId) -> Self {
        self.column_id = Some(column_id);
        self
    }

    /// Sets the position.
    #[must_use]
    pub const fn position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets or clears the due date.
    #[must_use]
    pub const fn due_date(mut self, due_date: Option<Timestamp>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets the completion flag.
    #[must_use]
    pub const fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Replaces the tag set (encoded for storage).
    #[must_use]
    pub fn tags(mut self, tags: &BTreeSet<String>) -> Self {
        self.tags = Some(tags::encode(tags));
        self
    }

    /// Returns `true` if the patch changes nothing but the timestamp.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.column_id.is_none()
            && self.position.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
            && self.tags.is_none()
    }
}

/// Partial update of a subtask.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New completion flag.
    pub completed: Option<bool>,
    /// New position.
    pub position: Option<u32>,
}

/// Error returned when a title fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TitleError {
    /// Title is empty or whitespace only.
    #[error("title cannot be empty")]
    Empty,
    /// Title exceeds [`MAX_TITLE_LENGTH`] characters.
    #[error("title too long (max {MAX_TITLE_LENGTH} characters)")]
    TooLong,
}

/// Validates a title for any entity, returning it trimmed.
///
/// # Errors
///
/// Returns [`TitleError::Empty`] for blank titles and
/// [`TitleError::TooLong`] for titles over [`MAX_TITLE_LENGTH`] characters.
pub fn validate_title(title: &str) -> Result<&str, TitleError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TitleError::Empty);
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(TitleError::TooLong);
    }
    Ok(trimmed)
}
