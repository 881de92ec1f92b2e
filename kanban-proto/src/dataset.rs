//! Reference semantics of the store contract.
//!
//! [`Dataset`] is a plain in-memory table set that executes [`StoreOp`]s on
//! behalf of a signed-in [`User`]. The hosted store serves it over the wire
//! and clients embed it for offline use and tests, so both agree on
//! validation, ownership, cascades and ordering.
//!
//! Rows are kept in insertion order, which doubles as creation order for
//! tie-breaking stable sorts.

use crate::model::{
    Board, BoardId, BoardPatch, Column, ColumnId, ColumnPatch, Subtask, SubtaskId, SubtaskPatch,
    TaskId, TaskPatch, TaskRecord, User, UserId, validate_title,
};
use crate::wire::{Filter, ListQuery, OrderBy, StoreFault, StoreOp, StoreValue};

/// What a user's first sign-in creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioning {
    /// Name of the default board.
    pub board_name: String,
    /// `(name, color)` of the default board's columns, left to right.
    pub columns: Vec<(String, String)>,
}

impl Default for Provisioning {
    fn default() -> Self {
        Self {
            board_name: "My Board".to_string(),
            columns: vec![
                ("To Do".to_string(), "#94a3b8".to_string()),
                ("In Progress".to_string(), "#3b82f6".to_string()),
                ("Done".to_string(), "#22c55e".to_string()),
            ],
        }
    }
}

/// In-memory tables for users, boards, columns, tasks and subtasks.
#[derive(Debug, Default)]
pub struct Dataset {
    users: Vec<User>,
    boards: Vec<Board>,
    columns: Vec<Column>,
    tasks: Vec<TaskRecord>,
    subtasks: Vec<Subtask>,
    provisioning: Provisioning,
}

impl Dataset {
    /// Creates an empty dataset with the default provisioning template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty dataset that provisions new users from `provisioning`.
    #[must_use]
    pub fn with_provisioning(provisioning: Provisioning) -> Self {
        Self {
            provisioning,
            ..Self::default()
        }
    }

    /// Signs a user in by email, creating the user and a default board on
    /// first contact. A supplied display name replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreFault::Invalid`] for a blank email.
    pub fn sign_in(
        &mut self,
        email: &str,
        display_name: Option<String>,
    ) -> Result<User, StoreFault> {
        let email = email.trim();
        if email.is_empty() {
            return Err(StoreFault::Invalid("email cannot be empty".to_string()));
        }

        if let Some(user) = self
            .users
            .iter_mut()
            .find(|u| u.email.eq_ignore_ascii_case(email))
        {
            if display_name.is_some() {
                user.display_name = display_name;
            }
            return Ok(user.clone());
        }

        let user = User {
            id: UserId::new(),
            email: email.to_string(),
            display_name,
        };
        self.users.push(user.clone());
        self.provision(&user);
        Ok(user)
    }

    /// Creates the default board and columns for a new user.
    fn provision(&mut self, user: &User) {
        let board = Board {
            id: BoardId::new(),
            name: self.provisioning.board_name.clone(),
            description: None,
            owner_id: user.id.clone(),
            is_shared: false,
            is_archived: false,
        };
        let columns = self
            .provisioning
            .columns
            .iter()
            .zip(0u32..)
            .map(|((name, color), position)| Column {
                id: ColumnId::new(),
                name: name.clone(),
                board_id: board.id.clone(),
                position,
                color: color.clone(),
            });
        self.columns.extend(columns);
        self.boards.push(board);
    }

    /// Executes a data operation on behalf of `user`.
    ///
    /// Session operations ([`StoreOp::SignIn`], [`StoreOp::SignOut`]) belong
    /// to the connection, not the dataset, and are rejected here.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreFault`] describing why the operation was refused.
    pub fn execute(&mut self, user: &User, op: StoreOp) -> Result<StoreValue, StoreFault> {
        match op {
            StoreOp::CreateBoard(board) => self.create_board(user, board),
            StoreOp::UpdateBoard { id, patch } => self.update_board(user, &id, patch),
            StoreOp::CreateColumn(column) => self.create_column(user, column),
            StoreOp::UpdateColumn { id, patch } => self.update_column(user, &id, patch),
            StoreOp::DeleteColumn { id } => self.delete_column(user, &id),
            StoreOp::CreateTask(record) => self.create_task(user, record),
            StoreOp::UpdateTask { id, patch } => self.update_task(user, &id, patch),
            StoreOp::DeleteTask { id } => self.delete_task(user, &id),
            StoreOp::CreateSubtask(subtask) => self.create_subtask(user, subtask),
            StoreOp::UpdateSubtask { id, patch } => self.update_subtask(user, &id, patch),
            StoreOp::DeleteSubtask { id } => self.delete_subtask(user, &id),
            op => self.query(user, &op),
        }
    }

    /// Executes a read-only operation on behalf of `user`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreFault::Invalid`] for operations that write, and the
    /// access faults of [`Dataset::execute`] otherwise.
    pub fn query(&self, user: &User, op: &StoreOp) -> Result<StoreValue, StoreFault> {
        match op {
            StoreOp::ListBoards(query) => self.list_boards(user, query).map(StoreValue::Boards),
            StoreOp::ListColumns(query) => {
                self.list_columns(user, query).map(StoreValue::Columns)
            }
            StoreOp::ListTasks(query) => self.list_tasks(user, query).map(StoreValue::Tasks),
            StoreOp::ListSubtasks(query) => {
                self.list_subtasks(user, query).map(StoreValue::Subtasks)
            }
            StoreOp::SignIn { .. } | StoreOp::SignOut => Err(StoreFault::Invalid(
                "session operations are handled by the connection".to_string(),
            )),
            other => Err(StoreFault::Invalid(format!(
                "{} is not a read operation",
                other.name()
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Access checks
    // -----------------------------------------------------------------------

    fn board_access(&self, user: &User, board_id: &BoardId) -> Result<&Board, StoreFault> {
        let board = self
            .boards
            .iter()
            .find(|b| b.id == *board_id)
            .ok_or_else(|| StoreFault::NotFound(format!("board {board_id}")))?;
        if board.owner_id != user.id && !board.is_shared {
            return Err(StoreFault::Forbidden(format!("board {board_id}")));
        }
        Ok(board)
    }

    fn column_access(&self, user: &User, column_id: &ColumnId) -> Result<&Column, StoreFault> {
        let column = self
            .columns
            .iter()
            .find(|c| c.id == *column_id)
            .ok_or_else(|| StoreFault::NotFound(format!("column {column_id}")))?;
        self.board_access(user, &column.board_id)?;
        Ok(column)
    }

    fn task_access(&self, user: &User, task_id: &TaskId) -> Result<&TaskRecord, StoreFault> {
        let task = self
            .tasks
            .iter()
            .find(|t| t.id == *task_id)
            .ok_or_else(|| StoreFault::NotFound(format!("task {task_id}")))?;
        self.board_access(user, &task.board_id)?;
        Ok(task)
    }

    fn subtask_access(
        &self,
        user: &User,
        subtask_id: &SubtaskId,
    ) -> Result<&Subtask, StoreFault> {
        let subtask = self
            .subtasks
            .iter()
            .find(|s| s.id == *subtask_id)
            .ok_or_else(|| StoreFault::NotFound(format!("subtask {subtask_id}")))?;
        self.task_access(user, &subtask.task_id)?;
        Ok(subtask)
    }

    // -----------------------------------------------------------------------
    // Boards
    // -----------------------------------------------------------------------

    fn list_boards(&self, user: &User, query: &ListQuery) -> Result<Vec<Board>, StoreFault> {
        let mut rows: Vec<Board> = match &query.filter {
            Filter::Owner(owner) => {
                if *owner != user.id {
                    return Err(StoreFault::Forbidden(format!("boards of {owner}")));
                }
                self.boards
                    .iter()
                    .filter(|b| b.owner_id == *owner || b.is_shared)
                    .cloned()
                    .collect()
            }
            Filter::Board(id) => vec![self.board_access(user, id)?.clone()],
            Filter::Task(_) => {
                return Err(StoreFault::Invalid("boards cannot be listed by task".to_string()));
            }
        };
        if query.order == OrderBy::Name {
            rows.sort_by_key(|b| b.name.to_lowercase());
        }
        Ok(rows)
    }

    fn create_board(&mut self, user: &User, mut board: Board) -> Result<StoreValue, StoreFault> {
        board.name = checked_title(&board.name)?;
        if self.boards.iter().any(|b| b.id == board.id) {
            return Err(StoreFault::Invalid(format!("board {} already exists", board.id)));
        }
        board.owner_id = user.id.clone();
        self.boards.push(board);
        Ok(StoreValue::Done)
    }

    fn update_board(
        &mut self,
        user: &User,
        id: &BoardId,
        patch: BoardPatch,
    ) -> Result<StoreValue, StoreFault> {
        self.board_access(user, id)?;
        let name = patch.name.as_deref().map(checked_title).transpose()?;
        let Some(board) = self.boards.iter_mut().find(|b| b.id == *id) else {
            return Err(StoreFault::NotFound(format!("board {id}")));
        };
        if let Some(name) = name {
            board.name = name;
        }
        if let Some(description) = patch.description {
            board.description = description;
        }
        if let Some(is_shared) = patch.is_shared {
            board.is_shared = is_shared;
        }
        if let Some(is_archived) = patch.is_archived {
            board.is_archived = is_archived;
        }
        Ok(StoreValue::Done)
    }

    // -----------------------------------------------------------------------
    // Columns
    // -----------------------------------------------------------------------

    fn list_columns(&self, user: &User, query: &ListQuery) -> Result<Vec<Column>, StoreFault> {
        let Filter::Board(board_id) = &query.filter else {
            return Err(StoreFault::Invalid("columns are listed by board".to_string()));
        };
        self.board_access(user, board_id)?;
        let mut rows: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| c.board_id == *board_id)
            .cloned()
            .collect();
        match query.order {
            OrderBy::Position => rows.sort_by_key(|c| c.position),
            OrderBy::Name => rows.sort_by_key(|c| c.name.to_lowercase()),
            OrderBy::CreatedAt => {}
        }
        Ok(rows)
    }

    fn create_column(&mut self, user: &User, mut column: Column) -> Result<StoreValue, StoreFault> {
        self.board_access(user, &column.board_id)?;
        column.name = checked_title(&column.name)?;
        if self.columns.iter().any(|c| c.id == column.id) {
            return Err(StoreFault::Invalid(format!("column {} already exists", column.id)));
        }
        self.columns.push(column);
        Ok(StoreValue::Done)
    }

    fn update_column(
        &mut self,
        user: &User,
        id: &ColumnId,
        patch: ColumnPatch,
    ) -> Result<StoreValue, StoreFault> {
        self.column_access(user, id)?;
        let name = patch.name.as_deref().map(checked_title).transpose()?;
        let Some(column) = self.columns.iter_mut().find(|c| c.id == *id) else {
            return Err(StoreFault::NotFound(format!("column {id}")));
        };
        if let Some(name) = name {
            column.name = name;
        }
        if let Some(position) = patch.position {
            column.position = position;
        }
        if let Some(color) = patch.color {
            column.color = color;
        }
        Ok(StoreValue::Done)
    }

    fn delete_column(&mut self, user: &User, id: &ColumnId) -> Result<StoreValue, StoreFault> {
        self.column_access(user, id)?;
        let doomed: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.column_id == *id)
            .map(|t| t.id.clone())
            .collect();
        self.subtasks.retain(|s| !doomed.contains(&s.task_id));
        self.tasks.retain(|t| t.column_id != *id);
        self.columns.retain(|c| c.id != *id);
        Ok(StoreValue::Done)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    fn list_tasks(&self, user: &User, query: &ListQuery) -> Result<Vec<TaskRecord>, StoreFault> {
        let Filter::Board(board_id) = &query.filter else {
            return Err(StoreFault::Invalid("tasks are listed by board".to_string()));
        };
        self.board_access(user, board_id)?;
        let mut rows: Vec<TaskRecord> = self
            .tasks
            .iter()
            .filter(|t| t.board_id == *board_id)
            .cloned()
            .collect();
        match query.order {
            OrderBy::Position => rows.sort_by_key(|t| t.position),
            OrderBy::Name => rows.sort_by_key(|t| t.title.to_lowercase()),
            OrderBy::CreatedAt => rows.sort_by_key(|t| t.created_at),
        }
        Ok(rows)
    }

    fn create_task(&mut self, user: &User, mut record: TaskRecord) -> Result<StoreValue, StoreFault> {
        self.board_access(user, &record.board_id)?;
        self.ensure_column_in_board(&record.column_id, &record.board_id)?;
        record.title = checked_title(&record.title)?;
        if self.tasks.iter().any(|t| t.id == record.id) {
            return Err(StoreFault::Invalid(format!("task {} already exists", record.id)));
        }
        record.owner_id = user.id.clone();
        record.updated_at = record.updated_at.max(record.created_at);
        self.tasks.push(record);
        Ok(StoreValue::Done)
    }

    fn update_task(
        &mut self,
        user: &User,
        id: &TaskId,
        patch: TaskPatch,
    ) -> Result<StoreValue, StoreFault> {
        let current = self.task_access(user, id)?;
        let board_id = current.board_id.clone();
        let moving_to = patch
            .column_id
            .as_ref()
            .filter(|c| **c != current.column_id)
            .cloned();
        if let Some(column_id) = &patch.column_id {
            self.ensure_column_in_board(column_id, &board_id)?;
        }
        let title = patch.title.as_deref().map(checked_title).transpose()?;

        // A task entering a column without an explicit position goes last.
        let appended_position = match (&moving_to, patch.position) {
            (Some(column_id), None) => Some(self.next_task_position(column_id)),
            _ => None,
        };

        let Some(task) = self.tasks.iter_mut().find(|t| t.id == *id) else {
            return Err(StoreFault::NotFound(format!("task {id}")));
        };
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(column_id) = patch.column_id {
            task.column_id = column_id;
        }
        if let Some(position) = patch.position.or(appended_position) {
            task.position = position;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        if let Some(tags) = patch.tags {
            task.tags = Some(tags);
        }
        task.updated_at = patch.updated_at.max(task.created_at);
        Ok(StoreValue::Done)
    }

    fn delete_task(&mut self, user: &User, id: &TaskId) -> Result<StoreValue, StoreFault> {
        self.task_access(user, id)?;
        self.subtasks.retain(|s| s.task_id != *id);
        self.tasks.retain(|t| t.id != *id);
        Ok(StoreValue::Done)
    }

    fn ensure_column_in_board(
        &self,
        column_id: &ColumnId,
        board_id: &BoardId,
    ) -> Result<(), StoreFault> {
        match self.columns.iter().find(|c| c.id == *column_id) {
            Some(column) if column.board_id == *board_id => Ok(()),
            Some(_) => Err(StoreFault::Invalid(format!(
                "column {column_id} does not belong to board {board_id}"
            ))),
            None => Err(StoreFault::NotFound(format!("column {column_id}"))),
        }
    }

    fn next_task_position(&self, column_id: &ColumnId) -> u32 {
        self.tasks
            .iter()
            .filter(|t| t.column_id == *column_id)
            .map(|t| t.position.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Subtasks
    // -----------------------------------------------------------------------

    fn list_subtasks(&self, user: &User, query: &ListQuery) -> Result<Vec<Subtask>, StoreFault> {
        let mut rows: Vec<Subtask> = match &query.filter {
            Filter::Board(board_id) => {
                self.board_access(user, board_id)?;
                let task_ids: Vec<&TaskId> = self
                    .tasks
                    .iter()
                    .filter(|t| t.board_id == *board_id)
                    .map(|t| &t.id)
                    .collect();
                self.subtasks
                    .iter()
                    .filter(|s| task_ids.contains(&&s.task_id))
                    .cloned()
                    .collect()
            }
            Filter::Task(task_id) => {
                self.task_access(user, task_id)?;
                self.subtasks
                    .iter()
                    .filter(|s| s.task_id == *task_id)
                    .cloned()
                    .collect()
            }
            Filter::Owner(_) => {
                return Err(StoreFault::Invalid(
                    "subtasks cannot be listed by owner".to_string(),
                ));
            }
        };
        match query.order {
            OrderBy::Position => rows.sort_by_key(|s| s.position),
            OrderBy::Name => rows.sort_by_key(|s| s.title.to_lowercase()),
            OrderBy::CreatedAt => {}
        }
        Ok(rows)
    }

    fn create_subtask(
        &mut self,
        user: &User,
        mut subtask: Subtask,
    ) -> Result<StoreValue, StoreFault> {
        self.task_access(user, &subtask.task_id)?;
        subtask.title = checked_title(&subtask.title)?;
        if self.subtasks.iter().any(|s| s.id == subtask.id) {
            return Err(StoreFault::Invalid(format!(
                "subtask {} already exists",
                subtask.id
            )));
        }
        self.subtasks.push(subtask);
        Ok(StoreValue::Done)
    }

    fn update_subtask(
        &mut self,
        user: &User,
        id: &SubtaskId,
        patch: SubtaskPatch,
    ) -> Result<StoreValue, StoreFault> {
        self.subtask_access(user, id)?;
        let title = patch.title.as_deref().map(checked_title).transpose()?;
        let Some(subtask) = self.subtasks.iter_mut().find(|s| s.id == *id) else {
            return Err(StoreFault::NotFound(format!("subtask {id}")));
        };
        if let Some(title) = title {
            subtask.title = title;
        }
        if let Some(completed) = patch.completed {
            subtask.completed = completed;
        }
        if let Some(position) = patch.position {
            subtask.position = position;
        }
        Ok(StoreValue::Done)
    }

    fn delete_subtask(&mut self, user: &User, id: &SubtaskId) -> Result<StoreValue, StoreFault> {
        self.subtask_access(user, id)?;
        self.subtasks.retain(|s| s.id != *id);
        Ok(StoreValue::Done)
    }
}

fn checked_title(title: &str) -> Result<String, StoreFault> {
    validate_title(title)
        .map(ToString::to_string)
        .map_err(|e| StoreFault::Invalid(e.to_string()))
}
