//! Task, subtask, column and board mutations.
//!
//! Every mutation validates against the cache, writes to the store and, on
//! success, reconciles the board and sends a success notification. On
//! failure an error notification is sent and the cache is left untouched;
//! nothing is applied optimistically here.

use std::collections::BTreeSet;

use kanban_proto::model::{
    Board, BoardId, BoardPatch, Column, ColumnId, Subtask, SubtaskId, SubtaskPatch, TaskId,
    TaskPatch, TaskRecord, Timestamp, validate_title,
};
use kanban_proto::wire::ListQuery;

use super::{BoardError, BoardSession};
use crate::store::{RemoteStore, StoreError};

/// Default color of columns created without one.
const DEFAULT_COLUMN_COLOR: &str = "#94a3b8";

/// Fields of a task to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    /// Target column; the first column when `None`.
    pub column_id: Option<ColumnId>,
    pub due_date: Option<Timestamp>,
    pub tags: BTreeSet<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl<S: RemoteStore> BoardSession<S> {
    /// Creates a task at the end of its column.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`BoardError::ColumnNotFound`] or the
    /// store error.
    pub async fn create_task(&self, new: NewTask) -> Result<TaskId, BoardError> {
        let board_id = self.selected_board_id().map_err(|e| self.reject(e))?;
        let title = validate_title(&new.title).map_err(|e| self.reject(e))?;

        let placement = self.with_cache(|c| {
            let column = match &new.column_id {
                Some(id) => c.column(id),
                None => c.columns().into_iter().next(),
            }?;
            Some((column.id.clone(), c.next_task_position(&column.id)))
        });
        let Some((column_id, position)) = placement else {
            let wanted = new.column_id.map_or_else(|| "(none)".to_string(), |c| c.to_string());
            return Err(self.reject(BoardError::ColumnNotFound(wanted)));
        };

        let now = Timestamp::now();
        let record = TaskRecord {
            id: TaskId::new(),
            title: title.to_string(),
            description: new.description.filter(|d| !d.trim().is_empty()),
            column_id,
            board_id,
            owner_id: self.user.id.clone(),
            position,
            due_date: new.due_date,
            completed: false,
            tags: (!new.tags.is_empty()).then(|| kanban_proto::tags::encode(&new.tags)),
            created_at: now,
            updated_at: now,
        };
        let id = record.id.clone();
        self.commit(
            self.store.create_task(record),
            "Task created",
            "Failed to create task",
        )
        .await?;
        tracing::info!(task_id = %id, "task created");
        Ok(id)
    }

    /// Applies `patch` to a task. `updated_at` is set to now.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`BoardError::TaskNotFound`],
    /// [`BoardError::ColumnNotFound`] or the store error.
    pub async fn update_task(&self, task_id: &TaskId, patch: TaskPatch) -> Result<(), BoardError> {
        self.ensure_task(task_id)?;
        let mut patch = TaskPatch {
            updated_at: Timestamp::now(),
            ..patch
        };
        if let Some(title) = &patch.title {
            let title = validate_title(title).map_err(|e| self.reject(e))?;
            patch.title = Some(title.to_string());
        }
        if let Some(column_id) = &patch.column_id
            && self.with_cache(|c| c.column(column_id).is_none())
        {
            return Err(self.reject(BoardError::ColumnNotFound(column_id.to_string())));
        }

        self.commit(
            self.store.update_task(task_id.clone(), patch),
            "Task updated",
            "Failed to update task",
        )
        .await
    }

    /// Sets a task's completion flag.
    ///
    /// # Errors
    ///
    /// See [`BoardSession::update_task`].
    pub async fn set_task_completed(&self, task_id: &TaskId, completed: bool) -> Result<(), BoardError> {
        self.update_task(task_id, TaskPatch::now().completed(completed))
            .await
    }

    /// Deletes a task and its subtasks.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TaskNotFound`] or the store error.
    pub async fn delete_task(&self, task_id: &TaskId) -> Result<(), BoardError> {
        self.ensure_task(task_id)?;
        self.commit(
            self.store.delete_task(task_id.clone()),
            "Task deleted",
            "Failed to delete task",
        )
        .await
    }

    /// Flips a subtask's completion flag.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::SubtaskNotFound`] or the store error.
    pub async fn toggle_subtask(&self, subtask_id: &SubtaskId) -> Result<bool, BoardError> {
        let Some(completed) = self.with_cache(|c| c.subtask(subtask_id).map(|s| !s.completed))
        else {
            return Err(self.reject(BoardError::SubtaskNotFound(subtask_id.to_string())));
        };
        let patch = SubtaskPatch {
            completed: Some(completed),
            ..SubtaskPatch::default()
        };
        self.commit(
            self.store.update_subtask(subtask_id.clone(), patch),
            if completed { "Subtask completed" } else { "Subtask reopened" },
            "Failed to update subtask",
        )
        .await?;
        Ok(completed)
    }

    /// Appends a subtask to a task's checklist.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`BoardError::TaskNotFound`] or the
    /// store error.
    pub async fn create_subtask(&self, task_id: &TaskId, title: &str) -> Result<SubtaskId, BoardError> {
        self.ensure_task(task_id)?;
        let title = validate_title(title).map_err(|e| self.reject(e))?;
        let subtask = Subtask {
            id: SubtaskId::new(),
            title: title.to_string(),
            task_id: task_id.clone(),
            completed: false,
            position: self.with_cache(|c| c.next_subtask_position(task_id)),
        };
        let id = subtask.id.clone();
        self.commit(
            self.store.create_subtask(subtask),
            "Subtask added",
            "Failed to add subtask",
        )
        .await?;
        Ok(id)
    }

    /// Deletes a subtask.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::SubtaskNotFound`] or the store error.
    pub async fn delete_subtask(&self, subtask_id: &SubtaskId) -> Result<(), BoardError> {
        if self.with_cache(|c| c.subtask(subtask_id).is_none()) {
            return Err(self.reject(BoardError::SubtaskNotFound(subtask_id.to_string())));
        }
        self.commit(
            self.store.delete_subtask(subtask_id.clone()),
            "Subtask deleted",
            "Failed to delete subtask",
        )
        .await
    }

    /// Appends a column to the selected board.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`BoardError::NoBoardSelected`] or the
    /// store error.
    pub async fn create_column(&self, name: &str, color: Option<String>) -> Result<ColumnId, BoardError> {
        let board_id = self.selected_board_id().map_err(|e| self.reject(e))?;
        let name = validate_title(name).map_err(|e| self.reject(e))?;
        let column = Column {
            id: ColumnId::new(),
            name: name.to_string(),
            board_id,
            position: self.with_cache(super::cache::BoardStateCache::next_column_position),
            color: color.unwrap_or_else(|| DEFAULT_COLUMN_COLOR.to_string()),
        };
        let id = column.id.clone();
        self.commit(
            self.store.create_column(column),
            "Column added",
            "Failed to add column",
        )
        .await?;
        Ok(id)
    }

    /// Deletes a column with all its tasks.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::ColumnNotFound`] or the store error.
    pub async fn delete_column(&self, column_id: &ColumnId) -> Result<(), BoardError> {
        if self.with_cache(|c| c.column(column_id).is_none()) {
            return Err(self.reject(BoardError::ColumnNotFound(column_id.to_string())));
        }
        self.commit(
            self.store.delete_column(column_id.clone()),
            "Column deleted",
            "Failed to delete column",
        )
        .await
    }

    /// Creates a board owned by the user. The selection is unchanged.
    ///
    /// # Errors
    ///
    /// Returns a validation error or the store error.
    pub async fn create_board(&self, name: &str, description: Option<String>) -> Result<BoardId, BoardError> {
        let name = validate_title(name).map_err(|e| self.reject(e))?;
        let board = Board {
            id: BoardId::new(),
            name: name.to_string(),
            description,
            owner_id: self.user.id.clone(),
            is_shared: false,
            is_archived: false,
        };
        let id = board.id.clone();
        self.commit(
            self.store.create_board(board),
            "Board created",
            "Failed to create board",
        )
        .await?;
        Ok(id)
    }

    /// Updates the selected board.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`BoardError::NoBoardSelected`] or the
    /// store error of the write or of the board reload. A failed reload
    /// keeps the previous board and raises "Failed to load board".
    pub async fn update_board(&self, mut patch: BoardPatch) -> Result<(), BoardError> {
        let board_id = self.selected_board_id().map_err(|e| self.reject(e))?;
        if let Some(name) = &patch.name {
            let name = validate_title(name).map_err(|e| self.reject(e))?;
            patch.name = Some(name.to_string());
        }
        self.commit(
            self.store.update_board(board_id.clone(), patch),
            "Board updated",
            "Failed to update board",
        )
        .await?;
        match self.store.list_boards(ListQuery::board(board_id.clone())).await {
            Ok(mut rows) if !rows.is_empty() => {
                *self.board.lock() = Some(rows.swap_remove(0));
                Ok(())
            }
            Ok(_) => Err(self.reject(BoardError::BoardNotFound(board_id))),
            Err(e) => {
                tracing::warn!(board_id = %board_id, error = %e, "failed to reload board");
                self.notifier
                    .error("Failed to load board", Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Runs a write, then reconciles and notifies.
    async fn commit(
        &self,
        write: impl Future<Output = Result<(), StoreError>>,
        success: &str,
        failure: &str,
    ) -> Result<(), BoardError> {
        match write.await {
            Ok(()) => {
                if self.board.lock().is_some() {
                    self.reconcile().await?;
                }
                self.notifier.success(success, None);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, action = failure, "store write failed");
                self.notifier.error(failure, Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    fn ensure_task(&self, task_id: &TaskId) -> Result<(), BoardError> {
        if self.with_cache(|c| c.task(task_id).is_none()) {
            return Err(self.reject(BoardError::TaskNotFound(task_id.to_string())));
        }
        Ok(())
    }
}
