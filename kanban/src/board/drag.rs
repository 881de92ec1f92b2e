//! Drag-and-drop state machine.
//!
//! [`DragController`] is pure: it reads the cache it is given and tells the
//! caller what to do (apply an optimistic state, write a move, nothing).
//! All I/O lives in [`super::BoardSession`].
//!
//! ```text
//! Idle --begin(task)--> Dragging { task, origin } --end(target?)--> Idle
//!                          |  ^
//!                          +--+ over(target): optimistic move
//! ```

use kanban_proto::model::{ColumnId, TaskId};

use super::cache::BoardStateCache;

/// What a pointer is over during a drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Another task card; resolves to that task's column.
    Task(TaskId),
    /// A column lane.
    Column(ColumnId),
}

/// Drag progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        /// The task being dragged.
        task_id: TaskId,
        /// The task's column when the drag began.
        origin: ColumnId,
    },
}

/// Errors raised when starting a drag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    /// A drag is already in progress.
    #[error("task {0} is already being dragged")]
    AlreadyDragging(TaskId),

    /// The task is not on the board.
    #[error("task {0} not found")]
    UnknownTask(TaskId),
}

/// What the session must do when a drag ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEnd {
    /// No drag was in progress.
    Ignored,
    /// Released outside any target: keep the cache, write nothing.
    Discarded,
    /// Dropped back on the origin column: nothing to write.
    Unchanged,
    /// Persist the move, then reconcile.
    Commit {
        /// The dragged task.
        task_id: TaskId,
        /// Its new column.
        column_id: ColumnId,
    },
}

/// Tracks one drag gesture at a time.
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> &DragState {
        &self.state
    }

    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Starts dragging `task_id`, remembering its current column.
    ///
    /// # Errors
    ///
    /// Returns [`DragError::AlreadyDragging`] while another drag is active
    /// and [`DragError::UnknownTask`] for a task not in `cache`.
    pub fn begin(&mut self, cache: &BoardStateCache, task_id: &TaskId) -> Result<(), DragError> {
        if let DragState::Dragging { task_id: active, .. } = &self.state {
            tracing::warn!(active = %active, requested = %task_id, "drag already in progress");
            return Err(DragError::AlreadyDragging(active.clone()));
        }
        let task = cache
            .task(task_id)
            .ok_or_else(|| DragError::UnknownTask(task_id.clone()))?;
        tracing::debug!(task_id = %task_id, origin = %task.column_id, "drag started");
        self.state = DragState::Dragging {
            task_id: task_id.clone(),
            origin: task.column_id.clone(),
        };
        Ok(())
    }

    /// Handles the pointer moving over `target`.
    ///
    /// Returns the optimistic state to install when the target resolves to a
    /// column other than the task's current one, `None` otherwise.
    #[must_use]
    pub fn over(&self, cache: &BoardStateCache, target: &DropTarget) -> Option<BoardStateCache> {
        let DragState::Dragging { task_id, .. } = &self.state else {
            return None;
        };
        let column_id = resolve_target(cache, target)?;
        let current = cache.task(task_id)?;
        if current.column_id == column_id {
            return None;
        }
        tracing::debug!(task_id = %task_id, column_id = %column_id, "optimistic move");
        Some(cache.apply_optimistic_move(task_id, &column_id))
    }

    /// Ends the drag and returns to idle.
    pub fn end(&mut self, cache: &BoardStateCache, target: Option<&DropTarget>) -> DragEnd {
        let DragState::Dragging { task_id, origin } = std::mem::take(&mut self.state) else {
            return DragEnd::Ignored;
        };
        let Some(target) = target else {
            tracing::debug!(task_id = %task_id, "drag released outside any target");
            return DragEnd::Discarded;
        };
        match resolve_target(cache, target) {
            None => DragEnd::Discarded,
            Some(column_id) if column_id == origin => DragEnd::Unchanged,
            Some(column_id) => DragEnd::Commit { task_id, column_id },
        }
    }

    /// Abandons any drag in progress.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

/// Resolves a drop target to a column present in `cache`.
#[must_use]
pub fn resolve_target(cache: &BoardStateCache, target: &DropTarget) -> Option<ColumnId> {
    match target {
        DropTarget::Column(id) => cache.column(id).map(|c| c.id.clone()),
        DropTarget::Task(id) => cache.task(id).map(|t| t.column_id.clone()),
    }
}
