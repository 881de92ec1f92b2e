//! Board synchronization core.
//!
//! A [`BoardSession`] owns the local [`BoardStateCache`] of the selected
//! board and keeps it consistent with a [`RemoteStore`]:
//!
//! - drag gestures update the cache optimistically and persist on drop;
//! - mutations write first and update the cache only through reconciliation;
//! - reconciliation re-reads the whole board and replaces the cache.
//!
//! The cache lock is never held across an `.await`, so session futures may
//! interleave freely. Whichever reconciliation finishes last wins.

pub mod cache;
pub mod drag;
pub mod loader;
mod mutators;

pub use mutators::NewTask;

use kanban_proto::model::{Board, BoardId, ColumnId, SubtaskId, TaskId, TaskPatch, TitleError, User};
use kanban_proto::wire::ListQuery;
use parking_lot::Mutex;

use crate::notify::Notifier;
use crate::store::{RemoteStore, StoreError};

use self::cache::BoardStateCache;
use self::drag::{DragController, DragEnd, DragError, DropTarget};

/// Errors reported by board operations.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// A title failed validation.
    #[error(transparent)]
    Title(#[from] TitleError),

    /// No board is selected.
    #[error("no board selected")]
    NoBoardSelected,

    /// The board does not exist or is not visible to the user.
    #[error("board {0} not found")]
    BoardNotFound(BoardId),

    /// The task is not on the selected board.
    #[error("task {0} not found")]
    TaskNotFound(String),

    /// The column is not on the selected board.
    #[error("column {0} not found")]
    ColumnNotFound(String),

    /// The subtask is not on the selected board.
    #[error("subtask {0} not found")]
    SubtaskNotFound(String),

    /// A drag could not start.
    #[error(transparent)]
    Drag(#[from] DragError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a finished drag was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// No drag was active.
    Ignored,
    /// Released outside a target; nothing written.
    Discarded,
    /// Dropped on its original column; nothing written.
    Unchanged,
    /// The move was persisted and the board reconciled.
    Moved {
        /// The moved task.
        task_id: TaskId,
        /// Its new column.
        column_id: ColumnId,
    },
}

/// A signed-in user's view of one board.
pub struct BoardSession<S> {
    store: S,
    user: User,
    notifier: Notifier,
    board: Mutex<Option<Board>>,
    cache: Mutex<BoardStateCache>,
    drag: Mutex<DragController>,
}

impl<S: RemoteStore> BoardSession<S> {
    /// Creates a session with no board selected.
    pub fn new(store: S, user: User, notifier: Notifier) -> Self {
        Self {
            store,
            user,
            notifier,
            board: Mutex::new(None),
            cache: Mutex::new(BoardStateCache::new()),
            drag: Mutex::new(DragController::new()),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The signed-in user.
    pub const fn user(&self) -> &User {
        &self.user
    }

    /// The selected board, if any.
    pub fn board(&self) -> Option<Board> {
        self.board.lock().clone()
    }

    /// A copy of the current cache.
    pub fn snapshot(&self) -> BoardStateCache {
        self.cache.lock().clone()
    }

    /// Runs `f` against the current cache without copying it.
    pub fn with_cache<R>(&self, f: impl FnOnce(&BoardStateCache) -> R) -> R {
        f(&self.cache.lock())
    }

    /// Boards visible to the user, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Store`] if the read fails.
    pub async fn boards(&self) -> Result<Vec<Board>, BoardError> {
        Ok(self
            .store
            .list_boards(ListQuery::owner(self.user.id.clone()))
            .await?)
    }

    /// Selects a board and loads it.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::BoardNotFound`] for an unknown board, or the
    /// store error of the initial load.
    pub async fn select_board(&self, board_id: &BoardId) -> Result<(), BoardError> {
        let found = match self
            .store
            .list_boards(ListQuery::board(board_id.clone()))
            .await
        {
            Ok(mut rows) if !rows.is_empty() => rows.swap_remove(0),
            Ok(_) | Err(StoreError::NotFound(_)) => {
                return Err(self.reject(BoardError::BoardNotFound(board_id.clone())));
            }
            Err(e) => {
                self.notifier
                    .error("Failed to load board", Some(e.to_string()));
                return Err(e.into());
            }
        };
        tracing::info!(board_id = %found.id, name = %found.name, "board selected");
        *self.board.lock() = Some(found);
        *self.cache.lock() = BoardStateCache::new();
        self.drag.lock().cancel();
        self.reconcile().await
    }

    /// Selects the user's first active board, creating one if none exists.
    ///
    /// # Errors
    ///
    /// Returns the store error of the listing, creation or load.
    pub async fn ensure_default_board(&self) -> Result<Board, BoardError> {
        let boards = self.boards().await?;
        let board_id = match boards.iter().find(|b| !b.is_archived && b.owner_id == self.user.id) {
            Some(board) => board.id.clone(),
            None => self.create_board("My Board", None).await?,
        };
        self.select_board(&board_id).await?;
        self.board().ok_or(BoardError::NoBoardSelected)
    }

    /// Re-reads the selected board and replaces the cache.
    ///
    /// On failure the previous cache is kept and an error notification is
    /// sent.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NoBoardSelected`] or the read error.
    pub async fn reconcile(&self) -> Result<(), BoardError> {
        let board_id = self.selected_board_id()?;
        match loader::fetch_board(&self.store, &board_id).await {
            Ok(snapshot) => {
                tracing::debug!(
                    board_id = %board_id,
                    columns = snapshot.columns.len(),
                    tasks = snapshot.tasks.len(),
                    subtasks = snapshot.subtasks.len(),
                    "board reconciled"
                );
                self.cache
                    .lock()
                    .replace_all(snapshot.columns, snapshot.tasks, snapshot.subtasks);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(board_id = %board_id, error = %e, "failed to load board");
                self.notifier
                    .error("Failed to load board", Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Drag and drop
    // -----------------------------------------------------------------------

    /// Starts dragging a task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Drag`] if a drag is active or the task is unknown.
    pub fn begin_drag(&self, task_id: &TaskId) -> Result<(), BoardError> {
        let cache = self.cache.lock();
        Ok(self.drag.lock().begin(&cache, task_id)?)
    }

    /// Handles the dragged task hovering over `target`, moving it in the
    /// cache when the target is a different column. Returns whether the
    /// cache changed.
    pub fn drag_over(&self, target: &DropTarget) -> bool {
        let mut cache = self.cache.lock();
        let next = self.drag.lock().over(&cache, target);
        match next {
            Some(next) => {
                *cache = next;
                true
            }
            None => false,
        }
    }

    /// Ends the drag.
    ///
    /// A drop on a column other than the origin writes the new column and
    /// then reconciles, whether the write succeeded or not. A failed write
    /// also raises an error notification; the reconciliation rolls the
    /// optimistic move back.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Store`] if the write or the reconciliation fails.
    pub async fn end_drag(&self, target: Option<&DropTarget>) -> Result<DragOutcome, BoardError> {
        let end = {
            let mut cache = self.cache.lock();
            let mut drag = self.drag.lock();
            if let Some(target) = target
                && let Some(next) = drag.over(&cache, target)
            {
                *cache = next;
            }
            drag.end(&cache, target)
        };

        let (task_id, column_id) = match end {
            DragEnd::Ignored => return Ok(DragOutcome::Ignored),
            DragEnd::Discarded => return Ok(DragOutcome::Discarded),
            DragEnd::Unchanged => return Ok(DragOutcome::Unchanged),
            DragEnd::Commit { task_id, column_id } => (task_id, column_id),
        };

        let patch = TaskPatch::now().column(column_id.clone());
        match self.store.update_task(task_id.clone(), patch).await {
            Ok(()) => {
                tracing::info!(task_id = %task_id, column_id = %column_id, "task moved");
                self.reconcile().await?;
                Ok(DragOutcome::Moved { task_id, column_id })
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "failed to persist move");
                self.notifier
                    .error("Failed to move task", Some(e.to_string()));
                // Reconciliation restores the durable column; its own failure
                // is already notified.
                let _ = self.reconcile().await;
                Err(e.into())
            }
        }
    }

    /// Performs a complete drag of `task_id` onto `column_id`.
    ///
    /// # Errors
    ///
    /// See [`BoardSession::begin_drag`] and [`BoardSession::end_drag`].
    pub async fn move_task(
        &self,
        task_id: &TaskId,
        column_id: &ColumnId,
    ) -> Result<DragOutcome, BoardError> {
        if let Err(e) = self.begin_drag(task_id) {
            return Err(self.reject(e));
        }
        let target = DropTarget::Column(column_id.clone());
        self.drag_over(&target);
        self.end_drag(Some(&target)).await
    }

    // -----------------------------------------------------------------------
    // Lookup helpers
    // -----------------------------------------------------------------------

    /// Resolves a task reference (id, or unique id prefix or suffix).
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::TaskNotFound`].
    pub fn resolve_task(&self, reference: &str) -> Result<TaskId, BoardError> {
        self.with_cache(|c| c.find_task(reference).map(|t| t.id.clone()))
            .ok_or_else(|| BoardError::TaskNotFound(reference.to_string()))
    }

    /// Resolves a column reference (id or case-insensitive name).
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::ColumnNotFound`].
    pub fn resolve_column(&self, reference: &str) -> Result<ColumnId, BoardError> {
        self.with_cache(|c| c.find_column(reference).map(|col| col.id.clone()))
            .ok_or_else(|| BoardError::ColumnNotFound(reference.to_string()))
    }

    /// Resolves a subtask reference (id, or unique id prefix or suffix).
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::SubtaskNotFound`].
    pub fn resolve_subtask(&self, reference: &str) -> Result<SubtaskId, BoardError> {
        self.with_cache(|c| c.find_subtask(reference).map(|s| s.id.clone()))
            .ok_or_else(|| BoardError::SubtaskNotFound(reference.to_string()))
    }

    fn selected_board_id(&self) -> Result<BoardId, BoardError> {
        self.board
            .lock()
            .as_ref()
            .map(|b| b.id.clone())
            .ok_or(BoardError::NoBoardSelected)
    }

    /// Reports a locally detected failure and hands the error back.
    fn reject(&self, err: impl Into<BoardError>) -> BoardError {
        let err = err.into();
        tracing::warn!(error = %err, "operation rejected");
        self.notifier.error("Operation failed", Some(err.to_string()));
        err
    }
}
