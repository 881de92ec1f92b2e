//! Local mirror of one board.
//!
//! [`BoardStateCache`] holds columns, tasks and subtasks keyed by id in the
//! order the store returned them. Groupings (tasks per column, subtasks per
//! task) are derived on every read and never stored, so they cannot drift
//! from the rows.

use indexmap::IndexMap;
use kanban_proto::model::{Column, ColumnId, Subtask, SubtaskId, Task, TaskId};

/// Columns, tasks and subtasks of the selected board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardStateCache {
    columns: IndexMap<ColumnId, Column>,
    tasks: IndexMap<TaskId, Task>,
    subtasks: IndexMap<SubtaskId, Subtask>,
}

impl BoardStateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cache from freshly fetched rows.
    #[must_use]
    pub fn from_rows(columns: Vec<Column>, tasks: Vec<Task>, subtasks: Vec<Subtask>) -> Self {
        let mut cache = Self::new();
        cache.replace_all(columns, tasks, subtasks);
        cache
    }

    /// Replaces the whole cache with freshly fetched rows.
    ///
    /// Tasks whose column is missing and subtasks whose task is missing are
    /// dropped, so no orphan survives a replacement.
    pub fn replace_all(&mut self, columns: Vec<Column>, tasks: Vec<Task>, subtasks: Vec<Subtask>) {
        let columns: IndexMap<ColumnId, Column> =
            columns.into_iter().map(|c| (c.id.clone(), c)).collect();

        let mut kept_tasks = IndexMap::with_capacity(tasks.len());
        for task in tasks {
            if columns.contains_key(&task.column_id) {
                kept_tasks.insert(task.id.clone(), task);
            } else {
                tracing::warn!(task_id = %task.id, column_id = %task.column_id, "dropping task without column");
            }
        }

        let mut kept_subtasks = IndexMap::with_capacity(subtasks.len());
        for subtask in subtasks {
            if kept_tasks.contains_key(&subtask.task_id) {
                kept_subtasks.insert(subtask.id.clone(), subtask);
            } else {
                tracing::warn!(subtask_id = %subtask.id, task_id = %subtask.task_id, "dropping subtask without task");
            }
        }

        self.columns = columns;
        self.tasks = kept_tasks;
        self.subtasks = kept_subtasks;
    }

    /// Returns the state after moving `task_id` into `column_id`.
    ///
    /// Only the column changes. The task keeps its stored position until
    /// the store assigns a final one, so hovering away and back leaves the
    /// origin column ordered exactly as the store has it. Moving a task to
    /// the column it is already in, or referencing an unknown task or column,
    /// returns an identical state.
    #[must_use]
    pub fn apply_optimistic_move(&self, task_id: &TaskId, column_id: &ColumnId) -> Self {
        let mut next = self.clone();
        if !self.columns.contains_key(column_id) {
            return next;
        }
        if let Some(task) = next.tasks.get_mut(task_id)
            && task.column_id != *column_id
        {
            task.column_id = column_id.clone();
        }
        next
    }

    /// Tasks matching `predicate`, in fetch order.
    pub fn tasks_filtered(&self, predicate: impl Fn(&Task) -> bool) -> Vec<&Task> {
        self.tasks.values().filter(|t| predicate(t)).collect()
    }

    /// Case-insensitive search over titles, descriptions and tags.
    #[must_use]
    pub fn search(&self, text: &str) -> Vec<&Task> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.tasks.values().collect();
        }
        self.tasks_filtered(|task| {
            task.title.to_lowercase().contains(&needle)
                || task
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
                || task.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
        })
    }

    /// Columns left to right.
    #[must_use]
    pub fn columns(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.columns.values().collect();
        columns.sort_by_key(|c| c.position);
        columns
    }

    /// Tasks of one column, top to bottom.
    #[must_use]
    pub fn tasks_in_column(&self, column_id: &ColumnId) -> Vec<&Task> {
        let mut tasks = self.tasks_filtered(|t| t.column_id == *column_id);
        tasks.sort_by_key(|t| t.position);
        tasks
    }

    /// Subtasks of one task, in checklist order.
    #[must_use]
    pub fn subtasks_of(&self, task_id: &TaskId) -> Vec<&Subtask> {
        let mut subtasks: Vec<&Subtask> = self
            .subtasks
            .values()
            .filter(|s| s.task_id == *task_id)
            .collect();
        subtasks.sort_by_key(|s| s.position);
        subtasks
    }

    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    #[must_use]
    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.get(id)
    }

    #[must_use]
    pub fn subtask(&self, id: &SubtaskId) -> Option<&Subtask> {
        self.subtasks.get(id)
    }

    /// `(completed, total)` subtask counts of a task.
    #[must_use]
    pub fn subtask_progress(&self, task_id: &TaskId) -> (usize, usize) {
        self.subtasks
            .values()
            .filter(|s| s.task_id == *task_id)
            .fold((0, 0), |(done, total), s| {
                (done + usize::from(s.completed), total + 1)
            })
    }

    /// Position for a task appended to `column_id`: the column's task count.
    #[must_use]
    pub fn next_task_position(&self, column_id: &ColumnId) -> u32 {
        count_u32(self.tasks.values().filter(|t| t.column_id == *column_id).count())
    }

    /// Position for a subtask appended to `task_id`: the task's subtask count.
    #[must_use]
    pub fn next_subtask_position(&self, task_id: &TaskId) -> u32 {
        count_u32(self.subtasks.values().filter(|s| s.task_id == *task_id).count())
    }

    /// Position for a new column: the board's column count.
    #[must_use]
    pub fn next_column_position(&self) -> u32 {
        count_u32(self.columns.len())
    }

    /// Resolves a task by exact id, or by an id prefix or suffix that
    /// matches exactly one task.
    #[must_use]
    pub fn find_task(&self, reference: &str) -> Option<&Task> {
        if let Some(task) = self.tasks.get(&TaskId::from(reference)) {
            return Some(task);
        }
        unique(self.tasks.values().filter(|t| id_matches(t.id.as_str(), reference)))
    }

    /// Resolves a column by exact id or case-insensitive name.
    #[must_use]
    pub fn find_column(&self, reference: &str) -> Option<&Column> {
        self.columns.get(&ColumnId::from(reference)).or_else(|| {
            self.columns
                .values()
                .find(|c| c.name.eq_ignore_ascii_case(reference.trim()))
        })
    }

    /// Resolves a subtask like [`BoardStateCache::find_task`] resolves tasks.
    #[must_use]
    pub fn find_subtask(&self, reference: &str) -> Option<&Subtask> {
        if let Some(subtask) = self.subtasks.get(&SubtaskId::from(reference)) {
            return Some(subtask);
        }
        unique(
            self.subtasks
                .values()
                .filter(|s| id_matches(s.id.as_str(), reference)),
        )
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.tasks.is_empty()
    }
}

/// Short references match the start (typed) or the end (displayed) of an id.
fn id_matches(id: &str, reference: &str) -> bool {
    !reference.is_empty() && (id.starts_with(reference) || id.ends_with(reference))
}

fn unique<T>(mut candidates: impl Iterator<Item = T>) -> Option<T> {
    match (candidates.next(), candidates.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

fn count_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
