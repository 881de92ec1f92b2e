//! One row per task.

use super::{BoardRenderer, BoardView, short_id, tag_words};

/// Flat listing ordered by column, then position.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListLayout;

impl BoardRenderer for ListLayout {
    fn render(&self, view: &BoardView<'_>) -> Vec<String> {
        let mut out = vec![view.heading()];
        for column in view.cache.columns() {
            for task in view.cache.tasks_in_column(&column.id) {
                let mark = if task.completed { "x" } else { " " };
                let mut row = format!(
                    "[{mark}] {:<8}  {:<14}  {}",
                    short_id(task.id.as_str()),
                    column.name,
                    task.title
                );
                if let Some(badge) = view.progress_badge(task) {
                    row.push(' ');
                    row.push_str(&badge);
                }
                if let Some(due) = view.due_label(task) {
                    row.push_str("  ");
                    row.push_str(&due);
                }
                if !task.tags.is_empty() {
                    row.push_str("  ");
                    row.push_str(&tag_words(task));
                }
                out.push(row);
                for subtask in view.cache.subtasks_of(&task.id) {
                    let mark = if subtask.completed { "x" } else { " " };
                    out.push(format!(
                        "      - [{mark}] {} ({})",
                        subtask.title,
                        short_id(subtask.id.as_str())
                    ));
                }
            }
        }
        if out.len() == 1 {
            out.push("(no tasks)".to_string());
        }
        out
    }
}
