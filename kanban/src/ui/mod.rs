//! Plain-text board renderers.
//!
//! A [`BoardRenderer`] turns a read-only [`BoardView`] into display lines.
//! [`board::BoardLayout`] draws columns side by side as lanes of cards;
//! [`list::ListLayout`] prints one row per task.

pub mod board;
pub mod list;

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, Utc};
use kanban_proto::model::{Board, Task, Timestamp};

use crate::board::cache::BoardStateCache;

/// Number of trailing id characters shown as a task's short reference.
const SHORT_ID_LEN: usize = 8;

/// Everything a renderer may look at.
#[derive(Debug, Clone, Copy)]
pub struct BoardView<'a> {
    /// The selected board, if any.
    pub board: Option<&'a Board>,
    /// Columns, tasks and subtasks.
    pub cache: &'a BoardStateCache,
    /// Reference instant for overdue checks.
    pub now: Timestamp,
    /// `chrono` format string for due dates.
    pub date_format: &'a str,
}

impl<'a> BoardView<'a> {
    #[must_use]
    pub fn new(board: Option<&'a Board>, cache: &'a BoardStateCache, date_format: &'a str) -> Self {
        Self {
            board,
            cache,
            now: Timestamp::now(),
            date_format,
        }
    }

    /// Title line for the board.
    #[must_use]
    pub fn heading(&self) -> String {
        match self.board {
            Some(board) => {
                let mut heading = format!("# {}", board.name);
                if board.is_shared {
                    heading.push_str(" (shared)");
                }
                if let Some(description) = &board.description {
                    heading.push_str(" - ");
                    heading.push_str(description);
                }
                heading
            }
            None => "# (no board selected)".to_string(),
        }
    }

    /// Due-date label of a task, flagged when overdue.
    #[must_use]
    pub fn due_label(&self, task: &Task) -> Option<String> {
        let due = task.due_date?;
        let mut label = format!("due {}", format_date(due, self.date_format));
        if is_overdue(task, self.now) {
            label.push_str(" (overdue)");
        }
        Some(label)
    }

    /// `[done/total]` subtask badge, if the task has subtasks.
    #[must_use]
    pub fn progress_badge(&self, task: &Task) -> Option<String> {
        let (done, total) = self.cache.subtask_progress(&task.id);
        (total > 0).then(|| format!("[{done}/{total}]"))
    }
}

/// Renders a board view as lines of text.
pub trait BoardRenderer {
    /// Produces the display lines for `view`.
    fn render(&self, view: &BoardView<'_>) -> Vec<String>;
}

/// Formats a timestamp as a UTC date with a `chrono` format string.
///
/// A format `chrono` cannot apply falls back to `YYYY-MM-DD`.
#[must_use]
pub fn format_date(timestamp: Timestamp, format: &str) -> String {
    let Some(dt) = i64::try_from(timestamp.as_millis())
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
    else {
        return timestamp.to_string();
    };
    let mut out = String::new();
    if write!(out, "{}", dt.format(format)).is_err() {
        tracing::debug!(format, "unusable date format");
        return dt.format("%Y-%m-%d").to_string();
    }
    out
}

/// Parses a `YYYY-MM-DD` date into a timestamp at midnight UTC.
///
/// # Errors
///
/// Returns the `chrono` parse error for malformed input.
pub fn parse_date(text: &str) -> Result<Timestamp, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")?;
    let millis = date
        .and_hms_opt(0, 0, 0)
        .map_or(0, |dt| dt.and_utc().timestamp_millis());
    Ok(Timestamp::from_millis(u64::try_from(millis).unwrap_or(0)))
}

/// An incomplete task whose due date has passed.
#[must_use]
pub fn is_overdue(task: &Task, now: Timestamp) -> bool {
    !task.completed && task.due_date.is_some_and(|due| due < now)
}

/// The short reference printed for an id.
#[must_use]
pub fn short_id(id: &str) -> &str {
    let skip = id.chars().count().saturating_sub(SHORT_ID_LEN);
    id.char_indices().nth(skip).map_or(id, |(i, _)| &id[i..])
}

/// Tags as `#tag` words.
#[must_use]
pub fn tag_words(task: &Task) -> String {
    task.tags
        .iter()
        .map(|t| format!("#{t}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip() {
        let ts = parse_date("2026-03-14").unwrap();
        assert_eq!(format_date(ts, "%Y-%m-%d"), "2026-03-14");
        assert_eq!(format_date(ts, "%d %b"), "14 Mar");
    }

    #[test]
    fn unknown_specifier_falls_back_to_iso_date() {
        let ts = parse_date("2026-03-14").unwrap();
        assert_eq!(format_date(ts, "%Q"), "2026-03-14");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_date("tomorrow").is_err());
        assert!(parse_date("2026-13-01").is_err());
    }

    #[test]
    fn short_id_keeps_tail() {
        assert_eq!(short_id("0192f3a4-7b8c-7def-8123-456789abcdef"), "89abcdef");
        assert_eq!(short_id("t1"), "t1");
    }
}
