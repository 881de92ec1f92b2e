//! Side-by-side lane layout.

use kanban_proto::model::{Column, Task};

use super::{BoardRenderer, BoardView, short_id, tag_words};

/// Default lane width in characters.
pub const DEFAULT_LANE_WIDTH: usize = 28;

/// Narrowest lane that still fits a short id.
const MIN_LANE_WIDTH: usize = 12;

const LANE_GAP: &str = "  ";

/// Draws each column as a lane of cards, lanes side by side.
#[derive(Debug, Clone, Copy)]
pub struct BoardLayout {
    lane_width: usize,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::new(DEFAULT_LANE_WIDTH)
    }
}

impl BoardLayout {
    #[must_use]
    pub fn new(lane_width: usize) -> Self {
        Self {
            lane_width: lane_width.max(MIN_LANE_WIDTH),
        }
    }

    fn lane(&self, view: &BoardView<'_>, column: &Column) -> Vec<String> {
        let tasks = view.cache.tasks_in_column(&column.id);
        let mut lines = vec![
            fit(&format!("{} ({})", column.name, tasks.len()), self.lane_width),
            "-".repeat(self.lane_width),
        ];
        for task in tasks {
            lines.extend(self.card(view, task));
        }
        lines
    }

    fn card(&self, view: &BoardView<'_>, task: &Task) -> Vec<String> {
        let mark = if task.completed { "[x]" } else { "[ ]" };
        let mut lines = vec![fit(&format!("{mark} {}", task.title), self.lane_width)];

        let mut meta = short_id(task.id.as_str()).to_string();
        if let Some(badge) = view.progress_badge(task) {
            meta.push(' ');
            meta.push_str(&badge);
        }
        lines.push(fit(&format!("    {meta}"), self.lane_width));

        if let Some(due) = view.due_label(task) {
            lines.push(fit(&format!("    {due}"), self.lane_width));
        }
        if !task.tags.is_empty() {
            lines.push(fit(&format!("    {}", tag_words(task)), self.lane_width));
        }
        lines.push(fit("", self.lane_width));
        lines
    }
}

impl BoardRenderer for BoardLayout {
    fn render(&self, view: &BoardView<'_>) -> Vec<String> {
        let mut out = vec![view.heading()];
        let columns = view.cache.columns();
        if columns.is_empty() {
            out.push("(no columns)".to_string());
            return out;
        }

        let lanes: Vec<Vec<String>> = columns.iter().map(|c| self.lane(view, c)).collect();
        let height = lanes.iter().map(Vec::len).max().unwrap_or(0);
        let blank = fit("", self.lane_width);
        for row in 0..height {
            let line = lanes
                .iter()
                .map(|lane| lane.get(row).map_or(blank.as_str(), String::as_str))
                .collect::<Vec<_>>()
                .join(LANE_GAP);
            out.push(line.trim_end().to_string());
        }
        while out.last().is_some_and(String::is_empty) {
            out.pop();
        }
        out
    }
}

/// Truncates or pads `text` to exactly `width` characters.
fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        return format!("{text:<width$}");
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}
