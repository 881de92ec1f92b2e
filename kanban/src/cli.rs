//! Command execution for the `kanban` binary.
//!
//! [`execute`] runs one parsed [`Command`] against a [`BoardSession`] and
//! says what to print. Printing stays in the binary.

use std::collections::BTreeSet;

use kanban_proto::model::TaskPatch;

use crate::auth::AuthError;
use crate::board::{BoardError, BoardSession, DragOutcome, NewTask};
use crate::config::{ColumnCommand, Command, SubtaskCommand};
use crate::store::{RemoteStore, StoreError};
use crate::ui;

/// Errors that end a CLI run.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("could not connect to {url}: {source}")]
    Connect { url: String, source: StoreError },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("invalid due date {input:?} (expected YYYY-MM-DD): {source}")]
    DueDate {
        input: String,
        source: chrono::ParseError,
    },
}

/// What to print once a command has run.
#[derive(Debug, PartialEq, Eq)]
pub enum Output {
    /// Render the board.
    Board,
    /// Print these lines instead.
    Lines(Vec<String>),
}

/// Runs one command against the session.
///
/// # Errors
///
/// Returns the first error the command hits. Store failures have already
/// been sent to the session's notifier.
pub async fn execute<S: RemoteStore>(session: &BoardSession<S>, command: &Command) -> Result<Output, CliError> {
    match command {
        Command::Show => {}
        Command::Boards => {
            let selected = session.board().map(|b| b.id);
            let lines = session
                .boards()
                .await?
                .into_iter()
                .map(|b| {
                    let marker = if Some(&b.id) == selected.as_ref() { '*' } else { ' ' };
                    let mut line = format!("{marker} {:<8}  {}", ui::short_id(b.id.as_str()), b.name);
                    if b.owner_id != session.user().id {
                        line.push_str(" (shared with you)");
                    }
                    if b.is_archived {
                        line.push_str(" (archived)");
                    }
                    line
                })
                .collect();
            return Ok(Output::Lines(lines));
        }
        Command::Add {
            title,
            column,
            description,
            tags,
            due,
        } => {
            let column_id = column
                .as_deref()
                .map(|c| session.resolve_column(c))
                .transpose()?;
            let due_date = due
                .as_deref()
                .map(|d| {
                    ui::parse_date(d).map_err(|source| CliError::DueDate {
                        input: d.to_string(),
                        source,
                    })
                })
                .transpose()?;
            session
                .create_task(NewTask {
                    title: title.clone(),
                    description: description.clone(),
                    column_id,
                    due_date,
                    tags: tags.iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect(),
                })
                .await?;
        }
        Command::Move { task, column } => {
            let task_id = session.resolve_task(task)?;
            let column_id = session.resolve_column(column)?;
            if session.move_task(&task_id, &column_id).await? == DragOutcome::Unchanged {
                return Ok(Output::Lines(vec!["task is already in that column".to_string()]));
            }
        }
        Command::Done { task } => {
            let task_id = session.resolve_task(task)?;
            session.set_task_completed(&task_id, true).await?;
        }
        Command::Edit {
            task,
            title,
            description,
        } => {
            let task_id = session.resolve_task(task)?;
            let mut patch = TaskPatch::now();
            if let Some(title) = title {
                patch = patch.title(title.clone());
            }
            if let Some(description) = description {
                let description = Some(description.clone()).filter(|d| !d.trim().is_empty());
                patch = patch.description(description);
            }
            session.update_task(&task_id, patch).await?;
        }
        Command::Rm { task } => {
            let task_id = session.resolve_task(task)?;
            session.delete_task(&task_id).await?;
        }
        Command::Search { text } => {
            let lines = session.with_cache(|cache| {
                cache
                    .search(text)
                    .into_iter()
                    .map(|t| {
                        let column = cache.column(&t.column_id).map_or("?", |c| c.name.as_str());
                        format!("{:<8}  {:<14}  {}", ui::short_id(t.id.as_str()), column, t.title)
                    })
                    .collect::<Vec<_>>()
            });
            let lines = if lines.is_empty() {
                vec![format!("no tasks match {text:?}")]
            } else {
                lines
            };
            return Ok(Output::Lines(lines));
        }
        Command::Column(ColumnCommand::Add { name, color }) => {
            session.create_column(name, color.clone()).await?;
        }
        Command::Column(ColumnCommand::Rm { column }) => {
            let column_id = session.resolve_column(column)?;
            session.delete_column(&column_id).await?;
        }
        Command::Subtask(SubtaskCommand::Add { task, title }) => {
            let task_id = session.resolve_task(task)?;
            session.create_subtask(&task_id, title).await?;
        }
        Command::Subtask(SubtaskCommand::Toggle { subtask }) => {
            let subtask_id = session.resolve_subtask(subtask)?;
            session.toggle_subtask(&subtask_id).await?;
        }
        Command::Subtask(SubtaskCommand::Rm { subtask }) => {
            let subtask_id = session.resolve_subtask(subtask)?;
            session.delete_subtask(&subtask_id).await?;
        }
    }
    Ok(Output::Board)
}

/// Fills an empty offline board with a few sample tasks.
///
/// # Errors
///
/// Returns the store error of the first failed write.
pub async fn seed_demo<S: RemoteStore>(session: &BoardSession<S>) -> Result<(), BoardError> {
    if session.with_cache(|c| c.task_count() > 0) {
        return Ok(());
    }
    let columns: Vec<_> = session.with_cache(|c| c.columns().into_iter().map(|col| col.id.clone()).collect());
    let samples = [
        ("Sketch the board layout", 0, &["design"][..]),
        ("Wire up the store client", 1, &["backend", "ws"][..]),
        ("Set up logging", 2, &[][..]),
    ];
    for (title, index, tags) in samples {
        let Some(column_id) = columns.get(index).or_else(|| columns.first()) else {
            break;
        };
        let task_id = session
            .create_task(NewTask {
                column_id: Some(column_id.clone()),
                tags: tags.iter().map(ToString::to_string).collect::<BTreeSet<_>>(),
                ..NewTask::titled(title)
            })
            .await?;
        if index == 1 {
            session.create_subtask(&task_id, "Request multiplexing").await?;
            session.create_subtask(&task_id, "Reconnect on failure").await?;
        }
    }
    Ok(())
}
