//! `kanban` command-line client.
//!
//! Signs in, opens the user's default board, runs one command and prints
//! the resulting notifications followed by the board.
//!
//! ```bash
//! # Offline demo against a seeded in-process store
//! cargo run --bin kanban
//!
//! # Against a hosted store
//! cargo run --bin kanban -- --store-url ws://127.0.0.1:9400/ws \
//!     --email ada@example.com add "Write docs" --tag docs --due 2026-11-01
//!
//! # Drag a task (unique id prefix or suffix) onto a column by name
//! cargo run --bin kanban -- move 89abcdef done
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use kanban::auth::AuthProvider;
use kanban::board::BoardSession;
use kanban::cli::{CliError, Output, execute, seed_demo};
use kanban::config::{CliArgs, ClientConfig, Command, Layout};
use kanban::notify::{Notification, Notifier};
use kanban::store::memory::InMemoryStore;
use kanban::store::remote::WsStore;
use kanban::store::{AuthBackend, RemoteStore};
use kanban::ui::board::BoardLayout;
use kanban::ui::list::ListLayout;
use kanban::ui::{BoardRenderer, BoardView};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file so stdout carries only the rendered board.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let command = cli.command.clone().unwrap_or(Command::Show);
    tracing::info!(?command, online = config.store_url.is_some(), "kanban starting");

    let result = match &config.store_url {
        Some(url) => match WsStore::connect(url, config.connect_timeout).await {
            Ok(store) => run(store, &config, &command, false).await,
            Err(source) => Err(CliError::Connect {
                url: url.clone(),
                source,
            }),
        },
        None => run(InMemoryStore::new(), &config, &command, true).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("kanban.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Signs in, opens the default board and runs `command`.
async fn run<S: RemoteStore + AuthBackend>(
    store: S,
    config: &ClientConfig,
    command: &Command,
    offline: bool,
) -> Result<(), CliError> {
    let auth = AuthProvider::new();
    let user = auth
        .sign_in(&store, &config.email, config.display_name.clone())
        .await?;

    let (notifier, mut notifications) = Notifier::channel(config.notification_buffer);
    let session = BoardSession::new(store, user, notifier);
    session.ensure_default_board().await?;

    if offline {
        seed_demo(&session).await?;
        drain(&mut notifications);
        println!("(offline demo: changes are not saved)");
    }

    let result = execute(&session, command).await;
    for notification in drain(&mut notifications) {
        println!("{notification}");
    }

    match &result {
        Ok(Output::Lines(lines)) => {
            for line in lines {
                println!("{line}");
            }
        }
        Ok(Output::Board) | Err(_) => print_board(&session, config),
    }

    if let Err(e) = auth.logout(session.store()).await {
        tracing::debug!(error = %e, "logout failed");
    }
    result.map(|_| ())
}

fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}

fn print_board<S: RemoteStore>(session: &BoardSession<S>, config: &ClientConfig) {
    let board = session.board();
    let cache = session.snapshot();
    let view = BoardView::new(board.as_ref(), &cache, &config.date_format);
    let lines = match config.layout {
        Layout::Board => BoardLayout::new(config.lane_width).render(&view),
        Layout::List => ListLayout.render(&view),
    };
    println!();
    for line in lines {
        println!("{line}");
    }
}
