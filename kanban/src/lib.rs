//! Kanban board client.
//!
//! The synchronization core ([`board`]) keeps a local cache of one board in
//! step with a [`store::RemoteStore`]: drags are applied optimistically and
//! persisted on drop, every other mutation is confirmed by the store first,
//! and each write is followed by a full reload of the board.

pub mod auth;
pub mod board;
pub mod cli;
pub mod config;
pub mod notify;
pub mod store;
pub mod ui;
