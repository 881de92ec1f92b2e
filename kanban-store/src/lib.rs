//! Hosted kanban store library.
//!
//! Exposes the store server for use in tests and embedding. The server
//! accepts WebSocket connections, authenticates each one with a sign-in
//! request and executes store operations against a shared dataset.

pub mod config;
pub mod server;
