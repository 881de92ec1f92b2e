//! Shared data model and store wire format for kanban boards.

pub mod dataset;
pub mod model;
pub mod tags;
pub mod wire;
