//! Change history: the log trait, its in-memory implementation, and the
//! decorator that records field-level diffs on update.

pub mod repository;
pub mod store;

pub use repository::{EntityHistory, HistoryRepository};
pub use store::{HistoryStore, MemoryHistoryStore};
