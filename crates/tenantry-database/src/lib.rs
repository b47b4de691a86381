//! # tenantry-database
//!
//! PostgreSQL connection management, migrations, and the storage-backed
//! implementations of the repository, history log, and metrics persister
//! contracts.

pub mod connection;
pub mod document;
pub mod history;
pub mod metrics;
pub mod migration;

pub use connection::DatabasePool;
pub use document::DocumentStore;
pub use history::PgHistoryStore;
pub use metrics::PgMetricsPersister;
