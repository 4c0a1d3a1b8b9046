//! Database module for PostgreSQL connection and operations
//!
//! The pipeline only ever reaches the database through [`ScalarStore`];
//! the loader and schema helpers are used by the `load_dataset` binary.

pub mod connection;
pub mod executor;
pub mod loader;
pub mod schema;

pub use connection::{close_pool, init_pool, DbPool};
pub use executor::{ExecutionOutcome, PgStore, QueryExecutor, ScalarStore, DEFAULT_ANSWER};
pub use loader::{load_dataset, read_dataset, LoadSummary};
