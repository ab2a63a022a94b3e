//! SQLite job store for postforge.
//!
//! Persists job definitions and run statistics in a single table. Schedules
//! and generation parameters are stored as JSON columns.

mod schema;
mod store;

pub use store::SqliteJobStore;
