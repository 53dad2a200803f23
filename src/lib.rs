//! sqlsource - keeps an embedded SQL database in step with a record cache
//!
//! This crate provides:
//! - `sql`: statement building, table migration and schema version checks
//! - `engine`: the SQL engine capability and its SQLite implementation
//! - `cache`: the record cache capability and an in-memory implementation
//! - `source`: operation dispatch, lookups and purges over a session
//! - `reconcile`: replay of committed writes against the cache

pub mod cache;
pub mod config;
pub mod deserialize;
pub mod engine;
pub mod error;
pub mod executor;
pub mod operation;
pub mod reconcile;
pub mod schema;
pub mod session;
pub mod source;
pub mod sql;
pub mod types;
