//! Durable video records.
//!
//! [`VideoStore`] is the seam the ingest path and the worker share;
//! [`PgVideoStore`] backs it with PostgreSQL via sqlx.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use memory::MemoryVideoStore;
pub use postgres::PgVideoStore;
pub use store::VideoStore;
