//! Database layer
//!
//! Storage abstraction for the Studyhall backend. SQLite is the default
//! driver (single-binary deployment); MySQL is supported for larger
//! installations. The driver is selected from configuration and hidden
//! behind the `DatabasePool` trait so repositories work with either.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
