//! Database module for startup_migrate
//!
//! This module handles row-store handles, transactions and migration history.

pub mod connection;
pub mod executor;
pub mod history;

// Re-export key types
pub use connection::DatabaseConnection;
pub use executor::UnitOfWork;
