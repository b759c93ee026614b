//! Error types for startup_migrate

use std::fmt;

use thiserror::Error;

/// Result type for startup_migrate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Phase of a database's startup sequence in which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Connect,
    Schema,
    Seed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Connect => write!(f, "connect"),
            Phase::Schema => write!(f, "schema"),
            Phase::Seed => write!(f, "seed"),
        }
    }
}

/// Error types for startup_migrate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Startup of database '{database}' failed during {phase}: {source}")]
    Startup {
        database: String,
        phase: Phase,
        #[source]
        source: Box<Error>,
    },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// SQLSTATE codes (postgres, mysql) and sqlite result codes worth another attempt
const TRANSIENT_CODES: &[&str] = &[
    "53300", // too_many_connections
    "57P01", // admin_shutdown
    "57P02", // crash_shutdown
    "57P03", // cannot_connect_now
    "40001", // serialization_failure / mysql deadlock
    "40P01", // deadlock_detected
    "5",     // SQLITE_BUSY
    "6",     // SQLITE_LOCKED
    "261",   // SQLITE_BUSY_RECOVERY
    "517",   // SQLITE_BUSY_SNAPSHOT
    "262",   // SQLITE_LOCKED_SHAREDCACHE
];

impl Error {
    /// Whether the failure is likely to go away on its own.
    ///
    /// Connectivity and contention problems reported by the row store are
    /// transient; schema conflicts, constraint violations and configuration
    /// mistakes are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::SqlxError(e) => is_transient_sqlx(e),
            Error::Startup { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConfigError(_) => "ConfigError",
            Error::MigrationError(_) => "MigrationError",
            Error::IoError(_) => "IoError",
            Error::SqlxError(_) => "SqlxError",
            Error::SerializationError(_) => "SerializationError",
            Error::Startup { .. } => "Startup",
            Error::Unknown(_) => "Unknown",
        }
    }
}

fn is_transient_sqlx(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => {
            if let Some(code) = db.code() {
                let code: &str = &code;
                // SQLSTATE class 08 is "connection exception"
                if code.starts_with("08") || TRANSIENT_CODES.contains(&code) {
                    return true;
                }
            }
            mentions_connectivity(db.message())
        }
        sqlx::Error::Protocol(msg) => mentions_connectivity(msg),
        _ => false,
    }
}

fn mentions_connectivity(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("connection refused")
        || message.contains("connection reset")
        || message.contains("timed out")
        || message.contains("database is locked")
}

/// Convert Serde JSON errors to startup_migrate errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to startup_migrate errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
