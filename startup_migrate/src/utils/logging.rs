//! Logging utilities for startup_migrate
//!
//! This module provides logging setup and configuration.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Build the filter: `RUST_LOG` when set, the configured level otherwise
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    let level = match config.level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => config.level.to_lowercase(),
        _ => "info".to_string(), // Default to INFO
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize logging based on configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config);
    let json = config.format.eq_ignore_ascii_case("json");

    let result = if let Some(file_path) = &config.file {
        // Ensure directory exists
        if let Some(parent) = Path::new(file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = Mutex::new(File::create(file_path)?);

        if json {
            fmt().json().with_env_filter(filter).with_writer(file).try_init()
        } else {
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(file)
                .try_init()
        }
    } else if config.stdout {
        if json {
            fmt().json().with_env_filter(filter).try_init()
        } else {
            fmt().with_env_filter(filter).try_init()
        }
    } else {
        return Ok(());
    };

    result.map_err(|e| Error::Unknown(format!("Failed to initialize logging: {}", e)))
}
