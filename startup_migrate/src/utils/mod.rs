//! Utilities for startup_migrate
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;
