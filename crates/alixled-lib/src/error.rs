//! Unified error type for the alixled-lib crate.
//!
//! [`AlixError`] wraps the module errors ([`ConfigError`], [`HwError`]) and
//! plain I/O errors so `?` works across module boundaries.

use std::fmt;

use crate::config::ConfigError;
use crate::hw::HwError;

#[derive(Debug)]
pub enum AlixError {
    /// Invalid configuration; raised before any hardware access.
    Config(ConfigError),
    /// Privilege or initialization failure.
    Hw(HwError),
    /// Filesystem or process setup error (pid file, daemonizing).
    Io(std::io::Error),
}

impl fmt::Display for AlixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlixError::Config(e) => write!(f, "{e}"),
            AlixError::Hw(e) => write!(f, "{e}"),
            AlixError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for AlixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AlixError::Config(e) => Some(e),
            AlixError::Hw(e) => Some(e),
            AlixError::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AlixError {
    fn from(e: ConfigError) -> Self {
        AlixError::Config(e)
    }
}

impl From<HwError> for AlixError {
    fn from(e: HwError) -> Self {
        AlixError::Hw(e)
    }
}

impl From<std::io::Error> for AlixError {
    fn from(e: std::io::Error) -> Self {
        AlixError::Io(e)
    }
}

/// Crate-level Result alias using [`AlixError`].
pub type Result<T> = std::result::Result<T, AlixError>;
