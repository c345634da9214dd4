//! CLI error type

use std::io;
use thiserror::Error;

/// Errors surfaced by the command-line tool
#[derive(Debug, Error)]
pub enum CliError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bus description could not be parsed
    #[error("invalid bus description: {0}")]
    Toml(#[from] toml::de::Error),

    /// Bus description is well-formed but inconsistent
    #[error("invalid bus description: {0}")]
    InvalidConfig(String),

    /// Device or bus error
    #[error("device error: {0}")]
    Device(#[from] spimem_core::Error),

    /// Filesystem error
    #[error("filesystem error: {0}")]
    Fs(#[from] spimem_fs::FsError),

    /// No free device of the requested family
    #[error("no free {0} device on the bus")]
    NoDevice(String),

    /// Progress bar template error
    #[error("progress bar template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
