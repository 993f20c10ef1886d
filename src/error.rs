//! Error types for the mozsuite harness
//!
//! Only failures that abort something larger than a single script live here.
//! Diagnostics produced while a script compiles or runs are plain values
//! (see [`crate::engine::Diagnostic`]) and are judged by the executor.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::Diagnostic;

/// Main error type for mozsuite
#[derive(Error, Debug)]
pub enum Error {
    /// Bad corpus location or unusable process configuration
    #[error("ConfigurationError: {0}")]
    Config(String),

    /// A manifest, include file or corpus directory could not be read
    #[error("DiscoveryIOError: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A test or bootstrap script could not be read; aborts only its run
    #[error("TestIOError: {}: {source}", path.display())]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An `include` directive names a file that does not exist
    #[error("DiscoveryIOError: {} includes missing manifest {}", manifest.display(), include.display())]
    MissingInclude { manifest: PathBuf, include: PathBuf },

    /// The parameterized suite violates its parameter-source contract
    #[error("SetupError: {}", .0.join("; "))]
    Setup(Vec<String>),

    /// A bootstrap script failed to compile or run
    #[error("PrerequisiteError: {}: {diagnostic}", path.display())]
    Prerequisite { path: PathBuf, diagnostic: Diagnostic },
}

impl Error {
    /// Wrap an I/O error with the path that produced it
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an I/O error raised while reading a script for a single run
    pub fn script_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::ScriptRead {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Whether this error stops the whole suite rather than a single run
    pub fn is_fatal_to_suite(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Io { .. } | Error::MissingInclude { .. } | Error::Setup(_)
        )
    }
}

/// Result type alias for mozsuite
pub type Result<T> = std::result::Result<T, Error>;
