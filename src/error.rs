//! Error types for golden dump reading, binary introspection and scanning
//!
//! Per-library failures (`DumpRead`, `VtableFormat`, `Introspection`, `Goblin`)
//! are recovered at the library boundary by the scanner. `Configuration` is the
//! only kind that aborts a check.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the abiguard library
#[derive(Error, Debug)]
pub enum Error {
    /// A golden dump file could not be opened or read
    #[error("failed to read dump '{}': {source}", path.display())]
    DumpRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A golden vtable dump does not follow the expected grammar
    #[error("malformed vtable dump at line {line}: {message}")]
    VtableFormat { line: usize, message: String },

    /// The library is not a loadable image the provider understands
    #[error("cannot introspect '{}': {message}", path.display())]
    Introspection { path: PathBuf, message: String },

    /// Lower-level parse failure reported by goblin
    #[error(transparent)]
    Goblin(#[from] goblin::error::Error),

    /// Internal dump grammar pattern failed to compile
    #[error("invalid dump pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The check cannot start (missing dump directory, unknown ABI, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn vtable_format(line: usize, message: impl Into<String>) -> Self {
        Error::VtableFormat {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn introspection(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Introspection {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole check
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Whether the scanner may record this error against a single library and move on
    pub fn is_recoverable(&self) -> bool {
        !self.is_configuration()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
