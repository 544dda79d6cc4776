//! Error types for the dictionary storage engine

use std::path::PathBuf;
use thiserror::Error;

/// Dictionary storage errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read ran past the end of the file. Distinct from [`Error::Io`] so
    /// that a truncated file is reported as such rather than as a generic
    /// I/O failure.
    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("{} exists but is not a regular file", .0.display())]
    NotARegularFile(PathBuf),

    #[error("{} does not exist, not creating", .0.display())]
    DoesNotExist(PathBuf),

    /// An on-disk structure failed an integrity check.
    #[error("{0}; file may be corrupted")]
    Corrupt(&'static str),

    #[error("definition hash does not match; file may be corrupted")]
    HashMismatch,

    /// Attempted to store a definition with an empty body. The record
    /// format reserves a size of zero for "no record".
    #[error("definition must not be empty")]
    EmptyDefinition,

    /// Duplicate words were found among entries inserted with duplicate
    /// checking skipped. This is a caller bug, not file corruption.
    #[error("repeated words were inserted with duplicate checking skipped")]
    PendingDuplicates,
}

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, Error>;
