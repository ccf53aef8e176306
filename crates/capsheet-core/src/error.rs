//! Error types for capsheet-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in capsheet-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index out of bounds
    #[error("Row index {0} out of bounds (max: {1})")]
    RowOutOfBounds(u32, u32),

    /// Column index out of bounds
    #[error("Column index {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(u16, u16),

    /// Symbol looked up before anything was registered under it
    #[error("Unregistered symbol: {0}")]
    UnregisteredSymbol(String),

    /// Symbol registered twice with different locations
    #[error("Symbol {key} already registered at {existing}, refusing {attempted}")]
    SymbolConflict {
        key: String,
        existing: String,
        attempted: String,
    },

    /// Symbol belongs to a round whose registration pass has not completed.
    ///
    /// Distinct from [`Error::UnregisteredSymbol`] so callers can tell an
    /// assembly-order bug from a data bug.
    #[error("Round '{round}' is declared but not yet registered (while resolving {key})")]
    RoundNotRegistered { round: String, key: String },

    /// Round referenced by name but absent from the document
    #[error("Round not found: {0}")]
    RoundNotFound(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
