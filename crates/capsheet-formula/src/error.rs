//! Formula error types
//!
//! Resolution failures are programmer/input errors: they carry enough context
//! (round, holder, placeholder) to debug, and they are never converted into a
//! zero or an empty formula. Arithmetic edge cases never surface here; those
//! degrade inside the emitted formula text itself.

use std::fmt;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while compiling a formula
#[derive(Debug, Error)]
pub enum FormulaError {
    /// The encoding object itself is unusable (empty template, duplicate
    /// dependency entries)
    #[error("Malformed formula encoding: {0}")]
    MalformedEncoding(String),

    /// A template placeholder has no dependency entry
    #[error("No dependency entry for placeholder '{placeholder}'{context}")]
    MissingDependency {
        placeholder: String,
        context: ResolveContext,
    },

    /// A dependency's symbol could not be resolved against the registry
    #[error("Cannot resolve placeholder '{placeholder}'{context}: {source}")]
    Placeholder {
        placeholder: String,
        context: ResolveContext,
        #[source]
        source: capsheet_core::Error,
    },

    /// A direct reference could not be resolved against the registry
    #[error("Cannot resolve reference{context}: {source}")]
    Reference {
        context: ResolveContext,
        #[source]
        source: capsheet_core::Error,
    },
}

/// Where in the document a resolution was happening
///
/// Attached to every resolution error so an unknown symbol points at the
/// round/holder being compiled, not just at itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveContext {
    pub round: Option<String>,
    pub holder: Option<String>,
    /// Structured references resolve to `[#This Row]` scope when set
    pub current_row: bool,
}

impl ResolveContext {
    /// Context for compiling a round-level formula
    pub fn round(round: impl Into<String>) -> Self {
        Self {
            round: Some(round.into()),
            ..Self::default()
        }
    }

    /// Context for compiling one holder's cell within a round
    pub fn cell(round: impl Into<String>, holder: impl Into<String>) -> Self {
        Self {
            round: Some(round.into()),
            holder: Some(holder.into()),
            current_row: false,
        }
    }

    /// Same context, scoped to the current table row
    pub fn current_row(mut self) -> Self {
        self.current_row = true;
        self
    }
}

impl fmt::Display for ResolveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.round, &self.holder) {
            (Some(round), Some(holder)) => write!(f, " (round '{}', holder '{}')", round, holder),
            (Some(round), None) => write!(f, " (round '{}')", round),
            (None, Some(holder)) => write!(f, " (holder '{}')", holder),
            (None, None) => Ok(()),
        }
    }
}
