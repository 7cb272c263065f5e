//! Error types for the section language server core.

use std::sync::PoisonError;

use thiserror::Error;

use crate::document::Location;
use crate::reference::ResolutionError;

/// Errors surfaced by the document model.
#[derive(Debug, Error)]
pub enum Error {
    /// A line, column or offset argument was out of range. Always a caller bug.
    #[error("{argument} {value} out of bounds (valid: {valid})")]
    Bounds {
        argument: &'static str,
        value: usize,
        valid: String,
    },

    /// Interval construction with `start > end`.
    #[error("invalid interval: start {start} is after end {end}")]
    InvalidInterval { start: String, end: String },

    /// Operation on a document id that was never opened or is already closed.
    #[error("unknown document: {id}")]
    UnknownDocument { id: String },

    /// A reference could not be resolved against the given context.
    #[error("could not resolve reference at {location}: {reason}")]
    ResolutionFailed {
        location: Location,
        reason: ResolutionError,
    },

    /// A property was stored under a key with a different value type.
    #[error("property '{key}' does not hold a value of type {expected}")]
    PropertyType {
        key: String,
        expected: &'static str,
    },

    /// settings.toml could not be read or parsed.
    #[error("invalid settings: {message}")]
    Settings { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn bounds(argument: &'static str, value: usize, valid: impl Into<String>) -> Self {
        Error::Bounds {
            argument,
            value,
            valid: valid.into(),
        }
    }

    pub(crate) fn unknown_document(id: impl Into<String>) -> Self {
        Error::UnknownDocument { id: id.into() }
    }

    /// Whether the caller can recover by retrying or re-opening.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnknownDocument { .. } | Error::ResolutionFailed { .. }
        )
    }
}

/// Recover the guard from a poisoned lock instead of propagating the panic.
pub(crate) trait LockResultExt<T> {
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for std::result::Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "seclsp::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}
