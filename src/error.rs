//! Error types for tree mutation.
//!
//! Lookups never fail: a hostname with no registration (or one with too many
//! labels) is simply `None`. Only insertion can be refused.

use std::fmt;

use thiserror::Error;

/// Reasons an insertion is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SniError {
    /// The exact hostname already has a registration.
    #[error("hostname is already registered")]
    AlreadyExists,

    /// The hostname splits into more labels than the tree accepts.
    #[error("hostname has {count} labels, at most {max} are supported")]
    TooManyLabels {
        /// Labels in the rejected hostname.
        count: usize,
        /// Configured cap.
        max: usize,
    },
}

/// A refused insertion, carrying the value that was not stored.
///
/// The existing registration (if any) is left untouched, so the caller gets
/// the new value back to release or retry with.
pub struct InsertError<T> {
    error: SniError,
    value: T,
}

impl<T> InsertError<T> {
    pub(crate) fn new(error: SniError, value: T) -> Self {
        Self { error, value }
    }

    /// Why the insertion was refused.
    pub fn error(&self) -> SniError {
        self.error
    }

    /// Take back the rejected value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Split into the reason and the rejected value.
    pub fn into_parts(self) -> (SniError, T) {
        (self.error, self.value)
    }
}

impl<T> fmt::Debug for InsertError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for InsertError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<T> std::error::Error for InsertError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T> From<InsertError<T>> for SniError {
    fn from(err: InsertError<T>) -> Self {
        err.error
    }
}
