//! Error taxonomy shared by the arena's error slot and the library-level
//! `Result` surface.
//!
//! Each [`crate::arena::Arena`] owns its own error slot rather than a
//! thread-local one, since arenas here are explicit, user-owned objects.

use std::fmt;

/// Closed taxonomy of everything that can go wrong inside the arena,
/// compiler, or adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    None,
    Memory,
    InvalidType,
    OutOfBounds,
    UnsupportedOperation,
    InvalidArgument,
    Io,
    Parse,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::None => "none",
            ErrorKind::Memory => "memory",
            ErrorKind::InvalidType => "invalid_type",
            ErrorKind::OutOfBounds => "out_of_bounds",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Io => "io",
            ErrorKind::Parse => "parse",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A `{kind, message}` record, as produced by a failing arena operation or
/// compile step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ArenaError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ArenaError {
            kind,
            message: message.into(),
        }
    }

    /// The sentinel shared by every allocation failure.
    pub fn alloc_failed() -> Self {
        ArenaError::new(ErrorKind::Memory, "arena allocation failed")
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ArenaError {}

/// Library-level error for operations with no "degrade to false" answer:
/// registry setup and arena construction. The compiler and evaluator never
/// use this type; they report via the arena's error slot (`compile`) or are
/// total functions that never fail (`match`).
#[derive(Debug, thiserror::Error)]
pub enum MongoryError {
    #[error("operator {0:?} is already registered")]
    OperatorAlreadyRegistered(String),

    #[error("registry already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Arena(#[from] ArenaError),
}
