//! Shared error classification.
//!
//! Every component reports failures through its own `thiserror` enum. Each of
//! those enums maps its variants onto [`ErrorKind`] so callers can branch on
//! the class of failure without matching every variant.

use std::fmt;

/// Broad class of a failure raised by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller passed a value outside the accepted domain.
    InvalidArgument,
    /// The input is well formed but its current state forbids the operation.
    InvalidState,
    /// The input has a layout the operation does not implement.
    NotSupported,
    /// Tensor sizes disagree between two collaborating modules.
    ShapeMismatch,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidArgument => "invalid argument",
            Self::InvalidState => "invalid state",
            Self::NotSupported => "not supported",
            Self::ShapeMismatch => "shape mismatch",
        };
        f.write_str(label)
    }
}
