use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised while building or running a [`Module`](super::Module).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{layer} expects a rank-{expected} input but received shape {actual:?}")]
    RankMismatch {
        layer: &'static str,
        expected: usize,
        actual: Vec<usize>,
    },
    #[error("{layer} expects size {expected} on axis {axis} but received shape {actual:?}")]
    ShapeMismatch {
        layer: &'static str,
        axis: usize,
        expected: usize,
        actual: Vec<usize>,
    },
    #[error("{layer} received input with an empty axis {axis}: {actual:?}")]
    EmptyAxis {
        layer: &'static str,
        axis: usize,
        actual: Vec<usize>,
    },
    #[error("{layer} received invalid {name} = {value}")]
    InvalidHyperparameter {
        layer: &'static str,
        name: &'static str,
        value: String,
    },
    #[error(
        "{layer} input extent {extent} on axis {axis} is smaller than the effective kernel extent {kernel}"
    )]
    InputTooSmall {
        layer: &'static str,
        axis: usize,
        extent: usize,
        kernel: usize,
    },
}

impl ModelError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Self::RankMismatch { .. }
            | Self::EmptyAxis { .. }
            | Self::InvalidHyperparameter { .. }
            | Self::InputTooSmall { .. } => ErrorKind::InvalidArgument,
        }
    }
}
