//! Serialisable settings for aggregation and the windowed ensemble head.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised by the `validate` methods in this module.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// `n_windows_stride` is zero.
    #[error("n_windows_stride must be greater than 0")]
    ZeroStride,
    /// A size field is zero.
    #[error("{field} must be greater than 0")]
    ZeroSize { field: &'static str },
    /// `dropout` lies outside `[0, 1)`.
    #[error("dropout must lie in [0, 1), got {value}")]
    DropoutOutOfRange { value: f32 },
}

impl ConfigError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

/// Settings for [`aggregate_probas`](crate::aggregate::aggregate_probas).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationConfig {
    /// Windows between the starts of consecutive sequences; must be greater
    /// than zero.
    #[serde(default = "default_stride")]
    pub n_windows_stride: usize,
}

const fn default_stride() -> usize {
    1
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            n_windows_stride: default_stride(),
        }
    }
}

impl AggregationConfig {
    /// Ensure the configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroStride`] if `n_windows_stride` is zero.
    #[must_use = "Validation should not be ignored"]
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.n_windows_stride == 0 {
            Err(ConfigError::ZeroStride)
        } else {
            Ok(self)
        }
    }
}

/// Settings for the default head of
/// [`WindowedEnsemble`](crate::ensemble::WindowedEnsemble).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowedEnsembleConfig {
    /// Flattened feature count produced by the extractor for one window.
    pub feature_size: usize,
    /// Windows per input sequence.
    pub n_windows: usize,
    /// Output classes.
    pub n_classes: usize,
    /// Dropout rate applied before the linear projection.
    #[serde(default = "default_dropout")]
    pub dropout: f32,
}

const fn default_dropout() -> f32 {
    0.25
}

impl WindowedEnsembleConfig {
    /// Creates a configuration with the default dropout rate.
    #[must_use]
    pub const fn new(feature_size: usize, n_windows: usize, n_classes: usize) -> Self {
        Self {
            feature_size,
            n_windows,
            n_classes,
            dropout: default_dropout(),
        }
    }

    /// Ensure the configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroSize`] for a zero size field and
    /// [`ConfigError::DropoutOutOfRange`] unless `0 <= dropout < 1`.
    #[must_use = "Validation should not be ignored"]
    pub fn validate(self) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("feature_size", self.feature_size),
            ("n_windows", self.n_windows),
            ("n_classes", self.n_classes),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroSize { field });
            }
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::DropoutOutOfRange {
                value: self.dropout,
            });
        }
        Ok(self)
    }
}
