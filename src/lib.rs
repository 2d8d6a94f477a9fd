//! Dense prediction from window-trained convolutional networks.
//!
//! [`convert::to_dense_prediction_model`] rewrites a strided network so it
//! emits one prediction per input timestep, [`aggregate::aggregate_probas`]
//! merges overlapping sequence predictions into one log-probability stream,
//! and [`ensemble::WindowedEnsemble`] classifies a run of windows from their
//! concatenated features. [`probe::output_shape`] reports the output geometry
//! of a network for a given window.

pub mod aggregate;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod convert;
pub mod ensemble;
pub mod error;
pub mod nn;
pub mod probe;

pub use aggregate::{AggregationError, aggregate_probas};
#[cfg(feature = "cli")]
pub use cli::DensepArgs;
pub use config::{AggregationConfig, ConfigError, WindowedEnsembleConfig};
pub use convert::{ConversionError, DEFAULT_AXES, to_dense_prediction_model};
pub use ensemble::{EnsembleError, WindowedEnsemble};
pub use error::ErrorKind;
pub use nn::{AxisParam, ModelError, Module, Tensor};
pub use probe::{ProbeError, output_shape};

pub mod tests;
