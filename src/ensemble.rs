//! Sequence-to-prediction wrapper that classifies a run of windows at once.
//!
//! Each window of a `(batch, n_windows, channels, time)` input goes through
//! the same feature extractor. The per-window features are flattened and
//! concatenated in window order, so the head sees window 0's features first.
//! That order is part of the trained model and must not change at inference.

use ndarray::{Array2, Axis, concatenate};
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, WindowedEnsembleConfig};
use crate::error::ErrorKind;
use crate::nn::{Dropout, Linear, ModelError, Module, Sequential, Tensor, flatten_batch, rank_check};

const LAYER: &str = "WindowedEnsemble";

/// Errors raised while building a [`WindowedEnsemble`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnsembleError {
    /// The head configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The head layers rejected the configuration.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl EnsembleError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(err) => err.kind(),
            Self::Model(err) => err.kind(),
        }
    }
}

/// Runs a feature extractor over every window of a sequence and classifies
/// the concatenated features.
pub struct WindowedEnsemble {
    feature_extractor: Box<dyn Module>,
    classifier: Box<dyn Module>,
}

impl std::fmt::Debug for WindowedEnsemble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedEnsemble")
            .field("feature_extractor", &self.feature_extractor.type_name())
            .field("classifier", &self.classifier.type_name())
            .finish()
    }
}

impl WindowedEnsemble {
    /// Wraps an extractor and an explicit classifier head.
    #[must_use]
    pub fn new(feature_extractor: Box<dyn Module>, classifier: Box<dyn Module>) -> Self {
        Self {
            feature_extractor,
            classifier,
        }
    }

    /// Wraps an extractor with the default head: dropout followed by a linear
    /// projection from `feature_size * n_windows` to `n_classes`.
    ///
    /// The head starts in evaluation mode, so dropout is inactive until
    /// [`set_training`](crate::nn::set_training) switches the model to
    /// training.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::Config`] when `config` fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use dense_windows::config::WindowedEnsembleConfig;
    /// use dense_windows::ensemble::WindowedEnsemble;
    /// use dense_windows::nn::{Flatten, Module, Tensor};
    ///
    /// let config = WindowedEnsembleConfig::new(6, 3, 4);
    /// let model = WindowedEnsemble::with_linear_head(Box::new(Flatten), &config)
    ///     .expect("valid config");
    /// let input = Tensor::ones(ndarray::IxDyn(&[2, 3, 2, 3]));
    /// let scores = model.forward(&input).expect("forward");
    /// assert_eq!(scores.shape(), &[2, 4]);
    /// ```
    pub fn with_linear_head(
        feature_extractor: Box<dyn Module>,
        config: &WindowedEnsembleConfig,
    ) -> Result<Self, EnsembleError> {
        let config = config.validate()?;
        let in_features = config
            .feature_size
            .checked_mul(config.n_windows)
            .ok_or(ModelError::InvalidHyperparameter {
                layer: "Linear",
                name: "in_features",
                value: format!("{} * {}", config.feature_size, config.n_windows),
            })?;
        let classifier = Sequential::new()
            .with(Dropout::new(config.dropout)?)
            .with(Linear::new(in_features, config.n_classes)?);
        debug!(
            extractor = feature_extractor.type_name(),
            in_features,
            n_classes = config.n_classes,
            dropout = config.dropout,
            "built linear head"
        );
        Ok(Self::new(feature_extractor, Box::new(classifier)))
    }

    /// The per-window feature extractor.
    #[must_use]
    pub fn feature_extractor(&self) -> &dyn Module {
        &*self.feature_extractor
    }

    /// The head applied to the concatenated features.
    #[must_use]
    pub fn classifier(&self) -> &dyn Module {
        &*self.classifier
    }

    fn window_features(&self, input: &Tensor) -> Result<Array2<f32>, ModelError> {
        let features = input
            .axis_iter(Axis(1))
            .map(|window| {
                let window = window.to_owned();
                let feats = self.feature_extractor.forward(&window)?;
                flatten_batch(LAYER, &feats)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let views: Vec<_> = features.iter().map(Array2::view).collect();
        concatenate(Axis(1), &views).map_err(|_| ModelError::ShapeMismatch {
            layer: LAYER,
            axis: 1,
            expected: features.first().map_or(0, |first| first.ncols()),
            actual: features.iter().map(Array2::ncols).collect(),
        })
    }
}

impl Module for WindowedEnsemble {
    fn type_name(&self) -> &'static str {
        LAYER
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        rank_check(LAYER, input, 4)?;
        if input.len_of(Axis(1)) == 0 {
            return Err(ModelError::EmptyAxis {
                layer: LAYER,
                axis: 1,
                actual: input.shape().to_vec(),
            });
        }
        let features = self.window_features(input)?;
        self.classifier.forward(&features.into_dyn())
    }

    fn children(&self) -> Vec<&dyn Module> {
        vec![&*self.feature_extractor, &*self.classifier]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Module> {
        vec![
            &mut *self.feature_extractor as &mut dyn Module,
            &mut *self.classifier as &mut dyn Module,
        ]
    }
}
