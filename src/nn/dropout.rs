use rand::Rng;

use super::{ModelError, Module, Tensor};

const LAYER: &str = "Dropout";

/// Inverted dropout. Identity in evaluation mode, which is the default.
#[derive(Debug, Clone, PartialEq)]
pub struct Dropout {
    rate: f32,
    training: bool,
}

impl Dropout {
    /// Creates a dropout layer in evaluation mode.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidHyperparameter`] unless `0 <= rate < 1`.
    pub fn new(rate: f32) -> Result<Self, ModelError> {
        if (0.0..1.0).contains(&rate) {
            Ok(Self {
                rate,
                training: false,
            })
        } else {
            Err(ModelError::InvalidHyperparameter {
                layer: LAYER,
                name: "rate",
                value: rate.to_string(),
            })
        }
    }
}

impl Module for Dropout {
    fn type_name(&self) -> &'static str {
        LAYER
    }

    #[expect(clippy::float_arithmetic, reason = "inverted dropout rescaling")]
    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        if !self.training || self.rate == 0.0 {
            return Ok(input.clone());
        }
        let keep = 1.0 - self.rate;
        let mut rng = rand::rng();
        Ok(input.mapv(|value| {
            if rng.random::<f32>() < self.rate {
                0.0
            } else {
                value / keep
            }
        }))
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
