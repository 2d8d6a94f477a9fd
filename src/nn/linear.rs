use ndarray::{Array1, Array2, Axis, Ix1, Ix2};
use rand::Rng;

use super::{ModelError, Module, Parameter, Tensor, rank_check};

const LAYER: &str = "Linear";

/// Affine projection `x · Wᵀ + b` over `(batch, in_features)` inputs.
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Parameter,
    bias: Option<Parameter>,
}

impl Linear {
    /// Creates a layer with Kaiming-uniform weight and bias.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidHyperparameter`] when either feature count
    /// is zero.
    #[expect(clippy::float_arithmetic, reason = "initialisation bound")]
    #[expect(
        clippy::cast_precision_loss,
        reason = "feature counts are far below f32 precision limits"
    )]
    pub fn new(in_features: usize, out_features: usize) -> Result<Self, ModelError> {
        for (name, value) in [("in_features", in_features), ("out_features", out_features)] {
            if value == 0 {
                return Err(ModelError::InvalidHyperparameter {
                    layer: LAYER,
                    name,
                    value: value.to_string(),
                });
            }
        }
        let bound = 1.0 / (in_features as f32).sqrt();
        let mut rng = rand::rng();
        let weight = Array2::from_shape_simple_fn((out_features, in_features), || {
            rng.random_range(-bound..bound)
        });
        let bias = Array1::from_shape_simple_fn(out_features, || rng.random_range(-bound..bound));
        Self::from_weights(weight, Some(bias))
    }

    /// Creates a layer from a `(out_features, in_features)` weight and an
    /// optional bias of length `out_features`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the weight has an empty axis or the bias
    /// length disagrees with `out_features`.
    pub fn from_weights(weight: Array2<f32>, bias: Option<Array1<f32>>) -> Result<Self, ModelError> {
        let (out_features, in_features) = weight.dim();
        if out_features == 0 || in_features == 0 {
            return Err(ModelError::EmptyAxis {
                layer: LAYER,
                axis: usize::from(out_features != 0),
                actual: weight.shape().to_vec(),
            });
        }
        if let Some(bias) = &bias {
            if bias.len() != out_features {
                return Err(ModelError::ShapeMismatch {
                    layer: LAYER,
                    axis: 0,
                    expected: out_features,
                    actual: bias.shape().to_vec(),
                });
            }
        }
        Ok(Self {
            weight: Parameter::new(weight.into_dyn()),
            bias: bias.map(|bias| Parameter::new(bias.into_dyn())),
        })
    }

    /// Number of input features.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.weight.value().len_of(Axis(1))
    }
}

impl Module for Linear {
    fn type_name(&self) -> &'static str {
        LAYER
    }

    #[expect(clippy::float_arithmetic, reason = "bias addition")]
    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        rank_check(LAYER, input, 2)?;
        if input.len_of(Axis(1)) != self.in_features() {
            return Err(ModelError::ShapeMismatch {
                layer: LAYER,
                axis: 1,
                expected: self.in_features(),
                actual: input.shape().to_vec(),
            });
        }
        let rank_error = |actual: &[usize], expected| ModelError::RankMismatch {
            layer: LAYER,
            expected,
            actual: actual.to_vec(),
        };
        let x = input
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| rank_error(input.shape(), 2))?;
        let weight = self
            .weight
            .value()
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| rank_error(self.weight.value().shape(), 2))?;
        let mut output = x.dot(&weight.t());
        if let Some(bias) = &self.bias {
            let bias = bias
                .value()
                .view()
                .into_dimensionality::<Ix1>()
                .map_err(|_| rank_error(bias.value().shape(), 1))?;
            output += &bias;
        }
        Ok(output.into_dyn())
    }

    fn parameters(&self) -> Vec<&Parameter> {
        std::iter::once(&self.weight).chain(self.bias.as_ref()).collect()
    }
}
