//! Shape adapters between windowed signals and convolutional stacks.

use ndarray::{Array2, Axis};

use super::{ModelError, Module, Tensor};

/// Appends unit axes until the input has rank 4, turning a
/// `(batch, channels, time)` window into `(batch, channels, time, 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ensure4d;

impl Module for Ensure4d {
    fn type_name(&self) -> &'static str {
        "Ensure4d"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        if input.ndim() > 4 {
            return Err(ModelError::RankMismatch {
                layer: "Ensure4d",
                expected: 4,
                actual: input.shape().to_vec(),
            });
        }
        let mut output = input.clone();
        while output.ndim() < 4 {
            let last = output.ndim();
            output = output.insert_axis(Axis(last));
        }
        Ok(output)
    }
}

/// Collapses every axis after the batch axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flatten;

impl Module for Flatten {
    fn type_name(&self) -> &'static str {
        "Flatten"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        flatten_batch("Flatten", input).map(Array2::into_dyn)
    }
}

/// Reshapes `(batch, ...)` into `(batch, features)` in row-major order.
pub(crate) fn flatten_batch(layer: &'static str, input: &Tensor) -> Result<Array2<f32>, ModelError> {
    let Some(&batch) = input.shape().first() else {
        return Err(ModelError::RankMismatch {
            layer,
            expected: 1,
            actual: Vec::new(),
        });
    };
    let features = input.shape().iter().skip(1).product::<usize>();
    input
        .to_shape((batch, features))
        .map(|flat| flat.into_owned())
        .map_err(|_| ModelError::ShapeMismatch {
            layer,
            axis: 1,
            expected: features,
            actual: input.shape().to_vec(),
        })
}
