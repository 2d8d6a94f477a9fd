//! Output-geometry probe.

use ndarray::IxDyn;
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;
use crate::nn::{ModelError, Module, Tensor};

/// Errors raised by [`output_shape`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The model has no parameters to infer precision and placement from.
    #[error("{type_name} has no parameters; cannot infer input precision")]
    NoParameters { type_name: &'static str },
    /// The forward pass failed.
    #[error(transparent)]
    Forward(#[from] ModelError),
}

impl ProbeError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoParameters { .. } => ErrorKind::InvalidState,
            Self::Forward(err) => err.kind(),
        }
    }
}

/// Runs `model` once on an all-ones `(1, in_chans, input_window_samples)`
/// input and returns the output shape.
///
/// Tensors in this crate are `f32` in host memory, so the parameter check is
/// what remains of the precision and placement inference.
///
/// # Errors
///
/// Returns [`ProbeError::NoParameters`] for a parameterless model and
/// [`ProbeError::Forward`] when the forward pass rejects the input.
///
/// # Examples
///
/// ```
/// use dense_windows::nn::{Conv2d, Ensure4d, Sequential};
/// use dense_windows::probe::output_shape;
///
/// let net = Sequential::new()
///     .with(Ensure4d)
///     .with(Conv2d::new(3, 8, (5, 1)).expect("valid conv"));
/// let shape = output_shape(&net, 3, 100).expect("probe");
/// assert_eq!(shape, [1, 8, 96, 1]);
/// ```
pub fn output_shape(
    model: &dyn Module,
    in_chans: usize,
    input_window_samples: usize,
) -> Result<Vec<usize>, ProbeError> {
    if model.parameters().is_empty() {
        return Err(ProbeError::NoParameters {
            type_name: model.type_name(),
        });
    }
    let input = Tensor::ones(IxDyn(&[1, in_chans, input_window_samples]));
    let output = model.forward(&input)?;
    let shape = output.shape().to_vec();
    debug!(
        model = model.type_name(),
        in_chans,
        input_window_samples,
        output_shape = ?shape,
        "probed output shape"
    );
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Conv2d, Ensure4d, Flatten, Relu, Sequential};

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn parameterless_model_is_rejected() {
        let net = Sequential::new().with(Ensure4d).with(Relu);
        let err = output_shape(&net, 2, 10).expect_err("no parameters");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn reports_flattened_shape() {
        let net = Sequential::new()
            .with(Ensure4d)
            .with(Conv2d::new(2, 4, (3, 1)).expect("valid conv"))
            .with(Flatten);
        assert_eq!(output_shape(&net, 2, 10), Ok(vec![1, 32]));
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn forwards_model_errors() {
        let net = Sequential::new()
            .with(Ensure4d)
            .with(Conv2d::new(2, 4, (9, 1)).expect("valid conv"));
        let err = output_shape(&net, 2, 5).expect_err("window shorter than kernel");
        assert!(matches!(
            err,
            ProbeError::Forward(ModelError::InputTooSmall { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
