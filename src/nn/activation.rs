use super::{ModelError, Module, Tensor};

/// Rectified linear unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relu;

impl Module for Relu {
    fn type_name(&self) -> &'static str {
        "Relu"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        Ok(input.mapv(|value| value.max(0.0)))
    }
}
