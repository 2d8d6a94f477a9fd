use super::{ModelError, Module, Tensor};

/// Ordered container applying its layers one after another.
#[derive(Default)]
pub struct Sequential {
    layers: Vec<Box<dyn Module>>,
}

impl std::fmt::Debug for Sequential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.layers.iter().map(|layer| layer.type_name()).collect();
        f.debug_struct("Sequential").field("layers", &names).finish()
    }
}

impl Sequential {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer.
    pub fn push<M>(&mut self, layer: M)
    where
        M: Module + 'static,
    {
        self.layers.push(Box::new(layer));
    }

    /// Builder-style [`Sequential::push`].
    #[must_use]
    pub fn with<M>(mut self, layer: M) -> Self
    where
        M: Module + 'static,
    {
        self.push(layer);
        self
    }

    /// Number of direct layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` when the container holds no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Module for Sequential {
    fn type_name(&self) -> &'static str {
        "Sequential"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        let mut activ = input.clone();
        for layer in &self.layers {
            activ = layer.forward(&activ)?;
        }
        Ok(activ)
    }

    fn children(&self) -> Vec<&dyn Module> {
        self.layers.iter().map(|layer| &**layer as &dyn Module).collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Module> {
        self.layers
            .iter_mut()
            .map(|layer| &mut **layer as &mut dyn Module)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Ensure4d, Flatten, Linear, Relu};
    use crate::tests::support::tensor;
    use ndarray::array;

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn chains_layers_in_order() {
        let seq = Sequential::new()
            .with(Ensure4d)
            .with(Flatten)
            .with(Linear::from_weights(array![[1.0, -1.0]], None).expect("valid weights"))
            .with(Relu);
        let out = seq
            .forward(&tensor(&[2, 2], vec![3.0, 1.0, 1.0, 3.0]))
            .expect("forward");
        assert_eq!(out, tensor(&[2, 1], vec![2.0, 0.0]));
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn collects_nested_parameters() {
        let inner = Sequential::new().with(Linear::new(3, 2).expect("valid layer"));
        let outer = Sequential::new()
            .with(inner)
            .with(Linear::new(2, 1).expect("valid layer"));
        assert_eq!(outer.parameters().len(), 4);
        assert_eq!(outer.len(), 2);
    }

    #[test]
    fn empty_container_is_identity() {
        let seq = Sequential::new();
        let input = tensor(&[1, 2], vec![1.0, 2.0]);
        assert!(seq.is_empty());
        assert_eq!(seq.forward(&input), Ok(input));
    }
}
