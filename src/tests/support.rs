use ndarray::IxDyn;

use crate::nn::{AxisParam, Module, Tensor, walk_modules};

#[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
#[must_use]
pub fn approx_eq(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() < tol
}

/// Builds a tensor of `shape` from a row-major buffer.
///
/// # Panics
///
/// Panics when `values.len()` does not match the product of `shape`.
#[must_use]
pub fn tensor(shape: &[usize], values: Vec<f32>) -> Tensor {
    Tensor::from_shape_vec(IxDyn(shape), values)
        .unwrap_or_else(|e| panic!("tensor buffer does not match shape {shape:?}: {e}"))
}

/// Strides of every stride-bearing module, in composition order.
#[must_use]
pub fn strides(graph: &dyn Module) -> Vec<AxisParam> {
    let mut out = Vec::new();
    walk_modules(graph, &mut |module| {
        if let Some(strided) = module.as_strided() {
            out.push(strided.stride());
        }
    });
    out
}

/// Dilations of every dilation-bearing module, in composition order.
#[must_use]
pub fn dilations(graph: &dyn Module) -> Vec<AxisParam> {
    let mut out = Vec::new();
    walk_modules(graph, &mut |module| {
        if let Some(dilated) = module.as_dilated() {
            out.push(dilated.dilation());
        }
    });
    out
}
