//! Minimal module layer the conversion and ensembling algorithms operate on.
//!
//! Tensors are `ndarray::ArrayD<f32>` in host memory. A network is any value
//! implementing [`Module`]; containers expose their sub-modules in
//! composition order through [`Module::children`] and
//! [`Module::children_mut`], and layers that carry a stride or a dilation
//! expose it through the optional [`HasStride`] / [`HasDilation`]
//! capabilities instead of being inspected by type.

mod activation;
mod conv;
mod dropout;
mod error;
mod linear;
mod pool;
mod reshape;
mod sequential;

use std::fmt;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

pub use activation::Relu;
pub use conv::Conv2d;
pub use dropout::Dropout;
pub use error::ModelError;
pub use linear::Linear;
pub use pool::{AvgPool2d, MaxPool2d};
pub use reshape::{Ensure4d, Flatten};
pub use sequential::Sequential;

pub(crate) use reshape::flatten_batch;

/// Dense `f32` tensor with a dynamic rank.
pub type Tensor = ArrayD<f32>;

/// Stride or dilation setting of a layer.
///
/// Layers accept a single value applied to both spatial axes or one value per
/// axis. Axis order matches the trailing two axes of a
/// `(batch, channels, axis2, axis3)` tensor.
///
/// # Examples
///
/// ```
/// use dense_windows::nn::AxisParam;
///
/// assert_eq!(AxisParam::Uniform(3).to_pair(), [3, 3]);
/// assert!(AxisParam::PerAxis([1, 1]).is_unit());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisParam {
    /// One value shared by both axes.
    Uniform(usize),
    /// One value per axis.
    PerAxis([usize; 2]),
}

impl AxisParam {
    /// Unit stride or dilation.
    pub const UNIT: Self = Self::Uniform(1);

    /// Expands the setting to one value per axis.
    #[must_use]
    pub const fn to_pair(self) -> [usize; 2] {
        match self {
            Self::Uniform(value) => [value, value],
            Self::PerAxis(pair) => pair,
        }
    }

    /// Returns `true` when every axis is 1.
    #[must_use]
    pub fn is_unit(self) -> bool {
        self.to_pair() == [1, 1]
    }

    pub(crate) fn validated(
        self,
        layer: &'static str,
        name: &'static str,
    ) -> Result<[usize; 2], ModelError> {
        let pair = self.to_pair();
        if pair.contains(&0) {
            Err(ModelError::InvalidHyperparameter {
                layer,
                name,
                value: self.to_string(),
            })
        } else {
            Ok(pair)
        }
    }
}

impl Default for AxisParam {
    fn default() -> Self {
        Self::UNIT
    }
}

impl From<usize> for AxisParam {
    fn from(value: usize) -> Self {
        Self::Uniform(value)
    }
}

impl From<[usize; 2]> for AxisParam {
    fn from(pair: [usize; 2]) -> Self {
        Self::PerAxis(pair)
    }
}

impl From<(usize, usize)> for AxisParam {
    fn from((first, second): (usize, usize)) -> Self {
        Self::PerAxis([first, second])
    }
}

impl fmt::Display for AxisParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform(value) => write!(f, "{value}"),
            Self::PerAxis([first, second]) => write!(f, "({first}, {second})"),
        }
    }
}

/// Capability of a layer that downsamples with a stride.
pub trait HasStride {
    /// Current stride.
    fn stride(&self) -> AxisParam;
    /// Replaces the stride.
    fn set_stride(&mut self, stride: AxisParam);
}

/// Capability of a layer whose kernel taps can be spread by a dilation.
pub trait HasDilation {
    /// Current dilation.
    fn dilation(&self) -> AxisParam;
    /// Replaces the dilation.
    fn set_dilation(&mut self, dilation: AxisParam);
}

/// Trainable tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    value: Tensor,
}

impl Parameter {
    /// Creates a parameter holding `value`.
    #[must_use]
    pub const fn new(value: Tensor) -> Self {
        Self { value }
    }

    /// Current value.
    #[must_use]
    pub const fn value(&self) -> &Tensor {
        &self.value
    }
}

/// Processing unit of a network.
///
/// Only [`Module::type_name`] and [`Module::forward`] are mandatory. Leaf
/// layers override [`Module::parameters`]; containers override the child
/// accessors and inherit parameter collection from them.
pub trait Module {
    /// Short, human-readable layer name used in logs and errors.
    fn type_name(&self) -> &'static str;

    /// Runs the layer on `input`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the input rank or sizes do not fit the
    /// layer configuration.
    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError>;

    /// Parameters of this module and all of its descendants.
    fn parameters(&self) -> Vec<&Parameter> {
        self.children()
            .into_iter()
            .flat_map(|child| child.parameters())
            .collect()
    }

    /// Direct sub-modules in composition order.
    fn children(&self) -> Vec<&dyn Module> {
        Vec::new()
    }

    /// Mutable direct sub-modules in composition order.
    fn children_mut(&mut self) -> Vec<&mut dyn Module> {
        Vec::new()
    }

    /// Switches between training and evaluation behaviour. Only this module
    /// is affected; use [`set_training`] to reach a whole graph.
    fn set_training(&mut self, _training: bool) {}

    /// Stride capability, when the layer has one.
    fn as_strided(&self) -> Option<&dyn HasStride> {
        None
    }

    /// Mutable stride capability, when the layer has one.
    fn as_strided_mut(&mut self) -> Option<&mut dyn HasStride> {
        None
    }

    /// Dilation capability, when the layer has one.
    fn as_dilated(&self) -> Option<&dyn HasDilation> {
        None
    }

    /// Mutable dilation capability, when the layer has one.
    fn as_dilated_mut(&mut self) -> Option<&mut dyn HasDilation> {
        None
    }
}

/// Visits `module` and every descendant, depth first, each container before
/// its children.
pub fn walk_modules(module: &dyn Module, visitor: &mut dyn FnMut(&dyn Module)) {
    visitor(module);
    for child in module.children() {
        walk_modules(child, visitor);
    }
}

/// Mutable counterpart of [`walk_modules`]. Stops at the first error.
///
/// # Errors
///
/// Propagates the first error returned by `visitor`.
pub fn walk_modules_mut<E>(
    module: &mut dyn Module,
    visitor: &mut dyn FnMut(&mut dyn Module) -> Result<(), E>,
) -> Result<(), E> {
    visitor(&mut *module)?;
    for child in module.children_mut() {
        walk_modules_mut(child, visitor)?;
    }
    Ok(())
}

/// Applies training or evaluation mode to every module of a graph.
pub fn set_training(module: &mut dyn Module, training: bool) {
    let _ = walk_modules_mut::<std::convert::Infallible>(module, &mut |layer| {
        layer.set_training(training);
        Ok(())
    });
}

pub(crate) fn rank_check(
    layer: &'static str,
    input: &Tensor,
    expected: usize,
) -> Result<(), ModelError> {
    if input.ndim() == expected {
        Ok(())
    } else {
        Err(ModelError::RankMismatch {
            layer,
            expected,
            actual: input.shape().to_vec(),
        })
    }
}
