//! Max and average pooling over the two trailing axes.
//!
//! `MaxPool2d` carries a dilation and therefore survives stride removal with
//! its receptive field intact. `AvgPool2d` has no dilation: once its stride is
//! removed it keeps averaging adjacent samples, so a converted model sees a
//! narrower window than the one it was trained with.

use ndarray::{Array4, ArrayView4, Ix4};

use super::{
    AxisParam, HasDilation, HasStride, ModelError, Module, Tensor, conv::output_extent,
    rank_check,
};

fn as_view4<'a>(layer: &'static str, input: &'a Tensor) -> Result<ArrayView4<'a, f32>, ModelError> {
    rank_check(layer, input, 4)?;
    input
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|_| ModelError::RankMismatch {
            layer,
            expected: 4,
            actual: input.shape().to_vec(),
        })
}

fn pooled_extent(
    layer: &'static str,
    input: &ArrayView4<'_, f32>,
    kernel: [usize; 2],
    stride: [usize; 2],
    dilation: [usize; 2],
) -> Result<[usize; 2], ModelError> {
    let (_, _, height, width) = input.dim();
    let extents = [height, width];
    let mut out = [0_usize; 2];
    for (axis, slot) in out.iter_mut().enumerate() {
        *slot = output_extent(extents[axis], 0, kernel[axis], stride[axis], dilation[axis])
            .ok_or(ModelError::InputTooSmall {
                layer,
                axis: axis + 2,
                extent: extents[axis],
                kernel: dilation[axis] * (kernel[axis] - 1) + 1,
            })?;
    }
    Ok(out)
}

/// Max pooling with stride and dilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxPool2d {
    kernel: [usize; 2],
    stride: AxisParam,
    dilation: AxisParam,
}

impl MaxPool2d {
    const LAYER: &'static str = "MaxPool2d";

    /// Creates a pool whose stride defaults to the kernel extent.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidHyperparameter`] for a zero kernel extent.
    pub fn new(kernel: impl Into<AxisParam>) -> Result<Self, ModelError> {
        let kernel = kernel.into();
        let pair = kernel.validated(Self::LAYER, "kernel")?;
        Ok(Self {
            kernel: pair,
            stride: kernel,
            dilation: AxisParam::UNIT,
        })
    }

    /// Builder-style stride override.
    #[must_use]
    pub fn with_stride(mut self, stride: impl Into<AxisParam>) -> Self {
        self.stride = stride.into();
        self
    }

    /// Builder-style dilation override.
    #[must_use]
    pub fn with_dilation(mut self, dilation: impl Into<AxisParam>) -> Self {
        self.dilation = dilation.into();
        self
    }
}

impl HasStride for MaxPool2d {
    fn stride(&self) -> AxisParam {
        self.stride
    }

    fn set_stride(&mut self, stride: AxisParam) {
        self.stride = stride;
    }
}

impl HasDilation for MaxPool2d {
    fn dilation(&self) -> AxisParam {
        self.dilation
    }

    fn set_dilation(&mut self, dilation: AxisParam) {
        self.dilation = dilation;
    }
}

impl Module for MaxPool2d {
    fn type_name(&self) -> &'static str {
        Self::LAYER
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        let x = as_view4(Self::LAYER, input)?;
        let stride = self.stride.validated(Self::LAYER, "stride")?;
        let dilation = self.dilation.validated(Self::LAYER, "dilation")?;
        let [out_h, out_w] = pooled_extent(Self::LAYER, &x, self.kernel, stride, dilation)?;
        let (batch, channels, _, _) = x.dim();
        let mut output = Array4::<f32>::zeros((batch, channels, out_h, out_w));
        for ((n, c, oh, ow), slot) in output.indexed_iter_mut() {
            let mut best = f32::NEG_INFINITY;
            for kh in 0..self.kernel[0] {
                for kw in 0..self.kernel[1] {
                    let value = x[[
                        n,
                        c,
                        oh * stride[0] + kh * dilation[0],
                        ow * stride[1] + kw * dilation[1],
                    ]];
                    best = best.max(value);
                }
            }
            *slot = best;
        }
        Ok(output.into_dyn())
    }

    fn as_strided(&self) -> Option<&dyn HasStride> {
        Some(self)
    }

    fn as_strided_mut(&mut self) -> Option<&mut dyn HasStride> {
        Some(self)
    }

    fn as_dilated(&self) -> Option<&dyn HasDilation> {
        Some(self)
    }

    fn as_dilated_mut(&mut self) -> Option<&mut dyn HasDilation> {
        Some(self)
    }
}

/// Average pooling with stride and no dilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvgPool2d {
    kernel: [usize; 2],
    stride: AxisParam,
}

impl AvgPool2d {
    const LAYER: &'static str = "AvgPool2d";

    /// Creates a pool whose stride defaults to the kernel extent.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidHyperparameter`] for a zero kernel extent.
    pub fn new(kernel: impl Into<AxisParam>) -> Result<Self, ModelError> {
        let kernel = kernel.into();
        let pair = kernel.validated(Self::LAYER, "kernel")?;
        Ok(Self {
            kernel: pair,
            stride: kernel,
        })
    }

    /// Builder-style stride override.
    #[must_use]
    pub fn with_stride(mut self, stride: impl Into<AxisParam>) -> Self {
        self.stride = stride.into();
        self
    }
}

impl HasStride for AvgPool2d {
    fn stride(&self) -> AxisParam {
        self.stride
    }

    fn set_stride(&mut self, stride: AxisParam) {
        self.stride = stride;
    }
}

impl Module for AvgPool2d {
    fn type_name(&self) -> &'static str {
        Self::LAYER
    }

    #[expect(clippy::float_arithmetic, reason = "averaging")]
    #[expect(clippy::cast_precision_loss, reason = "kernel area is small")]
    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        let x = as_view4(Self::LAYER, input)?;
        let stride = self.stride.validated(Self::LAYER, "stride")?;
        let [out_h, out_w] = pooled_extent(Self::LAYER, &x, self.kernel, stride, [1, 1])?;
        let (batch, channels, _, _) = x.dim();
        let area = (self.kernel[0] * self.kernel[1]) as f32;
        let mut output = Array4::<f32>::zeros((batch, channels, out_h, out_w));
        for ((n, c, oh, ow), slot) in output.indexed_iter_mut() {
            let mut total = 0.0;
            for kh in 0..self.kernel[0] {
                for kw in 0..self.kernel[1] {
                    total += x[[n, c, oh * stride[0] + kh, ow * stride[1] + kw]];
                }
            }
            *slot = total / area;
        }
        Ok(output.into_dyn())
    }

    fn as_strided(&self) -> Option<&dyn HasStride> {
        Some(self)
    }

    fn as_strided_mut(&mut self) -> Option<&mut dyn HasStride> {
        Some(self)
    }
}
