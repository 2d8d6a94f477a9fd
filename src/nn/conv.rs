use ndarray::{Array1, Array4, ArrayView4, Axis, Ix1, Ix4};
use rand::Rng;

use super::{
    AxisParam, HasDilation, HasStride, ModelError, Module, Parameter, Tensor, rank_check,
};

const LAYER: &str = "Conv2d";

/// Two-dimensional cross-correlation over `(batch, channels, axis2, axis3)`
/// inputs with configurable stride, dilation and zero padding.
///
/// Output extent per axis is
/// `(extent + 2 * padding - dilation * (kernel - 1) - 1) / stride + 1`.
#[derive(Debug, Clone)]
pub struct Conv2d {
    weight: Parameter,
    bias: Option<Parameter>,
    kernel: [usize; 2],
    stride: AxisParam,
    dilation: AxisParam,
    padding: [usize; 2],
}

impl Conv2d {
    /// Creates a convolution with Kaiming-uniform weights and bias, unit
    /// stride, unit dilation and no padding.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidHyperparameter`] when a channel count or
    /// kernel extent is zero.
    #[expect(clippy::float_arithmetic, reason = "initialisation bound")]
    #[expect(
        clippy::cast_precision_loss,
        reason = "fan-in is far below f32 precision limits"
    )]
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: impl Into<AxisParam>,
    ) -> Result<Self, ModelError> {
        let kernel = kernel.into().validated(LAYER, "kernel")?;
        positive("in_channels", in_channels)?;
        positive("out_channels", out_channels)?;
        let fan_in = in_channels * kernel[0] * kernel[1];
        let bound = 1.0 / (fan_in as f32).sqrt();
        let mut rng = rand::rng();
        let weight = Array4::from_shape_simple_fn(
            (out_channels, in_channels, kernel[0], kernel[1]),
            || rng.random_range(-bound..bound),
        );
        let bias = Array1::from_shape_simple_fn(out_channels, || rng.random_range(-bound..bound));
        Self::from_weights(weight, Some(bias))
    }

    /// Creates a convolution from explicit weights shaped
    /// `(out_channels, in_channels, kernel_axis2, kernel_axis3)` and an
    /// optional bias of length `out_channels`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the weight has an empty axis or the bias
    /// length disagrees with the output channels.
    pub fn from_weights(weight: Array4<f32>, bias: Option<Array1<f32>>) -> Result<Self, ModelError> {
        let (out_channels, in_channels, kernel_h, kernel_w) = weight.dim();
        if out_channels == 0 || in_channels == 0 || kernel_h == 0 || kernel_w == 0 {
            return Err(ModelError::EmptyAxis {
                layer: LAYER,
                axis: weight.shape().iter().position(|&n| n == 0).unwrap_or(0),
                actual: weight.shape().to_vec(),
            });
        }
        if let Some(bias) = &bias {
            if bias.len() != out_channels {
                return Err(ModelError::ShapeMismatch {
                    layer: LAYER,
                    axis: 0,
                    expected: out_channels,
                    actual: bias.shape().to_vec(),
                });
            }
        }
        Ok(Self {
            weight: Parameter::new(weight.into_dyn()),
            bias: bias.map(|bias| Parameter::new(bias.into_dyn())),
            kernel: [kernel_h, kernel_w],
            stride: AxisParam::UNIT,
            dilation: AxisParam::UNIT,
            padding: [0, 0],
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

    /// Builder-style zero padding applied symmetrically per axis.
    #[must_use]
    pub fn with_padding(mut self, padding: [usize; 2]) -> Self {
        self.padding = padding;
        self
    }

    fn in_channels(&self) -> usize {
        self.weight.value().len_of(Axis(1))
    }

    fn out_channels(&self) -> usize {
        self.weight.value().len_of(Axis(0))
    }
}

fn positive(name: &'static str, value: usize) -> Result<(), ModelError> {
    if value == 0 {
        Err(ModelError::InvalidHyperparameter {
            layer: LAYER,
            name,
            value: value.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Number of output positions along one axis, or `None` when the padded
/// input is shorter than the dilated kernel.
pub(super) fn output_extent(
    extent: usize,
    padding: usize,
    kernel: usize,
    stride: usize,
    dilation: usize,
) -> Option<usize> {
    let padded = extent + 2 * padding;
    let effective = dilation * (kernel - 1) + 1;
    padded
        .checked_sub(effective)
        .map(|span| span / stride + 1)
}

impl HasStride for Conv2d {
    fn stride(&self) -> AxisParam {
        self.stride
    }

    fn set_stride(&mut self, stride: AxisParam) {
        self.stride = stride;
    }
}

impl HasDilation for Conv2d {
    fn dilation(&self) -> AxisParam {
        self.dilation
    }

    fn set_dilation(&mut self, dilation: AxisParam) {
        self.dilation = dilation;
    }
}

impl Module for Conv2d {
    fn type_name(&self) -> &'static str {
        LAYER
    }

    #[expect(clippy::float_arithmetic, reason = "convolution accumulates in f32")]
    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        rank_check(LAYER, input, 4)?;
        let stride = self.stride.validated(LAYER, "stride")?;
        let dilation = self.dilation.validated(LAYER, "dilation")?;
        let x: ArrayView4<'_, f32> = input
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| ModelError::RankMismatch {
                layer: LAYER,
                expected: 4,
                actual: input.shape().to_vec(),
            })?;
        let (batch, channels, height, width) = x.dim();
        if channels != self.in_channels() {
            return Err(ModelError::ShapeMismatch {
                layer: LAYER,
                axis: 1,
                expected: self.in_channels(),
                actual: input.shape().to_vec(),
            });
        }
        let extents = [height, width];
        let mut out_extent = [0_usize; 2];
        for (axis, slot) in out_extent.iter_mut().enumerate() {
            let (extent, pad, kernel, step, dil) = (
                extents[axis],
                self.padding[axis],
                self.kernel[axis],
                stride[axis],
                dilation[axis],
            );
            *slot = output_extent(extent, pad, kernel, step, dil).ok_or(
                ModelError::InputTooSmall {
                    layer: LAYER,
                    axis: axis + 2,
                    extent: extent + 2 * pad,
                    kernel: dil * (kernel - 1) + 1,
                },
            )?;
        }

        let weight = self
            .weight
            .value()
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| ModelError::RankMismatch {
                layer: LAYER,
                expected: 4,
                actual: self.weight.value().shape().to_vec(),
            })?;
        let bias = self
            .bias
            .as_ref()
            .map(|bias| bias.value().view().into_dimensionality::<Ix1>())
            .transpose()
            .map_err(|_| ModelError::RankMismatch {
                layer: LAYER,
                expected: 1,
                actual: Vec::new(),
            })?;

        let [pad_h, pad_w] = self.padding;
        let mut output = Array4::<f32>::zeros((
            batch,
            self.out_channels(),
            out_extent[0],
            out_extent[1],
        ));
        for ((n, o, oh, ow), slot) in output.indexed_iter_mut() {
            let mut acc = bias.as_ref().map_or(0.0, |bias| bias[o]);
            for c in 0..channels {
                for kh in 0..self.kernel[0] {
                    let ih = oh * stride[0] + kh * dilation[0];
                    if ih < pad_h || ih - pad_h >= height {
                        continue;
                    }
                    for kw in 0..self.kernel[1] {
                        let iw = ow * stride[1] + kw * dilation[1];
                        if iw < pad_w || iw - pad_w >= width {
                            continue;
                        }
                        acc += weight[[o, c, kh, kw]] * x[[n, c, ih - pad_h, iw - pad_w]];
                    }
                }
            }
            *slot = acc;
        }
        Ok(output.into_dyn())
    }

    fn parameters(&self) -> Vec<&Parameter> {
        std::iter::once(&self.weight).chain(self.bias.as_ref()).collect()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::tensor;
    use ndarray::{Array, IxDyn};
    use rstest::rstest;

    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn ones_kernel(kernel: [usize; 2]) -> Conv2d {
        Conv2d::from_weights(Array4::ones((1, 1, kernel[0], kernel[1])), None)
            .expect("valid weights")
    }

    fn ramp(length: usize) -> Tensor {
        #[expect(clippy::cast_precision_loss, reason = "small test ramp")]
        let values = (0..length).map(|i| i as f32).collect();
        tensor(&[1, 1, length, 1], values)
    }

    #[rstest]
    #[case(10, 0, 3, 1, 1, Some(8))]
    #[case(10, 0, 3, 2, 1, Some(4))]
    #[case(10, 0, 3, 1, 2, Some(6))]
    #[case(10, 1, 3, 1, 1, Some(10))]
    #[case(2, 0, 3, 1, 1, None)]
    fn computes_output_extent(
        #[case] extent: usize,
        #[case] padding: usize,
        #[case] kernel: usize,
        #[case] stride: usize,
        #[case] dilation: usize,
        #[case] expected: Option<usize>,
    ) {
        assert_eq!(
            output_extent(extent, padding, kernel, stride, dilation),
            expected
        );
    }

    #[test]
    fn sums_window_along_first_axis() {
        let conv = ones_kernel([3, 1]);
        #[expect(clippy::expect_used, reason = "test should fail loudly")]
        let out = conv.forward(&ramp(5)).expect("forward");
        assert_eq!(out.shape(), &[1, 1, 3, 1]);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), [3.0, 6.0, 9.0]);
    }

    #[test]
    fn stride_skips_positions() {
        let conv = ones_kernel([3, 1]).with_stride((2, 1));
        #[expect(clippy::expect_used, reason = "test should fail loudly")]
        let out = conv.forward(&ramp(7)).expect("forward");
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), [3.0, 9.0, 15.0]);
    }

    #[test]
    fn dilation_spreads_taps() {
        let conv = ones_kernel([2, 1]).with_dilation((3, 1));
        #[expect(clippy::expect_used, reason = "test should fail loudly")]
        let out = conv.forward(&ramp(5)).expect("forward");
        // taps at t and t + 3
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), [3.0, 5.0]);
    }

    #[test]
    fn padding_adds_zero_border() {
        let conv = ones_kernel([3, 1]).with_padding([1, 0]);
        #[expect(clippy::expect_used, reason = "test should fail loudly")]
        let out = conv.forward(&ramp(3)).expect("forward");
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), [1.0, 3.0, 3.0]);
    }

    #[test]
    fn bias_is_added_per_output_channel() {
        #[expect(clippy::expect_used, reason = "test should fail loudly")]
        let conv = Conv2d::from_weights(
            Array4::zeros((2, 1, 1, 1)),
            Some(Array::from_vec(vec![0.5, -1.0])),
        )
        .expect("valid weights");
        #[expect(clippy::expect_used, reason = "test should fail loudly")]
        let out = conv.forward(&ramp(2)).expect("forward");
        assert_eq!(out.shape(), &[1, 2, 2, 1]);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), [0.5, 0.5, -1.0, -1.0]);
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let conv = ones_kernel([1, 1]);
        let input = Tensor::zeros(IxDyn(&[1, 2, 4, 1]));
        assert!(matches!(
            conv.forward(&input),
            Err(ModelError::ShapeMismatch { axis: 1, .. })
        ));
    }

    #[test]
    fn rejects_short_input() {
        let conv = ones_kernel([4, 1]);
        assert!(matches!(
            conv.forward(&ramp(3)),
            Err(ModelError::InputTooSmall { axis: 2, .. })
        ));
    }

    #[test]
    fn random_initialisation_has_expected_shapes() {
        #[expect(clippy::expect_used, reason = "test should fail loudly")]
        let conv = Conv2d::new(3, 8, (5, 1)).expect("valid conv");
        let shapes: Vec<_> = conv
            .parameters()
            .iter()
            .map(|p| p.value().shape().to_vec())
            .collect();
        assert_eq!(shapes, [vec![8, 3, 5, 1], vec![8]]);
    }
}
