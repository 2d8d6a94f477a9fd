//! End-to-end tests for stride-to-dilation conversion on small networks.

use dense_windows::nn::{
    AvgPool2d, AxisParam, Conv2d, Ensure4d, MaxPool2d, Module, Relu, Sequential, Tensor,
};
use dense_windows::tests::support::{approx_eq, dilations, strides};
use dense_windows::{ErrorKind, output_shape, to_dense_prediction_model};
use ndarray::{Array1, Array4, Axis, IxDyn, s};
use rstest::{fixture, rstest};

#[expect(clippy::cast_precision_loss, reason = "small test indices")]
#[expect(clippy::float_arithmetic, reason = "deterministic test weights")]
fn conv(in_ch: usize, out_ch: usize, kernel: usize, seed: usize) -> Conv2d {
    let weight = Array4::from_shape_fn((out_ch, in_ch, kernel, 1), |(o, i, k, _)| {
        ((o * 7 + i * 3 + k * 5 + seed) % 11) as f32 / 11.0 - 0.5
    });
    let bias = Array1::from_shape_fn(out_ch, |o| (o + seed) as f32 * 0.01);
    Conv2d::from_weights(weight, Some(bias)).unwrap_or_else(|e| panic!("valid conv: {e}"))
}

/// Receptive field 13, total stride 4 on axis 2.
fn network() -> Sequential {
    let pool = MaxPool2d::new((2, 1)).unwrap_or_else(|e| panic!("valid pool: {e}"));
    Sequential::new()
        .with(Ensure4d)
        .with(conv(2, 3, 3, 1).with_stride((2, 1)))
        .with(Relu)
        .with(conv(3, 3, 3, 2))
        .with(pool)
        .with(conv(3, 2, 2, 3))
}

#[fixture]
#[expect(clippy::cast_precision_loss, reason = "small test indices")]
#[expect(clippy::float_arithmetic, reason = "synthetic signal")]
fn signal() -> Tensor {
    Tensor::from_shape_fn(IxDyn(&[1, 2, 100]), |ix| {
        (ix[2] as f32 * 0.37 + ix[1] as f32).sin()
    })
}

#[rstest]
fn removes_every_stride_on_both_axes() {
    let mut net = network();
    to_dense_prediction_model(&mut net, &[2, 3]).unwrap_or_else(|e| panic!("convert: {e}"));
    assert!(strides(&net).iter().all(|stride| stride.is_unit()));
}

#[rstest]
fn dilations_follow_upstream_strides() {
    let mut net = network();
    to_dense_prediction_model(&mut net, &[2, 3]).unwrap_or_else(|e| panic!("convert: {e}"));
    assert_eq!(
        dilations(&net),
        [
            AxisParam::PerAxis([1, 1]),
            AxisParam::PerAxis([2, 1]),
            AxisParam::PerAxis([2, 1]),
            AxisParam::PerAxis([4, 1]),
        ]
    );
}

#[rstest]
fn second_conversion_fails_with_invalid_state() {
    let mut net = network();
    to_dense_prediction_model(&mut net, &[2, 3]).unwrap_or_else(|e| panic!("convert: {e}"));
    let Err(err) = to_dense_prediction_model(&mut net, &[2, 3]) else {
        panic!("second conversion must fail");
    };
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[rstest]
fn network_built_dilated_is_rejected() {
    let mut net = Sequential::new()
        .with(Ensure4d)
        .with(conv(2, 3, 3, 1).with_stride((2, 1)))
        .with(conv(3, 3, 3, 2).with_dilation((2, 1)))
        .with(conv(3, 2, 2, 3).with_stride((2, 1)));
    let Err(err) = to_dense_prediction_model(&mut net, &[2, 3]) else {
        panic!("a dilated layer must block conversion");
    };
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let strides = strides(&net);
    assert_eq!(strides.first(), Some(&AxisParam::PerAxis([1, 1])));
    assert_eq!(strides.last(), Some(&AxisParam::PerAxis([2, 1])));
    assert_eq!(
        dilations(&net).first(),
        Some(&AxisParam::PerAxis([1, 1]))
    );
}

#[rstest]
#[case(vec![1])]
#[case(vec![4])]
#[case(vec![2, 4])]
fn invalid_axes_leave_the_graph_untouched(#[case] axes: Vec<usize>) {
    let mut net = network();
    let before = strides(&net);
    let Err(err) = to_dense_prediction_model(&mut net, &axes) else {
        panic!("axes {axes:?} must be rejected");
    };
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(strides(&net), before);
}

#[rstest]
fn probed_length_is_dense_after_conversion() {
    let mut net = network();
    let strided = output_shape(&net, 2, 100).unwrap_or_else(|e| panic!("probe: {e}"));
    assert_eq!(strided, [1, 2, 22, 1]);
    to_dense_prediction_model(&mut net, &[2, 3]).unwrap_or_else(|e| panic!("convert: {e}"));
    let dense = output_shape(&net, 2, 100).unwrap_or_else(|e| panic!("probe: {e}"));
    assert_eq!(dense, [1, 2, 100 - 13 + 1, 1]);
}

#[rstest]
fn dense_output_contains_strided_output(signal: Tensor) {
    let strided_net = network();
    let mut dense_net = network();
    to_dense_prediction_model(&mut dense_net, &[2]).unwrap_or_else(|e| panic!("convert: {e}"));

    let strided = strided_net
        .forward(&signal)
        .unwrap_or_else(|e| panic!("strided forward: {e}"));
    let dense = dense_net
        .forward(&signal)
        .unwrap_or_else(|e| panic!("dense forward: {e}"));
    let subsampled = dense.slice(s![.., .., ..;4, ..]);
    let overlap = strided.len_of(Axis(2));
    for (a, b) in strided
        .iter()
        .zip(subsampled.slice(s![.., .., ..overlap, ..]).iter())
    {
        assert!(approx_eq(*a, *b, 1e-5), "{a} != {b}");
    }
}

#[rstest]
fn average_pooling_keeps_its_gap() {
    let pool = AvgPool2d::new((2, 1)).unwrap_or_else(|e| panic!("valid pool: {e}"));
    let mut net = Sequential::new()
        .with(Ensure4d)
        .with(pool)
        .with(conv(2, 1, 3, 0));
    to_dense_prediction_model(&mut net, &[2, 3]).unwrap_or_else(|e| panic!("convert: {e}"));
    assert_eq!(
        strides(&net),
        [AxisParam::PerAxis([1, 1]), AxisParam::PerAxis([1, 1])]
    );
    // only the convolution gained a dilation; the pool still averages
    // neighbouring samples
    assert_eq!(dilations(&net), [AxisParam::PerAxis([2, 1])]);
    let shape = output_shape(&net, 2, 50).unwrap_or_else(|e| panic!("probe: {e}"));
    assert_eq!(shape, [1, 1, 50 - 1 - 4, 1]);
}
