//! Self-ensembling of overlapping window predictions.
//!
//! Consecutive sequences of window predictions are offset from each other by
//! a fixed number of windows. Summing their log-probabilities on a shared
//! dense timeline multiplies the votes of every window covering a timestep.
//! Positions a sequence does not cover receive 0, the additive identity, so
//! partially covered timesteps only count the sequences that reach them.

use ndarray::{Array2, Array3, ArrayBase, ArrayView3, Axis, Data, Dimension, Ix3, s};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised by [`aggregate_probas`] and [`pad_shift_array`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// Input is not `(n_sequences, n_classes, n_windows)`.
    #[error("expected a rank-3 (n_sequences, n_classes, n_windows) array, got shape {shape:?}")]
    UnsupportedRank { shape: Vec<usize> },
    /// One of the three axes is empty.
    #[error("every axis must be non-empty, got shape {shape:?}")]
    EmptyAxis { shape: Vec<usize> },
    /// The offset between consecutive sequences is zero.
    #[error("n_windows_stride must be greater than 0")]
    ZeroStride,
    /// The dense timeline does not fit in `usize`.
    #[error("{n_sequences} sequences at stride {stride} overflow the dense timeline")]
    LengthOverflow { n_sequences: usize, stride: usize },
}

impl AggregationError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedRank { .. } => ErrorKind::NotSupported,
            Self::EmptyAxis { .. } | Self::ZeroStride | Self::LengthOverflow { .. } => {
                ErrorKind::InvalidArgument
            }
        }
    }
}

/// Log-softmax over the class axis (axis 1) of a
/// `(n_sequences, n_classes, n_windows)` array.
///
/// Uses the max-shift form so large or very negative scores neither overflow
/// nor underflow.
#[expect(clippy::float_arithmetic, reason = "log-sum-exp")]
#[must_use]
pub fn log_softmax<S>(logits: &ArrayBase<S, Ix3>) -> Array3<f32>
where
    S: Data<Elem = f32>,
{
    let mut out = logits.to_owned();
    for mut lane in out.lanes_mut(Axis(1)) {
        let max = lane.fold(f32::NEG_INFINITY, |acc, &value| acc.max(value));
        let shift = if max.is_finite() { max } else { 0.0 };
        let log_sum = lane.mapv(|value| (value - shift).exp()).sum().ln();
        lane.mapv_inplace(|value| value - shift - log_sum);
    }
    out
}

fn as_rank3<S, D>(x: &ArrayBase<S, D>) -> Result<ArrayView3<'_, f32>, AggregationError>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let unsupported = || AggregationError::UnsupportedRank {
        shape: x.shape().to_vec(),
    };
    if x.ndim() != 3 {
        return Err(unsupported());
    }
    let view = x.view().into_dimensionality::<Ix3>().map_err(|_| unsupported())?;
    if view.is_empty() {
        return Err(AggregationError::EmptyAxis {
            shape: x.shape().to_vec(),
        });
    }
    Ok(view)
}

/// Places row `i` of `x` at dense positions `[i * stride, i * stride + n_windows)`
/// of a zeroed `(n_rows, n_classes, (n_rows - 1) * stride + n_windows)` array.
///
/// # Errors
///
/// Returns [`AggregationError::UnsupportedRank`] unless `x` has rank 3,
/// [`AggregationError::EmptyAxis`] or [`AggregationError::ZeroStride`] for
/// degenerate input, and [`AggregationError::LengthOverflow`] when the dense
/// length does not fit in `usize`.
///
/// # Examples
///
/// ```
/// use dense_windows::aggregate::pad_shift_array;
/// use ndarray::array;
///
/// let x = array![[[1.0_f32, 2.0]], [[3.0, 4.0]]];
/// let shifted = pad_shift_array(&x, 1).expect("rank-3 input");
/// assert_eq!(shifted, array![[[1.0, 2.0, 0.0]], [[0.0, 3.0, 4.0]]]);
/// ```
pub fn pad_shift_array<S, D>(x: &ArrayBase<S, D>, stride: usize) -> Result<Array3<f32>, AggregationError>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let x = as_rank3(x)?;
    if stride == 0 {
        return Err(AggregationError::ZeroStride);
    }
    let (n_rows, n_classes, n_windows) = x.dim();
    let dense_len = (n_rows - 1)
        .checked_mul(stride)
        .and_then(|offset| offset.checked_add(n_windows))
        .ok_or(AggregationError::LengthOverflow {
            n_sequences: n_rows,
            stride,
        })?;
    let mut out = Array3::<f32>::zeros((n_rows, n_classes, dense_len));
    for (row_index, (row, mut dst)) in x.outer_iter().zip(out.outer_iter_mut()).enumerate() {
        let start = row_index * stride;
        dst.slice_mut(s![.., start..start + n_windows]).assign(&row);
    }
    Ok(out)
}

/// Turns per-window logits of overlapping sequences into one dense stream of
/// summed log-probabilities.
///
/// `logits` has shape `(n_sequences, n_classes, n_windows)`; consecutive
/// sequences start `n_windows_stride` windows apart. The result has shape
/// `((n_sequences - 1) * n_windows_stride + n_windows, n_classes)`.
///
/// # Errors
///
/// See [`pad_shift_array`]; a rank other than 3 is
/// [`ErrorKind::NotSupported`].
///
/// # Examples
///
/// ```
/// use dense_windows::aggregate::aggregate_probas;
/// use ndarray::Array3;
///
/// let logits = Array3::<f32>::zeros((2, 1, 2));
/// let dense = aggregate_probas(&logits, 1).expect("aggregate");
/// assert_eq!(dense.shape(), &[3, 1]);
/// assert!(dense.iter().all(|v| *v == 0.0));
/// ```
pub fn aggregate_probas<S, D>(
    logits: &ArrayBase<S, D>,
    n_windows_stride: usize,
) -> Result<Array2<f32>, AggregationError>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let logits = as_rank3(logits)?;
    if n_windows_stride == 0 {
        return Err(AggregationError::ZeroStride);
    }
    let log_probas = log_softmax(&logits);
    let shifted = pad_shift_array(&log_probas, n_windows_stride)?;
    let dense = shifted.sum_axis(Axis(0)).reversed_axes();
    Ok(dense.as_standard_layout().into_owned())
}
