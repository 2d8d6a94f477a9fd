//! Stride-to-dilation rewrite for dense prediction.
//!
//! A network trained to emit one prediction per window downsamples with
//! strides. Replacing every stride on the selected axes with 1 and giving each
//! downstream layer a dilation equal to the stride accumulated upstream of it
//! keeps the receptive field and relative tap positions while the output stays
//! at input resolution. The result emits one value per input timestep (less
//! the receptive field) instead of one per window.
//!
//! Layers that downsample but cannot dilate, such as [`AvgPool2d`], lose their
//! stride without compensation. Their receptive field shrinks; the rewrite
//! logs a warning and carries on.
//!
//! [`AvgPool2d`]: crate::nn::AvgPool2d

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ErrorKind;
use crate::nn::{AxisParam, Module, walk_modules_mut};

/// Axes converted when the caller has no preference.
pub const DEFAULT_AXES: [usize; 2] = [2, 3];

/// Errors raised by [`to_dense_prediction_model`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// No axis was selected.
    #[error("at least one axis must be selected")]
    NoAxes,
    /// An axis outside the two trailing spatial axes was selected.
    #[error("axis {axis} is not convertible; only axes 2 and 3 are supported")]
    InvalidAxis { axis: usize },
    /// A module already carries a non-unit dilation.
    #[error(
        "module {index} ({type_name}) already has dilation {dilation}; the graph was converted before or built dilated"
    )]
    AlreadyDilated {
        index: usize,
        type_name: &'static str,
        dilation: AxisParam,
    },
}

impl ConversionError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoAxes | Self::InvalidAxis { .. } => ErrorKind::InvalidArgument,
            Self::AlreadyDilated { .. } => ErrorKind::InvalidState,
        }
    }
}

/// Maps semantic axes `{2, 3}` onto a selection mask over `[axis2, axis3]`.
fn select_axes(axes: &[usize]) -> Result<[bool; 2], ConversionError> {
    if axes.is_empty() {
        return Err(ConversionError::NoAxes);
    }
    let mut selected = [false; 2];
    for &axis in axes {
        let slot = axis
            .checked_sub(2)
            .and_then(|offset| selected.get_mut(offset))
            .ok_or(ConversionError::InvalidAxis { axis })?;
        *slot = true;
    }
    Ok(selected)
}

/// Rewrites `graph` in place so that it produces dense output on `axes`.
///
/// Modules are visited in composition order. A module exposing a dilation
/// gets, on each selected axis, the product of all strides met strictly
/// before it; a module exposing a stride folds it into that product and then
/// has it forced to 1 on the selected axes. A module with both is handled in
/// that order, so its own stride never influences its own dilation. Strides
/// on unselected axes still accumulate but are left as they are.
///
/// # Errors
///
/// Returns [`ConversionError::NoAxes`] or [`ConversionError::InvalidAxis`]
/// before touching the graph, and [`ConversionError::AlreadyDilated`] when a
/// module has a non-unit dilation. In the latter case modules visited earlier
/// stay converted.
///
/// # Examples
///
/// ```
/// use dense_windows::convert::{DEFAULT_AXES, to_dense_prediction_model};
/// use dense_windows::nn::{AxisParam, Conv2d, HasDilation, HasStride, Module, Sequential};
///
/// let mut net = Sequential::new()
///     .with(Conv2d::new(1, 4, (3, 1)).expect("valid conv").with_stride((2, 1)))
///     .with(Conv2d::new(4, 4, (3, 1)).expect("valid conv"));
/// to_dense_prediction_model(&mut net, &DEFAULT_AXES).expect("convert network");
///
/// let children = net.children();
/// let dilation = children[1].as_dilated().map(|layer| layer.dilation());
/// assert_eq!(dilation, Some(AxisParam::PerAxis([2, 1])));
/// assert!(children[0].as_strided().is_some_and(|layer| layer.stride().is_unit()));
/// ```
pub fn to_dense_prediction_model(
    graph: &mut dyn Module,
    axes: &[usize],
) -> Result<(), ConversionError> {
    let selected = select_axes(axes)?;
    let mut cumulative = [1_usize; 2];
    let mut index = 0_usize;
    walk_modules_mut(graph, &mut |module| {
        let type_name = module.type_name();
        let has_dilation = if let Some(dilated) = module.as_dilated_mut() {
            let current = dilated.dilation();
            if !current.is_unit() {
                return Err(ConversionError::AlreadyDilated {
                    index,
                    type_name,
                    dilation: current,
                });
            }
            let mut dilation = [1_usize; 2];
            for ((slot, &upstream), &chosen) in dilation.iter_mut().zip(&cumulative).zip(&selected)
            {
                if chosen {
                    *slot = upstream;
                }
            }
            dilated.set_dilation(AxisParam::PerAxis(dilation));
            debug!(index, type_name, dilation = ?dilation, "set dilation");
            true
        } else {
            false
        };
        if let Some(strided) = module.as_strided_mut() {
            let mut stride = strided.stride().to_pair();
            for ((total, slot), &chosen) in cumulative.iter_mut().zip(&mut stride).zip(&selected) {
                *total = total.saturating_mul(*slot);
                if chosen {
                    if *slot > 1 && !has_dilation {
                        warn!(
                            index,
                            type_name,
                            stride = *slot,
                            "removing stride from a layer without dilation shrinks its receptive field"
                        );
                    }
                    *slot = 1;
                }
            }
            strided.set_stride(AxisParam::PerAxis(stride));
            debug!(index, type_name, stride = ?stride, cumulative = ?cumulative, "removed stride");
        }
        index += 1;
        Ok(())
    })
}
