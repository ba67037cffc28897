use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-axis description of the interpolation problem handed to
/// [`GridSpline::fit`](crate::GridSpline::fit).
///
/// `abscissae` holds the strictly increasing sample coordinates along
/// this axis and `order` the B-spline order (polynomial degree + 1).
/// When `knots` is `None` a not-a-knot sequence is derived from the
/// abscissae; a caller-supplied vector must be nondecreasing with
/// exactly `abscissae.len() + order` entries.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisSpec {
    pub abscissae: Array1<f64>,
    pub order: usize,
    pub knots: Option<Array1<f64>>,
}

impl AxisSpec {
    /// Axis with derived not-a-knot knots.
    pub fn new(abscissae: Array1<f64>, order: usize) -> Self {
        Self {
            abscissae,
            order,
            knots: None,
        }
    }

    /// Axis with a caller-supplied knot vector.
    pub fn with_knots(abscissae: Array1<f64>, order: usize, knots: Array1<f64>) -> Self {
        Self {
            abscissae,
            order,
            knots: Some(knots),
        }
    }
}

/// One axis of a fitted spline: sample count, order, and knot vector.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplineAxis {
    pub(crate) len: usize,
    pub(crate) order: usize,
    pub(crate) knots: Array1<f64>,
}

impl SplineAxis {
    /// Number of sample points (and of coefficients) along this axis.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Spline order `k` (polynomial degree + 1).
    pub fn order(&self) -> usize {
        self.order
    }

    /// The knot vector, of length `len() + order()`.
    pub fn knots(&self) -> ArrayView1<'_, f64> {
        self.knots.view()
    }

    /// The span on which queries along this axis are considered
    /// in range: the full knot interval `[t[0], t[n + k - 1]]`.
    pub fn span(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.len + self.order - 1])
    }
}

/// A fitted tensor-product B-spline on a rectilinear grid.
///
/// Produced once by [`fit`](GridSpline::fit) and then queried any
/// number of times; the representation is immutable. The coefficient
/// array has the same shape as the sample array it was fitted to, but
/// holds B-spline coefficients, not samples.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridSpline {
    pub(crate) axes: Vec<SplineAxis>,
    pub(crate) coefficients: ArrayD<f64>,
}

impl GridSpline {
    /// Number of interpolation axes.
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Per-axis metadata, in axis order.
    pub fn axes(&self) -> &[SplineAxis] {
        &self.axes
    }

    /// The tensor-product coefficient array.
    pub fn coefficients(&self) -> ArrayViewD<'_, f64> {
        self.coefficients.view()
    }
}
