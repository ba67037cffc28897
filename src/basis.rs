use crate::error::SplineError;
use ndarray::{Array1, ArrayView1};

/// Where a query coordinate landed relative to a knot vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// `x` is below the first knot.
    Below,
    /// `knots[i] <= x < knots[i + 1]` for the returned index `i`.
    Inside,
    /// `x` is at or above the last knot.
    Above,
}

/// Locates the knot interval containing `x`.
///
/// Returns the largest index `i` with `knots[i] <= x < knots[i + 1]`
/// together with [`Placement::Inside`], or the clamped boundary index
/// with [`Placement::Below`]/[`Placement::Above`] when `x` falls
/// outside `[knots[0], knots[last])`. When several knots equal `x`,
/// the interval to the right of the last duplicate is selected.
///
/// `hint` is a caller-owned cursor. The search gallops outward from it
/// with doubling steps before bisecting, so a monotone (or slowly
/// drifting) sequence of queries costs amortized O(1) per call instead
/// of O(log n). The hint is updated to the returned index; its initial
/// value only affects performance, never the result.
pub fn find_interval(knots: &[f64], x: f64, hint: &mut usize) -> (usize, Placement) {
    let last = knots.len() - 1;
    if x < knots[0] {
        *hint = 0;
        return (0, Placement::Below);
    }
    if x >= knots[last] {
        *hint = last;
        return (last, Placement::Above);
    }

    let start = (*hint).min(last - 1);
    let mut lo;
    let mut hi;
    let mut step = 1usize;
    if knots[start] <= x {
        lo = start;
        hi = start + 1;
        while knots[hi] <= x {
            lo = hi;
            hi = (hi + step).min(last);
            step *= 2;
        }
    } else {
        hi = start;
        lo = start.saturating_sub(1);
        while knots[lo] > x {
            hi = lo;
            lo = lo.saturating_sub(step);
            step *= 2;
        }
    }

    // Bracketed: knots[lo] <= x < knots[hi]. Bisect, keeping the
    // left comparison non-strict so duplicate knots resolve to the
    // rightmost interval.
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if knots[mid] <= x {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    *hint = lo;
    (lo, Placement::Inside)
}

/// Derives the default not-a-knot knot vector for interpolation at
/// `abscissae` with spline order `k`.
///
/// The first `k` knots coincide with the first abscissa. The last `k`
/// knots sit at the last abscissa plus a tenth of the final abscissa
/// spacing, so the right endpoint is strictly interior to the support
/// and evaluates like any other point. Interior knots fall on the
/// abscissae themselves for even `k` and on abscissa midpoints for odd
/// `k`, which yields an interpolant with `k - 2` continuous
/// derivatives.
///
/// Callers must supply at least two strictly increasing abscissae and
/// `k >= 2`; [`GridSpline::fit`](crate::GridSpline::fit) validates
/// this before knot selection runs.
pub fn not_a_knot_knots(abscissae: ArrayView1<'_, f64>, k: usize) -> Array1<f64> {
    let n = abscissae.len();
    debug_assert!(n >= 2 && k >= 2 && k < n);

    let mut knots = Array1::zeros(n + k);
    for j in 0..k {
        knots[j] = abscissae[0];
    }
    let upper = abscissae[n - 1] + 0.1 * (abscissae[n - 1] - abscissae[n - 2]);
    for j in n..n + k {
        knots[j] = upper;
    }
    if k % 2 == 0 {
        let half = k / 2;
        for j in k..n {
            knots[j] = abscissae[j - half];
        }
    } else {
        let below = (k + 1) / 2;
        for j in k..n {
            knots[j] = 0.5 * (abscissae[j - below] + abscissae[j - below + 1]);
        }
    }
    knots
}

/// Reusable buffers for the Cox-de Boor recurrence. Holding the two
/// distance buffers and the value buffer across calls avoids
/// per-point allocation in the collocation assembly loop, and keeping
/// the recurrence state here is what makes [`nonzero_basis_resume`]
/// possible.
#[derive(Clone, Debug)]
pub struct BasisScratch {
    left: Vec<f64>,
    right: Vec<f64>,
    values: Vec<f64>,
    /// Degree reached by the stored recurrence (0 = order-1 indicator).
    degree: usize,
    interval: usize,
    point: f64,
    active: bool,
}

impl BasisScratch {
    pub fn new(order: usize) -> Self {
        let len = order.max(1);
        Self {
            left: vec![0.0; len],
            right: vec![0.0; len],
            values: vec![0.0; len],
            degree: 0,
            interval: 0,
            point: 0.0,
            active: false,
        }
    }

    #[inline]
    fn ensure_order(&mut self, order: usize) {
        if self.values.len() < order {
            self.left.resize(order, 0.0);
            self.right.resize(order, 0.0);
            self.values.resize(order, 0.0);
        }
    }

    /// Raises the stored recurrence from `self.degree` to `degree`.
    /// Caller guarantees buffers are sized and the state is coherent.
    fn advance(&mut self, knots: &[f64], interval: usize, x: f64, degree: usize) {
        for d in self.degree + 1..=degree {
            self.left[d] = x - knots[interval + 1 - d];
            self.right[d] = knots[interval + d] - x;
            let mut saved = 0.0;
            for r in 0..d {
                let den = self.right[r + 1] + self.left[d - r];
                let temp = self.values[r] / den;
                self.values[r] = saved + self.right[r + 1] * temp;
                saved = self.left[d - r] * temp;
            }
            self.values[d] = saved;
        }
        self.degree = degree;
    }
}

fn check_basis_args(
    knots: &[f64],
    interval: usize,
    k: usize,
    x: f64,
    out: &[f64],
) -> Result<(), SplineError> {
    if k < 1 {
        return Err(SplineError::InvalidArgument(format!(
            "spline order must be at least 1, got {k}"
        )));
    }
    if interval + 1 < k || interval + k > knots.len() {
        return Err(SplineError::InvalidArgument(format!(
            "interval index {interval} leaves the order-{k} support window outside the {} knots",
            knots.len()
        )));
    }
    if !(knots[interval] <= x && x <= knots[interval + 1]) {
        return Err(SplineError::InvalidArgument(format!(
            "point {x} lies outside the working interval [{}, {}]",
            knots[interval],
            knots[interval + 1]
        )));
    }
    if out.len() != k {
        return Err(SplineError::InvalidArgument(format!(
            "output buffer holds {} values but order {k} has {k} nonzero basis functions",
            out.len()
        )));
    }
    Ok(())
}

/// Evaluates the `k` B-spline basis functions that can be nonzero at
/// `x`, namely `B[interval - k + 1 ..= interval]`, writing them to
/// `out` in ascending index order.
///
/// `interval` must satisfy `knots[interval] <= x <= knots[interval + 1]`
/// (as produced by [`find_interval`]). The recurrence runs from the
/// order-1 indicator up to order `k` using the scratch distance
/// buffers; the finished state stays in `scratch` so a follow-up
/// [`nonzero_basis_resume`] can extend it to a higher order without
/// recomputing the lower degrees.
pub fn nonzero_basis(
    knots: &[f64],
    interval: usize,
    k: usize,
    x: f64,
    scratch: &mut BasisScratch,
    out: &mut [f64],
) -> Result<(), SplineError> {
    check_basis_args(knots, interval, k, x, out)?;
    scratch.ensure_order(k);
    scratch.values[0] = 1.0;
    scratch.degree = 0;
    scratch.interval = interval;
    scratch.point = x;
    scratch.active = true;
    scratch.advance(knots, interval, x, k - 1);
    out.copy_from_slice(&scratch.values[..k]);
    Ok(())
}

/// Continues a previous [`nonzero_basis`] computation at the same
/// point and interval, raising it to the higher order `k`.
///
/// The lower-degree stages preserved in `scratch` are reused, so a
/// caller that needs the basis at several orders pays each recurrence
/// stage exactly once. Calling this with a different point or
/// interval, or without a preceding fresh evaluation, is an error.
pub fn nonzero_basis_resume(
    knots: &[f64],
    interval: usize,
    k: usize,
    x: f64,
    scratch: &mut BasisScratch,
    out: &mut [f64],
) -> Result<(), SplineError> {
    check_basis_args(knots, interval, k, x, out)?;
    if !scratch.active || scratch.interval != interval || scratch.point != x {
        return Err(SplineError::InvalidArgument(
            "resume requires a preceding basis evaluation at the same point and interval"
                .to_string(),
        ));
    }
    if k - 1 < scratch.degree {
        return Err(SplineError::InvalidArgument(format!(
            "cannot resume to order {k}: the stored recurrence already reached order {}",
            scratch.degree + 1
        )));
    }
    scratch.ensure_order(k);
    scratch.advance(knots, interval, x, k - 1);
    out.copy_from_slice(&scratch.values[..k]);
    Ok(())
}
