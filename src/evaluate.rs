use crate::basis::{Placement, find_interval};
use crate::error::SplineError;
use crate::types::GridSpline;
use ndarray::{Array1, ArrayView2};

/// Scratch for the de Boor evaluation: one flat buffer of length `3k`
/// partitioned as `[aj | dp | dm]` (active coefficients, distances to
/// the knots above, distances to the knots below). Keeping the three
/// segments in a single contiguous allocation with known offsets keeps
/// the inner convex-combination loop free of branches and indirection.
#[derive(Clone, Debug)]
pub struct DeBoorWorkspace {
    buf: Vec<f64>,
}

impl DeBoorWorkspace {
    pub fn new(order: usize) -> Self {
        Self {
            buf: vec![0.0; 3 * order.max(1)],
        }
    }

    #[inline]
    fn ensure(&mut self, order: usize) {
        if self.buf.len() < 3 * order {
            self.buf.resize(3 * order, 0.0);
        }
    }
}

/// Evaluates the `deriv`-th derivative of a 1D B-spline at `x`.
///
/// The spline is given by its knot vector (length `coefs.len() + k`)
/// and coefficient slice. Queries must lie in `[t[k-1], t[n]]`; values
/// are right-limits except at `x == t[n]`, where the left limit is
/// returned (walking back across any duplicated right knots). `hint`
/// is the caller-owned interval cursor from [`find_interval`].
///
/// The algorithm copies the `k` active coefficients, applies `deriv`
/// knot-differencing passes (producing the derivative spline's de Boor
/// coefficients), then `k - 1 - deriv` convex-combination passes using
/// the precomputed distance buffers, leaving the result in the first
/// workspace slot.
pub fn eval_1d(
    knots: &[f64],
    coefs: &[f64],
    k: usize,
    deriv: usize,
    x: f64,
    hint: &mut usize,
    work: &mut DeBoorWorkspace,
) -> Result<f64, SplineError> {
    let n = coefs.len();
    if k < 1 || n < k || knots.len() != n + k {
        return Err(SplineError::InvalidArgument(format!(
            "inconsistent 1D spline: {n} coefficients, {} knots, order {k}",
            knots.len()
        )));
    }
    if deriv >= k {
        return Err(SplineError::InvalidArgument(format!(
            "derivative order {deriv} must be below the spline order {k}"
        )));
    }
    if !(knots[k - 1] <= x && x <= knots[n]) {
        return Err(SplineError::OutOfDomain {
            value: x,
            lo: knots[k - 1],
            hi: knots[n],
        });
    }

    let (mut left, _) = find_interval(knots, x, hint);
    if left > n - 1 {
        // x sits on the right end of the coefficient range: back up
        // across duplicated knots and return the left limit.
        loop {
            if left == k - 1 {
                return Err(SplineError::LeftLimitAtEndpoint);
            }
            left -= 1;
            if knots[left] != x {
                break;
            }
        }
        *hint = left;
    }

    work.ensure(k);
    let (aj, rest) = work.buf.split_at_mut(k);
    let (dp, dm) = rest.split_at_mut(k);
    aj[..k].copy_from_slice(&coefs[left + 1 - k..=left]);

    for j in 1..=deriv {
        let kmj = k - j;
        let factor = kmj as f64;
        for jj in 0..kmj {
            let denom = knots[left + 1 + jj] - knots[left + 1 + jj - kmj];
            aj[jj] = (aj[jj + 1] - aj[jj]) * factor / denom;
        }
    }

    if deriv < k - 1 {
        for j in 0..k - deriv {
            dp[j] = knots[left + 1 + j] - x;
            dm[j] = x - knots[left - j];
        }
        for j in deriv + 1..k {
            let kmj = k - j;
            for jj in 0..kmj {
                let ilo = kmj - 1 - jj;
                aj[jj] = (aj[jj + 1] * dp[ilo] + aj[jj] * dm[jj]) / (dp[ilo] + dm[jj]);
            }
        }
    }

    Ok(aj[0])
}

/// Caller-owned interval hints for repeated evaluation of one spline.
///
/// Holds one search cursor and one evaluation cursor per axis. Reusing
/// a state across queries that move slowly through the domain makes
/// every interval search amortized O(1); resetting or recreating the
/// state is always safe and only costs locality. Concurrent evaluators
/// must each hold their own state.
#[derive(Clone, Debug)]
pub struct EvalState {
    search: Vec<usize>,
    line: Vec<usize>,
}

impl EvalState {
    pub fn new(ndim: usize) -> Self {
        Self {
            search: vec![0; ndim],
            line: vec![0; ndim],
        }
    }
}

impl GridSpline {
    /// A fresh hint state sized for this spline.
    pub fn make_state(&self) -> EvalState {
        EvalState::new(self.ndim())
    }

    /// Evaluates the spline at `point`.
    ///
    /// Returns exactly `0.0` for any invalid query: a coordinate
    /// outside its axis's knot span, or a point of the wrong
    /// dimension. The cause is reported through the `log` crate at
    /// debug level. Runs on a fresh hint state; use
    /// [`eval_with`](Self::eval_with) to amortize interval searches
    /// across many queries.
    pub fn eval(&self, point: &[f64]) -> f64 {
        let mut state = self.make_state();
        self.eval_with(&mut state, point)
    }

    /// Evaluates the spline at `point`, reusing `state` for locality.
    pub fn eval_with(&self, state: &mut EvalState, point: &[f64]) -> f64 {
        let zeros = [0usize; 6];
        self.eval_partial_with(state, point, &zeros[..self.ndim().min(6)])
    }

    /// Evaluates the mixed partial derivative of orders `deriv` at
    /// `point`, on a fresh hint state.
    ///
    /// Each derivative order must be below the corresponding axis
    /// order; invalid queries return exactly `0.0` as for
    /// [`eval`](Self::eval).
    pub fn eval_partial(&self, point: &[f64], deriv: &[usize]) -> f64 {
        let mut state = self.make_state();
        self.eval_partial_with(&mut state, point, deriv)
    }

    /// Evaluates the mixed partial derivative of orders `deriv` at
    /// `point`, reusing `state` for locality.
    pub fn eval_partial_with(&self, state: &mut EvalState, point: &[f64], deriv: &[usize]) -> f64 {
        match self.collapse(state, point, deriv) {
            Ok(v) => v,
            Err(err) => {
                log::debug!("spline query {point:?} yields 0: {err}");
                0.0
            }
        }
    }

    /// Evaluates the spline at each row of `points` (one query point
    /// per row), sharing one hint state across the batch so slowly
    /// varying query sequences get the amortized O(1) interval search.
    pub fn eval_many(&self, points: ArrayView2<'_, f64>) -> Array1<f64> {
        let mut state = self.make_state();
        let zeros = [0usize; 6];
        let deriv = &zeros[..self.ndim().min(6)];
        let mut buf = [0f64; 6];
        let mut out = Array1::zeros(points.nrows());
        for (i, row) in points.rows().into_iter().enumerate() {
            let len = row.len().min(6);
            for (slot, &v) in buf.iter_mut().zip(row.iter()) {
                *slot = v;
            }
            out[i] = self.eval_partial_with(&mut state, &buf[..len], deriv);
        }
        out
    }

    /// The collapse strategy: reduce the rank-d coefficient tensor to
    /// a scalar, one axis at a time.
    ///
    /// Intervals for every axis but the last are located once. The
    /// first stage runs one hinted 1D evaluation per combination of
    /// active basis indices on those axes -- each over a stride-1
    /// coefficient line along the last axis -- filling a staircase
    /// buffer of size `prod(k_a)`. Every later stage collapses the
    /// staircase along one more axis using a `2k`-knot window around
    /// that axis's interval, shrinking the buffer by a factor of `k_a`
    /// until a single value remains. Total work per query is on the
    /// order of `prod(k_a)`, independent of the grid sizes.
    fn collapse(
        &self,
        state: &mut EvalState,
        point: &[f64],
        deriv: &[usize],
    ) -> Result<f64, SplineError> {
        let d = self.ndim();
        if point.len() != d || deriv.len() != d || state.search.len() != d || state.line.len() != d
        {
            return Err(SplineError::InvalidArgument(format!(
                "query carries {} coordinates and {} derivative orders for a {d}-dimensional spline",
                point.len(),
                deriv.len()
            )));
        }
        for a in 0..d {
            if deriv[a] >= self.axes[a].order {
                return Err(SplineError::InvalidArgument(format!(
                    "axis {a}: derivative order {} must be below the spline order {}",
                    deriv[a], self.axes[a].order
                )));
            }
        }

        let k_max = self.axes.iter().map(|a| a.order).max().unwrap_or(1);
        let mut work = DeBoorWorkspace::new(k_max);
        let flat = self
            .coefficients
            .as_slice()
            .expect("coefficient array is standard layout");

        let last = d - 1;
        let ax_last = &self.axes[last];
        let t_last = ax_last.knots.as_slice().expect("knots are contiguous");
        {
            // Wide in-range test over the full knot span; the strict
            // domain of the 1D evaluator is enforced when it runs.
            let (lo, hi) = ax_last.span();
            if !(lo <= point[last] && point[last] <= hi) {
                return Err(SplineError::OutOfDomain {
                    value: point[last],
                    lo,
                    hi,
                });
            }
        }

        if d == 1 {
            return eval_1d(
                t_last,
                flat,
                ax_last.order,
                deriv[0],
                point[0],
                &mut state.line[0],
                &mut work,
            );
        }

        // Locate the enclosing interval on every windowed axis.
        let mut left = [0usize; 6];
        for a in 0..last {
            let ax = &self.axes[a];
            let t = ax.knots.as_slice().expect("knots are contiguous");
            let (l, placement) = find_interval(t, point[a], &mut state.search[a]);
            let in_coefficient_range = l + 1 >= ax.order && l < ax.len;
            if placement != Placement::Inside || !in_coefficient_range {
                return Err(SplineError::OutOfDomain {
                    value: point[a],
                    lo: t[0],
                    hi: t[t.len() - 1],
                });
            }
            left[a] = l;
        }

        let shape = self.coefficients.shape();
        let mut stride = [0usize; 6];
        let mut acc = 1usize;
        for a in (0..d).rev() {
            stride[a] = acc;
            acc *= shape[a];
        }

        // First stage: one line evaluation per window multi-index.
        let m: usize = self.axes[..last].iter().map(|a| a.order).product();
        let mut stair = vec![0.0; m];
        let n_last = ax_last.len;
        let mut idx = [0usize; 6];
        for slot in stair.iter_mut() {
            let mut base = 0usize;
            for a in 0..last {
                base += (left[a] + 1 - self.axes[a].order + idx[a]) * stride[a];
            }
            *slot = eval_1d(
                t_last,
                &flat[base..base + n_last],
                ax_last.order,
                deriv[last],
                point[last],
                &mut state.line[last],
                &mut work,
            )?;
            for a in (0..last).rev() {
                idx[a] += 1;
                if idx[a] < self.axes[a].order {
                    break;
                }
                idx[a] = 0;
            }
        }

        // Remaining stages: collapse the staircase one axis at a time
        // over a local 2k knot window.
        let mut len = m;
        for a in (0..last).rev() {
            let ax = &self.axes[a];
            let k = ax.order;
            let t = ax.knots.as_slice().expect("knots are contiguous");
            let window = &t[left[a] + 1 - k..left[a] + 1 + k];
            let count = len / k;
            for i in 0..count {
                let value = eval_1d(
                    window,
                    &stair[i * k..(i + 1) * k],
                    k,
                    deriv[a],
                    point[a],
                    &mut state.line[a],
                    &mut work,
                )?;
                stair[i] = value;
            }
            len = count;
        }

        Ok(stair[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{BasisScratch, not_a_knot_knots};
    use crate::construction::collocation_coefficients;
    use crate::types::AxisSpec;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2, ArrayD, IxDyn};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn uniform_axis(n: usize, lo: f64, hi: f64) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64))
    }

    fn fit_line(x: &Array1<f64>, k: usize, f: &dyn Fn(f64) -> f64) -> (Vec<f64>, Vec<f64>) {
        let t = not_a_knot_knots(x.view(), k);
        let values: Vec<f64> = x.iter().map(|&v| f(v)).collect();
        let mut coefs = vec![0.0; x.len()];
        let mut scratch = BasisScratch::new(k);
        let mut bvals = vec![0.0; k];
        let mut work = vec![0.0; x.len()];
        collocation_coefficients(
            x.as_slice().unwrap(),
            t.as_slice().unwrap(),
            k,
            0,
            &values,
            &mut coefs,
            &mut scratch,
            &mut bvals,
            &mut work,
        )
        .unwrap();
        (t.to_vec(), coefs)
    }

    #[test]
    fn cubic_line_reproduces_a_cubic_polynomial() {
        // A spline of order 4 represents cubics exactly, on and off
        // the data points.
        let x = uniform_axis(6, 0.0, 1.0);
        let poly = |v: f64| 2.0 - v + 3.0 * v * v - 0.5 * v * v * v;
        let (t, coefs) = fit_line(&x, 4, &poly);

        let mut hint = 0;
        let mut work = DeBoorWorkspace::new(4);
        for step in 0..=100 {
            let v = step as f64 / 100.0;
            let got = eval_1d(&t, &coefs, 4, 0, v, &mut hint, &mut work).unwrap();
            assert_abs_diff_eq!(got, poly(v), epsilon = 1e-12);
        }
    }

    #[test]
    fn derivatives_of_a_cubic_line() {
        let x = uniform_axis(8, -1.0, 1.0);
        let poly = |v: f64| v * v * v - 2.0 * v;
        let (t, coefs) = fit_line(&x, 4, &poly);

        let mut hint = 0;
        let mut work = DeBoorWorkspace::new(4);
        for step in 0..=40 {
            let v = -1.0 + step as f64 / 20.0;
            let d1 = eval_1d(&t, &coefs, 4, 1, v, &mut hint, &mut work).unwrap();
            assert_abs_diff_eq!(d1, 3.0 * v * v - 2.0, epsilon = 1e-10);
            let d2 = eval_1d(&t, &coefs, 4, 2, v, &mut hint, &mut work).unwrap();
            assert_abs_diff_eq!(d2, 6.0 * v, epsilon = 1e-10);
            let d3 = eval_1d(&t, &coefs, 4, 3, v, &mut hint, &mut work).unwrap();
            assert_abs_diff_eq!(d3, 6.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn right_endpoint_returns_the_left_limit() {
        let x = uniform_axis(6, 0.0, 1.0);
        let (t, coefs) = fit_line(&x, 4, &|v| (2.0 * v).exp());
        let top = t[t.len() - 1];

        let mut hint = 0;
        let mut work = DeBoorWorkspace::new(4);
        let at_end = eval_1d(&t, &coefs, 4, 0, top, &mut hint, &mut work).unwrap();
        let just_inside = eval_1d(&t, &coefs, 4, 0, top - 1e-9, &mut hint, &mut work).unwrap();
        assert_abs_diff_eq!(at_end, just_inside, epsilon = 1e-6);
    }

    #[test]
    fn eval_1d_errors() {
        let x = uniform_axis(6, 0.0, 1.0);
        let (t, coefs) = fit_line(&x, 4, &|v| v);
        let mut hint = 0;
        let mut work = DeBoorWorkspace::new(4);

        let err = eval_1d(&t, &coefs, 4, 0, -0.2, &mut hint, &mut work).unwrap_err();
        assert!(matches!(err, SplineError::OutOfDomain { .. }));
        let err = eval_1d(&t, &coefs, 4, 0, 1.5, &mut hint, &mut work).unwrap_err();
        assert!(matches!(err, SplineError::OutOfDomain { .. }));
        let err = eval_1d(&t, &coefs, 4, 4, 0.5, &mut hint, &mut work).unwrap_err();
        assert!(matches!(err, SplineError::InvalidArgument(_)));

        // A knot vector that collapses to a single point at the
        // domain's left edge has no left limit to fall back on.
        let degenerate_t = [0.0, 1.0, 1.0, 1.0, 1.0, 2.0];
        let degenerate_c = [1.0, 2.0, 3.0, 4.0];
        let err = eval_1d(&degenerate_t, &degenerate_c, 2, 0, 1.0, &mut hint, &mut work)
            .unwrap_err();
        assert_eq!(err, SplineError::LeftLimitAtEndpoint);
    }

    #[test]
    fn hint_reuse_matches_fresh_hints() {
        let x = uniform_axis(30, 0.0, 10.0);
        let (t, coefs) = fit_line(&x, 4, &|v| (v * 0.7).sin());
        let mut work = DeBoorWorkspace::new(4);

        let mut shared_hint = 0;
        for step in 0..400 {
            let v = step as f64 * 0.025;
            let shared = eval_1d(&t, &coefs, 4, 0, v, &mut shared_hint, &mut work).unwrap();
            let mut fresh_hint = 0;
            let fresh = eval_1d(&t, &coefs, 4, 0, v, &mut fresh_hint, &mut work).unwrap();
            assert_eq!(shared.to_bits(), fresh.to_bits());
        }
    }

    /// Direct tensor-product sum over the active basis window, as an
    /// independent reference for the collapse strategy.
    fn reference_eval_2d(spline: &GridSpline, x: f64, y: f64) -> f64 {
        let (kx, ky) = (spline.axes()[0].order(), spline.axes()[1].order());
        let tx = spline.axes()[0].knots();
        let ty = spline.axes()[1].knots();
        let mut hx = 0;
        let mut hy = 0;
        let (lx, _) = find_interval(tx.as_slice().unwrap(), x, &mut hx);
        let (ly, _) = find_interval(ty.as_slice().unwrap(), y, &mut hy);

        let mut sx = BasisScratch::new(kx);
        let mut bx = vec![0.0; kx];
        crate::basis::nonzero_basis(tx.as_slice().unwrap(), lx, kx, x, &mut sx, &mut bx).unwrap();
        let mut sy = BasisScratch::new(ky);
        let mut by = vec![0.0; ky];
        crate::basis::nonzero_basis(ty.as_slice().unwrap(), ly, ky, y, &mut sy, &mut by).unwrap();

        let coefs = spline.coefficients();
        let mut total = 0.0;
        for i in 0..kx {
            for j in 0..ky {
                let ci = lx + 1 + i - kx;
                let cj = ly + 1 + j - ky;
                total += bx[i] * by[j] * coefs[[ci, cj]];
            }
        }
        total
    }

    #[test]
    fn collapse_matches_direct_tensor_sum_in_2d() {
        let x = uniform_axis(7, 0.0, 1.0);
        let y = uniform_axis(9, -1.0, 1.0);
        let values = ArrayD::from_shape_fn(IxDyn(&[7, 9]), |ix| {
            let xv = ix[0] as f64 / 6.0;
            let yv = -1.0 + 2.0 * ix[1] as f64 / 8.0;
            (1.5 * xv).exp() * (0.8 * yv).cos()
        });
        let spline = GridSpline::fit(
            &[AxisSpec::new(x, 4), AxisSpec::new(y, 3)],
            values.view(),
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(20260802);
        let mut state = spline.make_state();
        for _ in 0..200 {
            let qx: f64 = rng.random_range(0.0..1.0);
            let qy: f64 = rng.random_range(-1.0..1.0);
            let got = spline.eval_with(&mut state, &[qx, qy]);
            let want = reference_eval_2d(&spline, qx, qy);
            assert_abs_diff_eq!(got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn out_of_domain_queries_return_exact_zero() {
        let x = uniform_axis(6, 0.0, 1.0);
        let values = ArrayD::from_shape_fn(IxDyn(&[6, 6]), |_| 3.5);
        let spline = GridSpline::fit(
            &[AxisSpec::new(x.clone(), 4), AxisSpec::new(x, 4)],
            values.view(),
        )
        .unwrap();

        assert_eq!(spline.eval(&[-0.1, 0.5]), 0.0);
        assert_eq!(spline.eval(&[0.5, -1e-300]), 0.0);
        assert_eq!(spline.eval(&[2.0, 0.5]), 0.0);
        assert_eq!(spline.eval(&[0.5, f64::NAN]), 0.0);
        assert_eq!(spline.eval(&[f64::NAN, 0.5]), 0.0);
        // Wrong arity and excessive derivative order are silent too.
        assert_eq!(spline.eval(&[0.5]), 0.0);
        assert_eq!(spline.eval_partial(&[0.5, 0.5], &[4, 0]), 0.0);
    }

    #[test]
    fn one_dimensional_surface_works_through_the_same_api() {
        let x = uniform_axis(9, 0.0, 2.0);
        let f = |v: f64| 1.0 + v * (0.5 - 0.25 * v);
        let values = ArrayD::from_shape_fn(IxDyn(&[9]), |ix| f(x[ix[0]]));
        let spline = GridSpline::fit(&[AxisSpec::new(x.clone(), 3)], values.view()).unwrap();

        for &v in x.iter() {
            assert_abs_diff_eq!(spline.eval(&[v]), f(v), epsilon = 1e-12);
        }
        assert_abs_diff_eq!(spline.eval(&[1.234]), f(1.234), epsilon = 1e-12);
        assert_eq!(spline.eval(&[-0.5]), 0.0);
    }

    #[test]
    fn eval_many_matches_single_queries() {
        let ax = uniform_axis(6, 0.0, 1.0);
        let values = ArrayD::from_shape_fn(IxDyn(&[6, 6]), |ix| {
            (ix[0] * ix[0]) as f64 * 0.1 - ix[1] as f64 * 0.2
        });
        let spline = GridSpline::fit(
            &[AxisSpec::new(ax.clone(), 4), AxisSpec::new(ax, 4)],
            values.view(),
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let mut points = Array2::zeros((64, 2));
        for i in 0..64 {
            points[[i, 0]] = rng.random_range(-0.2..1.2);
            points[[i, 1]] = rng.random_range(-0.2..1.2);
        }
        let batch = spline.eval_many(points.view());
        for i in 0..64 {
            let single = spline.eval(&[points[[i, 0]], points[[i, 1]]]);
            assert_eq!(batch[i].to_bits(), single.to_bits());
        }
    }
}
