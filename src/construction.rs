use crate::banded::BandMatrix;
use crate::basis::{BasisScratch, nonzero_basis, not_a_knot_knots};
use crate::error::SplineError;
use crate::types::{AxisSpec, GridSpline, SplineAxis};
use ndarray::{ArrayD, ArrayViewD, IxDyn};

/// Validates a fit request: axis count, sample shape, and the per-axis
/// checks (length, order, abscissa monotonicity, supplied knots). The
/// first failing check wins, axis by axis, which is what keeps the
/// legacy code mapping stable.
fn validate(axes: &[AxisSpec], shape: &[usize]) -> Result<(), SplineError> {
    if axes.is_empty() || axes.len() > 6 {
        return Err(SplineError::InvalidDimension(axes.len()));
    }
    let expected: Vec<usize> = axes.iter().map(|a| a.abscissae.len()).collect();
    if shape != expected.as_slice() {
        return Err(SplineError::ShapeMismatch {
            shape: shape.to_vec(),
            expected,
        });
    }
    for (axis, spec) in axes.iter().enumerate() {
        let n = spec.abscissae.len();
        if n < 3 {
            return Err(SplineError::AxisTooShort { axis, len: n });
        }
        let k = spec.order;
        if k < 2 || k > n - 1 {
            return Err(SplineError::InvalidOrder {
                axis,
                order: k,
                max: n - 1,
            });
        }
        for i in 1..n {
            if spec.abscissae[i] <= spec.abscissae[i - 1] {
                return Err(SplineError::NonIncreasingAbscissae { axis });
            }
        }
        if let Some(t) = &spec.knots {
            if t.len() != n + k {
                return Err(SplineError::InvalidKnotVector {
                    axis,
                    expected: n + k,
                });
            }
            for i in 1..t.len() {
                if t[i] < t[i - 1] {
                    return Err(SplineError::InvalidKnotVector {
                        axis,
                        expected: n + k,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Computes B-spline interpolation coefficients along one axis for
/// `nf` right-hand sides sharing the same abscissae and knots.
///
/// `rhs` is read as an `(nf, n)` row-major matrix whose rows are the
/// independent value lines; `out` is written as its `(n, nf)`
/// transpose, coefficient index major. The transpose is what rotates
/// the axis order of the tensor sweep: the next axis's value lines
/// land contiguously, so every sweep reads with stride 1.
///
/// The collocation matrix has bandwidth `k - 1` on both sides of the
/// diagonal and is assembled row by row from the nonzero basis values
/// at each abscissa, factorized once, and back-substituted per
/// right-hand side. An abscissa that escapes the support of its basis
/// function, or a vanishing pivot, reports the Schoenberg-Whitney
/// failure for `axis`.
pub(crate) fn collocation_coefficients(
    abscissae: &[f64],
    knots: &[f64],
    k: usize,
    axis: usize,
    rhs: &[f64],
    out: &mut [f64],
    scratch: &mut BasisScratch,
    bvals: &mut [f64],
    work: &mut [f64],
) -> Result<(), SplineError> {
    let n = abscissae.len();
    let nf = rhs.len() / n;
    debug_assert_eq!(rhs.len(), n * nf);
    debug_assert_eq!(out.len(), n * nf);
    debug_assert_eq!(bvals.len(), k);
    debug_assert_eq!(work.len(), n);

    let mut band = BandMatrix::new(n, k - 1, k - 1);
    let mut left = k - 1;
    for (i, &xi) in abscissae.iter().enumerate() {
        // The i-th collocation row must draw on basis functions
        // i-k+1..=i+k-1, so the enclosing interval is confined to
        // [i, i+k-1]; leaving that window means B[i](x[i]) = 0.
        left = left.max(i);
        let cap = (i + k).min(n) - 1;
        if xi < knots[left] {
            return Err(SplineError::SchoenbergWhitney { axis });
        }
        while left < cap && knots[left + 1] <= xi {
            left += 1;
        }
        if xi > knots[left + 1] {
            return Err(SplineError::SchoenbergWhitney { axis });
        }
        nonzero_basis(knots, left, k, xi, scratch, bvals)?;
        for (j, &v) in bvals.iter().enumerate() {
            band.set(i, left + 1 + j - k, v);
        }
    }

    band.factorize()
        .map_err(|_| SplineError::SchoenbergWhitney { axis })?;

    for r in 0..nf {
        work.copy_from_slice(&rhs[r * n..(r + 1) * n]);
        band.solve_in_place(work);
        for (i, &v) in work.iter().enumerate() {
            out[i * nf + r] = v;
        }
    }
    Ok(())
}

impl GridSpline {
    /// Fits an interpolating tensor-product B-spline to `values`
    /// sampled on the rectilinear grid described by `axes`.
    ///
    /// The sample array must have one dimension per axis, with extent
    /// equal to that axis's abscissa count; between 1 and 6 axes are
    /// supported. The returned spline reproduces every sample at its
    /// grid point and carries `order - 2` continuous derivatives along
    /// each axis.
    ///
    /// The fit applies the 1D coefficient solve once per axis, always
    /// along the currently contiguous dimension, ping-ponging between
    /// two flat buffers; each pass writes its output transposed so the
    /// axis order rotates cyclically and returns to the original
    /// layout after the final pass. `values` itself is only read --
    /// the coefficient array is freshly allocated.
    pub fn fit(axes: &[AxisSpec], values: ArrayViewD<'_, f64>) -> Result<Self, SplineError> {
        validate(axes, values.shape())?;
        let d = axes.len();

        let fitted: Vec<SplineAxis> = axes
            .iter()
            .map(|spec| {
                let knots = match &spec.knots {
                    Some(t) => t.clone(),
                    None => not_a_knot_knots(spec.abscissae.view(), spec.order),
                };
                SplineAxis {
                    len: spec.abscissae.len(),
                    order: spec.order,
                    knots,
                }
            })
            .collect();

        let total = values.len();
        // Logical-order flatten, so any input layout is accepted.
        let mut cur: Vec<f64> = values.iter().copied().collect();
        let mut next = vec![0.0; total];

        let k_max = fitted.iter().map(|a| a.order).max().unwrap_or(1);
        let n_max = fitted.iter().map(|a| a.len).max().unwrap_or(1);
        let mut scratch = BasisScratch::new(k_max);
        let mut bvals = vec![0.0; k_max];
        let mut work = vec![0.0; n_max];

        for sweep in 0..d {
            let axis = d - 1 - sweep;
            let ax = &fitted[axis];
            let n = ax.len;
            let k = ax.order;
            collocation_coefficients(
                axes[axis]
                    .abscissae
                    .as_slice()
                    .expect("axis abscissae are contiguous"),
                ax.knots.as_slice().expect("knot vectors are contiguous"),
                k,
                axis,
                &cur,
                &mut next,
                &mut scratch,
                &mut bvals[..k],
                &mut work[..n],
            )?;
            std::mem::swap(&mut cur, &mut next);
        }

        let shape: Vec<usize> = fitted.iter().map(|a| a.len).collect();
        let coefficients = ArrayD::from_shape_vec(IxDyn(&shape), cur)
            .expect("coefficient buffer matches the sample shape");
        Ok(GridSpline {
            axes: fitted,
            coefficients,
        })
    }
}
