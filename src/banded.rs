use crate::error::SplineError;
use ndarray::Array2;

/// A square banded matrix in diagonal-by-diagonal storage, together
/// with its LU factorization once [`factorize`](BandMatrix::factorize)
/// has run.
///
/// The matrix of order `n` with `nl` subdiagonals and `nu`
/// superdiagonals lives in an `(nl + nu + 1) x n` rectangle: logical
/// entry `(i, j)` is stored at rectangle row `nu + i - j`, column `j`,
/// so each stored row is one diagonal of the matrix. Entries of the
/// rectangle outside the band are never read.
#[derive(Clone, Debug)]
pub struct BandMatrix {
    bands: Array2<f64>,
    n: usize,
    nl: usize,
    nu: usize,
    factored: bool,
}

impl BandMatrix {
    /// Zero-filled banded matrix of order `n` with bandwidths
    /// `nl` below and `nu` above the diagonal.
    pub fn new(n: usize, nl: usize, nu: usize) -> Self {
        Self {
            bands: Array2::zeros((nl + nu + 1, n)),
            n,
            nl,
            nu,
            factored: false,
        }
    }

    pub fn order(&self) -> usize {
        self.n
    }

    /// Writes logical entry `(i, j)`; the pair must lie within the band.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        debug_assert!(i < self.n && j < self.n);
        debug_assert!(
            j <= i + self.nu && i <= j + self.nl,
            "entry ({i}, {j}) is outside the band"
        );
        self.bands[[self.nu + i - j, j]] = value;
        self.factored = false;
    }

    /// Reads logical entry `(i, j)` (zero outside the band).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i < self.n && j < self.n && j <= i + self.nu && i <= j + self.nl {
            self.bands[[self.nu + i - j, j]]
        } else {
            0.0
        }
    }

    /// Replaces the matrix in place by its LU factorization without
    /// pivoting: unit-lower-triangular multipliers below the diagonal,
    /// the upper factor on and above it, both within the original band.
    ///
    /// No pivoting is performed, so this succeeds exactly when every
    /// pivot is nonzero after elimination. That holds for totally
    /// positive matrices such as the B-spline collocation matrix under
    /// the Schoenberg-Whitney condition; a vanishing pivot is reported
    /// as [`SplineError::SingularMatrix`] and the caller maps it to its
    /// own failure taxonomy.
    pub fn factorize(&mut self) -> Result<(), SplineError> {
        let (n, nl, nu) = (self.n, self.nl, self.nu);
        if n == 0 {
            return Err(SplineError::InvalidArgument(
                "cannot factorize an empty matrix".to_string(),
            ));
        }

        for j in 0..n {
            let pivot = self.bands[[nu, j]];
            if pivot == 0.0 {
                self.factored = false;
                return Err(SplineError::SingularMatrix { column: j });
            }
            let rows_below = nl.min(n - 1 - j);
            let cols_right = nu.min(n - 1 - j);
            for i in 1..=rows_below {
                let multiplier = self.bands[[nu + i, j]] / pivot;
                self.bands[[nu + i, j]] = multiplier;
                for c in 1..=cols_right {
                    let update = multiplier * self.bands[[nu - c, j + c]];
                    self.bands[[nu + i - c, j + c]] -= update;
                }
            }
        }

        self.factored = true;
        Ok(())
    }

    /// Solves `A x = b` using the stored factorization, overwriting
    /// `b` with the solution. Forward substitution applies the stored
    /// multipliers, back substitution walks the upper band; the purely
    /// lower (`nu = 0`) and purely upper (`nl = 0`) shapes skip the
    /// half of the work that does not apply.
    pub fn solve_in_place(&self, b: &mut [f64]) {
        debug_assert!(self.factored, "solve_in_place requires factorize first");
        debug_assert_eq!(b.len(), self.n);
        let (n, nl, nu) = (self.n, self.nl, self.nu);

        if nl > 0 {
            for j in 0..n - 1 {
                let bj = b[j];
                if bj != 0.0 {
                    for i in 1..=nl.min(n - 1 - j) {
                        b[j + i] -= self.bands[[nu + i, j]] * bj;
                    }
                }
            }
        }

        for j in (0..n).rev() {
            b[j] /= self.bands[[nu, j]];
            if nu > 0 {
                let xj = b[j];
                for i in 1..=nu.min(j) {
                    b[j - i] -= self.bands[[nu - i, j]] * xj;
                }
            }
        }
    }
}
