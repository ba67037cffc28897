#![deny(dead_code)]
#![deny(unused_imports)]

//! Tensor-product B-spline interpolation of scalar functions sampled
//! on rectilinear grids, in one through six dimensions.
//!
//! [`GridSpline::fit`] builds an interpolating spline from per-axis
//! [`AxisSpec`] descriptors and a sample array; the fitted spline then
//! answers value and mixed-partial-derivative queries through
//! [`GridSpline::eval`] and friends. Out-of-domain queries evaluate to
//! exactly zero. The 1D building blocks (knot-interval search, basis
//! evaluation, de Boor evaluation, banded LU) are exported for callers
//! that need them directly.

pub mod banded;
pub mod basis;
pub mod construction;
pub mod error;
pub mod evaluate;
pub mod types;

pub use banded::BandMatrix;
pub use basis::{BasisScratch, Placement, find_interval, nonzero_basis, nonzero_basis_resume,
    not_a_knot_knots};
pub use error::SplineError;
pub use evaluate::{DeBoorWorkspace, EvalState, eval_1d};
pub use types::{AxisSpec, GridSpline, SplineAxis};
