use log::{debug, warn};
use nalgebra::linalg::{Cholesky, SVD};
use nalgebra::{DMatrix, DVector, Dyn};

use crate::config::SolverSettings;
use crate::error::{RatingError, Result};

const SVD_MAX_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMethod {
    /// LU with partial pivoting on a non-singular square system.
    Direct,
    /// Cholesky on a positive-definite normal-equations matrix.
    Cholesky,
    /// Minimum-norm least squares through the pseudo-inverse.
    LeastSquares,
}

impl SolveMethod {
    pub fn is_degraded(self) -> bool {
        self == SolveMethod::LeastSquares
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub values: Vec<f64>,
    pub method: SolveMethod,
}

/// Square solve with least-squares fallback when `a` is singular.
pub fn solve_square(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    settings: &SolverSettings,
) -> Result<Solution> {
    check_shapes(a, b)?;
    if let Some(x) = direct_solve(a, b, settings.pivot_tolerance) {
        return Ok(Solution {
            values: x.as_slice().to_vec(),
            method: SolveMethod::Direct,
        });
    }
    warn!(
        "{}x{} system is singular; using least-squares solution",
        a.nrows(),
        a.ncols()
    );
    let x = least_squares(a, b, settings)?;
    Ok(Solution {
        values: x.as_slice().to_vec(),
        method: SolveMethod::LeastSquares,
    })
}

/// Pseudo-inverse solve for an arbitrary (usually rectangular) system.
pub fn solve_least_squares(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    settings: &SolverSettings,
) -> Result<Solution> {
    check_shapes(a, b)?;
    let x = least_squares(a, b, settings)?;
    Ok(Solution {
        values: x.as_slice().to_vec(),
        method: SolveMethod::LeastSquares,
    })
}

/// A factorisation of a symmetric normal-equations matrix, reused across
/// several right-hand sides.
pub enum Factorization {
    Cholesky(Cholesky<f64, Dyn>),
    LeastSquares { svd: SVD<f64, Dyn, Dyn>, cutoff: f64 },
    Empty,
}

impl Factorization {
    pub fn new(a: &DMatrix<f64>, settings: &SolverSettings) -> Result<Self> {
        if a.nrows() == 0 || a.ncols() == 0 {
            return Ok(Factorization::Empty);
        }
        if a.is_square()
            && let Some(chol) = a.clone().cholesky()
            && pivots_ok(chol.l().diagonal().iter().map(|d| d * d), settings.pivot_tolerance)
        {
            return Ok(Factorization::Cholesky(chol));
        }
        warn!(
            "{}x{} system is not positive definite; using least-squares solutions",
            a.nrows(),
            a.ncols()
        );
        let svd = decompose(a)?;
        let cutoff = singular_cutoff(&svd, a, settings);
        Ok(Factorization::LeastSquares { svd, cutoff })
    }

    pub fn method(&self) -> SolveMethod {
        match self {
            Factorization::Cholesky(_) => SolveMethod::Cholesky,
            Factorization::LeastSquares { .. } | Factorization::Empty => SolveMethod::LeastSquares,
        }
    }

    pub fn solve(&self, b: &DVector<f64>) -> Result<Vec<f64>> {
        let x = match self {
            Factorization::Cholesky(chol) => chol.solve(b),
            Factorization::LeastSquares { svd, cutoff } => svd
                .solve(b, *cutoff)
                .map_err(|e| RatingError::Solver(e.to_string()))?,
            Factorization::Empty => DVector::zeros(0),
        };
        Ok(x.as_slice().to_vec())
    }
}

fn check_shapes(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<()> {
    if a.nrows() != b.len() {
        return Err(RatingError::Solver(format!(
            "matrix has {} rows but right-hand side has {}",
            a.nrows(),
            b.len()
        )));
    }
    Ok(())
}

fn direct_solve(a: &DMatrix<f64>, b: &DVector<f64>, tolerance: f64) -> Option<DVector<f64>> {
    if !a.is_square() || a.nrows() == 0 {
        return None;
    }
    let lu = a.clone().lu();
    if !pivots_ok(lu.u().diagonal().iter().copied(), tolerance) {
        return None;
    }
    let x = lu.solve(b)?;
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Smallest pivot must stay above `tolerance` relative to the largest.
fn pivots_ok(pivots: impl Iterator<Item = f64>, tolerance: f64) -> bool {
    let mut min = f64::INFINITY;
    let mut max = 0.0_f64;
    for p in pivots {
        let p = p.abs();
        min = min.min(p);
        max = max.max(p);
    }
    max > 0.0 && min.is_finite() && min > tolerance * max
}

fn least_squares(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    settings: &SolverSettings,
) -> Result<DVector<f64>> {
    if a.nrows() == 0 || a.ncols() == 0 {
        return Ok(DVector::zeros(a.ncols()));
    }
    let svd = decompose(a)?;
    let cutoff = singular_cutoff(&svd, a, settings);
    debug!(
        "least squares on {}x{} system, rank {}",
        a.nrows(),
        a.ncols(),
        svd.rank(cutoff)
    );
    svd.solve(b, cutoff)
        .map_err(|e| RatingError::Solver(e.to_string()))
}

fn decompose(a: &DMatrix<f64>) -> Result<SVD<f64, Dyn, Dyn>> {
    a.clone()
        .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or_else(|| RatingError::Solver("singular value decomposition did not converge".into()))
}

fn singular_cutoff(svd: &SVD<f64, Dyn, Dyn>, a: &DMatrix<f64>, settings: &SolverSettings) -> f64 {
    let rcond = settings
        .pinv_rcond
        .unwrap_or_else(|| a.nrows().max(a.ncols()) as f64 * f64::EPSILON);
    rcond * svd.singular_values.max()
}
