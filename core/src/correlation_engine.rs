//! Correlation Engine.
//!
//! Factors a target correlation matrix R into F with F·Fᵀ = R, then maps
//! independent standard normals z onto F·z. F is the Cholesky factor when
//! R is positive definite. Singular but semi-definite matrices fall back to
//! Q·√Λ from the symmetric eigendecomposition. Anything else is a
//! configuration error.

use nalgebra::{linalg::Cholesky, DMatrix, DVector, SymmetricEigen};

use crate::{
    error::{GenError, GenResult},
    rng::StreamRng,
};

/// Slack for symmetry, unit diagonal and eigenvalues of semi-definite input.
const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    factor: DMatrix<f64>,
}

impl CorrelationEngine {
    pub fn new(matrix: &[Vec<f64>]) -> GenResult<Self> {
        check_shape(matrix)?;
        let n = matrix.len();
        let target = DMatrix::from_fn(n, n, |i, j| matrix[i][j]);
        let factor = factorize(target)?;
        Ok(Self { factor })
    }

    pub fn dims(&self) -> usize {
        self.factor.nrows()
    }

    pub fn factor(&self) -> &DMatrix<f64> {
        &self.factor
    }

    /// Apply the factor to a vector of independent standard normals.
    pub fn correlate(&self, z: &[f64]) -> Vec<f64> {
        let z = DVector::from_column_slice(z);
        (&self.factor * z).iter().copied().collect()
    }

    /// One correlated draw with standard-normal marginals.
    pub fn draw(&self, rng: &mut StreamRng) -> Vec<f64> {
        let z: Vec<f64> = (0..self.dims()).map(|_| rng.standard_normal()).collect();
        self.correlate(&z)
    }

    /// `count × dims` matrix of correlated draws.
    pub fn sample(&self, count: usize, rng: &mut StreamRng) -> Vec<Vec<f64>> {
        (0..count).map(|_| self.draw(rng)).collect()
    }
}

fn check_shape(matrix: &[Vec<f64>]) -> GenResult<()> {
    let n = matrix.len();
    if n == 0 {
        return Err(GenError::config("correlation matrix is empty"));
    }
    if let Some((i, row)) = matrix.iter().enumerate().find(|(_, row)| row.len() != n) {
        return Err(GenError::config(format!(
            "correlation matrix row {i} has {} entries, expected {n}",
            row.len()
        )));
    }
    for (i, row) in matrix.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            if !v.is_finite() || v.abs() > 1.0 + TOLERANCE {
                return Err(GenError::config(format!(
                    "correlation entry ({i},{j}) = {v} is outside [-1, 1]"
                )));
            }
            if (v - matrix[j][i]).abs() > TOLERANCE {
                return Err(GenError::config(format!(
                    "correlation matrix is not symmetric at ({i},{j})"
                )));
            }
        }
        if (row[i] - 1.0).abs() > TOLERANCE {
            return Err(GenError::config(format!(
                "correlation matrix diagonal ({i},{i}) must be 1.0"
            )));
        }
    }
    Ok(())
}

fn factorize(target: DMatrix<f64>) -> GenResult<DMatrix<f64>> {
    if let Some(chol) = Cholesky::new(target.clone()) {
        return Ok(chol.l());
    }
    let eigen = SymmetricEigen::new(target);
    let smallest = eigen.eigenvalues.min();
    if smallest < -TOLERANCE {
        return Err(GenError::config(format!(
            "correlation matrix is not positive semi-definite (smallest eigenvalue {smallest:.6})"
        )));
    }
    let roots = eigen.eigenvalues.map(|v| if v > TOLERANCE { v.sqrt() } else { 0.0 });
    Ok(eigen.eigenvectors * DMatrix::from_diagonal(&roots))
}

/// Sample Pearson correlation. `None` when either side has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mx = xs[..n].iter().sum::<f64>() / n as f64;
    let my = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + statrs::function::erf::erf(x / std::f64::consts::SQRT_2))
}
