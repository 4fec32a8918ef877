// src/jacobi.rs

//! Cyclic Jacobi eigen-decomposition of real symmetric matrices.

use crate::error::{LinstatError, Result};
use crate::storage::{Matrix, Vector};
use crate::EPSILON;
use log::{debug, trace};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JacobiConfig {
    pub max_sweeps: usize,
    /// Convergence once the off-diagonal Frobenius norm falls below
    /// `tolerance` times the Frobenius norm of the whole matrix.
    pub tolerance: f64,
}

impl Default for JacobiConfig {
    fn default() -> Self {
        JacobiConfig {
            max_sweeps: 50,
            tolerance: EPSILON,
        }
    }
}

/// Eigenpairs sorted by descending eigenvalue; `vectors.column(i)` belongs to `values[i]`.
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    pub values: Vector,
    pub vectors: Matrix,
}

impl EigenDecomposition {
    /// `V · diag(λ) · Vᵀ`.
    pub fn reconstruct(&self) -> Matrix {
        let v = self.vectors.as_array();
        let scaled = v * &self.values.as_array().view().insert_axis(Axis(0));
        Matrix::from_array(scaled.dot(&v.t()))
    }
}

pub fn jacobi_eigen(matrix: &Matrix) -> Result<EigenDecomposition> {
    jacobi_eigen_with_config(matrix, &JacobiConfig::default())
}

/// Diagonalizes a symmetric matrix by plane rotations.
///
/// Only the upper triangle drives the rotations and symmetry is not checked;
/// an asymmetric input yields the decomposition of some symmetric neighbour.
///
/// # Errors
/// `DimensionMismatch` for a non-square matrix, `InvalidArgument` for a
/// non-finite entry, `ConvergenceFailure` after `config.max_sweeps` sweeps
/// without convergence.
pub fn jacobi_eigen_with_config(matrix: &Matrix, config: &JacobiConfig) -> Result<EigenDecomposition> {
    if !matrix.is_square() {
        return Err(LinstatError::shape_mismatch((matrix.rows(), matrix.rows()), matrix.shape()));
    }
    let (values, vectors) = jacobi_eigh(matrix.as_array(), config)?;
    Ok(EigenDecomposition {
        values: Vector::from_array(values),
        vectors: Matrix::from_array(vectors),
    })
}

/// Array-level routine shared with the native backend.
pub(crate) fn jacobi_eigh(input: &Array2<f64>, config: &JacobiConfig) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = input.nrows();
    if let Some(bad) = input.iter().find(|x| !x.is_finite()) {
        return Err(LinstatError::InvalidArgument(format!(
            "cannot diagonalize a matrix containing {}",
            bad
        )));
    }
    // Iterate on a copy scaled by a power of two near max|a|, so that squared
    // entries cannot overflow. The scaling itself is exact.
    let largest = input.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    let scale = if largest > 0.0 {
        2.0_f64.powi(largest.log2().floor() as i32)
    } else {
        1.0
    };
    let mut a = input / scale;
    // Mirror the upper triangle so rotations act on a symmetric matrix.
    for r in 0..n {
        for c in 0..r {
            a[[r, c]] = a[[c, r]];
        }
    }
    let mut v = Array2::<f64>::eye(n);
    let frobenius_sq: f64 = a.iter().map(|x| x * x).sum();

    let mut sweeps = 0;
    loop {
        let off_sq = off_diagonal_mass(&a);
        if off_sq == 0.0 || off_sq <= config.tolerance * config.tolerance * frobenius_sq {
            break;
        }
        if sweeps >= config.max_sweeps {
            return Err(LinstatError::ConvergenceFailure { iterations: sweeps });
        }
        for p in 0..n.saturating_sub(1) {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                // After a few sweeps, drop elements that no longer change either diagonal entry.
                let g = 100.0 * apq.abs();
                if sweeps > 3 && a[[p, p]].abs() + g == a[[p, p]].abs() && a[[q, q]].abs() + g == a[[q, q]].abs() {
                    a[[p, q]] = 0.0;
                    a[[q, p]] = 0.0;
                } else {
                    rotate(&mut a, &mut v, p, q);
                }
            }
        }
        sweeps += 1;
        trace!("Jacobi: sweep {} off-diagonal mass {:e}", sweeps, off_sq);
    }
    debug!("Jacobi: {}x{} converged after {} sweeps", n, n, sweeps);

    let diagonal = a.diag().to_owned();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| diagonal[j].total_cmp(&diagonal[i]));
    let values = order.iter().map(|&i| diagonal[i] * scale).collect::<Array1<f64>>();
    let vectors = v.select(Axis(1), &order);
    Ok((values, vectors))
}

fn off_diagonal_mass(a: &Array2<f64>) -> f64 {
    a.indexed_iter()
        .filter(|((r, c), _)| r != c)
        .map(|(_, x)| x * x)
        .sum()
}

/// Zeroes `a[p][q]` with one rotation `a ← Jᵀ a J`, accumulating `v ← v J`.
fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize) {
    let n = a.nrows();
    let apq = a[[p, q]];
    let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;
    let tau = s / (1.0 + c);

    a[[p, p]] -= t * apq;
    a[[q, q]] += t * apq;
    a[[p, q]] = 0.0;
    a[[q, p]] = 0.0;
    for k in 0..n {
        if k == p || k == q {
            continue;
        }
        let akp = a[[k, p]];
        let akq = a[[k, q]];
        let new_kp = akp - s * (akq + tau * akp);
        let new_kq = akq + s * (akp - tau * akq);
        a[[k, p]] = new_kp;
        a[[p, k]] = new_kp;
        a[[k, q]] = new_kq;
        a[[q, k]] = new_kq;
    }
    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = vkp - s * (vkq + tau * vkp);
        v[[k, q]] = vkq + s * (vkp - tau * vkq);
    }
}
