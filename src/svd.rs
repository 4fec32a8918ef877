// src/svd.rs

//! Singular value decomposition by one-sided (Hestenes) Jacobi rotations,
//! numerical rank, and the SVD-based pseudo-inverse.

use crate::error::{LinstatError, Result};
use crate::storage::{Matrix, Vector};
use crate::EPSILON;
use log::{debug, warn};
use ndarray::{s, Array1, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvdConfig {
    /// Upper bound on full sweeps over all column pairs.
    pub max_sweeps: usize,
}

impl Default for SvdConfig {
    fn default() -> Self {
        SvdConfig { max_sweeps: 60 }
    }
}

/// Thin SVD `a = u · diag(w) · vᵀ` with `k = min(m, n)` singular values.
#[derive(Debug, Clone)]
pub struct SvdDecomposition {
    /// m × k, orthonormal columns.
    pub u: Matrix,
    /// k singular values, non-negative and sorted descending.
    pub w: Vector,
    /// n × k, orthonormal columns.
    pub v: Matrix,
}

impl SvdDecomposition {
    /// Values at or below `EPSILON · max(w) · max(m, n)` count as zero.
    pub fn rank_threshold(&self) -> f64 {
        let largest = self.w.as_array().first().copied().unwrap_or(0.0);
        EPSILON * largest * self.u.rows().max(self.v.rows()) as f64
    }

    /// Number of singular values above [`Self::rank_threshold`].
    pub fn rank(&self) -> usize {
        let threshold = self.rank_threshold();
        self.w.as_array().iter().filter(|&&x| x > threshold).count()
    }

    /// `u · diag(w) · vᵀ`.
    pub fn reconstruct(&self) -> Matrix {
        let scaled = self.u.as_array() * &self.w.as_array().view().insert_axis(Axis(0));
        Matrix::from_array(scaled.dot(&self.v.as_array().t()))
    }

    /// Moore-Penrose pseudo-inverse `v · diag(1/w or 0) · uᵀ`.
    pub fn pseudo_inverse(&self) -> Matrix {
        let threshold = self.rank_threshold();
        let inverted = self.w.as_array().mapv(|x| if x > threshold { 1.0 / x } else { 0.0 });
        let truncated = inverted.iter().filter(|&&x| x == 0.0).count();
        if truncated > 0 {
            warn!(
                "Pseudo-inverse: truncated {} of {} singular values at threshold {:e}",
                truncated,
                inverted.len(),
                threshold
            );
        }
        let scaled = self.v.as_array() * &inverted.view().insert_axis(Axis(0));
        Matrix::from_array(scaled.dot(&self.u.as_array().t()))
    }
}

/// SVD with the default sweep cap.
pub fn svd(matrix: &Matrix) -> Result<SvdDecomposition> {
    svd_with_config(matrix, &SvdConfig::default())
}

/// SVD of any non-empty matrix.
///
/// # Errors
/// `DimensionMismatch` for an empty matrix, `InvalidArgument` for a non-finite
/// entry, `ConvergenceFailure` when the rotations do not settle within
/// `config.max_sweeps` sweeps.
pub fn svd_with_config(matrix: &Matrix, config: &SvdConfig) -> Result<SvdDecomposition> {
    let (m, n) = matrix.shape();
    if m == 0 || n == 0 {
        return Err(LinstatError::shape_mismatch((m.max(1), n.max(1)), (m, n)));
    }
    let a = matrix.as_array();
    if let Some(bad) = a.iter().find(|x| !x.is_finite()) {
        return Err(LinstatError::InvalidArgument(format!(
            "cannot decompose a matrix containing {}",
            bad
        )));
    }
    // Column dot products are taken on a copy scaled by a power of two near
    // max|a|; the scaling is exact and undone on the singular values.
    let largest = a.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    let scale = if largest > 0.0 {
        2.0_f64.powi(largest.log2().floor() as i32)
    } else {
        1.0
    };
    if m >= n {
        let (u, w, v) = one_sided_jacobi(a / scale, config.max_sweeps)?;
        Ok(SvdDecomposition {
            u: Matrix::from_array(u),
            w: Vector::from_array(w * scale),
            v: Matrix::from_array(v),
        })
    } else {
        // aᵀ = u' w v'ᵀ  ⇒  a = v' w u'ᵀ
        let (u_t, w, v_t) = one_sided_jacobi(a.t().to_owned() / scale, config.max_sweeps)?;
        Ok(SvdDecomposition {
            u: Matrix::from_array(v_t),
            w: Vector::from_array(w * scale),
            v: Matrix::from_array(u_t),
        })
    }
}

/// Replaces `a` by `u`, and writes `w` and `v`.
pub fn svd_in_place(a: &mut Matrix, w: &mut Vector, v: &mut Matrix) -> Result<()> {
    let decomposition = svd(a)?;
    *a = decomposition.u;
    *w = decomposition.w;
    *v = decomposition.v;
    Ok(())
}

/// Pseudo-inverse of any non-empty matrix. Singular input is not an error.
pub fn safe_invert(matrix: &Matrix) -> Result<Matrix> {
    Ok(svd(matrix)?.pseudo_inverse())
}

/// Orthogonalizes the columns of a tall (`m ≥ n`) matrix in place.
fn one_sided_jacobi(
    mut u: Array2<f64>,
    max_sweeps: usize,
) -> Result<(Array2<f64>, Array1<f64>, Array2<f64>)> {
    let (m, n) = u.dim();
    let mut v = Array2::<f64>::eye(n);
    // Relative orthogonality below which two working columns are left alone.
    let tolerance = f64::EPSILON * m as f64;

    let mut sweeps = 0;
    loop {
        let mut rotated = false;
        for p in 0..n.saturating_sub(1) {
            for q in (p + 1)..n {
                let alpha = u.column(p).dot(&u.column(p));
                let beta = u.column(q).dot(&u.column(q));
                let gamma = u.column(p).dot(&u.column(q));
                if gamma == 0.0 || gamma.abs() <= tolerance * (alpha * beta).sqrt() {
                    continue;
                }
                rotated = true;
                let zeta = (beta - alpha) / (2.0 * gamma);
                let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let sn = c * t;
                rotate_columns(&mut u, p, q, c, sn);
                rotate_columns(&mut v, p, q, c, sn);
            }
        }
        sweeps += 1;
        if !rotated {
            break;
        }
        if sweeps >= max_sweeps {
            return Err(LinstatError::ConvergenceFailure { iterations: sweeps });
        }
    }
    debug!("SVD: {}x{} converged after {} sweeps", m, n, sweeps);

    let mut w = Array1::<f64>::zeros(n);
    for j in 0..n {
        let norm = u.column(j).dot(&u.column(j)).sqrt();
        w[j] = norm;
        if norm > 0.0 {
            u.column_mut(j).mapv_inplace(|x| x / norm);
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| w[b].total_cmp(&w[a]));
    let u = u.select(Axis(1), &order);
    let v = v.select(Axis(1), &order);
    let w = order.iter().map(|&j| w[j]).collect::<Array1<f64>>();

    let u = complete_null_columns(u, &w);
    Ok((u, w, v))
}

fn rotate_columns(a: &mut Array2<f64>, p: usize, q: usize, c: f64, sn: f64) {
    let (mut col_p, mut col_q) = a.multi_slice_mut((s![.., p], s![.., q]));
    Zip::from(&mut col_p).and(&mut col_q).for_each(|x, y| {
        let xp = *x;
        let yq = *y;
        *x = c * xp - sn * yq;
        *y = sn * xp + c * yq;
    });
}

/// Columns belonging to a zero singular value come out of the rotations as
/// zero vectors. Replaces them with unit vectors orthogonal to every other column.
fn complete_null_columns(mut u: Array2<f64>, w: &Array1<f64>) -> Array2<f64> {
    let (m, k) = u.dim();
    for j in 0..k {
        if w[j] > 0.0 {
            continue;
        }
        for basis in 0..m {
            let mut candidate = Array1::<f64>::zeros(m);
            candidate[basis] = 1.0;
            // Two Gram-Schmidt passes against the other columns.
            for _ in 0..2 {
                for other in 0..k {
                    if other == j || (w[other] == 0.0 && other > j) {
                        continue;
                    }
                    let col = u.column(other);
                    let projection = col.dot(&candidate);
                    candidate.scaled_add(-projection, &col);
                }
            }
            let norm = candidate.dot(&candidate).sqrt();
            if norm > 1e-8 {
                candidate.mapv_inplace(|x| x / norm);
                u.column_mut(j).assign(&candidate);
                break;
            }
        }
    }
    u
}
