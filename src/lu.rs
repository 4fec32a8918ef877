// src/lu.rs

//! LU decomposition with partial pivoting, determinants and LU-based inversion.

use crate::error::{LinstatError, Result};
use crate::storage::{Matrix, Vector};
use crate::EPSILON;
use log::trace;
use ndarray::{Array1, Array2};

/// Packed LU factors of a row permutation of a square matrix: `P·A = L·U`.
///
/// `lu` holds `U` on and above the diagonal and the multipliers of `L` below it;
/// the unit diagonal of `L` is implicit.
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    lu: Array2<f64>,
    /// `permutation[i]` is the index of the original row that ended up in row `i`.
    permutation: Vec<usize>,
    /// +1 for an even number of row interchanges, -1 for an odd number.
    sign: i32,
}

/// Factors `matrix` using Gaussian elimination with partial pivoting.
///
/// A pivot whose magnitude does not exceed `EPSILON` times the largest absolute
/// element of the input is treated as zero.
///
/// # Errors
/// `DimensionMismatch` for an empty or non-square matrix, `SingularMatrix` when
/// no usable pivot exists in some column.
pub fn lu_decompose(matrix: &Matrix) -> Result<LuDecomposition> {
    let n = matrix.rows();
    if n == 0 || !matrix.is_square() {
        return Err(LinstatError::shape_mismatch((n.max(1), n.max(1)), matrix.shape()));
    }
    let mut lu = matrix.as_array().to_owned();
    let scale = lu.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()));
    let threshold = EPSILON * scale;
    let mut permutation: Vec<usize> = (0..n).collect();
    let mut sign = 1;

    for k in 0..n {
        let mut pivot_row = k;
        let mut pivot_abs = lu[[k, k]].abs();
        for r in (k + 1)..n {
            let candidate = lu[[r, k]].abs();
            if candidate > pivot_abs {
                pivot_abs = candidate;
                pivot_row = r;
            }
        }
        if pivot_abs <= threshold || !pivot_abs.is_finite() {
            trace!("LU: pivot {:e} in column {} below threshold {:e}", pivot_abs, k, threshold);
            return Err(LinstatError::SingularMatrix { pivot: pivot_abs });
        }
        if pivot_row != k {
            for c in 0..n {
                lu.swap([k, c], [pivot_row, c]);
            }
            permutation.swap(k, pivot_row);
            sign = -sign;
        }
        let pivot = lu[[k, k]];
        for r in (k + 1)..n {
            let factor = lu[[r, k]] / pivot;
            lu[[r, k]] = factor;
            if factor != 0.0 {
                for c in (k + 1)..n {
                    lu[[r, c]] -= factor * lu[[k, c]];
                }
            }
        }
    }

    Ok(LuDecomposition { lu, permutation, sign })
}

/// Replaces `matrix` by its packed LU factors, writes the row permutation into
/// `permutation` and returns the permutation sign.
pub fn lu_decompose_in_place(matrix: &mut Matrix, permutation: &mut Vector) -> Result<i32> {
    let decomposition = lu_decompose(matrix)?;
    *permutation = Vector::from_vec(decomposition.permutation.iter().map(|&p| p as f64).collect());
    *matrix = decomposition.packed();
    Ok(decomposition.sign)
}

impl LuDecomposition {
    pub fn dimension(&self) -> usize {
        self.lu.nrows()
    }

    /// The packed L/U matrix.
    pub fn packed(&self) -> Matrix {
        Matrix::from_array(self.lu.clone())
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn sign(&self) -> i32 {
        self.sign
    }

    /// Unit lower-triangular factor.
    pub fn lower(&self) -> Matrix {
        let n = self.dimension();
        Matrix::from_array(Array2::from_shape_fn((n, n), |(r, c)| match r.cmp(&c) {
            std::cmp::Ordering::Greater => self.lu[[r, c]],
            std::cmp::Ordering::Equal => 1.0,
            std::cmp::Ordering::Less => 0.0,
        }))
    }

    /// Upper-triangular factor.
    pub fn upper(&self) -> Matrix {
        let n = self.dimension();
        Matrix::from_array(Array2::from_shape_fn((n, n), |(r, c)| {
            if r <= c {
                self.lu[[r, c]]
            } else {
                0.0
            }
        }))
    }

    /// Rows of `matrix` reordered by the pivoting permutation, i.e. `P·A`.
    pub fn permuted_input(&self, matrix: &Matrix) -> Result<Matrix> {
        let indices: Vec<isize> = self.permutation.iter().map(|&p| p as isize).collect();
        matrix.rows_at(&indices)
    }

    /// Product of the diagonal of `U` times the permutation sign.
    pub fn determinant(&self) -> f64 {
        let diag_product: f64 = self.lu.diag().iter().product();
        f64::from(self.sign) * diag_product
    }

    /// `(sign, ln|det|)`, accumulated in log space so that neither part
    /// under- or overflows where [`determinant`](Self::determinant) would.
    pub fn log_abs_determinant(&self) -> (f64, f64) {
        self.lu
            .diag()
            .iter()
            .fold((f64::from(self.sign), 0.0), |(sign, log_abs), &u| {
                (if u < 0.0 { -sign } else { sign }, log_abs + u.abs().ln())
            })
    }

    /// Solves `A·x = b`.
    pub fn solve(&self, b: &Vector) -> Result<Vector> {
        let n = self.dimension();
        if b.size() != n {
            return Err(LinstatError::len_mismatch(n, b.size()));
        }
        let rhs = b.as_array();
        let mut x = Array1::from_shape_fn(n, |i| rhs[self.permutation[i]]);
        self.substitute(&mut x);
        Ok(Vector::from_array(x))
    }

    /// Forward then backward substitution on an already permuted right-hand side.
    fn substitute(&self, x: &mut Array1<f64>) {
        let n = self.dimension();
        for i in 0..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum / self.lu[[i, i]];
        }
    }

    /// `A⁻¹`, solving one unit column at a time.
    pub fn inverse(&self) -> Matrix {
        let n = self.dimension();
        let mut inverse = Array2::<f64>::zeros((n, n));
        for col in 0..n {
            let mut x = Array1::from_shape_fn(n, |i| if self.permutation[i] == col { 1.0 } else { 0.0 });
            self.substitute(&mut x);
            inverse.column_mut(col).assign(&x);
        }
        Matrix::from_array(inverse)
    }
}

/// Determinant via LU. A singular matrix has determinant 0.
///
/// # Errors
/// `DimensionMismatch` for a non-square matrix.
pub fn determinant(matrix: &Matrix) -> Result<f64> {
    if !matrix.is_square() {
        return Err(LinstatError::shape_mismatch((matrix.rows(), matrix.rows()), matrix.shape()));
    }
    if matrix.is_empty() {
        return Ok(1.0);
    }
    match lu_decompose(matrix) {
        Ok(decomposition) => Ok(decomposition.determinant()),
        Err(LinstatError::SingularMatrix { .. }) => Ok(0.0),
        Err(e) => Err(e),
    }
}

/// True if LU finds no usable pivot.
pub fn is_singular(matrix: &Matrix) -> Result<bool> {
    match lu_decompose(matrix) {
        Ok(_) => Ok(false),
        Err(LinstatError::SingularMatrix { .. }) => Ok(true),
        Err(e) => Err(e),
    }
}

/// Exact inverse via LU.
///
/// # Errors
/// `SingularMatrix` on singular input; use [`crate::svd::safe_invert`] for an
/// always-defined pseudo-inverse.
pub fn invert(matrix: &Matrix) -> Result<Matrix> {
    Ok(lu_decompose(matrix)?.inverse())
}

/// In-place variant of [`invert`]. The receiver is untouched on error.
pub fn invert_in_place(matrix: &mut Matrix) -> Result<()> {
    *matrix = invert(matrix)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn m(rows: &[Vec<f64>]) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    /// Reference determinant by cofactor expansion along the first row.
    fn cofactor_det(a: &Array2<f64>) -> f64 {
        let n = a.nrows();
        if n == 1 {
            return a[[0, 0]];
        }
        let mut det = 0.0;
        for c in 0..n {
            let minor = Array2::from_shape_fn((n - 1, n - 1), |(i, j)| {
                a[[i + 1, if j < c { j } else { j + 1 }]]
            });
            let sign = if c % 2 == 0 { 1.0 } else { -1.0 };
            det += sign * a[[0, c]] * cofactor_det(&minor);
        }
        det
    }

    #[test]
    fn test_lu_reconstructs_permuted_input() {
        let a = m(&[
            vec![2.0, 1.0, 1.0, 0.0],
            vec![4.0, 3.0, 3.0, 1.0],
            vec![8.0, 7.0, 9.0, 5.0],
            vec![6.0, 7.0, 9.0, 8.0],
        ]);
        let lu = lu_decompose(&a).unwrap();
        let product = lu.lower().product(&lu.upper()).unwrap();
        assert!(product.pretty_close_to(&lu.permuted_input(&a).unwrap(), 1e-12));

        let mut sorted = lu.permutation().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_determinant_matches_cofactor_expansion() {
        let a3 = m(&[vec![2.0, -3.0, 1.0], vec![2.0, 0.0, -1.0], vec![1.0, 4.0, 5.0]]);
        assert_abs_diff_eq!(determinant(&a3).unwrap(), cofactor_det(a3.as_array()), epsilon = 1e-10);
        assert_abs_diff_eq!(determinant(&a3).unwrap(), 49.0, epsilon = 1e-10);

        let a4 = m(&[
            vec![3.0, 2.0, 0.0, 1.0],
            vec![4.0, 0.0, 1.0, 2.0],
            vec![3.0, 0.0, 2.0, 1.0],
            vec![9.0, 2.0, 3.0, 1.0],
        ]);
        assert_abs_diff_eq!(determinant(&a4).unwrap(), cofactor_det(a4.as_array()), epsilon = 1e-10);
        assert_abs_diff_eq!(determinant(&a4).unwrap(), 24.0, epsilon = 1e-10);
    }

    #[test]
    fn test_log_determinant_survives_underflow() {
        let mut a = Matrix::identity(60);
        a.multiply(1e-7);
        a.as_array_mut()[[0, 0]] = -1e-7;
        let lu = lu_decompose(&a).unwrap();
        assert_eq!(lu.determinant(), 0.0);
        let (sign, log_abs) = lu.log_abs_determinant();
        assert_eq!(sign, -1.0);
        assert_abs_diff_eq!(log_abs, 60.0 * 1e-7_f64.ln(), epsilon = 1e-9);

        let b = Matrix::from_rows(&[vec![0.0, 2.0], vec![3.0, 1.0]]).unwrap();
        let (sign, log_abs) = lu_decompose(&b).unwrap().log_abs_determinant();
        assert_eq!(sign, -1.0);
        assert_abs_diff_eq!(log_abs, 6.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_singular_matrix_is_reported() {
        let a = m(&[vec![1.0, 2.0, 3.0], vec![2.0, 4.0, 6.0], vec![1.0, 0.0, 1.0]]);
        assert!(matches!(lu_decompose(&a), Err(LinstatError::SingularMatrix { .. })));
        assert!(matches!(invert(&a), Err(LinstatError::SingularMatrix { .. })));
        assert_eq!(determinant(&a).unwrap(), 0.0);
        assert!(is_singular(&a).unwrap());
        assert!(matches!(lu_decompose(&Matrix::zeros(3, 3)), Err(LinstatError::SingularMatrix { .. })));
    }

    #[test]
    fn test_non_square_is_dimension_mismatch() {
        assert!(matches!(
            lu_decompose(&Matrix::zeros(2, 3)),
            Err(LinstatError::DimensionMismatch { .. })
        ));
        assert!(determinant(&Matrix::zeros(3, 2)).is_err());
    }

    #[test]
    fn test_inverse_times_matrix_is_identity() {
        let a = m(&[vec![4.0, 7.0, 2.0], vec![3.0, 6.0, 1.0], vec![2.0, 5.0, 3.0]]);
        let inv = invert(&a).unwrap();
        let product = inv.product(&a).unwrap();
        assert!(product.pretty_close_to(&Matrix::identity(3), 1e-12));
    }

    #[test]
    fn test_in_place_variants() {
        let a = m(&[vec![0.0, 1.0], vec![1.0, 0.0]]);
        let mut packed = a.clone();
        let mut perm = Vector::new();
        let sign = lu_decompose_in_place(&mut packed, &mut perm).unwrap();
        assert_eq!(sign, -1);
        assert_eq!(perm.to_vec(), vec![1.0, 0.0]);
        assert_eq!(packed, Matrix::identity(2));

        let mut b = a.clone();
        invert_in_place(&mut b).unwrap();
        assert_eq!(b, a);
    }

    #[test]
    fn test_solve() {
        let a = m(&[vec![2.0, 1.0], vec![1.0, 3.0]]);
        let x = lu_decompose(&a)
            .unwrap()
            .solve(&Vector::from_vec(vec![3.0, 5.0]))
            .unwrap();
        assert!(x.pretty_close_to(&Vector::from_vec(vec![0.8, 1.4]), 1e-12));
    }
}
