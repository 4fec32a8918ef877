// src/stats.rs

//! Row/column statistics over dense storage.
//!
//! "Of rows" treats every row as one observation and yields one value per
//! column; "of columns" treats every column as an observation. All variances
//! and covariances are population statistics (divided by N).

use crate::error::{LinstatError, Result};
use crate::storage::{Matrix, Vector};
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};

/// Tolerance on `|Σp − 1|` accepted by [`entropy`].
pub const ENTROPY_SUM_TOLERANCE: f64 = 1e-6;

fn require_observations(count: usize, width: usize) -> Result<()> {
    if count == 0 {
        return Err(LinstatError::shape_mismatch((1, width), (0, width)));
    }
    Ok(())
}

/// Running mean `m_k = m_{k-1} + (x_k - m_{k-1}) / k` of the rows of `view`.
///
/// A constant column yields its value exactly, so centring it gives exact zeros.
pub(crate) fn mean_rows_of(view: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    require_observations(view.nrows(), view.ncols())?;
    let mut mean = Array1::<f64>::zeros(view.ncols());
    for (k, row) in view.rows().into_iter().enumerate() {
        let count = (k + 1) as f64;
        Zip::from(&mut mean).and(&row).for_each(|m, &x| *m += (x - *m) / count);
    }
    Ok(mean)
}

fn variance_rows_of(view: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    require_observations(view.nrows(), view.ncols())?;
    Ok(view.var_axis(Axis(0), 0.0))
}

/// Population covariance of the rows of `view`, `ncols × ncols`.
pub(crate) fn covariance_rows_of(view: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    let mean = mean_rows_of(view)?;
    let centered = &view - &mean.view().insert_axis(Axis(0));
    let n = view.nrows() as f64;
    Ok(centered.t().dot(&centered) / n)
}

fn bounds_rows_of(view: ArrayView2<'_, f64>) -> Result<(Array1<f64>, Array1<f64>)> {
    require_observations(view.nrows(), view.ncols())?;
    let min = view.fold_axis(Axis(0), f64::INFINITY, |acc, &x| acc.min(x));
    let max = view.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &x| acc.max(x));
    Ok((min, max))
}

/// Mean row: one entry per column.
pub fn mean_of_rows(m: &Matrix) -> Result<Vector> {
    mean_rows_of(m.view()).map(Vector::from_array)
}

/// Mean column: one entry per row.
pub fn mean_of_columns(m: &Matrix) -> Result<Vector> {
    mean_rows_of(m.view().reversed_axes()).map(Vector::from_array)
}

pub fn variance_of_rows(m: &Matrix) -> Result<Vector> {
    variance_rows_of(m.view()).map(Vector::from_array)
}

pub fn variance_of_columns(m: &Matrix) -> Result<Vector> {
    variance_rows_of(m.view().reversed_axes()).map(Vector::from_array)
}

/// `columns × columns` covariance treating rows as observations.
pub fn covariance_matrix_of_rows(m: &Matrix) -> Result<Matrix> {
    covariance_rows_of(m.view()).map(Matrix::from_array)
}

/// `rows × rows` covariance treating columns as observations.
pub fn covariance_matrix_of_columns(m: &Matrix) -> Result<Matrix> {
    covariance_rows_of(m.view().reversed_axes()).map(Matrix::from_array)
}

/// Per-column `(min, max)` over the rows.
pub fn bounds_of_rows(m: &Matrix) -> Result<(Vector, Vector)> {
    let (min, max) = bounds_rows_of(m.view())?;
    Ok((Vector::from_array(min), Vector::from_array(max)))
}

/// Per-row `(min, max)` over the columns.
pub fn bounds_of_columns(m: &Matrix) -> Result<(Vector, Vector)> {
    let (min, max) = bounds_rows_of(m.view().reversed_axes())?;
    Ok((Vector::from_array(min), Vector::from_array(max)))
}

pub fn mean_of_vector(v: &Vector) -> Result<f64> {
    let mean = mean_rows_of(v.view().insert_axis(Axis(1)))?;
    Ok(mean[0])
}

pub fn variance_of_vector(v: &Vector) -> Result<f64> {
    require_observations(v.size(), 1)?;
    Ok(v.as_array().var(0.0))
}

/// `(Πx)^(1/n)`, computed in log space. Any zero yields 0.
///
/// # Errors
/// `InvalidArgument` for a negative element, `DimensionMismatch` when empty.
pub fn geometric_mean_of_vector(v: &Vector) -> Result<f64> {
    require_observations(v.size(), 1)?;
    let data = v.as_array();
    if let Some(negative) = data.iter().find(|&&x| x < 0.0) {
        return Err(LinstatError::InvalidArgument(format!(
            "geometric mean of negative element {}",
            negative
        )));
    }
    if data.iter().any(|&x| x == 0.0) {
        return Ok(0.0);
    }
    let log_sum: f64 = data.iter().map(|x| x.ln()).sum();
    Ok((log_sum / data.len() as f64).exp())
}

/// Population covariance of two equally long series.
pub fn covariance(a: &Vector, b: &Vector) -> Result<f64> {
    if a.size() != b.size() {
        return Err(LinstatError::len_mismatch(a.size(), b.size()));
    }
    let mean_a = mean_of_vector(a)?;
    let mean_b = mean_of_vector(b)?;
    let n = a.size() as f64;
    let sum = Zip::from(a.as_array())
        .and(b.as_array())
        .fold(0.0, |acc, &x, &y| acc + (x - mean_a) * (y - mean_b));
    Ok(sum / n)
}

pub fn elementwise_min(a: &Vector, b: &Vector) -> Result<Vector> {
    elementwise(a, b, f64::min)
}

pub fn elementwise_max(a: &Vector, b: &Vector) -> Result<Vector> {
    elementwise(a, b, f64::max)
}

fn elementwise(a: &Vector, b: &Vector, f: fn(f64, f64) -> f64) -> Result<Vector> {
    if a.size() != b.size() {
        return Err(LinstatError::len_mismatch(a.size(), b.size()));
    }
    let out = Zip::from(a.as_array())
        .and(b.as_array())
        .map_collect(|&x, &y| f(x, y));
    Ok(Vector::from_array(out))
}

/// Shannon entropy `−Σ p ln p` of a probability vector. Zero terms contribute 0.
///
/// # Errors
/// `InvalidArgument` if an element is negative or not finite, or if the
/// elements do not sum to 1 within [`ENTROPY_SUM_TOLERANCE`].
pub fn entropy(p: &Vector) -> Result<f64> {
    let data = p.as_array();
    if let Some(bad) = data.iter().find(|x| !x.is_finite() || **x < 0.0) {
        return Err(LinstatError::InvalidArgument(format!(
            "probability {} is not a finite non-negative number",
            bad
        )));
    }
    let total = data.sum();
    if (total - 1.0).abs() > ENTROPY_SUM_TOLERANCE {
        return Err(LinstatError::InvalidArgument(format!(
            "probabilities sum to {}, expected 1",
            total
        )));
    }
    Ok(-data
        .iter()
        .filter(|&&x| x > 0.0)
        .map(|&x| x * x.ln())
        .sum::<f64>())
}
