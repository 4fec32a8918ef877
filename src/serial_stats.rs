// src/serial_stats.rs

use crate::error::{LinstatError, Result};
use crate::stats::mean_rows_of;
use crate::storage::{Matrix, Vector};
use log::trace;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Incremental mean, variance, covariance and bounds over observations
/// presented one vector or one chunk of rows at a time.
///
/// Chunks are merged with the pairwise update of the scatter matrix, so the
/// result matches a batch computation over the concatenated data without ever
/// holding more than one chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerialStats {
    count: usize,
    mean: Array1<f64>,
    /// Sum of outer products of deviations from `mean`.
    scatter: Array2<f64>,
    min: Array1<f64>,
    max: Array1<f64>,
}

impl SerialStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Width of the observations, 0 before the first one.
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn consider(&mut self, v: &Vector) -> Result<()> {
        self.consider_view(v.view().insert_axis(Axis(0)))
    }

    /// Every row of `m` is one observation.
    pub fn consider_rows(&mut self, m: &Matrix) -> Result<()> {
        self.consider_view(m.view())
    }

    pub(crate) fn consider_view(&mut self, chunk: ArrayView2<'_, f64>) -> Result<()> {
        let (rows, width) = chunk.dim();
        if self.count > 0 && width != self.dimension() {
            return Err(LinstatError::shape_mismatch((rows, self.dimension()), (rows, width)));
        }
        if rows == 0 {
            return Ok(());
        }
        let mean = mean_rows_of(chunk)?;
        let centered = &chunk - &mean.view().insert_axis(Axis(0));
        let chunk_stats = SerialStats {
            count: rows,
            scatter: centered.t().dot(&centered),
            mean,
            min: chunk.fold_axis(Axis(0), f64::INFINITY, |acc, &x| acc.min(x)),
            max: chunk.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &x| acc.max(x)),
        };
        self.merge(&chunk_stats)?;
        trace!("SerialStats: {} observations of width {}", self.count, width);
        Ok(())
    }

    /// Folds the observations summarized by `other` into `self`.
    pub fn merge(&mut self, other: &SerialStats) -> Result<()> {
        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            *self = other.clone();
            return Ok(());
        }
        if other.dimension() != self.dimension() {
            return Err(LinstatError::shape_mismatch((1, self.dimension()), (1, other.dimension())));
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;
        let delta = &other.mean - &self.mean;
        let delta_col = delta.view().insert_axis(Axis(1));
        let correction = delta_col.dot(&delta_col.t()) * (n_a * n_b / n);
        self.scatter += &other.scatter;
        self.scatter += &correction;
        self.mean.scaled_add(n_b / n, &delta);
        self.count += other.count;
        self.min.zip_mut_with(&other.min, |a, &b| *a = a.min(b));
        self.max.zip_mut_with(&other.max, |a, &b| *a = a.max(b));
        Ok(())
    }

    fn require_data(&self) -> Result<()> {
        if self.count == 0 {
            return Err(LinstatError::shape_mismatch((1, self.dimension()), (0, self.dimension())));
        }
        Ok(())
    }

    pub fn mean(&self) -> Result<Vector> {
        self.require_data()?;
        Ok(Vector::from_array(self.mean.clone()))
    }

    /// Population variance of every component.
    pub fn variance(&self) -> Result<Vector> {
        self.require_data()?;
        let n = self.count as f64;
        Ok(Vector::from_array(self.scatter.diag().mapv(|x| x / n)))
    }

    /// Population covariance matrix.
    pub fn covariance(&self) -> Result<Matrix> {
        self.require_data()?;
        Ok(Matrix::from_array(&self.scatter / self.count as f64))
    }

    /// Sum of outer products of deviations, i.e. `N · covariance`.
    pub fn scatter(&self) -> Result<Matrix> {
        self.require_data()?;
        Ok(Matrix::from_array(self.scatter.clone()))
    }

    /// Per-component `(min, max)`.
    pub fn bounds(&self) -> Result<(Vector, Vector)> {
        self.require_data()?;
        Ok((Vector::from_array(self.min.clone()), Vector::from_array(self.max.clone())))
    }
}
