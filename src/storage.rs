// src/storage.rs

//! Dense, exclusively-owned vector and matrix containers.
//!
//! `Vector` wraps an `Array1<f64>` and `Matrix` a row-major (standard layout)
//! `Array2<f64>`. Checked accessors take signed indices so that a caller holding
//! raw indices from another runtime can forward them unchanged; anything negative
//! or past the extent is reported as `OutOfRange` instead of panicking.

use crate::error::{LinstatError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validates a signed index against an extent and converts it.
pub(crate) fn check_index(index: isize, extent: usize) -> Result<usize> {
    if index < 0 || index as usize >= extent {
        return Err(LinstatError::OutOfRange { index, extent });
    }
    Ok(index as usize)
}

/// Validates an inclusive `[from, to]` range. Returns `None` for an empty range (`from > to`).
fn check_range(from: isize, to: isize, extent: usize) -> Result<Option<(usize, usize)>> {
    let from_idx = check_index(from, extent)?;
    let to_idx = check_index(to, extent)?;
    if from_idx > to_idx {
        return Ok(None);
    }
    Ok(Some((from_idx, to_idx)))
}

/// A resizable sequence of `f64` values with zero-based indexing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    data: Array1<f64>,
}

impl Vector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self { data: Array1::zeros(0) }
    }

    /// Creates a vector of `size` zeros.
    pub fn with_size(size: usize) -> Self {
        Self { data: Array1::zeros(size) }
    }

    /// Creates a vector of `size` copies of `value`.
    pub fn filled(size: usize, value: f64) -> Self {
        Self { data: Array1::from_elem(size, value) }
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        Self { data: Array1::from_vec(values) }
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self { data: Array1::from(values.to_vec()) }
    }

    pub fn from_array(data: Array1<f64>) -> Self {
        Self { data }
    }

    /// Read-only ndarray view of the elements.
    pub fn as_array(&self) -> &Array1<f64> {
        &self.data
    }

    /// Mutable view of the elements. The length cannot be changed through it.
    pub fn as_array_mut(&mut self) -> ArrayViewMut1<'_, f64> {
        self.data.view_mut()
    }

    pub fn into_array(self) -> Array1<f64> {
        self.data
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.data.view()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.to_vec()
    }

    /// Replaces the contents (and size) with `values`.
    pub fn set_data(&mut self, values: &[f64]) {
        self.data = Array1::from(values.to_vec());
    }

    /// Bounds-checked element read.
    ///
    /// # Errors
    /// `OutOfRange` if `pos` is negative or `pos >= size()`.
    pub fn at(&self, pos: isize) -> Result<f64> {
        let i = check_index(pos, self.size())?;
        Ok(self.data[i])
    }

    /// Bounds-checked element write.
    pub fn set_at(&mut self, pos: isize, value: f64) -> Result<()> {
        let i = check_index(pos, self.size())?;
        self.data[i] = value;
        Ok(())
    }

    /// Changes the size. Elements `0..min(old, new)` keep their values; newly
    /// created elements are set to `fill`, elements past `new_size` are dropped.
    pub fn resize(&mut self, new_size: usize, fill: f64) {
        let old = &self.data;
        let old_size = old.len();
        let resized = Array1::from_shape_fn(new_size, |i| if i < old_size { old[i] } else { fill });
        self.data = resized;
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Sets the elements `from..=to` to `value`. A range with `from > to` is empty.
    ///
    /// # Errors
    /// `OutOfRange` if either bound lies outside the vector.
    pub fn fill_range(&mut self, value: f64, from: isize, to: isize) -> Result<()> {
        if let Some((lo, hi)) = check_range(from, to, self.size())? {
            self.data.slice_mut(ndarray::s![lo..=hi]).fill(value);
        }
        Ok(())
    }

    /// Makes this vector an exact copy of `other`.
    pub fn copy_from(&mut self, other: &Vector) {
        self.data.clone_from(&other.data);
    }

    pub fn sort_ascending(&mut self) {
        let mut values = self.data.to_vec();
        values.sort_by(|a, b| a.total_cmp(b));
        self.data = Array1::from_vec(values);
    }

    pub fn sort_descending(&mut self) {
        let mut values = self.data.to_vec();
        values.sort_by(|a, b| b.total_cmp(a));
        self.data = Array1::from_vec(values);
    }

    pub fn sum_of_elements(&self) -> f64 {
        self.data.sum()
    }

    pub fn product_of_elements(&self) -> f64 {
        self.data.product()
    }

    /// Largest element.
    ///
    /// # Errors
    /// `OutOfRange` on an empty vector.
    pub fn maximum(&self) -> Result<f64> {
        let i = self.index_of_maximum()?;
        Ok(self.data[i])
    }

    pub fn minimum(&self) -> Result<f64> {
        let i = self.index_of_minimum()?;
        Ok(self.data[i])
    }

    /// Index of the first largest element.
    pub fn index_of_maximum(&self) -> Result<usize> {
        extreme_index(self.data.iter(), |candidate, best| candidate > best)
            .ok_or(LinstatError::OutOfRange { index: 0, extent: 0 })
    }

    /// Index of the first smallest element.
    pub fn index_of_minimum(&self) -> Result<usize> {
        extreme_index(self.data.iter(), |candidate, best| candidate < best)
            .ok_or(LinstatError::OutOfRange { index: 0, extent: 0 })
    }

    /// Replaces the contents with the concatenation of `parts`.
    pub fn concat(&mut self, parts: &[Vector]) {
        let total = parts.iter().map(Vector::size).sum();
        let mut values = Vec::with_capacity(total);
        for part in parts {
            values.extend(part.data.iter().copied());
        }
        self.data = Array1::from_vec(values);
    }

    /// Affinely maps `[minimum, maximum]` onto `[low, high]`. A constant vector
    /// becomes all `low`.
    pub fn normalize_range(&mut self, low: f64, high: f64) {
        if self.is_empty() {
            return;
        }
        let min = self.data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = max - min;
        if span == 0.0 {
            self.data.fill(low);
            return;
        }
        let factor = (high - low) / span;
        self.data.mapv_inplace(|x| low + (x - min) * factor);
    }

    /// Scales the vector so its L2 norm equals `length`. A zero vector is left unchanged.
    pub fn normalize_length(&mut self, length: f64) {
        let norm = self.data.dot(&self.data).sqrt();
        if norm > 0.0 {
            let factor = length / norm;
            self.data.mapv_inplace(|x| x * factor);
        }
    }

    /// Scales the vector so its elements sum to `sum`. A zero-sum vector is left unchanged.
    pub fn normalize_sum(&mut self, sum: f64) {
        let current = self.data.sum();
        if current != 0.0 {
            let factor = sum / current;
            self.data.mapv_inplace(|x| x * factor);
        }
    }

    /// Gathers the elements at `indices` into a new vector.
    pub fn subvector(&self, indices: &[isize]) -> Result<Vector> {
        let extent = self.size();
        let values = indices
            .iter()
            .map(|&idx| check_index(idx, extent).map(|i| self.data[i]))
            .collect::<Result<Vec<f64>>>()?;
        Ok(Vector::from_vec(values))
    }
}

fn extreme_index<'a, I, F>(values: I, better: F) -> Option<usize>
where
    I: Iterator<Item = &'a f64>,
    F: Fn(f64, f64) -> bool,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in values.enumerate() {
        match best {
            Some((_, current)) if !better(value, current) => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

impl From<Vec<f64>> for Vector {
    fn from(values: Vec<f64>) -> Self {
        Vector::from_vec(values)
    }
}

impl From<Array1<f64>> for Vector {
    fn from(data: Array1<f64>) -> Self {
        Vector::from_array(data)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// A row-major 2-D array of `f64` values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    data: Array2<f64>,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new()
    }
}

impl Matrix {
    /// Creates a 0×0 matrix.
    pub fn new() -> Self {
        Self { data: Array2::zeros((0, 0)) }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { data: Array2::zeros((rows, cols)) }
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self { data: Array2::from_elem((rows, cols), value) }
    }

    pub fn identity(n: usize) -> Self {
        Self { data: Array2::eye(n) }
    }

    /// Builds a matrix from row vectors.
    ///
    /// # Errors
    /// `DimensionMismatch` if the rows do not all have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(LinstatError::shape_mismatch((n_rows, n_cols), (n_rows, row.len())));
            }
            values.extend_from_slice(row);
        }
        Self::from_shape_vec(n_rows, n_cols, values)
    }

    /// Builds a matrix from row-major `values`.
    pub fn from_shape_vec(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        let got = values.len();
        Array2::from_shape_vec((rows, cols), values)
            .map(|data| Self { data })
            .map_err(|_| LinstatError::len_mismatch(rows * cols, got))
    }

    /// Wraps an ndarray matrix, normalising it to row-major layout.
    pub fn from_array(data: Array2<f64>) -> Self {
        if data.is_standard_layout() {
            Self { data }
        } else {
            Self { data: data.as_standard_layout().into_owned() }
        }
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    /// Mutable view of the elements. Shape and layout cannot be changed through it.
    pub fn as_array_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.data.view_mut()
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn columns(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_square(&self) -> bool {
        self.rows() == self.columns()
    }

    /// Replaces the contents (and shape) with `rows`.
    pub fn set_data(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        *self = Self::from_rows(rows)?;
        Ok(())
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.rows().into_iter().map(|r| r.to_vec()).collect()
    }

    /// Bounds-checked element read.
    pub fn at(&self, row: isize, col: isize) -> Result<f64> {
        let r = check_index(row, self.rows())?;
        let c = check_index(col, self.columns())?;
        Ok(self.data[[r, c]])
    }

    /// Bounds-checked element write.
    pub fn set_at(&mut self, row: isize, col: isize, value: f64) -> Result<()> {
        let r = check_index(row, self.rows())?;
        let c = check_index(col, self.columns())?;
        self.data[[r, c]] = value;
        Ok(())
    }

    /// Changes the shape. The element at `(r, c)` survives iff `r < min(old_rows,
    /// new_rows)` and `c < min(old_cols, new_cols)`; every other element of the
    /// result is `fill`.
    pub fn resize(&mut self, rows: usize, cols: usize, fill: f64) {
        let (old_rows, old_cols) = self.shape();
        let old = &self.data;
        let resized = Array2::from_shape_fn((rows, cols), |(r, c)| {
            if r < old_rows && c < old_cols {
                old[[r, c]]
            } else {
                fill
            }
        });
        self.data = resized;
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Fills the inclusive block `[from_row..=to_row] × [from_col..=to_col]`.
    pub fn fill_block(
        &mut self,
        value: f64,
        from_row: isize,
        from_col: isize,
        to_row: isize,
        to_col: isize,
    ) -> Result<()> {
        let rows = check_range(from_row, to_row, self.rows())?;
        let cols = check_range(from_col, to_col, self.columns())?;
        if let (Some((r0, r1)), Some((c0, c1))) = (rows, cols) {
            self.data.slice_mut(ndarray::s![r0..=r1, c0..=c1]).fill(value);
        }
        Ok(())
    }

    /// Makes this matrix an exact copy of `other`.
    pub fn copy_from(&mut self, other: &Matrix) {
        self.data.clone_from(&other.data);
    }

    /// Replaces this matrix with the inclusive sub-rectangle
    /// `[from_row..=to_row] × [from_col..=to_col]` of `other`.
    ///
    /// # Errors
    /// `OutOfRange` if any bound lies outside `other`; `InvalidArgument` if a
    /// range is reversed.
    pub fn copy_block(
        &mut self,
        other: &Matrix,
        from_row: isize,
        to_row: isize,
        from_col: isize,
        to_col: isize,
    ) -> Result<()> {
        let rows = check_range(from_row, to_row, other.rows())?;
        let cols = check_range(from_col, to_col, other.columns())?;
        match (rows, cols) {
            (Some((r0, r1)), Some((c0, c1))) => {
                self.data = other.data.slice(ndarray::s![r0..=r1, c0..=c1]).to_owned();
                Ok(())
            }
            _ => Err(LinstatError::InvalidArgument(format!(
                "reversed block range rows {}..={} cols {}..={}",
                from_row, to_row, from_col, to_col
            ))),
        }
    }

    /// Copy of row `row`.
    pub fn row(&self, row: isize) -> Result<Vector> {
        let r = check_index(row, self.rows())?;
        Ok(Vector::from_array(self.data.row(r).to_owned()))
    }

    /// Copy of column `col`.
    pub fn column(&self, col: isize) -> Result<Vector> {
        let c = check_index(col, self.columns())?;
        Ok(Vector::from_array(self.data.column(c).to_owned()))
    }

    /// Gathers the given rows, in order, into a new matrix.
    pub fn rows_at(&self, indices: &[isize]) -> Result<Matrix> {
        let picked = indices
            .iter()
            .map(|&i| check_index(i, self.rows()))
            .collect::<Result<Vec<usize>>>()?;
        Ok(Matrix::from_array(self.data.select(Axis(0), &picked)))
    }

    /// Gathers the given columns, in order, into a new matrix.
    pub fn columns_at(&self, indices: &[isize]) -> Result<Matrix> {
        let picked = indices
            .iter()
            .map(|&i| check_index(i, self.columns()))
            .collect::<Result<Vec<usize>>>()?;
        Ok(Matrix::from_array(self.data.select(Axis(1), &picked)))
    }

    /// Main diagonal, of length `min(rows, columns)`.
    pub fn diagonal(&self) -> Vector {
        Vector::from_array(self.data.diag().to_owned())
    }

    pub fn set_row(&mut self, row: isize, values: &Vector) -> Result<()> {
        let r = check_index(row, self.rows())?;
        if values.size() != self.columns() {
            return Err(LinstatError::len_mismatch(self.columns(), values.size()));
        }
        self.data.row_mut(r).assign(values.as_array());
        Ok(())
    }

    pub fn set_column(&mut self, col: isize, values: &Vector) -> Result<()> {
        let c = check_index(col, self.columns())?;
        if values.size() != self.rows() {
            return Err(LinstatError::len_mismatch(self.rows(), values.size()));
        }
        self.data.column_mut(c).assign(values.as_array());
        Ok(())
    }

    /// Sum of the diagonal of a square matrix.
    pub fn trace(&self) -> Result<f64> {
        if !self.is_square() {
            return Err(LinstatError::shape_mismatch(
                (self.rows(), self.rows()),
                self.shape(),
            ));
        }
        Ok(self.data.diag().sum())
    }

    pub fn maximum(&self) -> Result<f64> {
        let (r, c) = self.index_of_maximum()?;
        Ok(self.data[[r, c]])
    }

    pub fn minimum(&self) -> Result<f64> {
        let (r, c) = self.index_of_minimum()?;
        Ok(self.data[[r, c]])
    }

    /// `(row, col)` of the first largest element in row-major order.
    pub fn index_of_maximum(&self) -> Result<(usize, usize)> {
        let cols = self.columns();
        extreme_index(self.data.iter(), |candidate, best| candidate > best)
            .map(|flat| (flat / cols, flat % cols))
            .ok_or(LinstatError::OutOfRange { index: 0, extent: 0 })
    }

    /// `(row, col)` of the first smallest element in row-major order.
    pub fn index_of_minimum(&self) -> Result<(usize, usize)> {
        let cols = self.columns();
        extreme_index(self.data.iter(), |candidate, best| candidate < best)
            .map(|flat| (flat / cols, flat % cols))
            .ok_or(LinstatError::OutOfRange { index: 0, extent: 0 })
    }
}

impl From<Array2<f64>> for Matrix {
    fn from(data: Array2<f64>) -> Self {
        Matrix::from_array(data)
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "(")?;
        for row in self.data.rows() {
            write!(f, "  (")?;
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", value)?;
            }
            writeln!(f, ")")?;
        }
        write!(f, ")")
    }
}
