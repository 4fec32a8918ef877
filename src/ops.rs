// src/ops.rs

//! Elementwise and algebraic operators on `Vector` and `Matrix`.
//!
//! Every binary operator comes in two forms: the in-place form `a.op(&b)` writes
//! into the receiver, the `_of` form `r.op_of(&a, &b)` reshapes `r` to the result
//! and leaves both operands untouched. Shape mismatches are always errors.

use crate::error::{LinstatError, Result};
use crate::storage::{Matrix, Vector};
use ndarray::{Array2, Zip};

fn same_len(a: &Vector, b: &Vector) -> Result<()> {
    if a.size() != b.size() {
        return Err(LinstatError::len_mismatch(a.size(), b.size()));
    }
    Ok(())
}

fn same_shape(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(LinstatError::shape_mismatch(a.shape(), b.shape()));
    }
    Ok(())
}

impl Vector {
    pub fn add(&mut self, other: &Vector) -> Result<()> {
        same_len(self, other)?;
        self.as_array_mut().zip_mut_with(other.as_array(), |a, &b| *a += b);
        Ok(())
    }

    /// `self = a + b`.
    pub fn add_of(&mut self, a: &Vector, b: &Vector) -> Result<()> {
        same_len(a, b)?;
        *self = Vector::from_array(a.as_array() + b.as_array());
        Ok(())
    }

    pub fn subtract(&mut self, other: &Vector) -> Result<()> {
        same_len(self, other)?;
        self.as_array_mut().zip_mut_with(other.as_array(), |a, &b| *a -= b);
        Ok(())
    }

    /// `self = a - b`.
    pub fn subtract_of(&mut self, a: &Vector, b: &Vector) -> Result<()> {
        same_len(a, b)?;
        *self = Vector::from_array(a.as_array() - b.as_array());
        Ok(())
    }

    /// Elementwise product.
    pub fn emultiply(&mut self, other: &Vector) -> Result<()> {
        same_len(self, other)?;
        self.as_array_mut().zip_mut_with(other.as_array(), |a, &b| *a *= b);
        Ok(())
    }

    pub fn emultiply_of(&mut self, a: &Vector, b: &Vector) -> Result<()> {
        same_len(a, b)?;
        *self = Vector::from_array(a.as_array() * b.as_array());
        Ok(())
    }

    /// Elementwise quotient. Division by zero follows IEEE-754.
    pub fn edivide(&mut self, other: &Vector) -> Result<()> {
        same_len(self, other)?;
        self.as_array_mut().zip_mut_with(other.as_array(), |a, &b| *a /= b);
        Ok(())
    }

    pub fn edivide_of(&mut self, a: &Vector, b: &Vector) -> Result<()> {
        same_len(a, b)?;
        *self = Vector::from_array(a.as_array() / b.as_array());
        Ok(())
    }

    /// `self += s * other`.
    pub fn add_scaled(&mut self, s: f64, other: &Vector) -> Result<()> {
        same_len(self, other)?;
        self.as_array_mut().scaled_add(s, other.as_array());
        Ok(())
    }

    /// Multiplies every element by `s`.
    pub fn multiply(&mut self, s: f64) {
        self.as_array_mut().mapv_inplace(|x| x * s);
    }

    pub fn divide(&mut self, s: f64) {
        self.as_array_mut().mapv_inplace(|x| x / s);
    }

    /// Adds `s` to every element.
    pub fn add_scalar(&mut self, s: f64) {
        self.as_array_mut().mapv_inplace(|x| x + s);
    }

    pub fn dot(&self, other: &Vector) -> Result<f64> {
        same_len(self, other)?;
        Ok(self.as_array().dot(other.as_array()))
    }

    /// Exact equality of size and every element.
    pub fn equals(&self, other: &Vector) -> bool {
        self == other
    }

    /// True iff both have the same size and `max_i |a_i - b_i| <= tolerance`.
    pub fn pretty_close_to(&self, other: &Vector, tolerance: f64) -> bool {
        self.size() == other.size()
            && Zip::from(self.as_array())
                .and(other.as_array())
                .all(|&a, &b| (a - b).abs() <= tolerance)
    }

    /// Sum of absolute differences.
    pub fn l1_distance(&self, other: &Vector) -> Result<f64> {
        same_len(self, other)?;
        Ok(Zip::from(self.as_array())
            .and(other.as_array())
            .fold(0.0, |acc, &a, &b| acc + (a - b).abs()))
    }

    /// Euclidean distance.
    pub fn l2_distance(&self, other: &Vector) -> Result<f64> {
        same_len(self, other)?;
        Ok(Zip::from(self.as_array())
            .and(other.as_array())
            .fold(0.0, |acc, &a, &b| acc + (a - b) * (a - b))
            .sqrt())
    }
}

/// Squared cosine similarity `(a·b)² / (|a|²|b|²)`; 0 when either vector is zero.
pub fn cos2_similarity(a: &Vector, b: &Vector) -> Result<f64> {
    let ab = a.dot(b)?;
    let aa = a.dot(a)?;
    let bb = b.dot(b)?;
    if aa == 0.0 || bb == 0.0 {
        return Ok(0.0);
    }
    Ok(ab * ab / (aa * bb))
}

/// `1 / (1 + |a - b|)`: 1 for identical vectors, tending to 0 with distance.
pub fn euclidean_similarity(a: &Vector, b: &Vector) -> Result<f64> {
    Ok(1.0 / (1.0 + a.l2_distance(b)?))
}

impl Matrix {
    pub fn add(&mut self, other: &Matrix) -> Result<()> {
        same_shape(self, other)?;
        self.as_array_mut().zip_mut_with(other.as_array(), |a, &b| *a += b);
        Ok(())
    }

    pub fn add_of(&mut self, a: &Matrix, b: &Matrix) -> Result<()> {
        same_shape(a, b)?;
        *self = Matrix::from_array(a.as_array() + b.as_array());
        Ok(())
    }

    pub fn subtract(&mut self, other: &Matrix) -> Result<()> {
        same_shape(self, other)?;
        self.as_array_mut().zip_mut_with(other.as_array(), |a, &b| *a -= b);
        Ok(())
    }

    pub fn subtract_of(&mut self, a: &Matrix, b: &Matrix) -> Result<()> {
        same_shape(a, b)?;
        *self = Matrix::from_array(a.as_array() - b.as_array());
        Ok(())
    }

    pub fn emultiply(&mut self, other: &Matrix) -> Result<()> {
        same_shape(self, other)?;
        self.as_array_mut().zip_mut_with(other.as_array(), |a, &b| *a *= b);
        Ok(())
    }

    pub fn emultiply_of(&mut self, a: &Matrix, b: &Matrix) -> Result<()> {
        same_shape(a, b)?;
        *self = Matrix::from_array(a.as_array() * b.as_array());
        Ok(())
    }

    /// `self += s * other`.
    pub fn add_scaled(&mut self, s: f64, other: &Matrix) -> Result<()> {
        same_shape(self, other)?;
        self.as_array_mut().scaled_add(s, other.as_array());
        Ok(())
    }

    pub fn add_scalar(&mut self, s: f64) {
        self.as_array_mut().mapv_inplace(|x| x + s);
    }

    /// Elementwise broadcast: every element is multiplied by `s`.
    pub fn multiply(&mut self, s: f64) {
        self.as_array_mut().mapv_inplace(|x| x * s);
    }

    pub fn divide(&mut self, s: f64) {
        self.as_array_mut().mapv_inplace(|x| x / s);
    }

    /// Matrix product in place: `self = self · other`.
    pub fn matmul(&mut self, other: &Matrix) -> Result<()> {
        let product = self.product(other)?;
        *self = product;
        Ok(())
    }

    /// `self = a · b`.
    pub fn matmul_of(&mut self, a: &Matrix, b: &Matrix) -> Result<()> {
        *self = a.product(b)?;
        Ok(())
    }

    /// Returns `self · other`.
    pub fn product(&self, other: &Matrix) -> Result<Matrix> {
        if self.columns() != other.rows() {
            return Err(LinstatError::shape_mismatch(
                (self.columns(), other.columns()),
                other.shape(),
            ));
        }
        Ok(Matrix::from_array(self.as_array().dot(other.as_array())))
    }

    /// `result = self · v`.
    pub fn multiply_vector(&self, v: &Vector, result: &mut Vector) -> Result<()> {
        if self.columns() != v.size() {
            return Err(LinstatError::len_mismatch(self.columns(), v.size()));
        }
        *result = Vector::from_array(self.as_array().dot(v.as_array()));
        Ok(())
    }

    /// `result = vᵀ · self`.
    pub fn left_multiply(&self, v: &Vector, result: &mut Vector) -> Result<()> {
        if self.rows() != v.size() {
            return Err(LinstatError::len_mismatch(self.rows(), v.size()));
        }
        *result = Vector::from_array(v.as_array().dot(self.as_array()));
        Ok(())
    }

    /// `v = vᵀ · self`.
    pub fn left_multiply_in_place(&self, v: &mut Vector) -> Result<()> {
        let mut result = Vector::new();
        self.left_multiply(v, &mut result)?;
        *v = result;
        Ok(())
    }

    /// Sets the receiver to `a · bᵀ`.
    pub fn outer_product(&mut self, a: &Vector, b: &Vector) {
        let (av, bv) = (a.as_array(), b.as_array());
        *self = Matrix::from_array(Array2::from_shape_fn((av.len(), bv.len()), |(i, j)| {
            av[i] * bv[j]
        }));
    }

    /// Transposes in place.
    pub fn transpose(&mut self) {
        *self = self.transposed();
    }

    pub fn transposed(&self) -> Matrix {
        Matrix::from_array(self.as_array().t().as_standard_layout().into_owned())
    }

    /// Exact equality of shape and every element.
    pub fn equals(&self, other: &Matrix) -> bool {
        self == other
    }

    /// True iff both have the same shape and `max |a_ij - b_ij| <= tolerance`.
    pub fn pretty_close_to(&self, other: &Matrix, tolerance: f64) -> bool {
        self.shape() == other.shape()
            && Zip::from(self.as_array())
                .and(other.as_array())
                .all(|&a, &b| (a - b).abs() <= tolerance)
    }

    pub fn l1_distance(&self, other: &Matrix) -> Result<f64> {
        same_shape(self, other)?;
        Ok(Zip::from(self.as_array())
            .and(other.as_array())
            .fold(0.0, |acc, &a, &b| acc + (a - b).abs()))
    }

    pub fn l2_distance(&self, other: &Matrix) -> Result<f64> {
        same_shape(self, other)?;
        Ok(Zip::from(self.as_array())
            .and(other.as_array())
            .fold(0.0, |acc, &a, &b| acc + (a - b) * (a - b))
            .sqrt())
    }

    /// Multiplies the diagonal of a square matrix by `factor`.
    pub fn emphasize_diagonal(&mut self, factor: f64) -> Result<()> {
        if !self.is_square() {
            return Err(LinstatError::shape_mismatch((self.rows(), self.rows()), self.shape()));
        }
        self.as_array_mut().diag_mut().mapv_inplace(|x| x * factor);
        Ok(())
    }
}
