// src/transform.rs

//! Fitted linear transform state shared by PCA, whitening and LDA, with its
//! text (JSON) and binary (bincode) persistence.

use crate::error::{LinstatError, Result};
use crate::storage::{Matrix, Vector};
use log::debug;
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Version tag written into every persisted state.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Pca,
    Whitening,
    Lda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// JSON, human readable, exact `f64` round trip.
    Text,
    /// bincode, little-endian, fixed-width integers, IEEE-754 binary64 floats.
    Binary,
}

/// Everything a fitted transform needs to map input rows to output rows.
///
/// `apply` computes `((x − center) / scale) · basis / whitening` row by row,
/// where `scale` and `whitening` default to 1 when absent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransformState {
    pub version: u32,
    pub kind: TransformKind,
    /// input_dim × output_dim, components in columns.
    pub basis: Array2<f64>,
    /// Subtracted from every input row; zeros when the output is not centred.
    pub center: Array1<f64>,
    /// Per-feature divisor (correlation mode).
    pub scale: Option<Array1<f64>>,
    /// Per-component divisor (whitening).
    pub whitening: Option<Array1<f64>>,
    /// Full spectrum the basis was selected from, descending.
    pub eigenvalues: Array1<f64>,
    /// Class labels seen while fitting (LDA only), ascending.
    pub classes: Vec<usize>,
}

fn binary_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

fn invalid(message: String) -> LinstatError {
    LinstatError::Serialization(message)
}

impl TransformState {
    pub fn new(kind: TransformKind, basis: Array2<f64>, center: Array1<f64>, eigenvalues: Array1<f64>) -> Self {
        TransformState {
            version: FORMAT_VERSION,
            kind,
            basis,
            center,
            scale: None,
            whitening: None,
            eigenvalues,
            classes: Vec::new(),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.basis.nrows()
    }

    pub fn output_dim(&self) -> usize {
        self.basis.ncols()
    }

    /// Checks internal consistency of a state produced by a fit or a decode.
    pub fn validate(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(invalid(format!(
                "unsupported format version {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        let d = self.input_dim();
        let k = self.output_dim();
        if self.center.len() != d {
            return Err(invalid(format!(
                "center length {} does not match input dimension {}",
                self.center.len(),
                d
            )));
        }
        if self.eigenvalues.len() < k {
            return Err(invalid(format!(
                "{} eigenvalues cannot describe {} components",
                self.eigenvalues.len(),
                k
            )));
        }
        if let Some(scale) = &self.scale {
            if scale.len() != d {
                return Err(invalid(format!("scale length {} does not match input dimension {}", scale.len(), d)));
            }
            if scale.iter().any(|&s| !s.is_finite() || s <= 0.0) {
                return Err(invalid("scale contains non-positive or non-finite values".to_string()));
            }
        }
        if let Some(whitening) = &self.whitening {
            if whitening.len() != k {
                return Err(invalid(format!(
                    "whitening length {} does not match output dimension {}",
                    whitening.len(),
                    k
                )));
            }
            if whitening.iter().any(|&s| !s.is_finite() || s <= 0.0) {
                return Err(invalid("whitening contains non-positive or non-finite values".to_string()));
            }
        }
        if self.basis.iter().chain(self.center.iter()).any(|x| !x.is_finite()) {
            return Err(invalid("basis or center contains non-finite values".to_string()));
        }
        Ok(())
    }

    /// Projects every row of `data`. Read-only; safe to call from many threads.
    pub fn apply(&self, data: &Matrix) -> Result<Matrix> {
        let d = self.input_dim();
        if data.columns() != d {
            return Err(LinstatError::shape_mismatch((data.rows(), d), data.shape()));
        }
        if data.rows() == 0 {
            return Ok(Matrix::zeros(0, self.output_dim()));
        }
        let mut x = data.as_array().to_owned();
        let center = &self.center;
        match &self.scale {
            Some(scale) => x.axis_iter_mut(Axis(0)).into_par_iter().for_each(|mut row| {
                Zip::from(&mut row)
                    .and(center)
                    .and(scale)
                    .for_each(|v, &c, &s| *v = (*v - c) / s);
            }),
            None => x.axis_iter_mut(Axis(0)).into_par_iter().for_each(|mut row| {
                row -= center;
            }),
        }
        let mut y = x.dot(&self.basis);
        if let Some(whitening) = &self.whitening {
            y /= whitening;
        }
        Ok(Matrix::from_array(y))
    }

    pub fn apply_vector(&self, v: &Vector) -> Result<Vector> {
        let d = self.input_dim();
        if v.size() != d {
            return Err(LinstatError::len_mismatch(d, v.size()));
        }
        let row = v.view().insert_axis(Axis(0)).to_owned();
        let out = self.apply(&Matrix::from_array(row))?;
        Ok(Vector::from_array(out.into_array().row(0).to_owned()))
    }

    /// Maps output rows back into input space, `x ≈ (y · whitening) · basisᵀ · scale + center`.
    /// Exact on the span of the basis when its columns are orthonormal.
    pub fn unapply(&self, scores: &Matrix) -> Result<Matrix> {
        let k = self.output_dim();
        if scores.columns() != k {
            return Err(LinstatError::shape_mismatch((scores.rows(), k), scores.shape()));
        }
        let mut y = scores.as_array().to_owned();
        if let Some(whitening) = &self.whitening {
            y *= whitening;
        }
        let mut x = y.dot(&self.basis.t());
        if let Some(scale) = &self.scale {
            x *= scale;
        }
        x += &self.center;
        Ok(Matrix::from_array(x))
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let state: TransformState = serde_json::from_str(text)?;
        state.validate()?;
        Ok(state)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(self, binary_config())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (state, read): (TransformState, usize) = bincode::serde::decode_from_slice(bytes, binary_config())?;
        if read != bytes.len() {
            return Err(invalid(format!("{} trailing bytes after transform state", bytes.len() - read)));
        }
        state.validate()?;
        Ok(state)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, format: ModelFormat) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        match format {
            ModelFormat::Text => writer.write_all(self.to_text()?.as_bytes())?,
            ModelFormat::Binary => writer.write_all(&self.to_bytes()?)?,
        }
        writer.flush()?;
        debug!("Saved {:?} transform state to {:?}", self.kind, path.as_ref());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P, format: ModelFormat) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        match format {
            ModelFormat::Text => {
                let text = std::str::from_utf8(&bytes).map_err(|e| invalid(e.to_string()))?;
                Self::from_text(text)
            }
            ModelFormat::Binary => Self::from_bytes(&bytes),
        }
    }
}

/// Common surface of every fitted subspace transform: application and persistence.
pub trait SubspaceTransform: Sized {
    /// Transform kinds this type accepts when rebuilt from a decoded state.
    const KINDS: &'static [TransformKind];

    fn state(&self) -> Option<&TransformState>;

    /// Wraps an already validated state.
    fn with_state(state: TransformState) -> Self;

    fn from_state(state: TransformState) -> Result<Self> {
        state.validate()?;
        if !Self::KINDS.contains(&state.kind) {
            return Err(invalid(format!("cannot load a {:?} state into this transform", state.kind)));
        }
        Ok(Self::with_state(state))
    }

    fn fitted_state(&self) -> Result<&TransformState> {
        self.state().ok_or(LinstatError::NotFitted)
    }

    fn is_fitted(&self) -> bool {
        self.state().is_some()
    }

    /// Output dimension, 0 before fitting.
    fn dimension(&self) -> usize {
        self.state().map_or(0, TransformState::output_dim)
    }

    fn transform(&self, data: &Matrix) -> Result<Matrix> {
        self.fitted_state()?.apply(data)
    }

    fn transform_vector(&self, v: &Vector) -> Result<Vector> {
        self.fitted_state()?.apply_vector(v)
    }

    fn to_text(&self) -> Result<String> {
        self.fitted_state()?.to_text()
    }

    fn from_text(text: &str) -> Result<Self> {
        let state: TransformState = serde_json::from_str(text)?;
        Self::from_state(state)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        self.fitted_state()?.to_bytes()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_state(TransformState::from_bytes(bytes)?)
    }

    fn save_model<P: AsRef<Path>>(&self, path: P, format: ModelFormat) -> Result<()> {
        self.fitted_state()?.save(path, format)
    }

    fn load_model<P: AsRef<Path>>(path: P, format: ModelFormat) -> Result<Self> {
        Self::from_state(TransformState::load(path, format)?)
    }
}
