// src/lda.rs

//! Linear discriminant analysis.
//!
//! The generalized problem `S_b·v = λ·S_w·v` is reduced to a symmetric one by
//! whitening the within-class scatter: with `S_w = U·Λ·Uᵀ` and `W = U·Λ^{-1/2}`,
//! the eigenvectors `V` of `Wᵀ·S_b·W` give the discriminant basis `W·V`.

use crate::error::{LinstatError, Result};
use crate::linalg_backends::{BackendEigh, JacobiBackend};
use crate::pca::{state_from_spectrum, PcaConfig};
use crate::serial_stats::SerialStats;
use crate::stats::{covariance_rows_of, mean_rows_of};
use crate::storage::Matrix;
use crate::transform::{SubspaceTransform, TransformKind, TransformState};
use crate::EPSILON;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LdaConfig {
    /// Number of discriminant directions; 0 keeps every relevant one.
    pub result_dim: usize,
    pub kappa: f64,
    pub relevance: f64,
    /// Subtract the total mean before projecting.
    pub center_data: bool,
}

impl Default for LdaConfig {
    fn default() -> Self {
        LdaConfig {
            result_dim: 0,
            kappa: 1.0,
            relevance: 1e5,
            center_data: true,
        }
    }
}

impl LdaConfig {
    pub fn with_dim(result_dim: usize) -> Self {
        LdaConfig {
            result_dim,
            ..Self::default()
        }
    }

    fn as_pca_config(&self) -> PcaConfig {
        PcaConfig {
            result_dim: self.result_dim,
            kappa: self.kappa,
            relevance: self.relevance,
            whitening: false,
            use_correlation: false,
            center_data: self.center_data,
        }
    }
}

/// Per-class moments keyed by label.
pub(crate) type ClassMoments = BTreeMap<usize, SerialStats>;

/// Groups the rows of `data` by label.
pub(crate) fn class_moments(data: ArrayView2<'_, f64>, labels: &[usize]) -> Result<ClassMoments> {
    if labels.len() != data.nrows() {
        return Err(LinstatError::len_mismatch(data.nrows(), labels.len()));
    }
    let mut rows_by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        rows_by_class.entry(label).or_default().push(row);
    }
    let mut moments = ClassMoments::new();
    for (label, rows) in rows_by_class {
        let mut stats = SerialStats::new();
        stats.consider_view(data.select(Axis(0), &rows).view())?;
        moments.insert(label, stats);
    }
    Ok(moments)
}

/// Within-class scatter `Σ N_k·Cov_k`, between-class scatter
/// `Σ N_k·(μ_k − μ)(μ_k − μ)ᵀ` and the total mean `μ`.
pub(crate) fn scatter_matrices(moments: &ClassMoments) -> Result<(Array2<f64>, Array2<f64>, Array1<f64>)> {
    let total: usize = moments.values().map(SerialStats::count).sum();
    let d = moments.values().next().map_or(0, SerialStats::dimension);
    if total == 0 || d == 0 {
        return Err(LinstatError::shape_mismatch((1, d.max(1)), (total, d)));
    }
    let mut within = Array2::<f64>::zeros((d, d));
    let mut mean = Array1::<f64>::zeros(d);
    for stats in moments.values() {
        within += stats.scatter()?.as_array();
        mean.scaled_add(stats.count() as f64 / total as f64, stats.mean()?.as_array());
    }
    let mut between = Array2::<f64>::zeros((d, d));
    for stats in moments.values() {
        let diff = stats.mean()?.into_array() - &mean;
        let column = diff.view().insert_axis(Axis(1));
        between.scaled_add(stats.count() as f64, &column.dot(&column.t()));
    }
    Ok((within, between, mean))
}

/// Solves the discriminant problem for given scatter matrices.
///
/// With `safe` set, null directions of `within` are dropped (pseudo-inverse
/// square root) instead of failing. When `within` has no direction left at
/// all, `between` is diagonalized directly.
pub(crate) fn state_from_scatter(
    within: &Array2<f64>,
    between: &Array2<f64>,
    mean: Array1<f64>,
    classes: Vec<usize>,
    config: &LdaConfig,
    safe: bool,
) -> Result<TransformState> {
    let backend = JacobiBackend::default();
    let sw = backend.eigh_upper(within)?;
    let d = mean.len();
    let largest = sw.eigenvalues.first().copied().unwrap_or(0.0);
    let floor = EPSILON * largest.abs() * d as f64;
    let singular = sw.eigenvalues.iter().filter(|&&l| !(l > floor)).count();
    if singular > 0 {
        if !safe {
            let smallest = sw.eigenvalues.last().copied().unwrap_or(0.0);
            return Err(LinstatError::SingularMatrix { pivot: smallest });
        }
        warn!("LDA: within-class scatter has {} null directions, using pseudo-inverse", singular);
    }
    let whitener = if singular == d {
        // Every class collapsed to a point: only the between-class scatter is left.
        warn!("LDA: within-class scatter vanishes, diagonalizing the between-class scatter");
        Array2::<f64>::eye(d)
    } else {
        let inv_sqrt = sw.eigenvalues.mapv(|l| if l > floor { 1.0 / l.sqrt() } else { 0.0 });
        &sw.eigenvectors * &inv_sqrt.view().insert_axis(Axis(0))
    };

    let reduced = whitener.t().dot(between).dot(&whitener);
    let eig = backend.eigh_upper(&reduced)?;
    let basis = whitener.dot(&eig.eigenvectors);
    debug!("LDA: generalized eigenvalues {:?}", eig.eigenvalues);

    let mut state = state_from_spectrum(eig.eigenvalues, basis, mean, None, &config.as_pca_config())?;
    state.kind = TransformKind::Lda;
    state.classes = classes;
    Ok(state)
}

/// A fitted linear discriminant transform.
#[derive(Debug, Clone, Default)]
pub struct LDA {
    state: Option<TransformState>,
}

impl LDA {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Fits from labelled rows. Returns the chosen dimension.
    ///
    /// # Errors
    /// `DimensionMismatch` when `labels` and `data` disagree in length,
    /// `SingularMatrix` when the within-class scatter is singular or the
    /// classes cannot be separated (e.g. a single class).
    pub fn fit(&mut self, data: &Matrix, labels: &[usize], config: &LdaConfig) -> Result<usize> {
        self.fit_impl(data, labels, config, false)
    }

    /// Like [`LDA::fit`], but a singular within-class scatter is handled with
    /// its pseudo-inverse instead of failing.
    pub fn fit_safe(&mut self, data: &Matrix, labels: &[usize], config: &LdaConfig) -> Result<usize> {
        self.fit_impl(data, labels, config, true)
    }

    fn fit_impl(&mut self, data: &Matrix, labels: &[usize], config: &LdaConfig, safe: bool) -> Result<usize> {
        let start_time = Instant::now();
        let moments = class_moments(data.view(), labels)?;
        let (within, between, mean) = scatter_matrices(&moments)?;
        let classes = moments.keys().copied().collect();
        let state = state_from_scatter(&within, &between, mean, classes, config, safe)?;
        info!(
            "LDA: kept {} directions for {} classes from {}x{} data ({:.2?})",
            state.output_dim(),
            moments.len(),
            data.rows(),
            data.columns(),
            start_time.elapsed()
        );
        let dim = state.output_dim();
        self.state = Some(state);
        Ok(dim)
    }

    /// Fits the discriminant of one class against a given between-class
    /// scatter, using the class covariance as within-class scatter.
    pub fn fit_class(&mut self, class_data: &Matrix, between: &Matrix, config: &LdaConfig) -> Result<usize> {
        let within = covariance_rows_of(class_data.view())?;
        let d = within.nrows();
        if between.shape() != (d, d) {
            return Err(LinstatError::shape_mismatch((d, d), between.shape()));
        }
        let mean = mean_rows_of(class_data.view())?;
        let state = state_from_scatter(&within, between.as_array(), mean, Vec::new(), config, false)?;
        let dim = state.output_dim();
        self.state = Some(state);
        Ok(dim)
    }

    /// Labels seen while fitting, ascending.
    pub fn classes(&self) -> Option<&[usize]> {
        self.state.as_ref().map(|s| s.classes.as_slice())
    }

    /// Discriminant directions in columns.
    pub fn basis(&self) -> Option<&Array2<f64>> {
        self.state.as_ref().map(|s| &s.basis)
    }

    pub fn eigenvalues(&self) -> Option<&Array1<f64>> {
        self.state.as_ref().map(|s| &s.eigenvalues)
    }
}

impl SubspaceTransform for LDA {
    const KINDS: &'static [TransformKind] = &[TransformKind::Lda];

    fn state(&self) -> Option<&TransformState> {
        self.state.as_ref()
    }

    fn with_state(state: TransformState) -> Self {
        Self { state: Some(state) }
    }
}

/// Between-class scatter `Σ N_k·(μ_k − μ)(μ_k − μ)ᵀ` of labelled rows.
pub fn between_class_scatter(data: &Matrix, labels: &[usize]) -> Result<Matrix> {
    let moments = class_moments(data.view(), labels)?;
    let (_, between, _) = scatter_matrices(&moments)?;
    Ok(Matrix::from_array(between))
}
