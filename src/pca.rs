// src/pca.rs

//! Principal component analysis and whitening.

use crate::error::{LinstatError, Result};
use crate::linalg_backends::{BackendEigh, BackendSVD, JacobiBackend, LinAlgBackendProvider};
use crate::stats::{covariance_rows_of, mean_rows_of};
use crate::storage::{Matrix, Vector};
use crate::transform::{SubspaceTransform, TransformKind, TransformState};
use crate::EPSILON;
use log::{info, warn};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Standard deviations below this are treated as constant features and not rescaled.
const MIN_SCALE: f64 = 1e-9;

/// Parameters for fitting a [`PCA`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PcaConfig {
    /// Number of components to keep; 0 selects the dimension automatically.
    pub result_dim: usize,
    /// Regularization factor of the automatic dimension threshold.
    pub kappa: f64,
    /// Ratio between the largest eigenvalue and the smallest one still
    /// considered relevant.
    pub relevance: f64,
    /// Scale every output coordinate to unit variance.
    pub whitening: bool,
    /// Diagonalize the correlation instead of the covariance matrix.
    pub use_correlation: bool,
    /// Subtract the mean before projecting.
    pub center_data: bool,
}

impl Default for PcaConfig {
    fn default() -> Self {
        PcaConfig {
            result_dim: 0,
            kappa: 1.0,
            relevance: 1e5,
            whitening: false,
            use_correlation: false,
            center_data: true,
        }
    }
}

impl PcaConfig {
    pub fn with_dim(result_dim: usize) -> Self {
        PcaConfig {
            result_dim,
            ..Self::default()
        }
    }

    /// Eigenvalues at or below this magnitude are irrelevant: `kappa · |λ₀| / relevance`.
    pub fn threshold(&self, largest: f64) -> f64 {
        self.kappa * largest.abs() / self.relevance
    }
}

/// A fitted principal component transform.
///
/// The model is empty after [`PCA::new`] and must be computed with one of the
/// `fit*` methods or loaded through [`SubspaceTransform`].
#[derive(Debug, Clone, Default)]
pub struct PCA {
    state: Option<TransformState>,
}

/// Keeps at most `config.result_dim` leading eigenpairs (all relevant ones
/// when it is 0) and builds the transform state around them.
pub(crate) fn state_from_spectrum(
    eigenvalues: Array1<f64>,
    mut eigenvectors: Array2<f64>,
    mean: Array1<f64>,
    scale: Option<Array1<f64>>,
    config: &PcaConfig,
) -> Result<TransformState> {
    let largest = eigenvalues.first().copied().unwrap_or(0.0);
    if !(largest.abs() > 0.0) {
        return Err(LinstatError::SingularMatrix { pivot: largest });
    }
    let threshold = config.threshold(largest);
    let available = eigenvalues.len();
    let dim = if config.result_dim == 0 {
        eigenvalues.iter().take_while(|&&l| l.abs() > threshold).count()
    } else {
        if config.result_dim > available {
            warn!(
                "PCA: requested {} components but only {} exist, clamping",
                config.result_dim, available
            );
        }
        config.result_dim.min(available)
    };
    if dim == 0 {
        return Err(LinstatError::SingularMatrix { pivot: largest });
    }

    canonical_signs(&mut eigenvectors);
    let basis = eigenvectors.slice(s![.., ..dim]).to_owned();
    let center = if config.center_data {
        mean
    } else {
        Array1::zeros(basis.nrows())
    };
    let kind = if config.whitening {
        TransformKind::Whitening
    } else {
        TransformKind::Pca
    };
    let mut state = TransformState::new(kind, basis, center, eigenvalues);
    state.scale = scale;
    if config.whitening {
        let floor = threshold.max(EPSILON * largest.abs());
        state.whitening = Some(state.eigenvalues.slice(s![..dim]).mapv(|l| l.max(floor).sqrt()));
    }
    state.validate()?;
    Ok(state)
}

/// Flips each column so that its largest-magnitude entry is positive.
fn canonical_signs(vectors: &mut Array2<f64>) {
    for mut column in vectors.axis_iter_mut(Axis(1)) {
        let pivot = column
            .iter()
            .copied()
            .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            column.mapv_inplace(|x| -x);
        }
    }
}

/// Standard deviations from a covariance diagonal, constant features mapped to 1.
fn sanitized_scale(covariance: &Array2<f64>) -> Array1<f64> {
    covariance
        .diag()
        .mapv(|v| v.max(0.0).sqrt())
        .mapv(|s| if s < MIN_SCALE { 1.0 } else { s })
}

/// Builds the transform from second moments with the eigen-solver of `backend`.
pub(crate) fn state_from_moments(
    backend: &impl BackendEigh,
    covariance: Array2<f64>,
    mean: Array1<f64>,
    config: &PcaConfig,
) -> Result<TransformState> {
    let d = mean.len();
    if covariance.dim() != (d, d) {
        return Err(LinstatError::shape_mismatch((d, d), covariance.dim()));
    }
    let (matrix, scale) = if config.use_correlation {
        let scale = sanitized_scale(&covariance);
        let outer = scale.view().insert_axis(Axis(1)).dot(&scale.view().insert_axis(Axis(0)));
        (covariance / &outer, Some(scale))
    } else {
        (covariance, None)
    };
    let eig = backend.eigh_upper(&matrix)?;
    state_from_spectrum(eig.eigenvalues, eig.eigenvectors, mean, scale, config)
}

impl PCA {
    /// Creates a new, empty PCA struct.
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Creates a PCA from a pre-computed rotation, mean and standard deviations.
    ///
    /// Standard deviations that are not finite or not above `1e-9` are replaced
    /// by 1. The retained eigenvalues are unknown and stored as zeros.
    pub fn with_model(
        rotation: Array2<f64>,
        mean: Array1<f64>,
        raw_standard_deviations: Option<Array1<f64>>,
    ) -> Result<Self> {
        let k = rotation.ncols();
        let mut state = TransformState::new(TransformKind::Pca, rotation, mean, Array1::zeros(k));
        state.scale =
            raw_standard_deviations.map(|s| s.mapv(|val| if val.is_finite() && val > MIN_SCALE { val } else { 1.0 }));
        state.validate()?;
        Ok(Self { state: Some(state) })
    }

    /// Fits by diagonalizing the covariance (or correlation) matrix of the rows
    /// of `data` with Jacobi rotations. Returns the chosen dimension.
    ///
    /// # Errors
    /// `DimensionMismatch` on empty data, `SingularMatrix` when no component
    /// is relevant (e.g. constant data), `ConvergenceFailure` from the solver.
    pub fn fit(&mut self, data: &Matrix, config: &PcaConfig) -> Result<usize> {
        let start_time = Instant::now();
        let x = data.view();
        let covariance = covariance_rows_of(x)?;
        let mean = mean_rows_of(x)?;
        let state = state_from_moments(&JacobiBackend::default(), covariance, mean, config)?;
        info!(
            "PCA: kept {} of {} components from {}x{} data ({:.2?})",
            state.output_dim(),
            state.input_dim(),
            data.rows(),
            data.columns(),
            start_time.elapsed()
        );
        Ok(self.install(state))
    }

    /// Fits from the SVD of the centred (and, in correlation mode, scaled) data
    /// matrix, never forming the covariance. Uses the LAPACK backend when it is
    /// compiled in.
    pub fn fit_fast(&mut self, data: &Matrix, config: &PcaConfig) -> Result<usize> {
        let start_time = Instant::now();
        let (n, d) = data.shape();
        if n == 0 || d == 0 {
            return Err(LinstatError::shape_mismatch((1, d.max(1)), (n, d)));
        }
        let x = data.as_array();
        let mean = mean_rows_of(x.view())?;
        let mut centered = x - &mean.view().insert_axis(Axis(0));
        let scale = if config.use_correlation {
            let std = centered
                .map_axis(Axis(0), |column| column.std(0.0))
                .mapv(|s| if s < MIN_SCALE { 1.0 } else { s });
            centered /= &std;
            Some(std)
        } else {
            None
        };

        let provider = LinAlgBackendProvider::new();
        let svd = provider.svd_into(centered)?;
        let eigenvalues = svd.s.mapv(|s| s * s / n as f64);
        let state = state_from_spectrum(eigenvalues, svd.v, mean, scale, config)?;
        info!(
            "PCA ({}): kept {} of {} components from {}x{} data ({:.2?})",
            provider.name(),
            state.output_dim(),
            d,
            n,
            d,
            start_time.elapsed()
        );
        Ok(self.install(state))
    }

    pub fn fit_transform(&mut self, data: &Matrix, config: &PcaConfig) -> Result<Matrix> {
        self.fit(data, config)?;
        self.transform(data)
    }

    /// Fits from an externally computed covariance matrix and mean vector.
    pub fn set_covariance_and_mean(&mut self, covariance: &Matrix, mean: &Vector, config: &PcaConfig) -> Result<usize> {
        let state = state_from_moments(
            &JacobiBackend::default(),
            covariance.as_array().clone(),
            mean.as_array().clone(),
            config,
        )?;
        Ok(self.install(state))
    }

    /// Maps transformed rows back into input space.
    pub fn reconstruct(&self, scores: &Matrix) -> Result<Matrix> {
        self.fitted_state()?.unapply(scores)
    }

    /// Centering vector, zeros when the model does not centre its output.
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.state.as_ref().map(|s| &s.center)
    }

    /// Per-feature standard deviations used in correlation mode.
    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.state.as_ref().and_then(|s| s.scale.as_ref())
    }

    /// Principal axes in columns, shape (n_features, k_components).
    pub fn rotation(&self) -> Option<&Array2<f64>> {
        self.state.as_ref().map(|s| &s.basis)
    }

    /// Eigenvalues of the retained components, descending.
    pub fn explained_variance(&self) -> Option<Array1<f64>> {
        self.state
            .as_ref()
            .map(|state| state.eigenvalues.slice(s![..state.output_dim()]).to_owned())
    }

    /// Full eigenvalue spectrum, including discarded components.
    pub fn eigenvalues(&self) -> Option<&Array1<f64>> {
        self.state.as_ref().map(|s| &s.eigenvalues)
    }

    fn install(&mut self, state: TransformState) -> usize {
        let dim = state.output_dim();
        self.state = Some(state);
        dim
    }
}

impl SubspaceTransform for PCA {
    const KINDS: &'static [TransformKind] = &[TransformKind::Pca, TransformKind::Whitening];

    fn state(&self) -> Option<&TransformState> {
        self.state.as_ref()
    }

    fn with_state(state: TransformState) -> Self {
        Self { state: Some(state) }
    }
}

fn helper_config(dim: isize, kappa: f64, whitening: bool) -> PcaConfig {
    PcaConfig {
        result_dim: usize::try_from(dim).unwrap_or(0),
        kappa,
        whitening,
        ..PcaConfig::default()
    }
}

/// Fits a PCA keeping `dim` components (`dim <= 0` selects automatically)
/// and returns it together with the transformed data.
pub fn make_pca(data: &Matrix, dim: isize, kappa: f64) -> Result<(PCA, Matrix)> {
    let mut pca = PCA::new();
    let transformed = pca.fit_transform(data, &helper_config(dim, kappa, false))?;
    Ok((pca, transformed))
}

/// Like [`make_pca`] with whitened output.
pub fn make_white(data: &Matrix, dim: isize, kappa: f64) -> Result<(PCA, Matrix)> {
    let mut pca = PCA::new();
    let transformed = pca.fit_transform(data, &helper_config(dim, kappa, true))?;
    Ok((pca, transformed))
}

/// Like [`make_pca`], fitted with [`PCA::fit_fast`].
pub fn make_fast_pca(data: &Matrix, dim: isize, kappa: f64) -> Result<(PCA, Matrix)> {
    let mut pca = PCA::new();
    pca.fit_fast(data, &helper_config(dim, kappa, false))?;
    let transformed = pca.transform(data)?;
    Ok((pca, transformed))
}

/// Like [`make_white`], fitted with [`PCA::fit_fast`].
pub fn make_fast_white(data: &Matrix, dim: isize, kappa: f64) -> Result<(PCA, Matrix)> {
    let mut pca = PCA::new();
    pca.fit_fast(data, &helper_config(dim, kappa, true))?;
    let transformed = pca.transform(data)?;
    Ok((pca, transformed))
}
