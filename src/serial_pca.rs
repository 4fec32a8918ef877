// src/serial_pca.rs

use crate::error::Result;
use crate::linalg_backends::{BackendEigh, JacobiBackend, LinAlgBackendProvider};
use crate::pca::{state_from_moments, PcaConfig};
use crate::serial_stats::SerialStats;
use crate::storage::Matrix;
use crate::transform::{SubspaceTransform, TransformKind, TransformState};
use log::{debug, info};

/// PCA fitted from data presented in chunks.
///
/// Each [`consider`](SerialPCA::consider) folds a chunk into running moments;
/// [`finalize`](SerialPCA::finalize) diagonalizes them once. The result equals
/// a batch [`crate::PCA::fit`] over the concatenated chunks.
#[derive(Debug, Clone, Default)]
pub struct SerialPCA {
    moments: SerialStats,
    state: Option<TransformState>,
}

impl SerialPCA {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the rows of `chunk`. Widths must agree across chunks.
    pub fn consider(&mut self, chunk: &Matrix) -> Result<()> {
        self.moments.consider_rows(chunk)?;
        debug!("SerialPCA: {} rows considered", self.moments.count());
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.moments.count()
    }

    /// Builds the transform from everything considered so far and returns its
    /// dimension. Further chunks may be added and `finalize` called again.
    pub fn finalize(&mut self, config: &PcaConfig) -> Result<usize> {
        self.finalize_with(&JacobiBackend::default(), "jacobi", config)
    }

    /// Like [`finalize`](SerialPCA::finalize), diagonalizing through
    /// [`LinAlgBackendProvider`], i.e. LAPACK when it is compiled in.
    pub fn finalize_fast(&mut self, config: &PcaConfig) -> Result<usize> {
        let provider = LinAlgBackendProvider::new();
        self.finalize_with(&provider, provider.name(), config)
    }

    fn finalize_with(&mut self, backend: &impl BackendEigh, name: &str, config: &PcaConfig) -> Result<usize> {
        let covariance = self.moments.covariance()?.into_array();
        let mean = self.moments.mean()?.into_array();
        let state = state_from_moments(backend, covariance, mean, config)?;
        let dim = state.output_dim();
        info!(
            "SerialPCA ({}): finalized {} components from {} rows",
            name,
            dim,
            self.moments.count()
        );
        self.state = Some(state);
        Ok(dim)
    }

    /// Drops the accumulated moments and the fitted state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl SubspaceTransform for SerialPCA {
    const KINDS: &'static [TransformKind] = &[TransformKind::Pca, TransformKind::Whitening];

    fn state(&self) -> Option<&TransformState> {
        self.state.as_ref()
    }

    fn with_state(state: TransformState) -> Self {
        SerialPCA {
            moments: SerialStats::default(),
            state: Some(state),
        }
    }
}
