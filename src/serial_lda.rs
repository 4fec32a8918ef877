// src/serial_lda.rs

use crate::error::{LinstatError, Result};
use crate::lda::{class_moments, scatter_matrices, state_from_scatter, ClassMoments, LdaConfig};
use crate::serial_stats::SerialStats;
use crate::storage::Matrix;
use crate::transform::{SubspaceTransform, TransformKind, TransformState};
use log::info;

/// LDA fitted from data presented class by class, or in labelled chunks.
#[derive(Debug, Clone, Default)]
pub struct SerialLDA {
    moments: ClassMoments,
    state: Option<TransformState>,
}

impl SerialLDA {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `class_data` as a new class and returns the label assigned to it
    /// (one past the largest label seen so far).
    pub fn consider_class(&mut self, class_data: &Matrix) -> Result<usize> {
        if class_data.rows() == 0 {
            return Err(LinstatError::shape_mismatch((1, class_data.columns()), class_data.shape()));
        }
        self.check_width(class_data.columns())?;
        let label = self.moments.keys().next_back().map_or(0, |&l| l + 1);
        let mut stats = SerialStats::new();
        stats.consider_rows(class_data)?;
        self.moments.insert(label, stats);
        Ok(label)
    }

    /// Adds labelled rows, merging them into existing classes.
    pub fn consider(&mut self, data: &Matrix, labels: &[usize]) -> Result<()> {
        self.check_width(data.columns())?;
        for (label, chunk) in class_moments(data.view(), labels)? {
            match self.moments.get_mut(&label) {
                Some(existing) => existing.merge(&chunk)?,
                None => {
                    self.moments.insert(label, chunk);
                }
            }
        }
        Ok(())
    }

    fn check_width(&self, width: usize) -> Result<()> {
        match self.moments.values().next() {
            Some(stats) if stats.dimension() != width => {
                Err(LinstatError::shape_mismatch((1, stats.dimension()), (1, width)))
            }
            _ => Ok(()),
        }
    }

    pub fn class_count(&self) -> usize {
        self.moments.len()
    }

    pub fn finalize(&mut self, config: &LdaConfig) -> Result<usize> {
        self.finalize_impl(config, false)
    }

    /// Finalizes with the pseudo-inverse of a singular within-class scatter.
    pub fn finalize_safe(&mut self, config: &LdaConfig) -> Result<usize> {
        self.finalize_impl(config, true)
    }

    fn finalize_impl(&mut self, config: &LdaConfig, safe: bool) -> Result<usize> {
        let (within, between, mean) = scatter_matrices(&self.moments)?;
        let classes = self.moments.keys().copied().collect();
        let state = state_from_scatter(&within, &between, mean, classes, config, safe)?;
        let dim = state.output_dim();
        info!("SerialLDA: finalized {} directions for {} classes", dim, self.moments.len());
        self.state = Some(state);
        Ok(dim)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl SubspaceTransform for SerialLDA {
    const KINDS: &'static [TransformKind] = &[TransformKind::Lda];

    fn state(&self) -> Option<&TransformState> {
        self.state.as_ref()
    }

    fn with_state(state: TransformState) -> Self {
        SerialLDA {
            moments: ClassMoments::new(),
            state: Some(state),
        }
    }
}
