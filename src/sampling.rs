// src/sampling.rs

//! Seeded Gaussian sampling.

use crate::error::{LinstatError, Result};
use crate::storage::{Matrix, Vector};
use ndarray::{Array1, Array2};
use ndarray_rand::RandomExt;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

/// Normal-distribution sampler over a reproducible ChaCha8 stream.
///
/// `sigma` is always the standard deviation, never the variance.
#[derive(Debug, Clone)]
pub struct GaussianSampler {
    rng: ChaCha8Rng,
}

fn normal(mu: f64, sigma: f64) -> Result<Normal<f64>> {
    if !mu.is_finite() || !sigma.is_finite() || sigma < 0.0 {
        return Err(LinstatError::InvalidArgument(format!(
            "gaussian parameters mu={} sigma={} are invalid",
            mu, sigma
        )));
    }
    Normal::new(mu, sigma).map_err(|e| LinstatError::InvalidArgument(e.to_string()))
}

impl GaussianSampler {
    pub fn new(seed: u64) -> Self {
        GaussianSampler {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seeded from operating-system entropy.
    pub fn from_entropy() -> Self {
        GaussianSampler {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn sample(&mut self, mu: f64, sigma: f64) -> Result<f64> {
        let dist = normal(mu, sigma)?;
        Ok(self.rng.sample(dist))
    }

    /// Overwrites every element of `v` with an independent draw. The size is kept.
    pub fn fill_vector(&mut self, v: &mut Vector, mu: f64, sigma: f64) -> Result<()> {
        let dist = normal(mu, sigma)?;
        *v = Vector::from_array(Array1::random_using(v.size(), dist, &mut self.rng));
        Ok(())
    }

    pub fn random_vector(&mut self, size: usize, mu: f64, sigma: f64) -> Result<Vector> {
        let mut v = Vector::with_size(size);
        self.fill_vector(&mut v, mu, sigma)?;
        Ok(v)
    }

    pub fn random_matrix(&mut self, rows: usize, cols: usize, mu: f64, sigma: f64) -> Result<Matrix> {
        let dist = normal(mu, sigma)?;
        Ok(Matrix::from_array(Array2::random_using((rows, cols), dist, &mut self.rng)))
    }
}

/// Fills `v` with N(`mu`, `sigma`²) draws from a generator seeded with `seed`.
pub fn fill_gauss_vector(mu: f64, sigma: f64, v: &mut Vector, seed: u64) -> Result<()> {
    GaussianSampler::new(seed).fill_vector(v, mu, sigma)
}
