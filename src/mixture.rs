// src/mixture.rs

//! Gaussian mixture models with full covariances, fitted by expectation-maximization.

use crate::error::{LinstatError, Result};
use crate::lu::lu_decompose;
use crate::stats::covariance_rows_of;
use crate::storage::{Matrix, Vector};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixtureConfig {
    pub components: usize,
    /// Maximum number of EM iterations.
    pub iterations: usize,
    /// Keep iterating after the log-likelihood stops improving.
    pub force_iterations: bool,
    /// Minimum per-sample log-likelihood gain that counts as improvement.
    pub tolerance: f64,
    /// Added to every covariance diagonal.
    pub regularization: f64,
    pub seed: u64,
}

impl Default for MixtureConfig {
    fn default() -> Self {
        MixtureConfig {
            components: 2,
            iterations: 100,
            force_iterations: false,
            tolerance: 1e-8,
            regularization: 1e-6,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixtureModel {
    pub means: Vec<Vector>,
    pub covariances: Vec<Matrix>,
    /// Mixing weights, summing to 1.
    pub weights: Vector,
}

/// Precomputed inverse and normalization of one component density.
struct ComponentDensity {
    mean: Array1<f64>,
    inverse: Array2<f64>,
    log_norm: f64,
}

impl ComponentDensity {
    fn new(mean: &Array1<f64>, covariance: &Array2<f64>) -> Result<Self> {
        let lu = lu_decompose(&Matrix::from_array(covariance.clone()))?;
        let (sign, log_det) = lu.log_abs_determinant();
        if sign <= 0.0 {
            return Err(LinstatError::SingularMatrix { pivot: lu.determinant() });
        }
        let d = mean.len() as f64;
        Ok(ComponentDensity {
            mean: mean.clone(),
            inverse: lu.inverse().into_array(),
            log_norm: -0.5 * (d * (2.0 * PI).ln() + log_det),
        })
    }

    fn log_pdf(&self, x: ArrayView1<'_, f64>) -> f64 {
        let diff = &x - &self.mean;
        self.log_norm - 0.5 * diff.dot(&self.inverse.dot(&diff))
    }
}

fn log_sum_exp(values: ArrayView1<'_, f64>) -> f64 {
    let max = values.fold(f64::NEG_INFINITY, |acc, &x| acc.max(x));
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|&x| (x - max).exp()).sum::<f64>().ln()
}

impl MixtureModel {
    pub fn components(&self) -> usize {
        self.weights.size()
    }

    fn densities(&self) -> Result<Vec<ComponentDensity>> {
        self.means
            .iter()
            .zip(&self.covariances)
            .map(|(m, c)| ComponentDensity::new(m.as_array(), c.as_array()))
            .collect()
    }

    /// `n × k` matrix of `log(w_k) + log N(x_i | μ_k, Σ_k)`.
    fn weighted_log_densities(&self, data: &Matrix) -> Result<Array2<f64>> {
        let width = self.means.first().map_or(0, Vector::size);
        if data.columns() != width {
            return Err(LinstatError::shape_mismatch((data.rows(), width), data.shape()));
        }
        let densities = self.densities()?;
        let log_weights = self.weights.as_array().mapv(f64::ln);
        Ok(Array2::from_shape_fn((data.rows(), densities.len()), |(i, k)| {
            log_weights[k] + densities[k].log_pdf(data.as_array().row(i))
        }))
    }

    /// Total log-likelihood of the rows of `data`.
    pub fn log_likelihood(&self, data: &Matrix) -> Result<f64> {
        let weighted = self.weighted_log_densities(data)?;
        Ok(weighted.rows().into_iter().map(log_sum_exp).sum())
    }

    /// Posterior component probabilities, one row per observation.
    pub fn responsibilities(&self, data: &Matrix) -> Result<Matrix> {
        let (resp, _) = responsibilities_of(self.weighted_log_densities(data)?);
        Ok(Matrix::from_array(resp))
    }
}

fn responsibilities_of(mut weighted: Array2<f64>) -> (Array2<f64>, f64) {
    let mut total = 0.0;
    for mut row in weighted.rows_mut() {
        let norm = log_sum_exp(row.view());
        total += norm;
        row.mapv_inplace(|x| (x - norm).exp());
    }
    (weighted, total)
}

/// k-means++ seeding: each further mean is drawn with probability
/// proportional to its squared distance from the nearest chosen mean.
fn seed_means(data: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Vec<Array1<f64>> {
    let n = data.nrows();
    let mut means = vec![data.row(rng.gen_range(0..n)).to_owned()];
    while means.len() < k {
        let distances: Vec<f64> = data
            .rows()
            .into_iter()
            .map(|row| {
                means
                    .iter()
                    .map(|m| (&row - m).mapv(|x| x * x).sum())
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = distances.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, d) in distances.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            rng.gen_range(0..n)
        };
        means.push(data.row(chosen).to_owned());
    }
    means
}

/// Fits a `config.components`-component mixture to the rows of `data`.
///
/// # Errors
/// `DimensionMismatch` on empty data, `InvalidArgument` when the component
/// count is 0 or exceeds the number of observations.
pub fn fit_mixture_model(data: &Matrix, config: &MixtureConfig) -> Result<MixtureModel> {
    let start_time = Instant::now();
    let (n, d) = data.shape();
    if n == 0 || d == 0 {
        return Err(LinstatError::shape_mismatch((1, d.max(1)), (n, d)));
    }
    let k = config.components;
    if k == 0 || k > n {
        return Err(LinstatError::InvalidArgument(format!(
            "cannot fit {} components to {} observations",
            k, n
        )));
    }
    let x = data.as_array();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let regularizer = Array2::<f64>::eye(d) * config.regularization;

    let initial_cov = covariance_rows_of(x.view())? + &regularizer;
    let mut model = MixtureModel {
        means: seed_means(x, k, &mut rng).into_iter().map(Vector::from_array).collect(),
        covariances: vec![Matrix::from_array(initial_cov); k],
        weights: Vector::filled(k, 1.0 / k as f64),
    };

    let mut previous = f64::NEG_INFINITY;
    let mut iterations = 0;
    while iterations < config.iterations {
        let (resp, total) = responsibilities_of(model.weighted_log_densities(data)?);
        let average = total / n as f64;
        debug!("GMM: iteration {} mean log-likelihood {:.6}", iterations, average);
        if !config.force_iterations && iterations > 0 && average < previous + config.tolerance {
            break;
        }
        previous = average;

        let mut next = model.clone();
        for c in 0..k {
            let r = resp.column(c);
            let nk = r.sum();
            if nk < f64::EPSILON {
                warn!("GMM: component {} lost all support, keeping its previous parameters", c);
                continue;
            }
            let mean = x.t().dot(&r) / nk;
            let centered = x - &mean.view().insert_axis(Axis(0));
            let weighted = &centered * &r.insert_axis(Axis(1));
            let cov = weighted.t().dot(&centered) / nk + &regularizer;
            next.means[c] = Vector::from_array(mean);
            next.covariances[c] = Matrix::from_array(cov);
            next.weights.as_array_mut()[c] = nk / n as f64;
        }
        let weight_sum = next.weights.sum_of_elements();
        next.weights.divide(weight_sum);
        model = next;
        iterations += 1;
    }

    info!(
        "GMM: fitted {} components to {}x{} data in {} iterations ({:.2?})",
        k,
        n,
        d,
        iterations,
        start_time.elapsed()
    );
    Ok(model)
}
