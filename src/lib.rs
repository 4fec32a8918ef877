// Dense linear algebra, statistics and subspace transforms

#![doc = include_str!("../README.md")]

pub mod error;
pub mod jacobi;
pub mod lda;
pub mod linalg_backends;
pub mod lu;
pub mod mixture;
pub mod ops;
pub mod pca;
pub mod sampling;
pub mod serial_lda;
pub mod serial_pca;
pub mod serial_stats;
pub mod stats;
pub mod storage;
pub mod svd;
pub mod transform;

#[cfg(test)]
mod pca_tests;

/// Relative pivot and rank threshold shared by the decompositions.
pub const EPSILON: f64 = 1e-14;

pub use error::{LinstatError, Result};
pub use jacobi::{jacobi_eigen, jacobi_eigen_with_config, EigenDecomposition, JacobiConfig};
pub use lda::{between_class_scatter, LdaConfig, LDA};
pub use lu::{determinant, invert, invert_in_place, is_singular, lu_decompose, lu_decompose_in_place, LuDecomposition};
pub use mixture::{fit_mixture_model, MixtureConfig, MixtureModel};
pub use ops::{cos2_similarity, euclidean_similarity};
pub use pca::{make_fast_pca, make_fast_white, make_pca, make_white, PcaConfig, PCA};
pub use sampling::{fill_gauss_vector, GaussianSampler};
pub use serial_lda::SerialLDA;
pub use serial_pca::SerialPCA;
pub use serial_stats::SerialStats;
pub use storage::{Matrix, Vector};
pub use svd::{safe_invert, svd, svd_in_place, svd_with_config, SvdConfig, SvdDecomposition};
pub use transform::{ModelFormat, SubspaceTransform, TransformKind, TransformState};
