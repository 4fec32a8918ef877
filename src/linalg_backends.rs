// src/linalg_backends.rs

use crate::error::{LinstatError, Result};
use crate::jacobi::{jacobi_eigh, JacobiConfig};
use crate::svd::{svd_with_config, SvdConfig};
use crate::storage::Matrix;
use ndarray::{Array1, Array2};

/// Output of a symmetric eigendecomposition.
#[derive(Debug)]
pub struct EighOutput {
    /// Eigenvalues sorted in descending order.
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors as columns; `eigenvectors.column(i)` corresponds to `eigenvalues[i]`.
    pub eigenvectors: Array2<f64>,
}

/// Trait for symmetric eigendecomposition. Implementers read the upper triangle.
pub trait BackendEigh {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput>;
}

/// Output of a thin singular value decomposition, `k = min(m, n)`.
#[derive(Debug)]
pub struct SVDOutput {
    /// m × k
    pub u: Array2<f64>,
    /// k values, descending.
    pub s: Array1<f64>,
    /// n × k (not transposed).
    pub v: Array2<f64>,
}

/// Trait for Singular Value Decomposition.
pub trait BackendSVD {
    fn svd_into(&self, matrix: Array2<f64>) -> Result<SVDOutput>;
}

// --- Native backend: Jacobi rotations, no external LAPACK ---

#[derive(Debug, Default, Copy, Clone)]
pub struct JacobiBackend {
    pub jacobi: JacobiConfig,
    pub svd: SvdConfig,
}

impl BackendEigh for JacobiBackend {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput> {
        if matrix.nrows() != matrix.ncols() {
            return Err(LinstatError::shape_mismatch((matrix.nrows(), matrix.nrows()), matrix.dim()));
        }
        let (eigenvalues, eigenvectors) = jacobi_eigh(matrix, &self.jacobi)?;
        Ok(EighOutput { eigenvalues, eigenvectors })
    }
}

impl BackendSVD for JacobiBackend {
    fn svd_into(&self, matrix: Array2<f64>) -> Result<SVDOutput> {
        let decomposition = svd_with_config(&Matrix::from_array(matrix), &self.svd)?;
        Ok(SVDOutput {
            u: decomposition.u.into_array(),
            s: decomposition.w.into_array(),
            v: decomposition.v.into_array(),
        })
    }
}

// --- LAPACK backend via ndarray-linalg ---
#[cfg(feature = "backend_lapack")]
mod lapack_specific_code {
    use super::{BackendEigh, BackendSVD, EighOutput, SVDOutput};
    use crate::error::{LinstatError, Result};
    use ndarray::{s, Array2, Axis};
    use ndarray_linalg::{Eigh as NdLinalgEigh, SVDInto as NdLinalgSVDInto, UPLO};

    #[derive(Debug, Default, Copy, Clone)]
    pub struct LapackBackend;

    fn to_backend_error(e: ndarray_linalg::error::LinalgError) -> LinstatError {
        LinstatError::Backend(e.to_string())
    }

    impl BackendEigh for LapackBackend {
        fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput> {
            let (mut eigenvalues, mut eigenvectors) = matrix.eigh(UPLO::Upper).map_err(to_backend_error)?;
            // LAPACK returns ascending order.
            eigenvalues.invert_axis(Axis(0));
            eigenvectors.invert_axis(Axis(1));
            Ok(EighOutput {
                eigenvalues: eigenvalues.as_standard_layout().to_owned(),
                eigenvectors: eigenvectors.as_standard_layout().to_owned(),
            })
        }
    }

    impl BackendSVD for LapackBackend {
        fn svd_into(&self, matrix: Array2<f64>) -> Result<SVDOutput> {
            let k = matrix.nrows().min(matrix.ncols());
            let (u, s, vt) = matrix.svd_into(true, true).map_err(to_backend_error)?;
            let u = u.ok_or_else(|| LinstatError::Backend("LAPACK SVD returned no U".to_string()))?;
            let vt = vt.ok_or_else(|| LinstatError::Backend("LAPACK SVD returned no V^T".to_string()))?;
            Ok(SVDOutput {
                u: u.slice(s![.., ..k]).to_owned(),
                s,
                v: vt.slice(s![..k, ..]).t().to_owned(),
            })
        }
    }
}

#[cfg(feature = "backend_lapack")]
pub use lapack_specific_code::LapackBackend;

/// Chooses the LAPACK backend when compiled in, the native Jacobi backend otherwise.
#[derive(Debug, Default, Copy, Clone)]
pub struct LinAlgBackendProvider {
    native: JacobiBackend,
}

impl LinAlgBackendProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native(native: JacobiBackend) -> Self {
        Self { native }
    }

    pub fn name(&self) -> &'static str {
        if cfg!(feature = "backend_lapack") {
            "lapack"
        } else {
            "jacobi"
        }
    }
}

impl BackendEigh for LinAlgBackendProvider {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput> {
        #[cfg(feature = "backend_lapack")]
        {
            LapackBackend.eigh_upper(matrix).or_else(|e| {
                log::warn!("LAPACK eigh failed ({}), falling back to Jacobi", e);
                self.native.eigh_upper(matrix)
            })
        }
        #[cfg(not(feature = "backend_lapack"))]
        {
            self.native.eigh_upper(matrix)
        }
    }
}

impl BackendSVD for LinAlgBackendProvider {
    fn svd_into(&self, matrix: Array2<f64>) -> Result<SVDOutput> {
        #[cfg(feature = "backend_lapack")]
        {
            LapackBackend.svd_into(matrix.clone()).or_else(|e| {
                log::warn!("LAPACK SVD failed ({}), falling back to Jacobi", e);
                self.native.svd_into(matrix)
            })
        }
        #[cfg(not(feature = "backend_lapack"))]
        {
            self.native.svd_into(matrix)
        }
    }
}
