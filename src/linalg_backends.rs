// src/linalg_backends.rs

//! Dense decompositions used by the engine, behind small traits so the LAPACK
//! (ndarray-linalg) and faer implementations are interchangeable at compile time.

use ndarray::{Array1, Array2};
use std::error::Error;

/// Error type returned by backends; the engine wraps it into `NonConvergence`.
pub type BackendError = Box<dyn Error + Send + Sync>;

/// Output of a symmetric eigendecomposition.
#[derive(Debug)]
pub struct EighOutput {
    /// Eigenvalues in the order the solver produced them (ascending for LAPACK and faer).
    pub eigenvalues: Array1<f64>,
    /// eigenvectors.column(i) corresponds to eigenvalues[i].
    pub eigenvectors: Array2<f64>,
}

/// Output of a thin SVD `A = U diag(s) Vt`, right singular vectors only.
#[derive(Debug)]
pub struct SvdOutput {
    pub singular_values: Array1<f64>,
    /// Rows are right singular vectors, shape (k, n_cols).
    pub vt: Array2<f64>,
}

/// Symmetric eigendecomposition (LAPACK DSYEVD or equivalent). Reads the upper triangle.
pub trait SymmetricEigenSolver {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput, BackendError>;
}

/// Thin SVD returning singular values and right singular vectors.
pub trait ThinSvdSolver {
    fn svd_vt(&self, matrix: Array2<f64>) -> Result<SvdOutput, BackendError>;
}

// --- ndarray-linalg (LAPACK) backend ---
use ndarray_linalg::{Eigh, SVDInto, UPLO};

#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

fn to_dyn_error<E: Error + Send + Sync + 'static>(e: E) -> BackendError {
    Box::new(e)
}

impl SymmetricEigenSolver for NdarrayLinAlgBackend {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput, BackendError> {
        let (eigenvalues, eigenvectors) = matrix.eigh(UPLO::Upper).map_err(to_dyn_error)?;
        Ok(EighOutput { eigenvalues, eigenvectors })
    }
}

impl ThinSvdSolver for NdarrayLinAlgBackend {
    fn svd_vt(&self, matrix: Array2<f64>) -> Result<SvdOutput, BackendError> {
        let k = matrix.nrows().min(matrix.ncols());
        let (_, s, vt) = matrix.svd_into(false, true).map_err(to_dyn_error)?;
        let vt = vt.ok_or("SVD did not return right singular vectors")?;
        // LAPACK returns the full (n_cols x n_cols) Vt; only the first k rows pair with s.
        let vt = vt.slice(ndarray::s![..k, ..]).to_owned();
        Ok(SvdOutput { singular_values: s, vt })
    }
}

// --- faer backend ---
#[cfg(feature = "backend_faer")]
mod faer_specific_code {
    use super::{BackendError, EighOutput, SvdOutput, SymmetricEigenSolver, ThinSvdSolver};
    use faer::{Mat, Side};
    use ndarray::{Array1, Array2};

    #[derive(Debug, Default, Copy, Clone)]
    pub struct FaerLinAlgBackend;

    fn to_faer(matrix: &Array2<f64>) -> Mat<f64> {
        Mat::from_fn(matrix.nrows(), matrix.ncols(), |i, j| matrix[[i, j]])
    }

    fn to_ndarray(matrix: faer::MatRef<'_, f64>) -> Array2<f64> {
        Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| matrix[(i, j)])
    }

    impl SymmetricEigenSolver for FaerLinAlgBackend {
        fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput, BackendError> {
            if matrix.nrows() != matrix.ncols() {
                return Err("Matrix must be square for eigendecomposition.".into());
            }
            if matrix.is_empty() {
                return Ok(EighOutput { eigenvalues: Array1::zeros(0), eigenvectors: Array2::zeros((0, 0)) });
            }
            let eig = to_faer(matrix)
                .self_adjoint_eigen(Side::Upper)
                .map_err(|e| format!("faer eigendecomposition failed: {:?}", e))?;
            let s = eig.S().column_vector();
            let eigenvalues = Array1::from_shape_fn(s.nrows(), |i| s[i]);
            Ok(EighOutput { eigenvalues, eigenvectors: to_ndarray(eig.U()) })
        }
    }

    impl ThinSvdSolver for FaerLinAlgBackend {
        fn svd_vt(&self, matrix: Array2<f64>) -> Result<SvdOutput, BackendError> {
            let svd = to_faer(&matrix)
                .thin_svd()
                .map_err(|e| format!("faer SVD failed: {:?}", e))?;
            let s = svd.S().column_vector();
            let singular_values = Array1::from_shape_fn(s.nrows(), |i| s[i]);
            let vt = to_ndarray(svd.V()).reversed_axes();
            Ok(SvdOutput { singular_values, vt })
        }
    }
}

/// Dispatches to the backend chosen by cargo features.
#[derive(Debug, Default, Copy, Clone)]
pub struct LinAlgBackendProvider;

impl SymmetricEigenSolver for LinAlgBackendProvider {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput, BackendError> {
        #[cfg(feature = "backend_faer")]
        {
            faer_specific_code::FaerLinAlgBackend.eigh_upper(matrix)
        }
        #[cfg(not(feature = "backend_faer"))]
        {
            NdarrayLinAlgBackend.eigh_upper(matrix)
        }
    }
}

impl ThinSvdSolver for LinAlgBackendProvider {
    fn svd_vt(&self, matrix: Array2<f64>) -> Result<SvdOutput, BackendError> {
        #[cfg(feature = "backend_faer")]
        {
            faer_specific_code::FaerLinAlgBackend.svd_vt(matrix)
        }
        #[cfg(not(feature = "backend_faer"))]
        {
            NdarrayLinAlgBackend.svd_vt(matrix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn eigh_of_diagonal_matrix() {
        let m = array![[2.0, 0.0], [0.0, 5.0]];
        let out = LinAlgBackendProvider.eigh_upper(&m).unwrap();
        let mut vals = out.eigenvalues.to_vec();
        vals.sort_by(|a, b| a.total_cmp(b));
        assert_abs_diff_eq!(vals[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vals[1], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn svd_vt_rows_pair_with_singular_values() {
        let a = array![[3.0, 0.0], [0.0, -2.0], [0.0, 0.0]];
        let out = LinAlgBackendProvider.svd_vt(a).unwrap();
        assert_eq!(out.vt.dim(), (2, 2));
        assert_abs_diff_eq!(out.singular_values[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.singular_values[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.vt[[0, 0]].abs(), 1.0, epsilon = 1e-12);
    }
}
