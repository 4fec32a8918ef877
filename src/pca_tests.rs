use crate::error::LinstatError;
use crate::lda::{between_class_scatter, LdaConfig, LDA};
use crate::pca::{make_fast_pca, make_fast_white, make_pca, make_white, PcaConfig, PCA};
use crate::sampling::GaussianSampler;
use crate::stats;
use crate::storage::{Matrix, Vector};
use crate::transform::{ModelFormat, SubspaceTransform, TransformKind};

use approx::assert_abs_diff_eq;
use ndarray::{array, Array1, Array2};
use std::error::Error;
use tempfile::NamedTempFile;

const COMPARISON_TOLERANCE: f64 = 1e-8;

/// Gaussian rows with distinct per-axis spread, mixed so that features correlate.
fn generate_correlated_data(n_samples: usize, seed: u64) -> Matrix {
    let mut sampler = GaussianSampler::new(seed);
    let mut z = sampler.random_matrix(n_samples, 4, 0.0, 1.0).unwrap();
    let spread = array![4.0, 2.0, 1.0, 0.5];
    z.as_array_mut().zip_mut_with(&spread, |x, &s| *x *= s);
    let mixing = Matrix::from_rows(&[
        vec![1.0, 0.5, 0.0, 0.0],
        vec![0.0, 1.0, 0.3, 0.0],
        vec![0.0, 0.0, 1.0, 0.2],
        vec![0.1, 0.0, 0.0, 1.0],
    ])
    .unwrap();
    let mut data = z.product(&mixing).unwrap();
    data.add_scalar(10.0);
    data
}

/// Two labelled Gaussian blobs in 3 dimensions, separated along the first axis.
fn generate_two_classes(per_class: usize, seed: u64) -> (Matrix, Vec<usize>) {
    let mut sampler = GaussianSampler::new(seed);
    let first = sampler.random_matrix(per_class, 3, 0.0, 1.0).unwrap();
    let mut second = sampler.random_matrix(per_class, 3, 0.0, 1.0).unwrap();
    second.as_array_mut().column_mut(0).mapv_inplace(|x| x + 6.0);
    let mut rows = first.to_rows();
    rows.extend(second.to_rows());
    let labels = (0..2 * per_class).map(|i| i / per_class).collect();
    (Matrix::from_rows(&rows).unwrap(), labels)
}

fn assert_matrix_close(a: &Matrix, b: &Matrix, tolerance: f64, context: &str) {
    assert_eq!(a.shape(), b.shape(), "shape mismatch ({})", context);
    for ((r, c), x) in a.as_array().indexed_iter() {
        let y = b.as_array()[[r, c]];
        assert!((x - y).abs() < tolerance, "Mismatch at [{},{}] ({}): {} vs {}", r, c, context, x, y);
    }
}

fn assert_diagonal(m: &Matrix, tolerance: f64, context: &str) {
    for ((r, c), x) in m.as_array().indexed_iter() {
        if r != c {
            assert!(x.abs() < tolerance, "off-diagonal [{},{}] = {} ({})", r, c, x, context);
        }
    }
}

#[cfg(test)]
mod pca_fit_tests {
    use super::*;

    #[test]
    fn test_fit_and_fit_fast_agree() -> Result<(), Box<dyn Error>> {
        println!("--- Test: Jacobi and SVD paths agree ---");
        let data = generate_correlated_data(200, 11);
        let config = PcaConfig::with_dim(4);

        let mut exact = PCA::new();
        let mut fast = PCA::new();
        assert_eq!(exact.fit(&data, &config)?, 4);
        assert_eq!(fast.fit_fast(&data, &config)?, 4);

        let ev_exact = exact.explained_variance().ok_or("not fitted")?;
        let ev_fast = fast.explained_variance().ok_or("not fitted")?;
        for (a, b) in ev_exact.iter().zip(ev_fast.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-8 * ev_exact[0]);
        }
        assert_matrix_close(
            &exact.transform(&data)?,
            &fast.transform(&data)?,
            COMPARISON_TOLERANCE,
            "fit vs fit_fast",
        );
        Ok(())
    }

    #[test]
    fn test_transformed_covariance_is_diagonal() -> Result<(), Box<dyn Error>> {
        let data = generate_correlated_data(300, 3);
        let mut pca = PCA::new();
        let transformed = pca.fit_transform(&data, &PcaConfig::with_dim(3))?;
        assert_eq!(transformed.shape(), (300, 3));

        let cov = stats::covariance_matrix_of_rows(&transformed)?;
        assert_diagonal(&cov, 1e-9, "projected covariance");
        let ev = pca.explained_variance().ok_or("not fitted")?;
        for i in 0..3 {
            assert_abs_diff_eq!(cov.as_array()[[i, i]], ev[i], epsilon = 1e-9);
        }
        assert!(ev.windows(2).into_iter().all(|w| w[0] >= w[1]));

        let mean = stats::mean_of_rows(&transformed)?;
        assert!(mean.pretty_close_to(&Vector::filled(3, 0.0), 1e-9));
        Ok(())
    }

    #[test]
    fn test_whitening_gives_unit_variance() -> Result<(), Box<dyn Error>> {
        let data = generate_correlated_data(250, 5);
        let mut pca = PCA::new();
        let config = PcaConfig {
            result_dim: 4,
            whitening: true,
            ..PcaConfig::default()
        };
        let white = pca.fit_transform(&data, &config)?;
        let cov = stats::covariance_matrix_of_rows(&white)?;
        assert!(cov.pretty_close_to(&Matrix::identity(4), 1e-9), "whitened covariance:\n{}", cov);
        assert_eq!(pca.state().map(|s| s.kind), Some(TransformKind::Whitening));
        Ok(())
    }

    #[test]
    fn test_automatic_dimension_drops_null_directions() -> Result<(), Box<dyn Error>> {
        // third column is the sum of the first two
        let mut sampler = GaussianSampler::new(21);
        let base = sampler.random_matrix(50, 2, 0.0, 1.0)?;
        let rows: Vec<Vec<f64>> = base.to_rows().into_iter().map(|r| vec![r[0], r[1], r[0] + r[1]]).collect();
        let data = Matrix::from_rows(&rows)?;

        let mut pca = PCA::new();
        assert_eq!(pca.fit(&data, &PcaConfig::default())?, 2);
        assert_eq!(pca.eigenvalues().map(|e| e.len()), Some(3));
        assert_eq!(pca.dimension(), 2);

        // a large kappa raises the threshold above the second eigenvalue
        let ev = pca.eigenvalues().ok_or("not fitted")?.clone();
        let strict = PcaConfig {
            kappa: 1e5 * (ev[1] / ev[0]) * 1.01,
            ..PcaConfig::default()
        };
        assert_eq!(PCA::new().fit(&data, &strict)?, 1);
        Ok(())
    }

    #[test]
    fn test_requested_dimension_is_clamped() -> Result<(), Box<dyn Error>> {
        let data = generate_correlated_data(40, 8);
        let mut pca = PCA::new();
        assert_eq!(pca.fit(&data, &PcaConfig::with_dim(10))?, 4);
        Ok(())
    }

    #[test]
    fn test_constant_data_is_singular() {
        let data = Matrix::filled(8, 3, 2.0);
        assert!(matches!(
            PCA::new().fit(&data, &PcaConfig::default()),
            Err(LinstatError::SingularMatrix { .. })
        ));
        assert!(matches!(
            PCA::new().fit_fast(&data, &PcaConfig::default()),
            Err(LinstatError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_inexact_constant_data_is_singular() {
        println!("--- Test: inexact constant data has no principal component ---");
        let data = Matrix::filled(10, 3, 0.1);
        let correlation = PcaConfig {
            use_correlation: true,
            ..PcaConfig::default()
        };
        for config in [PcaConfig::default(), correlation] {
            assert!(matches!(PCA::new().fit(&data, &config), Err(LinstatError::SingularMatrix { .. })));
            assert!(matches!(PCA::new().fit_fast(&data, &config), Err(LinstatError::SingularMatrix { .. })));
        }

        let mut serial = crate::serial_pca::SerialPCA::new();
        serial.consider(&data.rows_at(&[0, 1, 2]).unwrap()).unwrap();
        serial.consider(&data.rows_at(&[3, 4, 5, 6, 7, 8, 9]).unwrap()).unwrap();
        assert!(matches!(
            serial.finalize(&PcaConfig::default()),
            Err(LinstatError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_empty_data_is_rejected() {
        assert!(matches!(
            PCA::new().fit(&Matrix::zeros(0, 3), &PcaConfig::default()),
            Err(LinstatError::DimensionMismatch { .. })
        ));
        assert!(PCA::new().fit_fast(&Matrix::zeros(0, 3), &PcaConfig::default()).is_err());
    }

    #[test]
    fn test_correlation_mode() -> Result<(), Box<dyn Error>> {
        let mut data = generate_correlated_data(150, 13);
        // blow up one feature; correlation mode must not care
        data.as_array_mut().column_mut(1).mapv_inplace(|x| x * 1000.0);

        let config = PcaConfig {
            result_dim: 4,
            use_correlation: true,
            ..PcaConfig::default()
        };
        let mut pca = PCA::new();
        pca.fit(&data, &config)?;
        let ev = pca.explained_variance().ok_or("not fitted")?;
        assert_abs_diff_eq!(ev.sum(), 4.0, epsilon = 1e-9);

        let scale = pca.scale().ok_or("no scale in correlation mode")?;
        let std = stats::variance_of_rows(&data)?.as_array().mapv(f64::sqrt);
        for (a, b) in scale.iter().zip(std.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9 * b);
        }

        let mut fast = PCA::new();
        fast.fit_fast(&data, &config)?;
        assert_matrix_close(&pca.transform(&data)?, &fast.transform(&data)?, 1e-7, "correlation fit vs fit_fast");
        Ok(())
    }

    #[test]
    fn test_correlation_mode_with_constant_feature() -> Result<(), Box<dyn Error>> {
        let mut data = generate_correlated_data(60, 17);
        data.as_array_mut().column_mut(2).fill(5.0);
        let config = PcaConfig {
            use_correlation: true,
            ..PcaConfig::default()
        };
        let mut pca = PCA::new();
        pca.fit(&data, &config)?;
        let scale = pca.scale().ok_or("no scale")?;
        assert_eq!(scale[2], 1.0);
        assert!(pca.transform(&data)?.as_array().iter().all(|x| x.is_finite()));
        Ok(())
    }

    #[test]
    fn test_uncentered_output() -> Result<(), Box<dyn Error>> {
        let data = generate_correlated_data(80, 23);
        let config = PcaConfig {
            result_dim: 2,
            center_data: false,
            ..PcaConfig::default()
        };
        let mut pca = PCA::new();
        pca.fit(&data, &config)?;
        let mean = pca.mean().ok_or("not fitted")?;
        assert!(mean.iter().all(|&x| x == 0.0));

        let rotation = pca.rotation().ok_or("not fitted")?;
        let expected = Matrix::from_array(data.as_array().dot(rotation));
        assert_matrix_close(&pca.transform(&data)?, &expected, 1e-10, "uncentered projection");
        Ok(())
    }

    #[test]
    fn test_full_rank_reconstruction() -> Result<(), Box<dyn Error>> {
        let data = generate_correlated_data(64, 29);
        for whitening in [false, true] {
            let config = PcaConfig {
                result_dim: 4,
                whitening,
                ..PcaConfig::default()
            };
            let mut pca = PCA::new();
            let scores = pca.fit_transform(&data, &config)?;
            let restored = pca.reconstruct(&scores)?;
            assert_matrix_close(&restored, &data, 1e-8, "reconstruction");
        }
        Ok(())
    }

    #[test]
    fn test_rotation_is_orthonormal_with_canonical_signs() -> Result<(), Box<dyn Error>> {
        let data = generate_correlated_data(120, 31);
        let mut pca = PCA::new();
        pca.fit(&data, &PcaConfig::with_dim(4))?;
        let rotation = pca.rotation().ok_or("not fitted")?;
        let gram = rotation.t().dot(rotation);
        for ((r, c), x) in gram.indexed_iter() {
            assert_abs_diff_eq!(*x, if r == c { 1.0 } else { 0.0 }, epsilon = 1e-10);
        }
        for column in rotation.columns() {
            let pivot = column.iter().copied().fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
            assert!(pivot > 0.0, "largest entry of every axis must be positive");
        }
        Ok(())
    }

    #[test]
    fn test_make_pca_and_make_white() -> Result<(), Box<dyn Error>> {
        let data = generate_correlated_data(100, 37);
        let (pca, transformed) = make_pca(&data, 2, 1.0)?;
        assert_eq!(pca.dimension(), 2);
        assert_eq!(transformed.shape(), (100, 2));

        let (auto, _) = make_pca(&data, -1, 1.0)?;
        assert_eq!(auto.dimension(), 4);

        let (white, whitened) = make_white(&data, 3, 1.0)?;
        assert_eq!(white.dimension(), 3);
        let cov = stats::covariance_matrix_of_rows(&whitened)?;
        assert!(cov.pretty_close_to(&Matrix::identity(3), 1e-9));
        Ok(())
    }

    #[test]
    fn test_fast_helpers_agree_with_jacobi_helpers() -> Result<(), Box<dyn Error>> {
        println!("--- Test: fast helpers agree with Jacobi helpers ---");
        let data = generate_correlated_data(120, 41);

        let (pca, transformed) = make_pca(&data, 3, 1.0)?;
        let (fast, fast_transformed) = make_fast_pca(&data, 3, 1.0)?;
        assert_eq!(fast.dimension(), pca.dimension());
        assert_matrix_close(&transformed, &fast_transformed, COMPARISON_TOLERANCE, "make_fast_pca");

        let (_, whitened) = make_white(&data, -1, 1.0)?;
        let (fast_white, fast_whitened) = make_fast_white(&data, -1, 1.0)?;
        assert_eq!(fast_white.dimension(), 4);
        assert_matrix_close(&whitened, &fast_whitened, COMPARISON_TOLERANCE, "make_fast_white");
        Ok(())
    }

    #[test]
    fn test_unfitted_and_width_mismatch() -> Result<(), Box<dyn Error>> {
        let pca = PCA::new();
        assert!(!pca.is_fitted());
        assert_eq!(pca.dimension(), 0);
        assert!(matches!(pca.transform(&Matrix::zeros(1, 4)), Err(LinstatError::NotFitted)));
        assert!(matches!(pca.to_bytes(), Err(LinstatError::NotFitted)));
        assert!(matches!(pca.reconstruct(&Matrix::zeros(1, 1)), Err(LinstatError::NotFitted)));

        let data = generate_correlated_data(30, 41);
        let mut fitted = PCA::new();
        fitted.fit(&data, &PcaConfig::with_dim(2))?;
        assert!(matches!(
            fitted.transform(&Matrix::zeros(3, 5)),
            Err(LinstatError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            fitted.transform_vector(&Vector::filled(3, 0.0)),
            Err(LinstatError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            fitted.reconstruct(&Matrix::zeros(1, 3)),
            Err(LinstatError::DimensionMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_transform_vector_matches_matrix_rows() -> Result<(), Box<dyn Error>> {
        let data = generate_correlated_data(50, 43);
        let mut pca = PCA::new();
        let transformed = pca.fit_transform(&data, &PcaConfig::with_dim(3))?;
        for r in [0isize, 17, 49] {
            let single = pca.transform_vector(&data.row(r)?)?;
            assert!(single.pretty_close_to(&transformed.row(r)?, 1e-12));
        }
        Ok(())
    }

    #[test]
    fn test_with_model_constructor() -> Result<(), Box<dyn Error>> {
        println!("--- Test: `with_model` Constructor ---");
        let rotation = array![[1.0, 0.0], [0.0, 1.0]];
        let mean = array![1.0, 1.0];
        let pca = PCA::with_model(rotation, mean, Some(array![2.0, 0.0]))?;
        assert_eq!(pca.scale().map(|s| s.to_vec()), Some(vec![2.0, 1.0]));
        let out = pca.transform_vector(&Vector::from_vec(vec![3.0, 3.0]))?;
        assert_eq!(out.to_vec(), vec![1.0, 2.0]);

        let sanitized = PCA::with_model(Array2::eye(3), Array1::zeros(3), Some(array![-5.0, f64::NAN, 1e-10]))?;
        assert_eq!(sanitized.scale().map(|s| s.to_vec()), Some(vec![1.0, 1.0, 1.0]));

        assert!(PCA::with_model(Array2::eye(3), Array1::zeros(2), None).is_err());
        Ok(())
    }

    #[test]
    fn test_set_covariance_and_mean() -> Result<(), Box<dyn Error>> {
        let covariance = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 4.0]])?;
        let mean = Vector::from_vec(vec![1.0, -1.0]);
        let mut pca = PCA::new();
        assert_eq!(pca.set_covariance_and_mean(&covariance, &mean, &PcaConfig::default())?, 2);
        assert_eq!(pca.explained_variance().map(|e| e.to_vec()), Some(vec![4.0, 1.0]));
        let rotation = pca.rotation().ok_or("not fitted")?;
        assert_eq!(rotation, &array![[0.0, 1.0], [1.0, 0.0]]);

        let out = pca.transform_vector(&Vector::from_vec(vec![3.0, 2.0]))?;
        assert_eq!(out.to_vec(), vec![3.0, 2.0]);

        assert!(matches!(
            pca.set_covariance_and_mean(&covariance, &Vector::filled(3, 0.0), &PcaConfig::default()),
            Err(LinstatError::DimensionMismatch { .. })
        ));
        Ok(())
    }
}

#[cfg(test)]
mod persistence_tests {
    use super::*;

    fn fitted(whitening: bool) -> (PCA, Matrix) {
        let data = generate_correlated_data(90, 47);
        let config = PcaConfig {
            result_dim: 3,
            whitening,
            ..PcaConfig::default()
        };
        let mut pca = PCA::new();
        pca.fit(&data, &config).unwrap();
        (pca, data)
    }

    #[test]
    fn test_text_and_binary_round_trip() -> Result<(), Box<dyn Error>> {
        println!("--- Test: in-memory round trip ---");
        for whitening in [false, true] {
            let (pca, data) = fitted(whitening);
            let expected = pca.transform(&data)?;

            let from_text = PCA::from_text(&pca.to_text()?)?;
            assert_eq!(from_text.state(), pca.state());
            assert_eq!(from_text.transform(&data)?, expected);

            let from_bytes = PCA::from_bytes(&pca.to_bytes()?)?;
            assert_eq!(from_bytes.state(), pca.state());
            assert_eq!(from_bytes.transform(&data)?, expected);
        }
        Ok(())
    }

    #[test]
    fn test_save_load_files() -> Result<(), Box<dyn Error>> {
        println!("--- Test: file round trip ---");
        let (pca, data) = fitted(true);
        let expected = pca.transform(&data)?;
        for format in [ModelFormat::Text, ModelFormat::Binary] {
            let file = NamedTempFile::new()?;
            pca.save_model(file.path(), format)?;
            let loaded = PCA::load_model(file.path(), format)?;
            assert_eq!(loaded.transform(&data)?, expected, "format {:?}", format);
        }
        Ok(())
    }

    #[test]
    fn test_load_error_conditions() -> Result<(), Box<dyn Error>> {
        assert!(matches!(
            PCA::load_model("a_surely_non_existent_file.linstat_model", ModelFormat::Binary),
            Err(LinstatError::Io(_))
        ));

        let empty = NamedTempFile::new()?;
        assert!(PCA::load_model(empty.path(), ModelFormat::Binary).is_err());
        assert!(PCA::load_model(empty.path(), ModelFormat::Text).is_err());

        // a text model read as binary
        let (pca, _) = fitted(false);
        let file = NamedTempFile::new()?;
        pca.save_model(file.path(), ModelFormat::Text)?;
        assert!(PCA::load_model(file.path(), ModelFormat::Binary).is_err());
        Ok(())
    }

    #[test]
    fn test_kind_mismatch_on_load() -> Result<(), Box<dyn Error>> {
        let (pca, _) = fitted(false);
        assert!(matches!(LDA::from_bytes(&pca.to_bytes()?), Err(LinstatError::Serialization(_))));
        assert!(matches!(LDA::from_text(&pca.to_text()?), Err(LinstatError::Serialization(_))));

        let (data, labels) = generate_two_classes(20, 3);
        let mut lda = LDA::new();
        lda.fit(&data, &labels, &LdaConfig::default())?;
        assert!(matches!(PCA::from_bytes(&lda.to_bytes()?), Err(LinstatError::Serialization(_))));
        let reloaded = LDA::from_bytes(&lda.to_bytes()?)?;
        assert_eq!(reloaded.classes(), Some(&[0usize, 1][..]));
        Ok(())
    }
}

#[cfg(test)]
mod lda_fit_tests {
    use super::*;

    #[test]
    fn test_two_class_separation() -> Result<(), Box<dyn Error>> {
        let (data, labels) = generate_two_classes(60, 5);
        let mut lda = LDA::new();
        assert_eq!(lda.fit(&data, &labels, &LdaConfig::default())?, 1);
        assert_eq!(lda.classes(), Some(&[0usize, 1][..]));

        let basis = lda.basis().ok_or("not fitted")?;
        let axis = basis.column(0);
        assert!(axis[0].abs() > axis[1].abs() && axis[0].abs() > axis[2].abs());

        let projected = lda.transform(&data)?;
        let first = projected.rows_at(&(0..60).collect::<Vec<isize>>())?;
        let second = projected.rows_at(&(60..120).collect::<Vec<isize>>())?;
        let m0 = stats::mean_of_rows(&first)?.at(0)?;
        let m1 = stats::mean_of_rows(&second)?.at(0)?;
        let sd0 = stats::variance_of_rows(&first)?.at(0)?.sqrt();
        assert!((m1 - m0).abs() > 3.0 * sd0, "classes not separated: {} vs {} (sd {})", m0, m1, sd0);
        Ok(())
    }

    #[test]
    fn test_arbitrary_labels() -> Result<(), Box<dyn Error>> {
        let (data, labels) = generate_two_classes(25, 9);
        let relabelled: Vec<usize> = labels.iter().map(|&l| if l == 0 { 7 } else { 3 }).collect();
        let mut lda = LDA::new();
        lda.fit(&data, &relabelled, &LdaConfig::default())?;
        assert_eq!(lda.classes(), Some(&[3usize, 7][..]));
        Ok(())
    }

    #[test]
    fn test_singular_within_scatter() -> Result<(), Box<dyn Error>> {
        let (data, labels) = generate_two_classes(30, 13);
        // duplicate the first feature
        let rows: Vec<Vec<f64>> = data.to_rows().into_iter().map(|r| vec![r[0], r[1], r[2], r[0]]).collect();
        let duplicated = Matrix::from_rows(&rows)?;

        assert!(matches!(
            LDA::new().fit(&duplicated, &labels, &LdaConfig::default()),
            Err(LinstatError::SingularMatrix { .. })
        ));

        let mut safe = LDA::new();
        let dim = safe.fit_safe(&duplicated, &labels, &LdaConfig::default())?;
        assert_eq!(dim, 1);
        let projected = safe.transform(&duplicated)?;
        assert!(projected.as_array().iter().all(|x| x.is_finite()));
        Ok(())
    }

    #[test]
    fn test_collapsed_classes_use_between_scatter() -> Result<(), Box<dyn Error>> {
        println!("--- Test: fit_safe with vanishing within-class scatter ---");
        let data = Matrix::from_rows(&[vec![0.0, 0.0], vec![0.0, 0.0], vec![1.0, 2.0], vec![1.0, 2.0]])?;
        let labels = [0, 0, 1, 1];
        assert!(matches!(
            LDA::new().fit(&data, &labels, &LdaConfig::default()),
            Err(LinstatError::SingularMatrix { .. })
        ));

        let mut lda = LDA::new();
        assert_eq!(lda.fit_safe(&data, &labels, &LdaConfig::default())?, 1);
        let axis = lda.basis().ok_or("not fitted")?.column(0).to_owned();
        assert_abs_diff_eq!(axis[1], 2.0 * axis[0], epsilon = 1e-12);

        let projected = lda.transform(&data)?;
        let p = projected.as_array();
        assert_eq!(p[[0, 0]], p[[1, 0]]);
        assert_eq!(p[[2, 0]], p[[3, 0]]);
        assert!((p[[2, 0]] - p[[0, 0]]).abs() > 1.0);

        let mut serial = crate::serial_lda::SerialLDA::new();
        serial.consider_class(&data.rows_at(&[0, 1])?)?;
        serial.consider_class(&data.rows_at(&[2, 3])?)?;
        assert_eq!(serial.finalize_safe(&LdaConfig::default())?, 1);
        assert_matrix_close(&serial.transform(&data)?, &projected, 1e-12, "serial vs batch");
        Ok(())
    }

    #[test]
    fn test_single_class_cannot_be_separated() {
        let (data, _) = generate_two_classes(10, 17);
        let labels = vec![0; 20];
        assert!(matches!(
            LDA::new().fit(&data, &labels, &LdaConfig::default()),
            Err(LinstatError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_fit_class_against_between_scatter() -> Result<(), Box<dyn Error>> {
        let (data, labels) = generate_two_classes(40, 19);
        let between = between_class_scatter(&data, &labels)?;
        let class_data = data.rows_at(&(0..40).collect::<Vec<isize>>())?;

        let mut lda = LDA::new();
        assert_eq!(lda.fit_class(&class_data, &between, &LdaConfig::default())?, 1);
        assert_eq!(lda.classes(), Some(&[][..]));
        assert_eq!(lda.transform(&class_data)?.shape(), (40, 1));

        assert!(matches!(
            LDA::new().fit_class(&class_data, &Matrix::zeros(2, 2), &LdaConfig::default()),
            Err(LinstatError::DimensionMismatch { .. })
        ));
        Ok(())
    }
}
