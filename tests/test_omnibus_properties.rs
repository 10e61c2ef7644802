use approx::assert_relative_eq;
use ndarray::Array2;
use num_complex::Complex64;
use omnibus::{
    BartlettCorrection, ChangeClassifier, ChangeDetectionParams, ChangeDetector, ChangeProbability,
    MatrixDimension, OmnibusStatistic, PolarimetricImage, WishartAccumulator,
};

/// Deterministic pseudo-random values in [0, 1)
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Random Hermitian positive semi-definite images built as A A^H
fn random_image(dimension: MatrixDimension, rows: usize, cols: usize, rng: &mut Lcg) -> PolarimetricImage {
    let p = dimension.order();
    let mut planes: Vec<Array2<Complex64>> = vec![Array2::zeros((rows, cols)); p * p];

    for i in 0..rows {
        for j in 0..cols {
            let a: Vec<Complex64> = (0..p * p)
                .map(|_| Complex64::new(rng.next() - 0.5, rng.next() - 0.5))
                .collect();
            for r in 0..p {
                for c in 0..p {
                    let mut sum = Complex64::new(0.0, 0.0);
                    for k in 0..p {
                        sum += a[r * p + k] * a[c * p + k].conj();
                    }
                    planes[r * p + c][[i, j]] = sum;
                }
            }
        }
    }

    let real = |idx: usize| planes[idx].mapv(|z| z.re);
    match dimension {
        MatrixDimension::Scalar => PolarimetricImage::Scalar { k: real(0) },
        MatrixDimension::Covariance2 => PolarimetricImage::Covariance2 {
            k: real(0),
            a: planes[1].clone(),
            xsi: real(3),
        },
        MatrixDimension::Coherency3 => PolarimetricImage::Coherency3 {
            k: real(0),
            a: planes[1].clone(),
            rho: planes[2].clone(),
            xsi: real(4),
            b: planes[5].clone(),
            zeta: real(8),
        },
    }
}

#[test]
fn test_statistic_and_probability_bounds_for_all_dimensions() {
    let mut rng = Lcg(42);
    for dimension in [MatrixDimension::Scalar, MatrixDimension::Covariance2, MatrixDimension::Coherency3] {
        for (images, enl) in [(2, 1.0), (3, 4.4), (5, 13.0)] {
            let series: Vec<PolarimetricImage> =
                (0..images).map(|_| random_image(dimension, 6, 7, &mut rng)).collect();
            let result = ChangeDetector::new(ChangeDetectionParams {
                enl,
                ..Default::default()
            })
            .detect(&series)
            .unwrap();

            assert!(result.statistic.iter().all(|&z| z.is_finite() && z >= 0.0));
            assert!(result.probability.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }
}

#[test]
fn test_scalar_two_image_scenario() {
    let image = || PolarimetricImage::Scalar {
        k: Array2::from_elem((1, 1), 4.0),
    };
    let correction = BartlettCorrection::new(MatrixDimension::Scalar, 2, 10.0).unwrap();
    let mut accumulator = WishartAccumulator::new(MatrixDimension::Scalar, (1, 1), 10.0);
    accumulator.accumulate(image()).unwrap();
    accumulator.accumulate(image()).unwrap();

    let statistic = OmnibusStatistic::compute(accumulator, &correction).unwrap();
    assert_relative_eq!(statistic.ln_q[[0, 0]], 0.0, epsilon = 1e-9);
    assert_relative_eq!(statistic.z[[0, 0]], 0.0, epsilon = 1e-9);

    let probability = ChangeProbability::new(&correction).unwrap().probability(statistic.z[[0, 0]]);
    assert!(probability < 1e-3);
    assert!(!ChangeClassifier::new(0.01).unwrap().is_changed(probability));
}

#[test]
fn test_identical_series_has_no_false_alarms() {
    let mut rng = Lcg(7);
    for dimension in [MatrixDimension::Covariance2, MatrixDimension::Coherency3] {
        let image = random_image(dimension, 8, 8, &mut rng);
        let series = vec![image.clone(), image.clone(), image];
        let result = ChangeDetector::new(ChangeDetectionParams {
            enl: 9.0,
            significance: 0.01,
            ..Default::default()
        })
        .detect(&series)
        .unwrap();

        assert!(result.probability.iter().all(|&p| p < 0.5));
        assert_eq!(result.change_map.changed_pixels, 0);
    }
}

#[test]
fn test_significance_monotonicity() {
    let mut rng = Lcg(1234);
    let series: Vec<PolarimetricImage> = (0..3)
        .map(|_| random_image(MatrixDimension::Covariance2, 12, 12, &mut rng))
        .collect();

    let mut previous = 0;
    for alpha in [0.001, 0.01, 0.05, 0.1, 0.2, 0.5] {
        let result = ChangeDetector::new(ChangeDetectionParams {
            enl: 2.0,
            significance: alpha,
            ..Default::default()
        })
        .detect(&series)
        .unwrap();
        assert!(result.change_map.changed_pixels >= previous);
        previous = result.change_map.changed_pixels;
    }
}

#[test]
fn test_degenerate_matrices_produce_finite_output() {
    // Rank-one 2x2 matrices at every pixel: det = k xsi - |a|^2 = 0
    let rank_one = |scale: f64| PolarimetricImage::Covariance2 {
        k: Array2::from_elem((3, 3), scale),
        a: Array2::from_elem((3, 3), Complex64::new(scale, 0.0)),
        xsi: Array2::from_elem((3, 3), scale),
    };
    let negative = PolarimetricImage::Covariance2 {
        k: Array2::from_elem((3, 3), 1.0),
        a: Array2::from_elem((3, 3), Complex64::new(2.0, 0.0)),
        xsi: Array2::from_elem((3, 3), 1.0),
    };

    let result = ChangeDetector::new(ChangeDetectionParams {
        enl: 4.0,
        ..Default::default()
    })
    .detect(&[rank_one(1.0), rank_one(3.0), negative])
    .unwrap();

    assert_eq!(result.summary.degenerate_determinants, 27);
    assert!(result.statistic.iter().all(|z| z.is_finite()));
    assert!(result.probability.iter().all(|p| p.is_finite()));
}
