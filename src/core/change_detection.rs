use crate::core::accumulate::WishartAccumulator;
use crate::core::classify::{ChangeClassifier, ChangeMap};
use crate::core::matrix::{MatrixDimension, MatrixSource};
use crate::core::median_filter::MedianFilter;
use crate::core::omnibus::{BartlettCorrection, OmnibusStatistic};
use crate::core::probability::ChangeProbability;
use crate::io::{ChangeMapWriter, MatrixReader, OutputPaths};
use crate::types::{ChangeDetectionParams, OmnibusError, OmnibusResult, RealPlane, Window};
use chrono::{DateTime, Utc};
use ndarray::s;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Diagnostics for one change detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub images: usize,
    pub dimension: MatrixDimension,
    pub window: Window,
    pub correction: BartlettCorrection,
    pub changed_pixels: usize,
    pub changed_fraction: f64,
    /// Per-time-step determinants replaced by the floor
    pub degenerate_determinants: usize,
    /// Summed-matrix determinants replaced by the floor
    pub degenerate_sum_determinants: usize,
}

/// Rasters produced by a change detection run
#[derive(Debug, Clone)]
pub struct ChangeDetectionOutput {
    /// Test statistic Z
    pub statistic: RealPlane,
    /// Change probability P (median filtered when requested)
    pub probability: RealPlane,
    pub change_map: ChangeMap,
    pub summary: ChangeSummary,
}

/// Multi-temporal complex Wishart change detector
pub struct ChangeDetector {
    params: ChangeDetectionParams,
}

impl ChangeDetector {
    pub fn new(params: ChangeDetectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ChangeDetectionParams {
        &self.params
    }

    /// Run the omnibus test over a co-registered series.
    ///
    /// The parameter window applies to the first source only; every later
    /// source must already be cropped to that window and is read from (0, 0).
    pub fn detect<S: MatrixSource>(&self, sources: &[S]) -> OmnibusResult<ChangeDetectionOutput> {
        let started_at = Utc::now();
        let start = Instant::now();

        self.params.validate(sources.len())?;
        let (dimension, window) = self.reference_window(sources)?;

        let n = sources.len();
        let correction = BartlettCorrection::new(dimension, n, self.params.enl)?;
        let mapper = ChangeProbability::new(&correction)?;
        let classifier = ChangeClassifier::new(self.params.significance)?;

        log::info!(
            "Omnibus change detection: {} images of {} matrices, ENL {}, window {}",
            n,
            dimension,
            self.params.enl,
            window
        );
        log::debug!(
            "Correction terms: f = {}, rho = {:.6}, omega2 = {:.6}",
            correction.dof,
            correction.rho,
            correction.omega2
        );

        let shape = (window.rows, window.cols);
        let mut statistic = RealPlane::zeros(shape);
        let mut probability = RealPlane::zeros(shape);
        let mut intensity = RealPlane::zeros(shape);
        let mut degenerate_determinants = 0;
        let mut degenerate_sum_determinants = 0;

        let tile_rows = self.params.tile_rows.unwrap_or(window.rows).min(window.rows);
        for row0 in (0..window.rows).step_by(tile_rows) {
            let rows = tile_rows.min(window.rows - row0);
            log::debug!("Processing rows {}..{}", row0, row0 + rows);

            let mut accumulator = WishartAccumulator::new(dimension, (rows, window.cols), self.params.enl);
            for (index, source) in sources.iter().enumerate() {
                let strip = if index == 0 {
                    window.strip(row0, rows)
                } else {
                    window.at_origin().strip(row0, rows)
                };
                accumulator.accumulate(source.read_window(&strip)?)?;
            }
            degenerate_determinants += accumulator.degenerate_count();

            let strip_stat = OmnibusStatistic::compute(accumulator, &correction)?;
            degenerate_sum_determinants += strip_stat.degenerate_sum;

            let region = s![row0..row0 + rows, ..];
            probability.slice_mut(region).assign(&mapper.map(&strip_stat.z));
            statistic.slice_mut(region).assign(&strip_stat.z);
            intensity.slice_mut(region).assign(&strip_stat.intensity);
        }

        if degenerate_determinants > 0 {
            log::warn!(
                "{} per-image determinants were non-positive and replaced by {:e}",
                degenerate_determinants,
                crate::core::matrix::DETERMINANT_FLOOR
            );
        }

        if self.params.median_filter {
            probability = MedianFilter::new().apply(&probability);
        }

        let change_map = classifier.classify(&probability, &intensity)?;

        let summary = ChangeSummary {
            started_at,
            elapsed_seconds: start.elapsed().as_secs_f64(),
            images: n,
            dimension,
            window,
            correction,
            changed_pixels: change_map.changed_pixels,
            changed_fraction: change_map.changed_fraction(),
            degenerate_determinants,
            degenerate_sum_determinants,
        };
        log::info!(
            "Change detection finished in {:.2}s: {} changed pixels ({:.2}%)",
            summary.elapsed_seconds,
            summary.changed_pixels,
            summary.changed_fraction * 100.0
        );

        Ok(ChangeDetectionOutput {
            statistic,
            probability,
            change_map,
            summary,
        })
    }

    /// Read a series of raster files, run the test and write both output rasters
    pub fn run<P: AsRef<Path>>(&self, inputs: &[P], output: &Path) -> OmnibusResult<(ChangeSummary, OutputPaths)> {
        self.params.validate(inputs.len())?;

        let readers = inputs
            .iter()
            .map(|path| {
                log::info!("Ingesting: {}", path.as_ref().display());
                MatrixReader::open(path)
            })
            .collect::<OmnibusResult<Vec<_>>>()?;

        let result = self.detect(&readers)?;
        let paths = ChangeMapWriter::new(&readers[0], &readers[1]).write(output, &result)?;

        Ok((result.summary, paths))
    }

    /// Resolve the reference window and check every later source against it
    fn reference_window<S: MatrixSource>(&self, sources: &[S]) -> OmnibusResult<(MatrixDimension, Window)> {
        let reference = sources
            .first()
            .ok_or_else(|| OmnibusError::InvalidParameter("empty image series".to_string()))?;
        let dimension = reference.dimension();
        let (cols, rows) = reference.raster_size();

        let window = self.params.window.unwrap_or_else(|| Window::full(cols, rows));
        if !window.fits_within(cols, rows) {
            return Err(OmnibusError::WindowOutOfBounds {
                window,
                raster_cols: cols,
                raster_rows: rows,
            });
        }

        for source in sources.iter().skip(1) {
            if source.dimension() != dimension {
                return Err(OmnibusError::BandCountMismatch {
                    path: source.label().into(),
                    expected: dimension.band_count(),
                    found: source.dimension().band_count(),
                });
            }
            let size = source.raster_size();
            if size != (window.cols, window.rows) {
                return Err(OmnibusError::DimensionMismatch {
                    path: source.label().into(),
                    expected: (window.cols, window.rows),
                    found: size,
                });
            }
        }

        Ok((dimension, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matrix::PolarimetricImage;
    use crate::types::ComplexPlane;
    use num_complex::Complex64;

    fn scalar(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> PolarimetricImage {
        PolarimetricImage::Scalar {
            k: RealPlane::from_shape_fn((rows, cols), |(i, j)| f(i, j)),
        }
    }

    fn params(enl: f64) -> ChangeDetectionParams {
        ChangeDetectionParams {
            enl,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_change_scalar_series() {
        let series = vec![scalar(4, 4, |_, _| 4.0), scalar(4, 4, |_, _| 4.0)];
        let out = ChangeDetector::new(params(10.0)).detect(&series).unwrap();

        assert!(out.statistic.iter().all(|&z| z >= 0.0 && z < 1e-8));
        assert!(out.probability.iter().all(|&p| p < 0.01));
        assert_eq!(out.change_map.changed_pixels, 0);
        assert_eq!(out.summary.correction.dof, 1.0);
    }

    #[test]
    fn test_changed_block_detected() {
        let before = scalar(6, 6, |_, _| 1.0);
        let after = scalar(6, 6, |i, j| if i < 2 && j < 2 { 10.0 } else { 1.0 });
        let out = ChangeDetector::new(params(10.0)).detect(&[before, after]).unwrap();

        assert_eq!(out.change_map.changed_pixels, 4);
        assert_eq!(out.change_map.mask[[0, 0]], 255);
        assert_eq!(out.change_map.mask[[5, 5]], 0);
        assert!(out.probability[[1, 1]] > 0.99);
    }

    #[test]
    fn test_identical_covariance_series_below_threshold() {
        let image = PolarimetricImage::Covariance2 {
            k: RealPlane::from_shape_fn((3, 3), |(i, j)| 1.0 + (i + j) as f64),
            a: ComplexPlane::from_elem((3, 3), Complex64::new(0.2, -0.1)),
            xsi: RealPlane::from_elem((3, 3), 0.8),
        };
        let series = vec![image.clone(), image.clone(), image];
        let out = ChangeDetector::new(params(6.0)).detect(&series).unwrap();

        assert!(out.probability.iter().all(|&p| p <= 0.99));
        assert_eq!(out.change_map.changed_pixels, 0);
    }

    #[test]
    fn test_tiled_matches_single_strip() {
        let before = scalar(7, 5, |i, j| 1.0 + (i * 5 + j) as f64 * 0.1);
        let after = scalar(7, 5, |i, j| if (i + j) % 3 == 0 { 8.0 } else { 1.0 + (i * 5 + j) as f64 * 0.1 });
        let series = vec![before, after];

        let whole = ChangeDetector::new(params(5.0)).detect(&series).unwrap();
        let tiled = ChangeDetector::new(ChangeDetectionParams {
            tile_rows: Some(3),
            ..params(5.0)
        })
        .detect(&series)
        .unwrap();

        assert_eq!(whole.statistic, tiled.statistic);
        assert_eq!(whole.probability, tiled.probability);
        assert_eq!(whole.change_map.mask, tiled.change_map.mask);
    }

    #[test]
    fn test_window_applies_to_reference_only() {
        let reference = scalar(6, 6, |i, j| if i >= 2 && j >= 2 { 5.0 } else { 100.0 });
        let cropped = scalar(3, 3, |_, _| 5.0);
        let out = ChangeDetector::new(ChangeDetectionParams {
            window: Some(Window::new(2, 2, 3, 3)),
            ..params(10.0)
        })
        .detect(&[reference, cropped])
        .unwrap();

        assert_eq!(out.statistic.dim(), (3, 3));
        assert_eq!(out.change_map.changed_pixels, 0);
    }

    #[test]
    fn test_median_filter_removes_isolated_change() {
        let before = scalar(5, 5, |_, _| 1.0);
        let after = scalar(5, 5, |i, j| if i == 2 && j == 2 { 20.0 } else { 1.0 });
        let series = vec![before, after];

        let raw = ChangeDetector::new(params(10.0)).detect(&series).unwrap();
        assert_eq!(raw.change_map.changed_pixels, 1);

        let filtered = ChangeDetector::new(ChangeDetectionParams {
            median_filter: true,
            ..params(10.0)
        })
        .detect(&series)
        .unwrap();
        assert_eq!(filtered.change_map.changed_pixels, 0);
        // The statistic itself is never filtered
        assert_eq!(filtered.statistic, raw.statistic);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let series = vec![scalar(4, 4, |_, _| 1.0), scalar(4, 3, |_, _| 1.0)];
        let err = ChangeDetector::new(params(10.0)).detect(&series).unwrap_err();
        assert!(matches!(err, OmnibusError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let series = vec![
            scalar(2, 2, |_, _| 1.0),
            PolarimetricImage::zeros(MatrixDimension::Covariance2, (2, 2)),
        ];
        let err = ChangeDetector::new(params(10.0)).detect(&series).unwrap_err();
        assert!(matches!(err, OmnibusError::BandCountMismatch { .. }));
    }

    #[test]
    fn test_invalid_parameters_rejected_before_reading() {
        let series = vec![scalar(2, 2, |_, _| 1.0), scalar(2, 2, |_, _| 1.0)];
        assert!(matches!(
            ChangeDetector::new(params(-1.0)).detect(&series),
            Err(OmnibusError::InvalidParameter(_))
        ));
        assert!(matches!(
            ChangeDetector::new(params(10.0)).detect(&series[..1]),
            Err(OmnibusError::InvalidParameter(_))
        ));
        let out_of_bounds = ChangeDetectionParams {
            window: Some(Window::new(1, 1, 2, 2)),
            ..params(10.0)
        };
        assert!(matches!(
            ChangeDetector::new(out_of_bounds).detect(&series),
            Err(OmnibusError::WindowOutOfBounds { .. })
        ));
    }
}
