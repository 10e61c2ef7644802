use crate::core::matrix::{MatrixDimension, PolarimetricImage};
use crate::types::{OmnibusError, OmnibusResult, RealPlane};

/// Running sums over the time series for one spatial strip.
///
/// Each ingested image is scaled by the ENL, added to the running matrix sum,
/// and its clamped log-determinant is added to `sum_log_det`.
#[derive(Debug, Clone)]
pub struct WishartAccumulator {
    enl: f64,
    sum: PolarimetricImage,
    sum_log_det: RealPlane,
    images: usize,
    degenerate: usize,
}

impl WishartAccumulator {
    /// Empty accumulator for images of the given dimension and (rows, cols) shape
    pub fn new(dimension: MatrixDimension, shape: (usize, usize), enl: f64) -> Self {
        Self {
            enl,
            sum: PolarimetricImage::zeros(dimension, shape),
            sum_log_det: RealPlane::zeros(shape),
            images: 0,
            degenerate: 0,
        }
    }

    /// Add one time step
    pub fn accumulate(&mut self, mut image: PolarimetricImage) -> OmnibusResult<()> {
        if image.dimension() != self.sum.dimension() {
            return Err(OmnibusError::Processing(format!(
                "time step {} has {} matrices, expected {}",
                self.images + 1,
                image.dimension(),
                self.sum.dimension()
            )));
        }

        image.scale(self.enl);
        self.sum.add_assign(&image)?;

        let (log_det, degenerate) = image.log_determinant();
        self.sum_log_det += &log_det;
        self.degenerate += degenerate;
        self.images += 1;

        if degenerate > 0 {
            log::debug!(
                "time step {}: {} pixels with non-positive determinant clamped",
                self.images,
                degenerate
            );
        }
        Ok(())
    }

    pub fn enl(&self) -> f64 {
        self.enl
    }

    pub fn dimension(&self) -> MatrixDimension {
        self.sum.dimension()
    }

    /// Number of time steps accumulated so far
    pub fn image_count(&self) -> usize {
        self.images
    }

    /// Per-time-step determinants replaced by the floor so far
    pub fn degenerate_count(&self) -> usize {
        self.degenerate
    }

    /// Scaled matrix sum over all time steps
    pub fn sum(&self) -> &PolarimetricImage {
        &self.sum
    }

    /// Sum of the per-time-step log-determinants
    pub fn sum_log_det(&self) -> &RealPlane {
        &self.sum_log_det
    }

    /// Release the matrix sum and the log-determinant sum
    pub fn into_parts(self) -> (PolarimetricImage, RealPlane) {
        (self.sum, self.sum_log_det)
    }
}
