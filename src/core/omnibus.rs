//! Omnibus likelihood-ratio test statistic for equality of complex Wishart matrices
//!
//! For n acquisitions with p x p matrices X_i (already scaled by the ENL m)
//! and X = sum X_i, the log-likelihood ratio is
//!
//! ```text
//! ln Q = m (p n ln n + sum ln|X_i| - n ln|X|)
//! ```
//!
//! and `Z = -2 rho ln Q` is approximately chi-square with `f = (n - 1) p^2`
//! degrees of freedom after the Bartlett correction `rho`.

use crate::core::accumulate::WishartAccumulator;
use crate::core::matrix::{clamp_determinant, fill_plane, MatrixDimension};
use crate::types::{OmnibusError, OmnibusResult, RealPlane};
use serde::{Deserialize, Serialize};

/// Scalar correction terms shared by every pixel of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BartlettCorrection {
    /// Matrix order p
    pub order: usize,
    /// Number of images n
    pub images: usize,
    /// Equivalent number of looks m
    pub enl: f64,
    /// Degrees of freedom f = (n - 1) p^2
    pub dof: f64,
    /// Bartlett scale factor rho
    pub rho: f64,
    /// Second order correction omega^2
    pub omega2: f64,
}

impl BartlettCorrection {
    pub fn new(dimension: MatrixDimension, images: usize, enl: f64) -> OmnibusResult<Self> {
        if images < 2 {
            return Err(OmnibusError::InvalidParameter(format!(
                "omnibus test needs at least 2 images, got {}",
                images
            )));
        }
        if !enl.is_finite() || enl <= 0.0 {
            return Err(OmnibusError::InvalidParameter(format!(
                "equivalent number of looks must be positive, got {}",
                enl
            )));
        }

        let p = dimension.order() as f64;
        let p2 = p * p;
        let n = images as f64;
        let m = enl;

        let dof = (n - 1.0) * p2;
        let rho = 1.0 - (2.0 * p2 - 1.0) * (n / m - 1.0 / (m * n)) / (6.0 * (n - 1.0) * p);
        if rho == 0.0 {
            return Err(OmnibusError::InvalidParameter(format!(
                "Bartlett factor vanishes for ENL {} with {} images of order {}",
                enl, images, p
            )));
        }
        let omega2 = p2 * (p2 - 1.0) * (n / (m * m) - 1.0 / ((m * n) * (m * n))) / (24.0 * rho * rho)
            - p2 * (n - 1.0) * (1.0 - 1.0 / rho).powi(2) / 4.0;

        if rho < 0.0 {
            log::warn!(
                "Bartlett factor rho = {:.4} is negative (ENL {} too small for p = {}); statistics will be clamped to zero",
                rho,
                enl,
                dimension.order()
            );
        }

        Ok(Self {
            order: dimension.order(),
            images,
            enl,
            dof,
            rho,
            omega2,
        })
    }

    /// Constant term p n ln n of the log-likelihood ratio
    fn ln_n_term(&self) -> f64 {
        let n = self.images as f64;
        self.order as f64 * n * n.ln()
    }

    /// ln Q for a single pixel
    #[inline]
    pub fn log_likelihood_ratio(&self, sum_log_det: f64, det_sum: f64) -> f64 {
        let n = self.images as f64;
        self.enl * (self.ln_n_term() + sum_log_det - n * clamp_determinant(det_sum).ln())
    }

    /// Z = -2 rho ln Q, never negative
    #[inline]
    pub fn test_statistic(&self, ln_q: f64) -> f64 {
        // f64::max also maps NaN to 0
        (-2.0 * self.rho * ln_q).max(0.0)
    }
}

/// Per-pixel output of the likelihood-ratio test for one strip
#[derive(Debug, Clone)]
pub struct OmnibusStatistic {
    /// Log-likelihood ratio ln Q
    pub ln_q: RealPlane,
    /// Test statistic Z
    pub z: RealPlane,
    /// Accumulated (ENL-scaled) first diagonal element
    pub intensity: RealPlane,
    /// Pixels whose summed matrix had a non-positive determinant
    pub degenerate_sum: usize,
}

impl OmnibusStatistic {
    /// Consume an accumulator and evaluate the test at every pixel
    pub fn compute(accumulator: WishartAccumulator, correction: &BartlettCorrection) -> OmnibusResult<Self> {
        if accumulator.image_count() != correction.images {
            return Err(OmnibusError::Processing(format!(
                "accumulated {} images but the correction was built for {}",
                accumulator.image_count(),
                correction.images
            )));
        }
        if accumulator.dimension().order() != correction.order {
            return Err(OmnibusError::Processing(format!(
                "accumulated {} matrices but the correction was built for order {}",
                accumulator.dimension(),
                correction.order
            )));
        }

        let (sum, sum_log_det) = accumulator.into_parts();
        let det_sum = sum.determinant();
        let degenerate_sum = det_sum.iter().filter(|&&d| !(d > 0.0)).count();
        if degenerate_sum > 0 {
            log::warn!(
                "{} pixels with non-positive summed determinant clamped",
                degenerate_sum
            );
        }

        let ln_q = fill_plane(det_sum.dim(), |i, j| {
            correction.log_likelihood_ratio(sum_log_det[[i, j]], det_sum[[i, j]])
        });
        let z = ln_q.mapv(|v| correction.test_statistic(v));

        Ok(Self {
            ln_q,
            z,
            intensity: sum.into_intensity(),
            degenerate_sum,
        })
    }
}
