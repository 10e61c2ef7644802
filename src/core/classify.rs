use crate::types::{BytePlane, OmnibusError, OmnibusResult, RealPlane};
use ndarray::Zip;
use rayon::prelude::*;

/// Offset added to the intensity before taking its logarithm
pub const INTENSITY_OFFSET: f64 = 0.01;

/// Byte layers produced from the change probabilities
#[derive(Debug, Clone)]
pub struct ChangeMap {
    /// 255 where changed, 0 elsewhere
    pub mask: BytePlane,
    /// Red channel of the display: 255 where changed, grey intensity elsewhere
    pub colour: BytePlane,
    /// Green/blue channels of the display: grey intensity, 0 where changed
    pub intensity: BytePlane,
    /// Number of pixels classified as changed
    pub changed_pixels: usize,
}

impl ChangeMap {
    /// Fraction of all pixels classified as changed
    pub fn changed_fraction(&self) -> f64 {
        let total = self.mask.len();
        if total == 0 {
            0.0
        } else {
            self.changed_pixels as f64 / total as f64
        }
    }
}

/// `ln(k + INTENSITY_OFFSET)` stretched linearly to [0, 255].
///
/// Non-finite logarithms are ignored for the min/max and mapped to 0; a flat
/// image maps to 0 everywhere.
pub fn normalized_log_intensity(intensity: &RealPlane) -> RealPlane {
    let log_k = intensity.mapv(|k| (k + INTENSITY_OFFSET).ln());

    let (min, max) = log_k
        .par_iter()
        .filter(|v| v.is_finite())
        .map(|&v| (v, v))
        .reduce(
            || (f64::INFINITY, f64::NEG_INFINITY),
            |(lo_a, hi_a), (lo_b, hi_b)| (lo_a.min(lo_b), hi_a.max(hi_b)),
        );

    if !(max > min) {
        return RealPlane::zeros(intensity.dim());
    }

    let scale = 255.0 / (max - min);
    log_k.mapv(|v| {
        if v.is_finite() {
            ((v - min) * scale).clamp(0.0, 255.0)
        } else {
            0.0
        }
    })
}

/// Thresholds change probabilities at a significance level
#[derive(Debug, Clone, Copy)]
pub struct ChangeClassifier {
    significance: f64,
}

impl ChangeClassifier {
    pub fn new(significance: f64) -> OmnibusResult<Self> {
        if !(significance > 0.0 && significance < 1.0) {
            return Err(OmnibusError::InvalidParameter(format!(
                "significance must lie in (0, 1), got {}",
                significance
            )));
        }
        Ok(Self { significance })
    }

    pub fn significance(&self) -> f64 {
        self.significance
    }

    /// Probability a pixel must exceed to count as changed
    pub fn threshold(&self) -> f64 {
        1.0 - self.significance
    }

    #[inline]
    pub fn is_changed(&self, probability: f64) -> bool {
        probability > self.threshold()
    }

    /// Binary change mask plus the display layers blended with the intensity
    pub fn classify(&self, probability: &RealPlane, intensity: &RealPlane) -> OmnibusResult<ChangeMap> {
        if probability.dim() != intensity.dim() {
            return Err(OmnibusError::Processing(format!(
                "probability raster {:?} and intensity raster {:?} differ in size",
                probability.dim(),
                intensity.dim()
            )));
        }

        let grey = normalized_log_intensity(intensity).mapv(|v| v.round() as u8);
        let shape = probability.dim();
        let mut mask = BytePlane::zeros(shape);
        let mut colour = BytePlane::zeros(shape);
        let mut blended = BytePlane::zeros(shape);

        Zip::from(&mut mask)
            .and(&mut colour)
            .and(&mut blended)
            .and(probability)
            .and(&grey)
            .for_each(|m, c, b, &p, &g| {
                if self.is_changed(p) {
                    *m = 255;
                    *c = 255;
                    *b = 0;
                } else {
                    *m = 0;
                    *c = g;
                    *b = g;
                }
            });

        let changed_pixels = mask.par_iter().filter(|&&m| m == 255).count();
        log::info!(
            "{} of {} pixels changed at significance {}",
            changed_pixels,
            mask.len(),
            self.significance
        );

        Ok(ChangeMap {
            mask,
            colour,
            intensity: blended,
            changed_pixels,
        })
    }
}
