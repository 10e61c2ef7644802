use crate::core::matrix::fill_plane;
use crate::types::{OmnibusError, OmnibusResult, RealPlane};

/// Spatial median filter for change probability rasters.
///
/// Edge pixels use replicate boundary handling: coordinates outside the
/// raster are clamped to the nearest edge row/column, so every output pixel
/// is the median of a full `window_size` x `window_size` neighbourhood.
/// The output is computed from the untouched input, never in place.
#[derive(Debug, Clone)]
pub struct MedianFilter {
    window_size: usize,
}

impl Default for MedianFilter {
    fn default() -> Self {
        Self { window_size: 3 }
    }
}

impl MedianFilter {
    /// Standard 3x3 filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter with a custom window size (must be odd)
    pub fn with_window_size(window_size: usize) -> OmnibusResult<Self> {
        if window_size == 0 || window_size % 2 == 0 {
            return Err(OmnibusError::InvalidParameter(format!(
                "median window size must be odd, got {}",
                window_size
            )));
        }
        Ok(Self { window_size })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn apply(&self, image: &RealPlane) -> RealPlane {
        log::debug!("Applying {0}x{0} median filter", self.window_size);

        let (height, width) = image.dim();
        if height == 0 || width == 0 {
            return image.clone();
        }
        let half = (self.window_size / 2) as isize;
        let clamp = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;

        fill_plane((height, width), |i, j| {
            let mut window_values = Vec::with_capacity(self.window_size * self.window_size);
            for di in -half..=half {
                let ii = clamp(i as isize + di, height);
                for dj in -half..=half {
                    let jj = clamp(j as isize + dj, width);
                    window_values.push(image[[ii, jj]]);
                }
            }

            let mid = window_values.len() / 2;
            let (_, median, _) = window_values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
            *median
        })
    }
}
