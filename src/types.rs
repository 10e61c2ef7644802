use ndarray::Array2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complex-valued off-diagonal matrix element (re + j im)
pub type WishartComplex = Complex<f64>;

/// Real-valued per-pixel plane (diagonal elements, determinants, statistics)
pub type RealPlane = Array2<f64>;

/// Complex-valued per-pixel plane (off-diagonal elements)
pub type ComplexPlane = Array2<WishartComplex>;

/// Byte-valued per-pixel plane (masks and display layers)
pub type BytePlane = Array2<u8>;

/// Spatial window into a raster, in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub x0: usize,
    pub y0: usize,
    pub cols: usize,
    pub rows: usize,
}

impl Window {
    pub fn new(x0: usize, y0: usize, cols: usize, rows: usize) -> Self {
        Self { x0, y0, cols, rows }
    }

    /// Window covering a whole raster of the given size
    pub fn full(cols: usize, rows: usize) -> Self {
        Self::new(0, 0, cols, rows)
    }

    /// Whether the window lies inside a raster of `cols` x `rows` pixels
    pub fn fits_within(&self, cols: usize, rows: usize) -> bool {
        self.cols > 0
            && self.rows > 0
            && self.x0.checked_add(self.cols).map_or(false, |end| end <= cols)
            && self.y0.checked_add(self.rows).map_or(false, |end| end <= rows)
    }

    /// The same extent with its origin moved to (0, 0)
    pub fn at_origin(&self) -> Self {
        Self::new(0, 0, self.cols, self.rows)
    }

    /// Horizontal strip of this window starting `row_offset` rows down
    pub fn strip(&self, row_offset: usize, rows: usize) -> Self {
        Self::new(self.x0, self.y0 + row_offset, self.cols, rows)
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x0, self.y0, self.cols, self.rows)
    }
}

/// Georeferencing carried from the inputs to the outputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoReference {
    /// GDAL affine geotransform, if the source had one
    pub geo_transform: Option<[f64; 6]>,
    /// Projection as WKT (empty when unknown)
    pub projection: String,
}

/// Run configuration for one change detection pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeDetectionParams {
    /// Equivalent number of looks
    pub enl: f64,
    /// Significance level for the change decision
    pub significance: f64,
    /// Window applied to the reference (first) image; `None` reads it whole
    pub window: Option<Window>,
    /// Apply a 3x3 median filter to the change probabilities
    pub median_filter: bool,
    /// Rows per processing strip; `None` processes the window in one strip
    pub tile_rows: Option<usize>,
}

impl Default for ChangeDetectionParams {
    fn default() -> Self {
        Self {
            enl: 1.0,
            significance: 0.01,
            window: None,
            median_filter: false,
            tile_rows: None,
        }
    }
}

impl ChangeDetectionParams {
    /// Check parameters against the series length before any computation
    pub fn validate(&self, n_images: usize) -> OmnibusResult<()> {
        if !self.enl.is_finite() || self.enl <= 0.0 {
            return Err(OmnibusError::InvalidParameter(format!(
                "equivalent number of looks must be positive, got {}",
                self.enl
            )));
        }
        if n_images < 2 {
            return Err(OmnibusError::InvalidParameter(format!(
                "at least 2 images are required, got {}",
                n_images
            )));
        }
        if !(self.significance > 0.0 && self.significance < 1.0) {
            return Err(OmnibusError::InvalidParameter(format!(
                "significance must lie in (0, 1), got {}",
                self.significance
            )));
        }
        if self.tile_rows == Some(0) {
            return Err(OmnibusError::InvalidParameter(
                "tile_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Error types for change detection
#[derive(Debug, thiserror::Error)]
pub enum OmnibusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("{}: unsupported band count {} (expected 1, 4 or 9)", .path.display(), .bands)]
    UnsupportedBandCount { path: PathBuf, bands: usize },

    #[error("window {window} exceeds raster bounds {raster_cols}x{raster_rows}")]
    WindowOutOfBounds {
        window: Window,
        raster_cols: usize,
        raster_rows: usize,
    },

    #[error("{}: raster is {}x{} but the reference window is {}x{}", .path.display(), .found.0, .found.1, .expected.0, .expected.1)]
    DimensionMismatch {
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("{}: {} bands but the reference image has {}", .path.display(), .found, .expected)]
    BandCountMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for change detection operations
pub type OmnibusResult<T> = Result<T, OmnibusError>;
