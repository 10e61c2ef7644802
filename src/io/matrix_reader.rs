use crate::core::matrix::{MatrixDimension, MatrixSource, PolarimetricImage};
use crate::types::{
    ComplexPlane, GeoReference, OmnibusError, OmnibusResult, RealPlane, Window, WishartComplex,
};
use gdal::Dataset;
use ndarray::{Array2, Zip};
use std::path::{Path, PathBuf};

/// Reader for covariance/coherency matrix rasters.
///
/// Band layout (1-based):
/// - 1 band:  C11
/// - 4 bands: C11, Re C12, Im C12, C22
/// - 9 bands: T11, Re T12, Im T12, Re T13, Im T13, T22, Re T23, Im T23, T33
pub struct MatrixReader {
    path: PathBuf,
    dataset: Dataset,
    dimension: MatrixDimension,
}

impl MatrixReader {
    /// Open a raster and infer the matrix dimension from its band count
    pub fn open<P: AsRef<Path>>(path: P) -> OmnibusResult<Self> {
        let path = path.as_ref().to_path_buf();
        let dataset = Dataset::open(&path)?;

        let bands = dataset.raster_count().max(0) as usize;
        let dimension = MatrixDimension::from_band_count(bands).ok_or_else(|| {
            OmnibusError::UnsupportedBandCount {
                path: path.clone(),
                bands,
            }
        })?;

        let (cols, rows) = dataset.raster_size();
        log::debug!(
            "Opened {}: {}x{} pixels, {} bands ({} matrices)",
            path.display(),
            cols,
            rows,
            bands,
            dimension
        );

        Ok(Self {
            path,
            dataset,
            dimension,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Geotransform and projection of the underlying raster
    pub fn georeference(&self) -> GeoReference {
        GeoReference {
            geo_transform: self.dataset.geo_transform().ok(),
            projection: self.dataset.projection(),
        }
    }

    /// Read a window of all matrix elements
    pub fn read(&self, window: &Window) -> OmnibusResult<PolarimetricImage> {
        let (cols, rows) = self.dataset.raster_size();
        if !window.fits_within(cols, rows) {
            return Err(OmnibusError::WindowOutOfBounds {
                window: *window,
                raster_cols: cols,
                raster_rows: rows,
            });
        }

        let image = match self.dimension {
            MatrixDimension::Scalar => PolarimetricImage::Scalar {
                k: self.read_real(1, window)?,
            },
            MatrixDimension::Covariance2 => PolarimetricImage::Covariance2 {
                k: self.read_real(1, window)?,
                a: self.read_complex(2, window)?,
                xsi: self.read_real(4, window)?,
            },
            MatrixDimension::Coherency3 => PolarimetricImage::Coherency3 {
                k: self.read_real(1, window)?,
                a: self.read_complex(2, window)?,
                rho: self.read_complex(4, window)?,
                xsi: self.read_real(6, window)?,
                b: self.read_complex(7, window)?,
                zeta: self.read_real(9, window)?,
            },
        };
        Ok(image)
    }

    fn read_real(&self, band_index: isize, window: &Window) -> OmnibusResult<RealPlane> {
        let band = self.dataset.rasterband(band_index)?;
        let buffer = band.read_as::<f64>(
            (window.x0 as isize, window.y0 as isize),
            (window.cols, window.rows),
            (window.cols, window.rows),
            None,
        )?;

        Array2::from_shape_vec((window.rows, window.cols), buffer.data).map_err(|e| {
            OmnibusError::Processing(format!(
                "Failed to reshape band {} of {}: {}",
                band_index,
                self.path.display(),
                e
            ))
        })
    }

    /// Complex element from a real band followed by its imaginary band
    fn read_complex(&self, re_band: isize, window: &Window) -> OmnibusResult<ComplexPlane> {
        let re = self.read_real(re_band, window)?;
        let im = self.read_real(re_band + 1, window)?;
        Ok(Zip::from(&re)
            .and(&im)
            .map_collect(|&re, &im| WishartComplex::new(re, im)))
    }
}

impl MatrixSource for MatrixReader {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn dimension(&self) -> MatrixDimension {
        self.dimension
    }

    fn raster_size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    fn read_window(&self, window: &Window) -> OmnibusResult<PolarimetricImage> {
        self.read(window)
    }
}
