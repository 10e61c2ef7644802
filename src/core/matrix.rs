use crate::types::{ComplexPlane, OmnibusError, OmnibusResult, RealPlane, Window, WishartComplex};
use ndarray::{s, Array2, Zip};
use serde::{Deserialize, Serialize};

/// Smallest positive determinant allowed before taking a logarithm
pub const DETERMINANT_FLOOR: f64 = f64::MIN_POSITIVE;

/// Per-pixel matrix dimension, selected from the input band count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixDimension {
    /// p = 1, single intensity band
    Scalar,
    /// p = 2, dual-pol covariance matrix (4 bands)
    Covariance2,
    /// p = 3, quad-pol covariance or coherency matrix (9 bands)
    Coherency3,
}

impl MatrixDimension {
    pub fn from_band_count(bands: usize) -> Option<Self> {
        match bands {
            1 => Some(MatrixDimension::Scalar),
            4 => Some(MatrixDimension::Covariance2),
            9 => Some(MatrixDimension::Coherency3),
            _ => None,
        }
    }

    pub fn band_count(&self) -> usize {
        match self {
            MatrixDimension::Scalar => 1,
            MatrixDimension::Covariance2 => 4,
            MatrixDimension::Coherency3 => 9,
        }
    }

    /// Matrix order p
    pub fn order(&self) -> usize {
        match self {
            MatrixDimension::Scalar => 1,
            MatrixDimension::Covariance2 => 2,
            MatrixDimension::Coherency3 => 3,
        }
    }
}

impl std::fmt::Display for MatrixDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let p = self.order();
        write!(f, "{}x{}", p, p)
    }
}

/// Determinant of a 2x2 Hermitian matrix [[k, a], [a*, xsi]]
#[inline]
pub fn determinant2(k: f64, a: WishartComplex, xsi: f64) -> f64 {
    k * xsi - a.norm_sqr()
}

/// Determinant of a 3x3 Hermitian matrix [[k, a, rho], [a*, xsi, b], [rho*, b*, zeta]]
#[inline]
pub fn determinant3(
    k: f64,
    a: WishartComplex,
    rho: WishartComplex,
    xsi: f64,
    b: WishartComplex,
    zeta: f64,
) -> f64 {
    k * xsi * zeta + 2.0 * (a * b * rho.conj()).re
        - xsi * rho.norm_sqr()
        - k * b.norm_sqr()
        - zeta * a.norm_sqr()
}

/// Replace non-positive (or NaN) determinants with [`DETERMINANT_FLOOR`]
#[inline]
pub fn clamp_determinant(det: f64) -> f64 {
    if det > 0.0 {
        det
    } else {
        DETERMINANT_FLOOR
    }
}

/// Fill a plane from a per-pixel function, in parallel when enabled
pub(crate) fn fill_plane<T, F>(shape: (usize, usize), f: F) -> Array2<T>
where
    T: Copy + Default + Send + Sync,
    F: Fn(usize, usize) -> T + Sync + Send,
{
    let mut out = Array2::from_elem(shape, T::default());

    #[cfg(feature = "parallel")]
    Zip::indexed(&mut out).par_for_each(|(i, j), v| *v = f(i, j));

    #[cfg(not(feature = "parallel"))]
    Zip::indexed(&mut out).for_each(|(i, j), v| *v = f(i, j));

    out
}

/// Upper triangle of a per-pixel Hermitian matrix, one plane per element.
///
/// Diagonal elements are real; off-diagonal elements are complex. The lower
/// triangle follows from conjugate symmetry and is never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum PolarimetricImage {
    Scalar {
        k: RealPlane,
    },
    Covariance2 {
        k: RealPlane,
        a: ComplexPlane,
        xsi: RealPlane,
    },
    Coherency3 {
        k: RealPlane,
        a: ComplexPlane,
        rho: ComplexPlane,
        xsi: RealPlane,
        b: ComplexPlane,
        zeta: RealPlane,
    },
}

impl PolarimetricImage {
    /// All-zero image of the given dimension and (rows, cols) shape
    pub fn zeros(dimension: MatrixDimension, shape: (usize, usize)) -> Self {
        let real = || RealPlane::zeros(shape);
        let complex = || ComplexPlane::zeros(shape);
        match dimension {
            MatrixDimension::Scalar => PolarimetricImage::Scalar { k: real() },
            MatrixDimension::Covariance2 => PolarimetricImage::Covariance2 {
                k: real(),
                a: complex(),
                xsi: real(),
            },
            MatrixDimension::Coherency3 => PolarimetricImage::Coherency3 {
                k: real(),
                a: complex(),
                rho: complex(),
                xsi: real(),
                b: complex(),
                zeta: real(),
            },
        }
    }

    pub fn dimension(&self) -> MatrixDimension {
        match self {
            PolarimetricImage::Scalar { .. } => MatrixDimension::Scalar,
            PolarimetricImage::Covariance2 { .. } => MatrixDimension::Covariance2,
            PolarimetricImage::Coherency3 { .. } => MatrixDimension::Coherency3,
        }
    }

    /// First diagonal element (intensity)
    pub fn intensity(&self) -> &RealPlane {
        match self {
            PolarimetricImage::Scalar { k }
            | PolarimetricImage::Covariance2 { k, .. }
            | PolarimetricImage::Coherency3 { k, .. } => k,
        }
    }

    /// Take the first diagonal element, dropping the rest
    pub fn into_intensity(self) -> RealPlane {
        match self {
            PolarimetricImage::Scalar { k }
            | PolarimetricImage::Covariance2 { k, .. }
            | PolarimetricImage::Coherency3 { k, .. } => k,
        }
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.intensity().dim()
    }

    /// Multiply every element by `factor`
    pub fn scale(&mut self, factor: f64) {
        match self {
            PolarimetricImage::Scalar { k } => {
                *k *= factor;
            }
            PolarimetricImage::Covariance2 { k, a, xsi } => {
                *k *= factor;
                a.mapv_inplace(|z| z * factor);
                *xsi *= factor;
            }
            PolarimetricImage::Coherency3 { k, a, rho, xsi, b, zeta } => {
                *k *= factor;
                a.mapv_inplace(|z| z * factor);
                rho.mapv_inplace(|z| z * factor);
                *xsi *= factor;
                b.mapv_inplace(|z| z * factor);
                *zeta *= factor;
            }
        }
    }

    /// Element-wise sum with another image of the same dimension and shape
    pub fn add_assign(&mut self, other: &PolarimetricImage) -> OmnibusResult<()> {
        if self.shape() != other.shape() {
            return Err(OmnibusError::Processing(format!(
                "cannot add {:?} image to {:?} image",
                other.shape(),
                self.shape()
            )));
        }

        match (self, other) {
            (PolarimetricImage::Scalar { k }, PolarimetricImage::Scalar { k: k1 }) => {
                *k += k1;
            }
            (
                PolarimetricImage::Covariance2 { k, a, xsi },
                PolarimetricImage::Covariance2 { k: k1, a: a1, xsi: xsi1 },
            ) => {
                *k += k1;
                *a += a1;
                *xsi += xsi1;
            }
            (
                PolarimetricImage::Coherency3 { k, a, rho, xsi, b, zeta },
                PolarimetricImage::Coherency3 {
                    k: k1,
                    a: a1,
                    rho: rho1,
                    xsi: xsi1,
                    b: b1,
                    zeta: zeta1,
                },
            ) => {
                *k += k1;
                *a += a1;
                *rho += rho1;
                *xsi += xsi1;
                *b += b1;
                *zeta += zeta1;
            }
            (lhs, rhs) => {
                return Err(OmnibusError::Processing(format!(
                    "cannot add {} matrices to {} matrices",
                    rhs.dimension(),
                    lhs.dimension()
                )));
            }
        }
        Ok(())
    }

    /// Closed-form determinant per pixel, without clamping
    pub fn determinant(&self) -> RealPlane {
        match self {
            PolarimetricImage::Scalar { k } => k.clone(),
            PolarimetricImage::Covariance2 { k, a, xsi } => fill_plane(k.dim(), |i, j| {
                determinant2(k[[i, j]], a[[i, j]], xsi[[i, j]])
            }),
            PolarimetricImage::Coherency3 { k, a, rho, xsi, b, zeta } => {
                fill_plane(k.dim(), |i, j| {
                    determinant3(
                        k[[i, j]],
                        a[[i, j]],
                        rho[[i, j]],
                        xsi[[i, j]],
                        b[[i, j]],
                        zeta[[i, j]],
                    )
                })
            }
        }
    }

    /// Natural log of the clamped determinant per pixel, with the number of
    /// pixels whose determinant had to be clamped
    pub fn log_determinant(&self) -> (RealPlane, usize) {
        let det = self.determinant();
        let degenerate = det.iter().filter(|&&d| !(d > 0.0)).count();
        let log_det = det.mapv(|d| clamp_determinant(d).ln());
        (log_det, degenerate)
    }

    /// Copy of a window of this image
    pub fn window(&self, window: &Window) -> OmnibusResult<PolarimetricImage> {
        let (rows, cols) = self.shape();
        if !window.fits_within(cols, rows) {
            return Err(OmnibusError::WindowOutOfBounds {
                window: *window,
                raster_cols: cols,
                raster_rows: rows,
            });
        }

        let region = s![
            window.y0..window.y0 + window.rows,
            window.x0..window.x0 + window.cols
        ];
        let image = match self {
            PolarimetricImage::Scalar { k } => PolarimetricImage::Scalar {
                k: k.slice(region).to_owned(),
            },
            PolarimetricImage::Covariance2 { k, a, xsi } => PolarimetricImage::Covariance2 {
                k: k.slice(region).to_owned(),
                a: a.slice(region).to_owned(),
                xsi: xsi.slice(region).to_owned(),
            },
            PolarimetricImage::Coherency3 { k, a, rho, xsi, b, zeta } => {
                PolarimetricImage::Coherency3 {
                    k: k.slice(region).to_owned(),
                    a: a.slice(region).to_owned(),
                    rho: rho.slice(region).to_owned(),
                    xsi: xsi.slice(region).to_owned(),
                    b: b.slice(region).to_owned(),
                    zeta: zeta.slice(region).to_owned(),
                }
            }
        };
        Ok(image)
    }
}

/// Something a time step of the series can be read from
pub trait MatrixSource {
    /// Label used in error messages
    fn label(&self) -> String;

    fn dimension(&self) -> MatrixDimension;

    /// (cols, rows)
    fn raster_size(&self) -> (usize, usize);

    fn read_window(&self, window: &Window) -> OmnibusResult<PolarimetricImage>;
}

impl MatrixSource for PolarimetricImage {
    fn label(&self) -> String {
        format!("<in-memory {} image>", self.dimension())
    }

    fn dimension(&self) -> MatrixDimension {
        PolarimetricImage::dimension(self)
    }

    fn raster_size(&self) -> (usize, usize) {
        let (rows, cols) = self.shape();
        (cols, rows)
    }

    fn read_window(&self, window: &Window) -> OmnibusResult<PolarimetricImage> {
        self.window(window)
    }
}
