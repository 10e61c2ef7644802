use crate::core::matrix::fill_plane;
use crate::core::omnibus::BartlettCorrection;
use crate::types::{OmnibusError, OmnibusResult, RealPlane};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Maps the test statistic Z to a change probability with the two-term
/// Box approximation
///
/// ```text
/// P = (1 - omega^2) chi2cdf(Z, f) + omega^2 chi2cdf(Z, f + 4)
/// ```
#[derive(Debug, Clone)]
pub struct ChangeProbability {
    chi2_f: ChiSquared,
    chi2_f4: ChiSquared,
    omega2: f64,
}

impl ChangeProbability {
    pub fn new(correction: &BartlettCorrection) -> OmnibusResult<Self> {
        let chi2 = |dof: f64| {
            ChiSquared::new(dof).map_err(|e| {
                OmnibusError::InvalidParameter(format!(
                    "chi-square distribution with {} degrees of freedom: {}",
                    dof, e
                ))
            })
        };

        Ok(Self {
            chi2_f: chi2(correction.dof)?,
            chi2_f4: chi2(correction.dof + 4.0)?,
            omega2: correction.omega2,
        })
    }

    /// Change probability for a single statistic value, in [0, 1]
    #[inline]
    pub fn probability(&self, z: f64) -> f64 {
        if !(z > 0.0) {
            return 0.0;
        }
        let p = (1.0 - self.omega2) * self.chi2_f.cdf(z) + self.omega2 * self.chi2_f4.cdf(z);
        if p.is_nan() {
            0.0
        } else {
            p.clamp(0.0, 1.0)
        }
    }

    /// Change probability at every pixel
    pub fn map(&self, z: &RealPlane) -> RealPlane {
        fill_plane(z.dim(), |i, j| self.probability(z[[i, j]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matrix::MatrixDimension;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_statistic_has_zero_probability() {
        let c = BartlettCorrection::new(MatrixDimension::Scalar, 2, 10.0).unwrap();
        let mapper = ChangeProbability::new(&c).unwrap();
        assert_eq!(mapper.probability(0.0), 0.0);
        assert_eq!(mapper.probability(-1e-12), 0.0);
        assert_eq!(mapper.probability(f64::NAN), 0.0);
    }

    #[test]
    fn test_single_pol_matches_chi_square() {
        // With p = 1 omega^2 is tiny, so P is close to the plain chi2(1) cdf
        let c = BartlettCorrection::new(MatrixDimension::Scalar, 2, 10.0).unwrap();
        let mapper = ChangeProbability::new(&c).unwrap();
        // chi2(1) cdf at 3.841459 is 0.95
        assert_relative_eq!(mapper.probability(3.841459), 0.95, epsilon = 1e-3);
        assert!(mapper.probability(25.0) > 0.999);
    }

    #[test]
    fn test_probability_is_monotone_and_bounded() {
        let c = BartlettCorrection::new(MatrixDimension::Coherency3, 5, 4.4).unwrap();
        let mapper = ChangeProbability::new(&c).unwrap();

        let mut previous = 0.0;
        for step in 0..400 {
            let z = step as f64 * 0.5;
            let p = mapper.probability(z);
            assert!((0.0..=1.0).contains(&p));
            assert!(p + 1e-12 >= previous);
            previous = p;
        }
        assert!(mapper.probability(1e4) > 0.999);
    }

    #[test]
    fn test_map_plane() {
        let c = BartlettCorrection::new(MatrixDimension::Covariance2, 3, 8.0).unwrap();
        let mapper = ChangeProbability::new(&c).unwrap();
        let z = RealPlane::from_shape_vec((2, 2), vec![0.0, 1.0, 10.0, 100.0]).unwrap();
        let p = mapper.map(&z);
        assert_eq!(p.dim(), (2, 2));
        assert_eq!(p[[0, 0]], 0.0);
        assert!(p[[0, 1]] < p[[1, 0]]);
        assert!(p[[1, 1]] > 0.999);
    }
}
