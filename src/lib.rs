//! omnibus: multi-temporal polarimetric SAR change detection
//!
//! Tests, at every pixel, whether the covariance or coherency matrices of a
//! co-registered SAR time series are consistent with a single complex Wishart
//! distribution, using the omnibus likelihood-ratio statistic with its
//! Bartlett/Box chi-square approximation.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    ChangeDetectionParams, GeoReference, OmnibusError, OmnibusResult, Window,
};

pub use crate::core::{
    BartlettCorrection, ChangeClassifier, ChangeDetectionOutput, ChangeDetector, ChangeMap,
    ChangeProbability, ChangeSummary, MatrixDimension, MatrixSource, MedianFilter,
    OmnibusStatistic, PolarimetricImage, WishartAccumulator,
};

pub use io::{ChangeMapWriter, MatrixReader, OutputPaths};
