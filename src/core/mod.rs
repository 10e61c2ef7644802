//! Core change detection modules

pub mod matrix;
pub mod accumulate;
pub mod omnibus;
pub mod probability;
pub mod median_filter;
pub mod classify;
pub mod change_detection;

// Re-export main types
pub use matrix::{MatrixDimension, MatrixSource, PolarimetricImage, DETERMINANT_FLOOR};
pub use accumulate::WishartAccumulator;
pub use omnibus::{BartlettCorrection, OmnibusStatistic};
pub use probability::ChangeProbability;
pub use median_filter::MedianFilter;
pub use classify::{ChangeClassifier, ChangeMap, normalized_log_intensity};
pub use change_detection::{ChangeDetector, ChangeDetectionOutput, ChangeSummary};
