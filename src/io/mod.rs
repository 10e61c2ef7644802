//! I/O modules for reading matrix rasters and writing change maps

pub mod matrix_reader;
pub mod writer;

pub use matrix_reader::MatrixReader;
pub use writer::{ChangeMapWriter, OutputPaths};
