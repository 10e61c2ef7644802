//! Python bindings

use crate::core::{ChangeDetector, ChangeSummary};
use crate::io::MatrixReader;
use crate::types::{ChangeDetectionParams, OmnibusError, OmnibusResult, Window};
use numpy::{IntoPyArray, PyArray2};
use pyo3::prelude::*;
use std::path::Path;

fn to_py_err(e: OmnibusError) -> PyErr {
    match e {
        OmnibusError::InvalidParameter(_) => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

fn build_params(
    enl: f64,
    significance: f64,
    median_filter: bool,
    dims: Option<(usize, usize, usize, usize)>,
) -> ChangeDetectionParams {
    ChangeDetectionParams {
        enl,
        significance,
        window: dims.map(|(x0, y0, cols, rows)| Window::new(x0, y0, cols, rows)),
        median_filter,
        tile_rows: None,
    }
}

/// Python wrapper for ChangeSummary
#[pyclass(name = "ChangeSummary")]
struct PyChangeSummary {
    inner: ChangeSummary,
    statistic_path: String,
    change_map_path: String,
}

#[pymethods]
impl PyChangeSummary {
    #[getter]
    fn images(&self) -> usize {
        self.inner.images
    }

    #[getter]
    fn changed_pixels(&self) -> usize {
        self.inner.changed_pixels
    }

    #[getter]
    fn changed_fraction(&self) -> f64 {
        self.inner.changed_fraction
    }

    #[getter]
    fn degrees_of_freedom(&self) -> f64 {
        self.inner.correction.dof
    }

    #[getter]
    fn degenerate_determinants(&self) -> usize {
        self.inner.degenerate_determinants
    }

    #[getter]
    fn elapsed_seconds(&self) -> f64 {
        self.inner.elapsed_seconds
    }

    #[getter]
    fn statistic_path(&self) -> String {
        self.statistic_path.clone()
    }

    #[getter]
    fn change_map_path(&self) -> String {
        self.change_map_path.clone()
    }

    fn __repr__(&self) -> String {
        format!(
            "ChangeSummary(images={}, dimension='{}', changed_pixels={}, changed_fraction={:.4})",
            self.inner.images,
            self.inner.dimension,
            self.inner.changed_pixels,
            self.inner.changed_fraction
        )
    }
}

/// Run change detection on a list of files and write both output rasters
#[pyfunction]
#[pyo3(signature = (filenames, outfile, enl, significance=0.01, median_filter=false, dims=None))]
fn run_change_detection(
    filenames: Vec<String>,
    outfile: String,
    enl: f64,
    significance: f64,
    median_filter: bool,
    dims: Option<(usize, usize, usize, usize)>,
) -> PyResult<PyChangeSummary> {
    let detector = ChangeDetector::new(build_params(enl, significance, median_filter, dims));
    let (summary, paths) = detector
        .run(&filenames, Path::new(&outfile))
        .map_err(to_py_err)?;

    Ok(PyChangeSummary {
        inner: summary,
        statistic_path: paths.statistic.display().to_string(),
        change_map_path: paths.change_map.display().to_string(),
    })
}

/// Change probabilities for a list of files, without writing anything
#[pyfunction]
#[pyo3(signature = (filenames, enl, significance=0.01, median_filter=false, dims=None))]
fn change_probability<'py>(
    py: Python<'py>,
    filenames: Vec<String>,
    enl: f64,
    significance: f64,
    median_filter: bool,
    dims: Option<(usize, usize, usize, usize)>,
) -> PyResult<&'py PyArray2<f64>> {
    let detector = ChangeDetector::new(build_params(enl, significance, median_filter, dims));
    let readers = filenames
        .iter()
        .map(MatrixReader::open)
        .collect::<OmnibusResult<Vec<_>>>()
        .map_err(to_py_err)?;
    let output = detector.detect(&readers).map_err(to_py_err)?;
    Ok(output.probability.into_pyarray(py))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyChangeSummary>()?;
    m.add_function(wrap_pyfunction!(run_change_detection, m)?)?;
    m.add_function(wrap_pyfunction!(change_probability, m)?)?;
    Ok(())
}
