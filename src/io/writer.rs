use crate::core::change_detection::ChangeDetectionOutput;
use crate::io::MatrixReader;
use crate::types::{GeoReference, OmnibusResult};
use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, Driver};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Locations of the two output rasters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Float32 raster with Z, P and the change mask
    pub statistic: PathBuf,
    /// Byte raster with the colour change map and grey intensity
    pub change_map: PathBuf,
}

impl OutputPaths {
    /// `out.tif` -> `out.tif` and `out_cmap.tif`
    pub fn for_output(output: &Path) -> Self {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match output.extension() {
            Some(ext) => format!("{}_cmap.{}", stem, ext.to_string_lossy()),
            None => format!("{}_cmap", stem),
        };

        Self {
            statistic: output.to_path_buf(),
            change_map: output.with_file_name(name),
        }
    }
}

/// Writes change detection results with the reference image's GDAL driver.
///
/// Both outputs take their geotransform from the second image, which is
/// already cropped to the processing window. The statistic raster takes the
/// second image's projection, the change map the reference image's.
pub struct ChangeMapWriter {
    driver: Driver,
    reference: GeoReference,
    warped: GeoReference,
}

impl ChangeMapWriter {
    pub fn new(reference: &MatrixReader, second: &MatrixReader) -> Self {
        Self {
            driver: reference.dataset().driver(),
            reference: reference.georeference(),
            warped: second.georeference(),
        }
    }

    pub fn write(&self, output: &Path, result: &ChangeDetectionOutput) -> OmnibusResult<OutputPaths> {
        let paths = OutputPaths::for_output(output);
        let (rows, cols) = result.statistic.dim();

        {
            let mut dataset = self.driver.create_with_band_type::<f32, _>(
                &paths.statistic,
                cols as isize,
                rows as isize,
                3,
            )?;
            apply_georeference(&mut dataset, self.warped.geo_transform, &self.warped.projection)?;

            let mask = result.change_map.mask.mapv(f32::from);
            write_band(&dataset, 1, &result.statistic.mapv(|v| v as f32))?;
            write_band(&dataset, 2, &result.probability.mapv(|v| v as f32))?;
            write_band(&dataset, 3, &mask)?;
        }
        log::info!(
            "Test statistic, change probabilities and change mask written to: {}",
            paths.statistic.display()
        );

        {
            let mut dataset = self.driver.create_with_band_type::<u8, _>(
                &paths.change_map,
                cols as isize,
                rows as isize,
                3,
            )?;
            apply_georeference(&mut dataset, self.warped.geo_transform, &self.reference.projection)?;

            write_band(&dataset, 1, &result.change_map.colour)?;
            write_band(&dataset, 2, &result.change_map.intensity)?;
            write_band(&dataset, 3, &result.change_map.intensity)?;
        }
        log::info!("Change map image written to: {}", paths.change_map.display());

        Ok(paths)
    }
}

fn apply_georeference(
    dataset: &mut Dataset,
    geo_transform: Option<[f64; 6]>,
    projection: &str,
) -> OmnibusResult<()> {
    if let Some(transform) = geo_transform {
        dataset.set_geo_transform(&transform)?;
    }
    if !projection.is_empty() {
        dataset.set_projection(projection)?;
    }
    Ok(())
}

fn write_band<T: GdalType + Copy>(dataset: &Dataset, index: isize, plane: &Array2<T>) -> OmnibusResult<()> {
    let (rows, cols) = plane.dim();
    let data: Vec<T> = plane.iter().copied().collect();
    let mut band = dataset.rasterband(index)?;
    band.write((0, 0), (cols, rows), &Buffer::new((cols, rows), data))?;
    Ok(())
}
