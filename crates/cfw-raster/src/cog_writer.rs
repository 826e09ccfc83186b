//! Single-band, tiled COG writer shared by the Predictor (C5) and the
//! Composite Builder (C6): `TILED=YES`, 512-pixel internal tiles, LZW
//! compression, internal overviews down to <=256px, `nodata=255`, and
//! the tag set written as GDAL metadata items.

use std::collections::HashMap;
use std::path::Path;

use gdal::raster::{Buffer, RasterCreationOption};
use gdal::{Dataset, DriverManager};

use cfw_core::{CfwError, CfwResult};

pub const TILE_SIZE: usize = 512;
pub const NODATA: u8 = 255;

/// Everything needed to materialize one single-band class-index COG.
pub struct CogWrite<'a> {
    pub path: &'a Path,
    pub width: usize,
    pub height: usize,
    pub geo_transform: [f64; 6],
    pub projection_wkt: &'a str,
    pub pixels: &'a [u8],
    pub tags: &'a HashMap<String, String>,
}

pub fn write_cog(spec: &CogWrite) -> CfwResult<()> {
    if let Some(parent) = spec.path.parent() {
        std::fs::create_dir_all(parent).map_err(CfwError::Io)?;
    }

    let driver = DriverManager::get_driver_by_name("GTiff")
        .map_err(|e| CfwError::Integrity(format!("GTiff driver unavailable: {e}")))?;

    let options = [
        RasterCreationOption { key: "TILED", value: "YES" },
        RasterCreationOption { key: "BLOCKXSIZE", value: "512" },
        RasterCreationOption { key: "BLOCKYSIZE", value: "512" },
        RasterCreationOption { key: "COMPRESS", value: "LZW" },
    ];
    let mut dataset = driver
        .create_with_band_type_with_options::<u8, _>(spec.path, spec.width, spec.height, 1, &options)
        .map_err(|e| CfwError::Integrity(format!("failed to create COG {}: {e}", spec.path.display())))?;

    dataset
        .set_geo_transform(&spec.geo_transform)
        .map_err(|e| CfwError::Integrity(format!("failed to set geotransform: {e}")))?;
    dataset
        .set_projection(spec.projection_wkt)
        .map_err(|e| CfwError::Integrity(format!("failed to set projection: {e}")))?;

    {
        let mut band = dataset
            .rasterband(1)
            .map_err(|e| CfwError::Integrity(format!("failed to open output band: {e}")))?;
        band.set_no_data_value(Some(NODATA as f64))
            .map_err(|e| CfwError::Integrity(format!("failed to set nodata: {e}")))?;
        let mut buffer = Buffer::new((spec.width, spec.height), spec.pixels.to_vec());
        band.write((0, 0), (spec.width, spec.height), &mut buffer)
            .map_err(|e| CfwError::Integrity(format!("failed to write raster band: {e}")))?;
    }

    for (key, value) in spec.tags {
        dataset
            .set_metadata_item(key, value, "")
            .map_err(|e| CfwError::Integrity(format!("failed to set metadata tag {key}: {e}")))?;
    }

    let levels = overview_levels(spec.width, spec.height);
    if !levels.is_empty() {
        dataset
            .build_overviews("NEAREST", &levels, &[])
            .map_err(|e| CfwError::Integrity(format!("failed to build overviews: {e}")))?;
    }

    Ok(())
}

/// Reads the geographic bounding box `(minx, miny, maxx, maxy)` of an
/// already-written COG, for STAC item registration after the fact
/// (used by the Composite Builder CLI, which unlike the Predictor does
/// not keep the geotransform around after `write_cog` returns).
pub fn read_bbox(path: &Path) -> CfwResult<(f64, f64, f64, f64)> {
    let dataset = Dataset::open(path).map_err(|e| CfwError::InputData(format!("failed to open {}: {e}", path.display())))?;
    let (width, height) = dataset.raster_size();
    let t = dataset
        .geo_transform()
        .map_err(|e| CfwError::Integrity(format!("{} has no geotransform: {e}", path.display())))?;
    let corner = |px: f64, py: f64| (t[0] + px * t[1] + py * t[2], t[3] + px * t[4] + py * t[5]);
    let (x0, y0) = corner(0.0, 0.0);
    let (x1, y1) = corner(width as f64, height as f64);
    Ok((x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
}

/// Powers of two, coarsest-last, down to the level whose longest side
/// is <= 256px.
fn overview_levels(width: usize, height: usize) -> Vec<i32> {
    let mut levels = Vec::new();
    let mut factor = 2usize;
    while width / factor > 256 || height / factor > 256 {
        levels.push(factor as i32);
        factor *= 2;
    }
    levels.push(factor as i32);
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overview_levels_reach_the_256px_floor() {
        let levels = overview_levels(2048, 2048);
        assert_eq!(levels, vec![2, 4, 8]);
    }

    #[test]
    fn small_raster_still_gets_one_overview_level() {
        let levels = overview_levels(300, 300);
        assert_eq!(levels, vec![2]);
    }
}
