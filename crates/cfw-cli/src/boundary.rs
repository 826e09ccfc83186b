//! Loads the optional `--boundary-geojson` clip polygon shared by the
//! Predictor and Benchmarker subcommands. The file is expected to hold
//! a single GeoJSON `Polygon` in EPSG:4326, matching the convention
//! `cfw-raster::crs` reprojects from.

use std::path::Path;

use geo_types::Polygon;
use geojson::GeoJson;

use cfw_core::{CfwError, CfwResult};

pub fn load_boundary(path: Option<&Path>) -> CfwResult<Option<Polygon<f64>>> {
    let Some(path) = path else { return Ok(None) };
    let text = std::fs::read_to_string(path).map_err(CfwError::Io)?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| CfwError::Config(format!("invalid boundary GeoJSON at {}: {e}", path.display())))?;

    let geometry = match geojson {
        GeoJson::Geometry(g) => g,
        GeoJson::Feature(f) => f
            .geometry
            .ok_or_else(|| CfwError::Config(format!("boundary GeoJSON feature at {} has no geometry", path.display())))?,
        GeoJson::FeatureCollection(fc) => fc
            .features
            .into_iter()
            .next()
            .and_then(|f| f.geometry)
            .ok_or_else(|| CfwError::Config(format!("boundary GeoJSON at {} has no features", path.display())))?,
    };

    let polygon: Polygon<f64> = geo_types::Geometry::try_from(geometry)
        .map_err(|e| CfwError::Config(format!("boundary GeoJSON at {} is not convertible: {e}", path.display())))?
        .try_into()
        .map_err(|_| CfwError::Config(format!("boundary GeoJSON at {} must be a Polygon", path.display())))?;

    Ok(Some(polygon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_none() {
        assert!(load_boundary(None).unwrap().is_none());
    }

    #[test]
    fn parses_a_bare_polygon_geometry() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}"#,
        )
        .unwrap();
        let polygon = load_boundary(Some(tmp.path())).unwrap().unwrap();
        assert_eq!(polygon.exterior().0.len(), 5);
    }
}
