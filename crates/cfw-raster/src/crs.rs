//! CRS-safety helpers for geometry-raster operations (P7): a query
//! geometry is never assumed to share the raster's CRS; it is either
//! reprojected explicitly or the operation fails with the offending
//! CRS pair named in the error.

use gdal::spatial_ref::{CoordTransform, SpatialRef};
use geo_types::{Coord, LineString, Polygon};

use cfw_core::{CfwError, CfwResult};

/// Reprojects `polygon` (assumed EPSG:4326, the boundary-GeoJSON
/// convention) into the raster's projection, given as WKT. A no-op
/// when the two spatial references already match.
pub fn reproject_polygon_to_raster(polygon: &Polygon<f64>, raster_projection_wkt: &str) -> CfwResult<Polygon<f64>> {
    let source = SpatialRef::from_epsg(4326)
        .map_err(|e| CfwError::InputData(format!("failed to build EPSG:4326 spatial reference: {e}")))?;
    let target = SpatialRef::from_wkt(raster_projection_wkt)
        .map_err(|e| CfwError::InputData(format!("raster has invalid projection WKT: {e}")))?;

    if source.auth_code().ok() == target.auth_code().ok() {
        return Ok(polygon.clone());
    }

    let transform = CoordTransform::new(&source, &target).map_err(|e| {
        CfwError::InputData(format!(
            "cannot reproject boundary geometry from EPSG:4326 to raster CRS: {e}"
        ))
    })?;

    let reproject_ring = |ring: &LineString<f64>| -> CfwResult<LineString<f64>> {
        let mut xs: Vec<f64> = ring.coords().map(|c| c.x).collect();
        let mut ys: Vec<f64> = ring.coords().map(|c| c.y).collect();
        let mut zs = vec![0.0; xs.len()];
        transform
            .transform_coords(&mut xs, &mut ys, &mut zs)
            .map_err(|e| CfwError::InputData(format!("boundary reprojection failed: {e}")))?;
        Ok(LineString::new(xs.into_iter().zip(ys).map(|(x, y)| Coord { x, y }).collect()))
    };

    let exterior = reproject_ring(polygon.exterior())?;
    let interiors = polygon
        .interiors()
        .iter()
        .map(reproject_ring)
        .collect::<CfwResult<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Polygon<f64> {
        Polygon::new(
            LineString::new(vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 1.0, y: 0.0 },
                Coord { x: 1.0, y: 1.0 },
                Coord { x: 0.0, y: 1.0 },
                Coord { x: 0.0, y: 0.0 },
            ]),
            vec![],
        )
    }

    #[test]
    fn identical_crs_is_a_no_op() {
        let wgs84_wkt = SpatialRef::from_epsg(4326).unwrap().to_wkt().unwrap();
        let reprojected = reproject_polygon_to_raster(&unit_square(), &wgs84_wkt).unwrap();
        assert_eq!(reprojected, unit_square());
    }
}
