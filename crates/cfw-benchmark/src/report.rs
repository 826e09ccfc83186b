//! Ties confusion-matrix, per-class, and area statistics together into
//! one `BenchmarkReport` per reference raster, writes it as JSON under
//! the run directory's `benchmark_results/`, and prints the
//! human-readable summary table (spec §7's "summary table at stage
//! end").

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use gdal::Dataset;
use geo_types::Polygon;
use serde::{Deserialize, Serialize};
use tracing::info;

use cfw_core::{CfwError, CfwResult, RunContext};

use crate::area::{class_area_hectares, pixel_area_hectares};
use crate::confusion::{confusion_matrix, overall_accuracy, per_class_metrics, ClassMetrics, ConfusionMatrix};
use crate::reference::{resample_reference_to_prediction_grid, restrict_to_boundary, ReferenceCoding};

#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    pub reference_id: String,
    pub confusion_matrix: ConfusionMatrix,
    pub overall_accuracy: f64,
    pub per_class_metrics: Vec<ClassMetrics>,
    pub prediction_area_hectares: HashMap<u8, f64>,
    pub reference_area_hectares: HashMap<u8, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceInput {
    pub reference_id: String,
    pub path: PathBuf,
    pub coding: ReferenceCoding,
}

/// Benchmarks one prediction or composite raster against one or more
/// reference rasters, optionally clipped to `boundary` (the prediction
/// CRS). Each reference is scored independently; a failure to open or
/// align one reference does not block the others.
pub fn run_benchmark(
    context: &RunContext,
    prediction_path: &std::path::Path,
    references: &[ReferenceInput],
    boundary: Option<&Polygon<f64>>,
) -> CfwResult<Vec<BenchmarkReport>> {
    let prediction_dataset = Dataset::open(prediction_path)
        .map_err(|e| CfwError::InputData(format!("failed to open prediction raster {}: {e}", prediction_path.display())))?;
    let (width, height) = prediction_dataset.raster_size();
    let transform = prediction_dataset
        .geo_transform()
        .map_err(|e| CfwError::InputData(format!("prediction raster has no geotransform: {e}")))?;
    let projection = prediction_dataset.projection();
    let band = prediction_dataset
        .rasterband(1)
        .map_err(|e| CfwError::InputData(format!("prediction raster missing band 1: {e}")))?;
    let mut prediction_pixels =
        band.read_as::<u8>((0, 0), (width, height), (width, height), None).map_err(|e| CfwError::InputData(e.to_string()))?.data;
    if let Some(boundary) = boundary {
        restrict_to_boundary(&mut prediction_pixels, width, height, &transform, boundary);
    }

    let pixel_area_ha = pixel_area_hectares(&transform);
    let mut reports = Vec::with_capacity(references.len());

    for reference in references {
        let dataset = match Dataset::open(&reference.path) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(reference = %reference.reference_id, error = %e, "skipping reference that could not be opened");
                continue;
            }
        };
        let resampled = resample_reference_to_prediction_grid(&dataset, width, height, &transform, &projection)?;
        let mut normalized: Vec<u8> = resampled.iter().map(|&raw| reference.coding.normalize(raw)).collect();
        if let Some(boundary) = boundary {
            restrict_to_boundary(&mut normalized, width, height, &transform, boundary);
        }

        let cm = confusion_matrix(&prediction_pixels, &normalized);
        let report = BenchmarkReport {
            reference_id: reference.reference_id.clone(),
            overall_accuracy: overall_accuracy(&cm),
            per_class_metrics: per_class_metrics(&cm),
            prediction_area_hectares: class_area_hectares(&prediction_pixels, pixel_area_ha),
            reference_area_hectares: class_area_hectares(&normalized, pixel_area_ha),
            confusion_matrix: cm,
        };
        write_report(context, &report)?;
        reports.push(report);
    }

    info!(count = reports.len(), "benchmark complete");
    Ok(reports)
}

fn write_report(context: &RunContext, report: &BenchmarkReport) -> CfwResult<()> {
    let dir = context.run_dir.benchmark_results_dir();
    std::fs::create_dir_all(&dir).map_err(CfwError::Io)?;
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(dir.join(format!("{}.json", report.reference_id)), json).map_err(CfwError::Io)?;

    let mut summary = Vec::new();
    writeln!(summary, "Reference: {}", report.reference_id).ok();
    writeln!(summary, "Overall accuracy: {:.4}", report.overall_accuracy).ok();
    for metrics in &report.per_class_metrics {
        writeln!(
            summary,
            "class {}: precision={:.4} recall={:.4} f1={:.4} support={}",
            metrics.class_idx, metrics.precision, metrics.recall, metrics.f1, metrics.support
        )
        .ok();
    }
    std::fs::write(dir.join(format!("{}_summary.txt", report.reference_id)), summary).map_err(CfwError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confusion::MISSING;

    #[test]
    fn benchmark_report_serializes_to_json() {
        let cm = confusion_matrix(&[0, 1], &[0, 1]);
        let report = BenchmarkReport {
            reference_id: "ref1".into(),
            overall_accuracy: overall_accuracy(&cm),
            per_class_metrics: per_class_metrics(&cm),
            prediction_area_hectares: class_area_hectares(&[0, 1], 0.01),
            reference_area_hectares: class_area_hectares(&[0, 1, MISSING], 0.01),
            confusion_matrix: cm,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("ref1"));
    }
}
