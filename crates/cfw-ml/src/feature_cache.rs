//! The NPZ the Prepare phase writes and the Fit phase reads: the
//! feature-engineered row per pixel, its class index, and its group id
//! (feature id), the combined cache `cfw-ml` drives splitting and
//! fitting from.

use std::fs::File;
use std::path::Path;

use ndarray::{Array1, Array2};
use ndarray_npy::{NpzReader, NpzWriter};

use cfw_core::{CfwError, CfwResult};

pub fn write_feature_cache(
    path: &Path,
    rows: &[Vec<f64>],
    labels: &[u8],
    group_ids: &[u64],
) -> CfwResult<()> {
    if rows.is_empty() {
        return Err(CfwError::StageDependency(
            "no feature rows to cache: month has zero training pixels".into(),
        ));
    }
    let n = rows.len();
    let n_cols = rows[0].len();
    let mut features = Array2::<f64>::zeros((n, n_cols));
    for (i, row) in rows.iter().enumerate() {
        features.row_mut(i).assign(&Array1::from_vec(row.clone()));
    }
    let labels_arr: Array1<u8> = labels.to_vec().into();
    let groups_arr: Array1<u64> = group_ids.to_vec().into();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(CfwError::Io)?;
    }
    let file = File::create(path).map_err(CfwError::Io)?;
    let mut npz = NpzWriter::new_compressed(file);
    npz.add_array("features", &features).map_err(npz_err)?;
    npz.add_array("labels", &labels_arr).map_err(npz_err)?;
    npz.add_array("group_ids", &groups_arr).map_err(npz_err)?;
    npz.finish().map_err(npz_err)?;
    Ok(())
}

pub fn read_feature_cache(path: &Path) -> CfwResult<(Vec<Vec<f64>>, Vec<u8>, Vec<u64>)> {
    let file = File::open(path).map_err(CfwError::Io)?;
    let mut npz = NpzReader::new(file).map_err(npz_err)?;
    let features: Array2<f64> = npz.by_name("features.npy").map_err(npz_err)?;
    let labels: Array1<u8> = npz.by_name("labels.npy").map_err(npz_err)?;
    let group_ids: Array1<u64> = npz.by_name("group_ids.npy").map_err(npz_err)?;

    let rows: Vec<Vec<f64>> = features.outer_iter().map(|r| r.to_vec()).collect();
    Ok((rows, labels.to_vec(), group_ids.to_vec()))
}

fn npz_err(e: impl std::fmt::Display) -> CfwError {
    CfwError::Integrity(format!("feature cache archive error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_feature_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("features.npz");
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let labels = vec![0u8, 1u8];
        let groups = vec![10u64, 11u64];
        write_feature_cache(&path, &rows, &labels, &groups).unwrap();

        let (read_rows, read_labels, read_groups) = read_feature_cache(&path).unwrap();
        assert_eq!(read_rows, rows);
        assert_eq!(read_labels, labels);
        assert_eq!(read_groups, groups);
    }

    #[test]
    fn empty_rows_is_a_stage_dependency_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("features.npz");
        let result = write_feature_cache(&path, &[], &[], &[]);
        assert!(matches!(result, Err(CfwError::StageDependency(_))));
    }
}
