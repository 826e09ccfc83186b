//! Pixel Cache (de)serialization as a compressed `.npz`, the direct
//! analogue of the NumPy `.npz` archive format the data model names.
//! The ordered feature-extractor list's hash travels inside the archive
//! so the Trainer can assert P1 (byte-equal extractor lists) without a
//! separate sidecar file.

use std::fs::File;
use std::path::Path;

use ndarray::{Array1, Array2};
use ndarray_npy::{NpzReader, NpzWriter};
use sha2::{Digest, Sha256};

use cfw_core::classes::ClassIdx;
use cfw_core::model::{BandStack, MonthTag, PixelRecord};
use cfw_core::{CfwError, CfwResult};

/// SHA-256 of the ordered, newline-joined extractor name list. Stable
/// across runs as long as the extractor list and order are unchanged.
pub fn feature_set_hash(feature_extractors: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(feature_extractors.join("\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Writes `rows` (assumed to all share one month, the common case for a
/// cache file) as a compressed NPZ at `path`, returning the computed
/// feature-set hash embedded in the archive.
pub fn write_pixel_cache(
    path: &Path,
    rows: &[PixelRecord],
    feature_extractors: &[String],
) -> CfwResult<String> {
    let hash = feature_set_hash(feature_extractors);

    let n = rows.len();
    let x: Array1<i64> = rows.iter().map(|r| r.x).collect();
    let y: Array1<i64> = rows.iter().map(|r| r.y).collect();
    let feature_id: Array1<u64> = rows.iter().map(|r| r.feature_id).collect();
    let class_idx: Array1<u8> = rows.iter().map(|r| r.class_idx.0).collect();
    let year: Array1<i32> = rows.iter().map(|r| r.month.year).collect();
    let month: Array1<u32> = rows.iter().map(|r| r.month.month).collect();

    let mut bands = Array2::<f64>::zeros((n, 4));
    for (i, row) in rows.iter().enumerate() {
        let b = row.bands.as_array();
        bands.row_mut(i).assign(&Array1::from_vec(b.to_vec()));
    }

    let file = File::create(path).map_err(CfwError::Io)?;
    let mut npz = NpzWriter::new_compressed(file);
    npz.add_array("x", &x).map_err(npz_err)?;
    npz.add_array("y", &y).map_err(npz_err)?;
    npz.add_array("feature_id", &feature_id).map_err(npz_err)?;
    npz.add_array("class_idx", &class_idx).map_err(npz_err)?;
    npz.add_array("year", &year).map_err(npz_err)?;
    npz.add_array("month", &month).map_err(npz_err)?;
    npz.add_array("bands", &bands).map_err(npz_err)?;
    let hash_bytes: Array1<u8> = hash.bytes().collect();
    npz.add_array("feature_set_hash", &hash_bytes).map_err(npz_err)?;
    npz.finish().map_err(npz_err)?;

    Ok(hash)
}

/// Reads a pixel cache archive back into `PixelRecord`s plus the
/// embedded feature-set hash.
pub fn read_pixel_cache(path: &Path) -> CfwResult<(Vec<PixelRecord>, String)> {
    let file = File::open(path).map_err(CfwError::Io)?;
    let mut npz = NpzReader::new(file).map_err(npz_err)?;

    let x: Array1<i64> = npz.by_name("x.npy").map_err(npz_err)?;
    let y: Array1<i64> = npz.by_name("y.npy").map_err(npz_err)?;
    let feature_id: Array1<u64> = npz.by_name("feature_id.npy").map_err(npz_err)?;
    let class_idx: Array1<u8> = npz.by_name("class_idx.npy").map_err(npz_err)?;
    let year: Array1<i32> = npz.by_name("year.npy").map_err(npz_err)?;
    let month: Array1<u32> = npz.by_name("month.npy").map_err(npz_err)?;
    let bands: Array2<f64> = npz.by_name("bands.npy").map_err(npz_err)?;
    let hash_bytes: Array1<u8> = npz.by_name("feature_set_hash.npy").map_err(npz_err)?;
    let hash = String::from_utf8(hash_bytes.to_vec())
        .map_err(|e| CfwError::Integrity(format!("corrupt feature_set_hash in cache: {e}")))?;

    let n = x.len();
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let b = bands.row(i);
        rows.push(PixelRecord {
            x: x[i],
            y: y[i],
            month: MonthTag { year: year[i], month: month[i] },
            class_idx: ClassIdx(class_idx[i]),
            bands: BandStack {
                blue: b[0],
                green: b[1],
                red: b[2],
                nir: b[3],
            },
            feature_id: feature_id[i],
        });
    }
    Ok((rows, hash))
}

fn npz_err(e: impl std::fmt::Display) -> CfwError {
    CfwError::Integrity(format!("pixel cache archive error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfw_core::classes::ClassIdx;

    fn sample_rows() -> Vec<PixelRecord> {
        vec![
            PixelRecord {
                x: 0,
                y: 0,
                month: MonthTag::parse("2024-03").unwrap(),
                class_idx: ClassIdx(0),
                bands: BandStack { blue: 100.0, green: 200.0, red: 150.0, nir: 3000.0 },
                feature_id: 7,
            },
            PixelRecord {
                x: 1,
                y: 0,
                month: MonthTag::parse("2024-03").unwrap(),
                class_idx: ClassIdx(1),
                bands: BandStack { blue: 110.0, green: 210.0, red: 160.0, nir: 500.0 },
                feature_id: 7,
            },
        ]
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.npz");
        let extractors = vec!["ndvi".to_string(), "evi".to_string()];
        let hash = write_pixel_cache(&path, &sample_rows(), &extractors).unwrap();

        let (rows, read_hash) = read_pixel_cache(&path).unwrap();
        assert_eq!(read_hash, hash);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].class_idx, ClassIdx(0));
        assert_eq!(rows[1].bands.nir, 500.0);
    }

    #[test]
    fn feature_set_hash_is_order_sensitive() {
        let a = feature_set_hash(&["ndvi".to_string(), "evi".to_string()]);
        let b = feature_set_hash(&["evi".to_string(), "ndvi".to_string()]);
        assert_ne!(a, b);
    }
}
