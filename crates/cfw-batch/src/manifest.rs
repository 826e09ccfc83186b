//! The machine-readable run manifest: one JSON file per stage
//! invocation enumerating every unit attempted and its outcome (spec
//! §7's "machine-readable JSON manifest enumerating every artifact
//! produced").

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cfw_core::{CfwError, CfwResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRecord {
    pub unit_id: String,
    pub status: String,
    pub error: Option<String>,
    pub output: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunManifest {
    pub created_at: DateTime<Utc>,
    pub run_id: String,
    pub stage: String,
    pub num_units: usize,
    pub success: usize,
    pub failure: usize,
    pub units: Vec<UnitRecord>,
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> CfwResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(CfwError::Io)?;
    }
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(path, json).map_err(CfwError::Io)
}

pub fn read_manifest(path: &Path) -> CfwResult<RunManifest> {
    let text = fs::read_to_string(path).map_err(CfwError::Io)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_writes_and_reads_back() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let manifest = RunManifest {
            created_at: Utc::now(),
            run_id: "r1".into(),
            stage: "training".into(),
            num_units: 1,
            success: 1,
            failure: 0,
            units: vec![UnitRecord {
                unit_id: "2024-01".into(),
                status: "ok".into(),
                error: None,
                output: "runs/r1/2024_01/saved_models".into(),
            }],
        };
        write_manifest(tmp.path(), &manifest).unwrap();
        let parsed = read_manifest(tmp.path()).unwrap();
        assert_eq!(parsed.stage, "training");
        assert_eq!(parsed.units.first().unwrap().unit_id, "2024-01");
    }
}
