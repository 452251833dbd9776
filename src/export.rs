//! Export (DIP-light): payload + record.ini + a two-line sha256sum
//! manifest. Distinct from the richer Package format of `package.rs`.
//!
//! Grounded on `core/export.h`.

use std::path::Path;

use crate::cas;
use crate::error::{Result, TablinumError};
use crate::fs as tfs;
use crate::record::{Record, Status};
use crate::sha256::digest_hex;

pub fn export(repo_root: &Path, jobid: &str, out_dir: &Path) -> Result<()> {
    let record = Record::read(repo_root, jobid)?;
    if record.status != Status::Ok {
        return Err(TablinumError::integrity(format!(
            "job {jobid}: record status is not ok"
        )));
    }

    let object_path = cas::object_path(repo_root, &record.sha256);
    if !object_path.is_file() {
        return Err(TablinumError::not_found(format!(
            "job {jobid}: CAS object for {} not found",
            record.sha256
        )));
    }

    tfs::mkdir_p(out_dir)?;

    let payload_dst = out_dir.join(&record.payload);
    std::fs::copy(&object_path, &payload_dst).map_err(|e| TablinumError::io(&payload_dst, e))?;

    let record_src = crate::record::record_path(repo_root, jobid);
    let record_dst = out_dir.join("record.ini");
    std::fs::copy(&record_src, &record_dst).map_err(|e| TablinumError::io(&record_dst, e))?;

    let payload_hash = digest_hex(&std::fs::read(&payload_dst).map_err(|e| TablinumError::io(&payload_dst, e))?);
    let record_hash = digest_hex(&std::fs::read(&record_dst).map_err(|e| TablinumError::io(&record_dst, e))?);

    let manifest = format!(
        "{payload_hash}  {}\n{record_hash}  record.ini\n",
        record.payload
    );
    tfs::write_file(&out_dir.join("manifest-sha256.txt"), manifest.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn export_produces_two_line_manifest() {
        let dir = tempdir().unwrap();
        let repo_root = dir.path().join("repo");
        let payload = dir.path().join("payload.bin");
        std::fs::write(&payload, b"hello tablinum\n").unwrap();
        let sha = crate::cas::put_file(&repo_root, &payload).unwrap();

        let record = Record {
            status: Status::Ok,
            job: "job1".to_string(),
            payload: "payload.bin".to_string(),
            sha256: sha,
            bytes: 15,
            stored_at: 1_700_000_000,
            reason: None,
        };
        record.write(&repo_root).unwrap();

        let out_dir = dir.path().join("out");
        export(&repo_root, "job1", &out_dir).unwrap();

        assert!(out_dir.join("payload.bin").is_file());
        assert!(out_dir.join("record.ini").is_file());
        let manifest = std::fs::read_to_string(out_dir.join("manifest-sha256.txt")).unwrap();
        assert_eq!(manifest.lines().count(), 2);
        assert!(manifest.lines().next().unwrap().ends_with("payload.bin"));
    }

    #[test]
    fn export_fails_on_non_ok_record() {
        let dir = tempdir().unwrap();
        let repo_root = dir.path().join("repo");
        let record = Record {
            status: Status::Fail,
            job: "job1".to_string(),
            payload: "payload.bin".to_string(),
            sha256: String::new(),
            bytes: 0,
            stored_at: 0,
            reason: Some("x".to_string()),
        };
        record.write(&repo_root).unwrap();

        let out_dir = dir.path().join("out");
        assert!(export(&repo_root, "job1", &out_dir).is_err());
    }
}
