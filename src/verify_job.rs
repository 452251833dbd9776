//! Verify-job: recompute the CAS object hash and compare against the
//! record.
//!
//! Grounded on `core/verify.h`. A record whose status is not `ok` is a
//! "skip", reported as OK to the caller.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::cas;
use crate::error::{Result, TablinumError};
use crate::record::{Record, Status};
use crate::sha256::{to_hex, Sha256};

#[derive(Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Ok,
    Skip,
}

pub fn verify_job(repo_root: &Path, jobid: &str) -> Result<VerifyOutcome> {
    let record = Record::read(repo_root, jobid)?;
    if record.status != Status::Ok {
        return Ok(VerifyOutcome::Skip);
    }

    let object_path = cas::object_path(repo_root, &record.sha256);
    let file = File::open(&object_path)
        .map_err(|_| TablinumError::integrity(format!("job {jobid}: CAS object missing")))?;

    let mut hasher = Sha256::new();
    let mut reader = BufReader::new(file);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| TablinumError::io(&object_path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let actual = to_hex(&hasher.finalize());

    if actual != record.sha256 {
        return Err(TablinumError::integrity("sha256 mismatch".to_string()));
    }

    Ok(VerifyOutcome::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record as Rec;
    use tempfile::tempdir;

    #[test]
    fn verify_job_detects_tampered_object() {
        let dir = tempdir().unwrap();
        let repo_root = dir.path().join("repo");
        let payload = dir.path().join("payload.bin");
        std::fs::write(&payload, b"abc").unwrap();
        let sha = cas::put_file(&repo_root, &payload).unwrap();

        let record = Rec {
            status: Status::Ok,
            job: "jobOK".to_string(),
            payload: "payload.bin".to_string(),
            sha256: sha.clone(),
            bytes: 3,
            stored_at: 1,
            reason: None,
        };
        record.write(&repo_root).unwrap();

        assert_eq!(verify_job(&repo_root, "jobOK").unwrap(), VerifyOutcome::Ok);

        std::fs::write(cas::object_path(&repo_root, &sha), b"zzz").unwrap();
        let err = verify_job(&repo_root, "jobOK").unwrap_err();
        assert_eq!(err.kind(), crate::error::ExitKind::Integrity);
        assert_eq!(err.to_string(), "sha256 mismatch");
    }

    #[test]
    fn verify_job_skips_non_ok_record() {
        let dir = tempdir().unwrap();
        let repo_root = dir.path().join("repo");
        let record = Rec {
            status: Status::Fail,
            job: "jobBAD".to_string(),
            payload: "payload.bin".to_string(),
            sha256: String::new(),
            bytes: 0,
            stored_at: 0,
            reason: Some("x".to_string()),
        };
        record.write(&repo_root).unwrap();

        assert_eq!(verify_job(&repo_root, "jobBAD").unwrap(), VerifyOutcome::Skip);
    }
}
