//! Spool state machine: inbox -> claim -> out/fail via atomic rename.
//!
//! Grounded on `core/spool.h`, with the claim step widened to operate on
//! directories (jobdirs), matching `ingest.h`'s `claim_next_dir` caller and
//! the data model's definition of a job as a directory.

use std::path::{Path, PathBuf};

use crate::error::{Result, TablinumError};
use crate::fs as tfs;

pub struct Spool {
    pub root: PathBuf,
    pub inbox: PathBuf,
    pub claim: PathBuf,
    pub out: PathBuf,
    pub fail: PathBuf,
}

impl Spool {
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let inbox = root.join("inbox");
        let claim = root.join("claim");
        let out = root.join("out");
        let fail = root.join("fail");

        for dir in [&root, &inbox, &claim, &out, &fail] {
            tfs::mkdir_p(dir)?;
        }

        Ok(Spool {
            root,
            inbox,
            claim,
            out,
            fail,
        })
    }

    /// Enumerate `inbox` and attempt to rename each directory entry into
    /// `claim/<name>`, stopping at the first success. The rename is the
    /// lock: exactly one racer wins a given name. Returns `None` if
    /// enumeration finishes without a successful rename (`ENOJOB`).
    pub fn claim_next(&self) -> Result<Option<String>> {
        let entries = tfs::list_dir(&self.inbox)?;
        for (name, full_path, is_dir) in entries {
            if !is_dir {
                continue;
            }
            let dst = self.claim.join(&name);
            match tfs::rename_atomic(&full_path, &dst, false) {
                Ok(()) => return Ok(Some(name)),
                Err(_) => continue,
            }
        }
        Ok(None)
    }

    pub fn claimed_dir(&self, name: &str) -> PathBuf {
        self.claim.join(name)
    }

    pub fn commit_out(&self, name: &str) -> Result<()> {
        let src = self.claim.join(name);
        let dst = self.out.join(name);
        tfs::rename_atomic(&src, &dst, false)
    }

    pub fn commit_fail(&self, name: &str) -> Result<()> {
        let src = self.claim.join(name);
        let dst = self.fail.join(name);
        tfs::rename_atomic(&src, &dst, false)
    }
}

/// Write the sidecar `job.meta` into a claimed jobdir.
pub fn write_job_meta(jobdir: &Path, contents: &str) -> Result<()> {
    tfs::write_file(&jobdir.join("job.meta"), contents.as_bytes())
}

pub fn payload_path(jobdir: &Path) -> PathBuf {
    jobdir.join("payload.bin")
}
