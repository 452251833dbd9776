//! Durable per-job record: `<repo>/records/<jobid>.ini`.
//!
//! Grounded on `core/record.h`. The writer in this implementation always
//! produces a bare-basename `payload` (no separators, no `..`), resolving
//! the Open Question the distilled specification raised about whether the
//! record writer should enforce that shape itself.

use std::path::{Path, PathBuf};

use crate::error::{Result, TablinumError};
use crate::fs as tfs;
use crate::ini;
use crate::path;
use crate::safe::to_dec;
use crate::sha256::is_valid_hex64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Fail,
    Unknown,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Fail => "fail",
            Status::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Status {
        match s {
            "ok" => Status::Ok,
            "fail" => Status::Fail,
            _ => Status::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Record {
    pub status: Status,
    pub job: String,
    pub payload: String,
    pub sha256: String,
    pub bytes: u32,
    pub stored_at: u32,
    pub reason: Option<String>,
}

/// A job id is safe when it contains no control bytes (<0x20), no path
/// separators, no drive-colon, and no `..` substring.
pub fn is_safe_id(id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    if id.bytes().any(|b| b < 0x20 || b == b'/' || b == b'\\' || b == b':') {
        return false;
    }
    if id.contains("..") {
        return false;
    }
    true
}

/// A record's `payload` field must be a bare basename: no separators, no
/// `..`.
pub fn is_safe_payload_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

/// Joins go through `path::join_path` rather than `Path::join` directly,
/// per the overflow-safe-join contract; job ids are bounded either by
/// `is_safe_id` at the CLI boundary or by the filesystem's own name-length
/// limit when sourced from a spool directory entry, so the join cannot
/// realistically fail here.
pub fn record_path(repo_root: &Path, jobid: &str) -> PathBuf {
    let records_dir = path::join_path(repo_root, "records").expect("fixed short segment");
    path::join_path(&records_dir, &format!("{jobid}.ini")).expect("job id within path ceiling")
}

impl Record {
    pub fn write(&self, repo_root: &Path) -> Result<()> {
        if !is_safe_id(&self.job) {
            return Err(TablinumError::usage(format!("unsafe job id: {}", self.job)));
        }
        if !is_safe_payload_name(&self.payload) {
            return Err(TablinumError::usage(format!(
                "unsafe payload name: {}",
                self.payload
            )));
        }

        let mut body = String::new();
        body.push_str("status=");
        body.push_str(self.status.as_str());
        body.push('\n');
        body.push_str("job=");
        body.push_str(&self.job);
        body.push('\n');
        body.push_str("payload=");
        body.push_str(&self.payload);
        body.push('\n');
        body.push_str("sha256=");
        body.push_str(&self.sha256);
        body.push('\n');
        body.push_str("bytes=");
        body.push_str(&to_dec(self.bytes));
        body.push('\n');
        body.push_str("stored_at=");
        body.push_str(&to_dec(self.stored_at));
        body.push('\n');
        if let Some(reason) = &self.reason {
            body.push_str("reason=");
            body.push_str(reason);
            body.push('\n');
        }

        let path = record_path(repo_root, &self.job);
        if let Some(parent) = path.parent() {
            tfs::mkdir_p(parent)?;
        }
        tfs::write_file(&path, body.as_bytes())
    }

    pub fn read(repo_root: &Path, jobid: &str) -> Result<Record> {
        let path = record_path(repo_root, jobid);
        if !path.is_file() {
            return Err(TablinumError::not_found(format!(
                "record not found for job {jobid}"
            )));
        }
        let text = tfs::read_to_string(&path)?;
        Self::parse(&text, jobid)
    }

    fn parse(text: &str, jobid: &str) -> Result<Record> {
        let entries = ini::parse(text).map_err(|e| {
            TablinumError::schema(format!("record {jobid}: {e}"))
        })?;

        let mut status = None;
        let mut job = None;
        let mut payload = None;
        let mut sha256 = None;
        let mut bytes = None;
        let mut stored_at = None;
        let mut reason = None;

        // Records written by this implementation have no `[section]`
        // header at all; tolerate flat key=value by treating every entry
        // whose section is empty or "record" as record fields. A file
        // produced elsewhere with an explicit section still round-trips.
        for e in &entries {
            match e.key.as_str() {
                "status" => status = Some(Status::parse(&e.value)),
                "job" => job = Some(e.value.clone()),
                "payload" => payload = Some(e.value.clone()),
                "sha256" => sha256 = Some(e.value.clone()),
                "bytes" => bytes = Some(e.value.clone()),
                "stored_at" => stored_at = Some(e.value.clone()),
                "reason" => reason = Some(e.value.clone()),
                _ => {} // unknown keys ignored on read
            }
        }

        let bytes = bytes
            .map(|v| crate::safe::parse_u32(&v))
            .transpose()
            .map_err(|_| TablinumError::schema(format!("record {jobid}: invalid bytes field")))?
            .unwrap_or(0);
        let stored_at = stored_at
            .map(|v| crate::safe::parse_u32(&v))
            .transpose()
            .map_err(|_| TablinumError::schema(format!("record {jobid}: invalid stored_at field")))?
            .unwrap_or(0);

        let sha256 = sha256.unwrap_or_default();
        if !sha256.is_empty() && !is_valid_hex64(&sha256) && status == Some(Status::Ok) {
            return Err(TablinumError::schema(format!(
                "record {jobid}: sha256 is not 64 lowercase hex chars"
            )));
        }

        Ok(Record {
            status: status.unwrap_or(Status::Unknown),
            job: job.unwrap_or_else(|| jobid.to_string()),
            payload: payload.unwrap_or_default(),
            sha256,
            bytes,
            stored_at,
            reason,
        })
    }
}
