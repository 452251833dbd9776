//! Events & audit: three best-effort sinks sharing an `EventSink`
//! capability, plus chain-verification for the ops audit log.
//!
//! Grounded on `core/events.h` and `core/audit.h`, with two deliberate
//! deviations from the literal C source (both documented as resolved
//! Open Questions in `SPEC_FULL.md` §9): every sink here is best-effort
//! (the original's legacy-log write was not), and canonical line values
//! are sanitized before being written (the original never sanitized).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, TablinumError};
use crate::fs as tfs;
use crate::sha256::{digest_hex, is_valid_hex64};

pub fn zero_hash() -> String {
    "0".repeat(64)
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if (c as u32) <= 0x20 || c == '=' { '_' } else { c })
        .collect()
}

/// An append-only destination for canonical event lines. The legacy and
/// per-job sinks are plain appends; the ops-audit sink wraps the
/// canonical line with a chained hash before delegating to the same
/// append primitive.
pub trait EventSink {
    fn append_line(&self, line: &str) -> std::io::Result<()>;
}

struct PlainFileSink {
    path: PathBuf,
}

impl EventSink for PlainFileSink {
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        tfs::locked_append(&self.path, line)
    }
}

/// Build the canonical `ts=... event=... [job=...] [status=...]
/// [sha256=...] [reason=...]` payload, with every value sanitized.
pub fn build_canonical(
    ts: u64,
    event: &str,
    job: Option<&str>,
    status: Option<&str>,
    sha256: Option<&str>,
    reason: Option<&str>,
) -> String {
    let mut s = format!("ts={} event={}", ts, sanitize(event));
    if let Some(job) = job {
        s.push_str(" job=");
        s.push_str(&sanitize(job));
    }
    if let Some(status) = status {
        s.push_str(" status=");
        s.push_str(&sanitize(status));
    }
    if let Some(sha256) = sha256 {
        s.push_str(" sha256=");
        s.push_str(&sanitize(sha256));
    }
    if let Some(reason) = reason {
        s.push_str(" reason=");
        s.push_str(&sanitize(reason));
    }
    s
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Read the last chained hash from `path` by tailing its final 4 KiB.
/// Returns 64 zeros if there is no file or no valid previous line.
fn read_last_hash(path: &Path) -> String {
    let Ok(tail) = tfs::tail_bytes(path, 4096) else {
        return zero_hash();
    };
    let text = String::from_utf8_lossy(&tail);
    let Some(last_line) = text.lines().filter(|l| !l.is_empty()).next_back() else {
        return zero_hash();
    };
    let Some(pos) = last_line.find("hash=") else {
        return zero_hash();
    };
    let candidate = &last_line[pos + "hash=".len()..];
    let hash_field: String = candidate.chars().take(64).collect();
    if is_valid_hex64(&hash_field) {
        hash_field
    } else {
        zero_hash()
    }
}

/// Append one event to all three sinks rooted at `repo_root`. Every sink
/// write is best-effort: failures are swallowed here and never surface
/// to the caller, matching the primary-operation-must-not-fail contract.
#[allow(clippy::too_many_arguments)]
pub fn events_append(
    repo_root: &Path,
    event: &str,
    job: Option<&str>,
    status: Option<&str>,
    sha256: Option<&str>,
    reason: Option<&str>,
) {
    let ts = now_unix();
    let canonical = build_canonical(ts, event, job, status, sha256, reason);
    let line = format!("{canonical}\n");

    let legacy = PlainFileSink {
        path: repo_root.join("events.log"),
    };
    let _ = legacy.append_line(&line);

    if let Some(job) = job {
        let per_job = PlainFileSink {
            path: repo_root.join("jobs").join(job).join("events.log"),
        };
        let _ = per_job.append_line(&line);
    }

    let audit_path = repo_root.join("audit").join("ops.log");
    let prev = read_last_hash(&audit_path);
    let hash = canonical_hash(&prev, &canonical);
    let audit_line = format!("prev={prev} hash={hash} {canonical}\n");
    let audit_sink = PlainFileSink { path: audit_path };
    let _ = audit_sink.append_line(&audit_line);
}

#[derive(Debug)]
pub struct AuditBreak {
    pub line_no: usize,
    pub reason: String,
}

/// Replay the hash chain in `<repo>/audit/ops.log`. Returns `Ok(())` if
/// the whole chain verifies, or the first detected break.
pub fn verify_audit(repo_root: &Path) -> Result<()> {
    let path = repo_root.join("audit").join("ops.log");
    if !path.is_file() {
        return Err(TablinumError::not_found(format!(
            "audit log not found at {}",
            path.display()
        )));
    }
    let text = tfs::read_to_string(&path)?;

    let mut expected_prev = zero_hash();

    if !text.is_empty() && !text.ends_with('\n') {
        let line_no = text.matches('\n').count() + 1;
        return Err(TablinumError::integrity(format!(
            "audit integrity: line {line_no}: missing LF"
        )));
    }

    let mut lines: Vec<&str> = text.split('\n').collect();
    // A trailing newline produces a spurious empty final "line"; drop it.
    if text.ends_with('\n') {
        lines.pop();
    }

    for (idx, raw_line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        if raw_line.is_empty() {
            return Err(TablinumError::integrity(format!(
                "audit integrity: line {line_no}: empty line"
            )));
        }
        if raw_line.contains('\r') {
            return Err(TablinumError::integrity(format!(
                "audit integrity: line {line_no}: CR found (LF-only required)"
            )));
        }

        let rest = raw_line.strip_prefix("prev=").ok_or_else(|| {
            TablinumError::integrity(format!(
                "audit integrity: line {line_no}: missing prev= field"
            ))
        })?;
        if rest.len() < 64 {
            return Err(TablinumError::integrity(format!(
                "audit integrity: line {line_no}: prev field too short"
            )));
        }
        let (prev, rest) = rest.split_at(64);
        if !is_valid_hex64(prev) {
            return Err(TablinumError::integrity(format!(
                "audit integrity: line {line_no}: prev is not 64 lowercase hex chars"
            )));
        }
        let rest = rest
            .strip_prefix(" hash=")
            .ok_or_else(|| TablinumError::integrity(format!(
                "audit integrity: line {line_no}: missing hash= field"
            )))?;
        if rest.len() < 64 {
            return Err(TablinumError::integrity(format!(
                "audit integrity: line {line_no}: hash field too short"
            )));
        }
        let (hash, canonical) = rest.split_at(64);
        if !is_valid_hex64(hash) {
            return Err(TablinumError::integrity(format!(
                "audit integrity: line {line_no}: hash is not 64 lowercase hex chars"
            )));
        }
        let canonical = canonical.strip_prefix(' ').ok_or_else(|| {
            TablinumError::integrity(format!(
                "audit integrity: line {line_no}: missing canonical payload"
            ))
        })?;

        if !canonical.starts_with("ts=") || !canonical.contains(" event=") {
            return Err(TablinumError::integrity(format!(
                "audit integrity: line {line_no}: malformed canonical payload"
            )));
        }

        if prev != expected_prev {
            return Err(TablinumError::integrity(format!(
                "audit integrity: line {line_no}: prev mismatch"
            )));
        }

        let recomputed = canonical_hash(prev, canonical);
        if recomputed != hash {
            return Err(TablinumError::integrity(format!(
                "audit integrity: line {line_no}: hash mismatch"
            )));
        }

        expected_prev = hash.to_string();
    }

    Ok(())
}

pub fn canonical_hash(prev: &str, canonical: &str) -> String {
    digest_hex(format!("{prev}\n{canonical}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_replaces_control_and_equals() {
        assert_eq!(sanitize("a=b c"), "a_b_c");
    }

    #[test]
    fn first_event_chains_from_zero_hash() {
        let dir = tempdir().unwrap();
        events_append(dir.path(), "ingest.ok", Some("job1"), Some("ok"), None, None);
        let audit = tfs::read_to_string(&dir.path().join("audit").join("ops.log")).unwrap();
        assert!(audit.starts_with(&format!("prev={}", zero_hash())));
    }

    #[test]
    fn legacy_and_per_job_and_audit_all_written() {
        let dir = tempdir().unwrap();
        events_append(dir.path(), "ingest.ok", Some("job1"), Some("ok"), None, None);
        assert!(dir.path().join("events.log").is_file());
        assert!(dir.path().join("jobs/job1/events.log").is_file());
        assert!(dir.path().join("audit/ops.log").is_file());
    }

    #[test]
    fn verify_audit_ok_on_untampered_chain() {
        let dir = tempdir().unwrap();
        events_append(dir.path(), "e1", None, None, None, None);
        events_append(dir.path(), "e2", None, None, None, None);
        verify_audit(dir.path()).unwrap();
    }

    #[test]
    fn verify_audit_detects_tampered_canonical() {
        let dir = tempdir().unwrap();
        events_append(dir.path(), "e1", None, None, None, None);
        events_append(dir.path(), "e2", None, None, None, None);

        let audit_path = dir.path().join("audit").join("ops.log");
        let original = tfs::read_to_string(&audit_path).unwrap();
        let mut lines: Vec<&str> = original.lines().collect();
        let tampered_second = lines[1].replacen("e2", "tampered", 1);
        lines[1] = &tampered_second;
        let tampered = lines.join("\n") + "\n";
        tfs::write_file(&audit_path, tampered.as_bytes()).unwrap();

        let err = verify_audit(dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ExitKind::Integrity);
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn verify_audit_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = verify_audit(dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ExitKind::NotFound);
    }

    #[test]
    fn verify_audit_rejects_dangling_unterminated_line() {
        let dir = tempdir().unwrap();
        events_append(dir.path(), "e1", None, None, None, None);

        let audit_path = dir.path().join("audit").join("ops.log");
        let original = tfs::read_to_string(&audit_path).unwrap();
        let truncated = original.trim_end_matches('\n').to_string();
        tfs::write_file(&audit_path, truncated.as_bytes()).unwrap();

        let err = verify_audit(dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ExitKind::Integrity);
        assert!(err.to_string().contains("missing LF"));
    }
}
