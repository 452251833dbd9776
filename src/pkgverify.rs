//! Package verify (strict, ordered checks) and package ingest
//! (verify -> CAS put -> record write -> event).
//!
//! Grounded on `core/pkgverify.h`.

use std::path::Path;

use crate::cas;
use crate::error::{Result, TablinumError};
use crate::events::events_append;
use crate::fs as tfs;
use crate::ini;
use crate::record::{is_safe_payload_name, Record, Status};
use crate::sha256::{digest_hex, is_valid_hex64};

const REQUIRED_PACKAGE_KEYS: &[&str] = &["schema_version", "kind", "jobid", "created_utc", "tool_version"];
const OPTIONAL_PACKAGE_KEYS: &[&str] = &["tool_commit", "events_source"];
const MANIFEST_ORDER_SUFFIXES: &[&str] = &[
    "metadata/record.ini",
    "metadata/package.ini",
    "metadata/events.log",
];

struct PackageIni {
    jobid: String,
}

/// Run every check of §4.11 in order; the first failure's kind is
/// returned.
pub fn verify_package(pkg_dir: &Path) -> Result<()> {
    if !pkg_dir.is_dir() {
        return Err(TablinumError::not_found(format!(
            "package dir not found: {}",
            pkg_dir.display()
        )));
    }

    let metadata_dir = pkg_dir.join("metadata");
    let data_dir = pkg_dir.join("representations/rep0/data");
    if !metadata_dir.is_dir() || !data_dir.is_dir() {
        return Err(TablinumError::schema(
            "missing metadata/ or representations/rep0/data/ directory".to_string(),
        ));
    }

    let record_path = metadata_dir.join("record.ini");
    let package_path = metadata_dir.join("package.ini");
    let events_path = metadata_dir.join("events.log");
    let manifest_path = metadata_dir.join("manifest-sha256.txt");
    for p in [&record_path, &package_path, &events_path, &manifest_path] {
        if !p.is_file() {
            return Err(TablinumError::schema(format!(
                "missing required metadata file: {}",
                p.display()
            )));
        }
    }

    for p in [&record_path, &package_path, &events_path, &manifest_path] {
        let bytes = std::fs::read(p).map_err(|e| TablinumError::io(p, e))?;
        if bytes.contains(&b'\r') {
            return Err(TablinumError::schema(format!(
                "CR found (LF-only required): {}",
                p.display()
            )));
        }
    }

    let package_ini = parse_package_ini(&package_path)?;

    let record_text = tfs::read_to_string(&record_path)?;
    let record_entries = ini::parse(&record_text)
        .map_err(|e| TablinumError::schema(format!("record.ini: {e}")))?;
    let record_job = record_entries
        .iter()
        .find(|e| e.key == "job")
        .map(|e| e.value.clone())
        .unwrap_or_default();
    if record_job != package_ini.jobid {
        return Err(TablinumError::integrity(
            "record.job does not match package.ini jobid".to_string(),
        ));
    }

    let record = parse_record_fields(&record_entries)?;

    if !is_safe_payload_name(&record.payload) {
        return Err(TablinumError::schema(
            "record.payload is empty or unsafe".to_string(),
        ));
    }
    let payload_path = data_dir.join(&record.payload);
    if !payload_path.is_file() {
        return Err(TablinumError::not_found(format!(
            "payload not found: {}",
            payload_path.display()
        )));
    }

    let payload_bytes = std::fs::read(&payload_path).map_err(|e| TablinumError::io(&payload_path, e))?;
    let payload_hash = digest_hex(&payload_bytes);
    if payload_hash != record.sha256 {
        return Err(TablinumError::integrity(
            "payload hash does not match record.sha256".to_string(),
        ));
    }

    let record_hash = digest_hex(&std::fs::read(&record_path).map_err(|e| TablinumError::io(&record_path, e))?);
    let package_hash = digest_hex(&std::fs::read(&package_path).map_err(|e| TablinumError::io(&package_path, e))?);
    let events_hash = digest_hex(&std::fs::read(&events_path).map_err(|e| TablinumError::io(&events_path, e))?);

    let manifest_text = tfs::read_to_string(&manifest_path)?;
    verify_manifest(&manifest_text, &record.payload, payload_hash, record_hash, package_hash, events_hash)?;

    Ok(())
}

fn parse_package_ini(path: &Path) -> Result<PackageIni> {
    let text = tfs::read_to_string(path)?;
    let entries = ini::parse(&text).map_err(|e| TablinumError::schema(format!("package.ini: {e}")))?;

    let mut sections = std::collections::BTreeSet::new();
    let mut map = std::collections::BTreeMap::new();
    for e in &entries {
        sections.insert(e.section.clone());
        if map.insert(e.key.clone(), e.value.clone()).is_some() {
            return Err(TablinumError::schema(format!(
                "package.ini: duplicate key {}",
                e.key
            )));
        }
    }
    if sections.len() != 1 || !sections.contains("package") {
        return Err(TablinumError::schema(
            "package.ini: expected exactly one [package] section".to_string(),
        ));
    }

    for key in map.keys() {
        if !REQUIRED_PACKAGE_KEYS.contains(&key.as_str()) && !OPTIONAL_PACKAGE_KEYS.contains(&key.as_str())
        {
            return Err(TablinumError::schema(format!(
                "package.ini: unknown key {key}"
            )));
        }
    }
    for key in REQUIRED_PACKAGE_KEYS {
        if !map.contains_key(*key) {
            return Err(TablinumError::schema(format!(
                "package.ini: missing required key {key}"
            )));
        }
    }

    if map.get("schema_version").map(String::as_str) != Some("1") {
        return Err(TablinumError::schema(
            "package.ini: schema_version must be 1".to_string(),
        ));
    }
    let kind = map.get("kind").cloned().unwrap_or_default();
    if kind != "aip" && kind != "sip" {
        return Err(TablinumError::schema(
            "package.ini: kind must be aip or sip".to_string(),
        ));
    }
    if let Some(source) = map.get("events_source") {
        if source != "job" && source != "legacy" {
            return Err(TablinumError::schema(
                "package.ini: events_source must be job or legacy".to_string(),
            ));
        }
    }

    Ok(PackageIni {
        jobid: map.get("jobid").cloned().unwrap_or_default(),
    })
}

fn parse_record_fields(entries: &[ini::Entry]) -> Result<Record> {
    let mut status = None;
    let mut job = None;
    let mut payload = None;
    let mut sha256 = None;
    let mut bytes = None;
    let mut stored_at = None;

    for e in entries {
        match e.key.as_str() {
            "status" => status = Some(crate::record::Status::parse(&e.value)),
            "job" => job = Some(e.value.clone()),
            "payload" => payload = Some(e.value.clone()),
            "sha256" => sha256 = Some(e.value.clone()),
            "bytes" => bytes = Some(e.value.clone()),
            "stored_at" => stored_at = Some(e.value.clone()),
            _ => {}
        }
    }

    let sha256 = sha256.unwrap_or_default();
    if !sha256.is_empty() && !is_valid_hex64(&sha256) {
        return Err(TablinumError::schema(
            "record.ini: sha256 is not 64 lowercase hex chars".to_string(),
        ));
    }

    Ok(Record {
        status: status.unwrap_or(Status::Unknown),
        job: job.unwrap_or_default(),
        payload: payload.unwrap_or_default(),
        sha256,
        bytes: bytes.and_then(|v| crate::safe::parse_u32(&v).ok()).unwrap_or(0),
        stored_at: stored_at.and_then(|v| crate::safe::parse_u32(&v).ok()).unwrap_or(0),
        reason: None,
    })
}

#[allow(clippy::too_many_arguments)]
fn verify_manifest(
    manifest_text: &str,
    payload_name: &str,
    payload_hash: String,
    record_hash: String,
    package_hash: String,
    events_hash: String,
) -> Result<()> {
    let lines: Vec<&str> = manifest_text.lines().collect();
    if lines.len() != 4 {
        return Err(TablinumError::integrity(
            "manifest must have exactly four lines".to_string(),
        ));
    }

    let payload_rel = format!("representations/rep0/data/{payload_name}");
    let expected_order = [
        (payload_rel.as_str(), payload_hash),
        (MANIFEST_ORDER_SUFFIXES[0], record_hash),
        (MANIFEST_ORDER_SUFFIXES[1], package_hash),
        (MANIFEST_ORDER_SUFFIXES[2], events_hash),
    ];

    for (i, line) in lines.iter().enumerate() {
        let (expected_rel, expected_hash) = &expected_order[i];
        let (hash, relpath) = parse_manifest_line(line)?;
        if relpath.starts_with('/') || relpath.contains('\\') || relpath.split('/').any(|seg| seg == "..") {
            return Err(TablinumError::integrity(format!(
                "manifest line {}: unsafe relative path",
                i + 1
            )));
        }
        if &relpath != expected_rel {
            return Err(TablinumError::integrity(format!(
                "manifest order/path mismatch at line {}",
                i + 1
            )));
        }
        if hash != *expected_hash {
            return Err(TablinumError::integrity(format!(
                "manifest hash mismatch at line {}",
                i + 1
            )));
        }
    }

    Ok(())
}

fn parse_manifest_line(line: &str) -> Result<(String, String)> {
    if line.len() < 66 {
        return Err(TablinumError::integrity("malformed manifest line".to_string()));
    }
    let (hash, rest) = line.split_at(64);
    if !is_valid_hex64(hash) {
        return Err(TablinumError::integrity(
            "manifest hash is not 64 lowercase hex chars".to_string(),
        ));
    }
    let relpath = rest
        .strip_prefix("  ")
        .ok_or_else(|| TablinumError::integrity("malformed manifest line separator".to_string()))?;
    Ok((hash.to_string(), relpath.to_string()))
}

/// Verify, then put the representation payload into the local CAS,
/// write the record, and append an `ingest-package.ok` audit event.
pub fn ingest_package(pkg_dir: &Path, repo_root: &Path) -> Result<()> {
    verify_package(pkg_dir)?;

    let metadata_dir = pkg_dir.join("metadata");
    let record_text = tfs::read_to_string(&metadata_dir.join("record.ini"))?;
    let entries = ini::parse(&record_text).map_err(|e| TablinumError::schema(format!("record.ini: {e}")))?;
    let record = parse_record_fields(&entries)?;

    let payload_path = pkg_dir
        .join("representations/rep0/data")
        .join(&record.payload);

    let digest = cas::put_file(repo_root, &payload_path)?;
    if digest != record.sha256 {
        return Err(TablinumError::integrity(
            "CAS put digest does not match record.sha256".to_string(),
        ));
    }

    record.write(repo_root)?;

    events_append(
        repo_root,
        "ingest-package.ok",
        Some(&record.job),
        Some("ok"),
        Some(&digest),
        None,
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{self, Kind};
    use tempfile::tempdir;

    fn setup_package(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let repo_root = dir.join("repo");
        let payload = dir.join("payload.bin");
        std::fs::write(&payload, b"hello tablinum\n").unwrap();
        let sha = cas::put_file(&repo_root, &payload).unwrap();

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

        let pkg_dir = dir.join("pkg");
        package::build(&repo_root, "job1", &pkg_dir, Kind::Aip).unwrap();
        (repo_root, pkg_dir)
    }

    #[test]
    fn verify_package_accepts_freshly_built_package() {
        let dir = tempdir().unwrap();
        let (_repo, pkg_dir) = setup_package(dir.path());
        verify_package(&pkg_dir).unwrap();
    }

    #[test]
    fn verify_package_rejects_manifest_order_violation() {
        let dir = tempdir().unwrap();
        let (_repo, pkg_dir) = setup_package(dir.path());

        let manifest_path = pkg_dir.join("metadata/manifest-sha256.txt");
        let manifest = std::fs::read_to_string(&manifest_path).unwrap();
        let mut lines: Vec<&str> = manifest.lines().collect();
        lines.swap(0, 1);
        let reordered = lines.join("\n") + "\n";
        std::fs::write(&manifest_path, reordered).unwrap();

        let err = verify_package(&pkg_dir).unwrap_err();
        assert_eq!(err.kind(), crate::error::ExitKind::Integrity);
    }

    #[test]
    fn ingest_package_round_trip_into_fresh_repo() {
        let dir = tempdir().unwrap();
        let (_repo_a, pkg_dir) = setup_package(dir.path());

        let repo_b = dir.path().join("repo_b");
        ingest_package(&pkg_dir, &repo_b).unwrap();

        let record = Record::read(&repo_b, "job1").unwrap();
        assert_eq!(record.status, Status::Ok);
        assert!(cas::object_exists(&repo_b, &record.sha256));
    }
}
