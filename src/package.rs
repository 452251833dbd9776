//! Package build: AIP/SIP layout, filtered events, deterministic
//! manifest.
//!
//! Grounded on `core/package.h`.

use std::path::Path;

use crate::cas;
use crate::error::{Result, TablinumError};
use crate::fs as tfs;
use crate::record::{Record, Status};
use crate::sha256::digest_hex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Aip,
    Sip,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Aip => "aip",
            Kind::Sip => "sip",
        }
    }

    pub fn parse(s: &str) -> Option<Kind> {
        match s {
            "aip" => Some(Kind::Aip),
            "sip" => Some(Kind::Sip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventsSource {
    Job,
    Legacy,
}

impl EventsSource {
    pub fn as_str(self) -> &'static str {
        match self {
            EventsSource::Job => "job",
            EventsSource::Legacy => "legacy",
        }
    }
}

pub fn tool_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build the package directory tree at `out_dir` for `jobid`'s record in
/// `repo_root`.
pub fn build(repo_root: &Path, jobid: &str, out_dir: &Path, kind: Kind) -> Result<()> {
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

    let metadata_dir = out_dir.join("metadata");
    let data_dir = out_dir.join("representations/rep0/data");
    tfs::mkdir_p(&metadata_dir)?;
    tfs::mkdir_p(&data_dir)?;

    let payload_dst = data_dir.join(&record.payload);
    std::fs::copy(&object_path, &payload_dst).map_err(|e| TablinumError::io(&payload_dst, e))?;

    let record_src = crate::record::record_path(repo_root, jobid);
    let record_dst = metadata_dir.join("record.ini");
    std::fs::copy(&record_src, &record_dst).map_err(|e| TablinumError::io(&record_dst, e))?;

    let events_source = materialize_events(repo_root, jobid, &metadata_dir)?;

    let created_utc = if record.stored_at != 0 {
        record.stored_at
    } else {
        crate::events::now_unix() as u32
    };

    let mut package_ini = String::new();
    package_ini.push_str("[package]\n");
    package_ini.push_str("schema_version = 1\n");
    package_ini.push_str(&format!("kind = {}\n", kind.as_str()));
    package_ini.push_str(&format!("jobid = {jobid}\n"));
    package_ini.push_str(&format!("created_utc = {created_utc}\n"));
    package_ini.push_str(&format!("events_source = {}\n", events_source.as_str()));
    package_ini.push_str(&format!("tool_version = {}\n", tool_version()));
    let package_ini_dst = metadata_dir.join("package.ini");
    tfs::write_file(&package_ini_dst, package_ini.as_bytes())?;

    let payload_rel = format!("representations/rep0/data/{}", record.payload);
    let record_rel = "metadata/record.ini";
    let package_rel = "metadata/package.ini";
    let events_rel = "metadata/events.log";

    let payload_hash = digest_hex(&read(&out_dir.join(&payload_rel))?);
    let record_hash = digest_hex(&read(&out_dir.join(record_rel))?);
    let package_hash = digest_hex(&read(&out_dir.join(package_rel))?);
    let events_hash = digest_hex(&read(&out_dir.join(events_rel))?);

    let manifest = format!(
        "{payload_hash}  {payload_rel}\n{record_hash}  {record_rel}\n{package_hash}  {package_rel}\n{events_hash}  {events_rel}\n"
    );
    tfs::write_file(&metadata_dir.join("manifest-sha256.txt"), manifest.as_bytes())?;

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| TablinumError::io(path, e))
}

/// Prefer the per-job events stream (CR stripped); otherwise filter the
/// legacy stream for lines belonging to this job; otherwise an empty
/// file.
fn materialize_events(repo_root: &Path, jobid: &str, metadata_dir: &Path) -> Result<EventsSource> {
    let dst = metadata_dir.join("events.log");
    let per_job = repo_root.join("jobs").join(jobid).join("events.log");

    if per_job.is_file() {
        let content = tfs::read_to_string(&per_job)?;
        let stripped: String = content.chars().filter(|&c| c != '\r').collect();
        tfs::write_file(&dst, stripped.as_bytes())?;
        return Ok(EventsSource::Job);
    }

    let legacy = repo_root.join("events.log");
    if legacy.is_file() {
        let content = tfs::read_to_string(&legacy)?;
        let needle_prefix = format!("job={jobid}");
        let filtered: String = content
            .lines()
            .filter(|line| {
                line.starts_with(&needle_prefix) || line.contains(&format!(" {needle_prefix}"))
            })
            .map(|line| format!("{line}\n"))
            .collect();
        tfs::write_file(&dst, filtered.as_bytes())?;
        return Ok(EventsSource::Legacy);
    }

    tfs::write_file(&dst, b"")?;
    Ok(EventsSource::Legacy)
}
