//! Filesystem primitives: existence, atomic rename, recursive mkdir/rm,
//! directory listing, and an advisory-locked read/write pair for the
//! event-log sinks.
//!
//! Grounded on `os/fs.h` for the operation contracts, and on
//! `src/fs/locking.rs` (the teacher's TOCTOU-safe `fs2`-based write path)
//! for the advisory-locking idiom used by `locked_append`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, TablinumError};

pub fn exists(path: &Path) -> bool {
    path.exists()
}

pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// Create a single directory; success if it already exists as a
/// directory, failure if it exists as something else.
pub fn mkdir_one(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(TablinumError::io(
            path,
            io::Error::new(io::ErrorKind::AlreadyExists, "exists and is not a directory"),
        ));
    }
    fs::create_dir(path).map_err(|e| TablinumError::io(path, e))
}

/// Create every intermediate component, idempotent.
pub fn mkdir_p(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| TablinumError::io(path, e))?;
    Ok(())
}

/// Atomic rename. When `replace` is false, fails if `dst` already exists
/// (best-effort pre-check plus reliance on the platform's own rename
/// semantics to resolve the race; this mirrors the guarantee the spool
/// state machine depends on).
pub fn rename_atomic(src: &Path, dst: &Path, replace: bool) -> Result<()> {
    if !replace && dst.exists() {
        return Err(TablinumError::io(
            dst,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
        ));
    }
    fs::rename(src, dst).map_err(|e| TablinumError::io(src, e))
}

/// Truncating write. Acceptable for metadata the caller regenerates on
/// retry; CAS placement uses `put_via_temp_rename` below instead.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| TablinumError::io(path, e))
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| TablinumError::io(path, e))
}

/// Non-recursive listing, skipping `.`/`..` implicitly (readdir never
/// yields those).
pub fn list_dir(path: &Path) -> Result<Vec<(String, PathBuf, bool)>> {
    let mut out = Vec::new();
    let rd = fs::read_dir(path).map_err(|e| TablinumError::io(path, e))?;
    for entry in rd {
        let entry = entry.map_err(|e| TablinumError::io(path, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let full = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        out.push((name, full, is_dir));
    }
    Ok(out)
}

/// Best-effort recursive delete.
pub fn rm_rf(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if path.is_dir() {
        let _ = fs::remove_dir_all(path);
    } else {
        let _ = fs::remove_file(path);
    }
    Ok(())
}

/// Copy `src` through a temp sibling of `dst`, then atomically rename
/// into place. Used by CAS placement so partial objects never appear at
/// the final path. `tmp_suffix` should be unique per writer (a pid or a
/// monotonically increasing counter).
pub fn put_via_temp_rename(src: &Path, dst: &Path, tmp_suffix: &str) -> Result<()> {
    if dst.exists() {
        return Ok(());
    }
    let parent = dst.parent().unwrap_or_else(|| Path::new("."));
    mkdir_p(parent)?;

    let file_name = dst
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("object");
    let tmp_path = parent.join(format!("{file_name}.tmp.{tmp_suffix}"));

    let copy_result = fs::copy(src, &tmp_path).map_err(|e| TablinumError::io(src, e));
    if let Err(e) = copy_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    match rename_atomic(&tmp_path, dst, false) {
        Ok(()) => Ok(()),
        Err(_) if dst.exists() => {
            // Another racer won; drop our temp and treat as success.
            let _ = fs::remove_file(&tmp_path);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

/// Process id, best-effort, for temp-file naming during CAS placement.
pub fn pid() -> u32 {
    std::process::id()
}

/// TOCTOU-safe append under an exclusive advisory lock: open without
/// truncating, take the lock, seek to end, append, flush. Used by the
/// event-log sinks so concurrent processes sharing a repo don't
/// interleave partial lines.
pub fn locked_append(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;
    file.lock_exclusive()?;
    let result = (|| {
        file.seek(SeekFrom::End(0))?;
        file.write_all(line.as_bytes())?;
        file.flush()
    })();
    let _ = file.unlock();
    result
}

/// Read the last up to `max_bytes` of a file, for tailing the audit log
/// to find the previous chained hash without reading the whole file.
pub fn tail_bytes(path: &Path, max_bytes: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mkdir_p_then_mkdir_one_idempotent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        mkdir_p(&nested).unwrap();
        assert!(nested.is_dir());
        mkdir_one(&nested).unwrap();
    }

    #[test]
    fn rename_atomic_refuses_clobber_without_replace() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"a").unwrap();
        fs::write(&dst, b"b").unwrap();
        assert!(rename_atomic(&src, &dst, false).is_err());
    }

    #[test]
    fn put_via_temp_rename_no_tmp_sibling_left() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("payload");
        fs::write(&src, b"hello").unwrap();
        let dst = dir.path().join("objects").join("object");
        put_via_temp_rename(&src, &dst, "1").unwrap();
        assert!(dst.exists());
        let leftovers: Vec<_> = list_dir(dst.parent().unwrap())
            .unwrap()
            .into_iter()
            .filter(|(name, _, _)| name.contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn put_via_temp_rename_idempotent_on_existing() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("payload");
        fs::write(&src, b"hello").unwrap();
        let dst = dir.path().join("object");
        put_via_temp_rename(&src, &dst, "1").unwrap();
        put_via_temp_rename(&src, &dst, "2").unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"hello");
    }

    #[test]
    fn locked_append_appends_without_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        locked_append(&path, "line1\n").unwrap();
        locked_append(&path, "line2\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "line1\nline2\n");
    }

    #[test]
    fn rm_rf_missing_path_is_ok() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(rm_rf(&missing).is_ok());
    }
}
