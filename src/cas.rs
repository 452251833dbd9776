//! Content-addressed store: `put_file` plus the deterministic object path.
//!
//! Grounded on `core/cas.h`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{Result, TablinumError};
use crate::fs as tfs;
use crate::path;
use crate::sha256::{to_hex, Sha256};

/// `<repo>/sha256/<h[0:2]>/<h[2:64]>`. Pure function of the hex digest.
///
/// Joins go through `path::join_path` rather than `Path::join` directly, per
/// the overflow-safe-join contract; a 2- or 62-byte hex segment can never
/// approach the length ceiling, so the join cannot fail here.
pub fn object_path(repo_root: &Path, hex_digest: &str) -> PathBuf {
    let with_sha256 = path::join_path(repo_root, "sha256").expect("fixed short segment");
    let with_prefix =
        path::join_path(&with_sha256, &hex_digest[0..2]).expect("fixed short segment");
    path::join_path(&with_prefix, &hex_digest[2..64]).expect("fixed short segment")
}

/// Stream `src_path` through SHA-256, place it in the CAS under
/// `repo_root` via temp-then-rename, and return the hex digest. Idempotent:
/// a second `put_file` for equal content returns the same digest without
/// rewriting the object.
pub fn put_file(repo_root: &Path, src_path: &Path) -> Result<String> {
    let file = File::open(src_path).map_err(|e| TablinumError::io(src_path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| TablinumError::io(src_path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let hex_digest = to_hex(&hasher.finalize());

    let dst = object_path(repo_root, &hex_digest);
    tfs::put_via_temp_rename(src_path, &dst, &tfs::pid().to_string())?;

    Ok(hex_digest)
}

pub fn object_exists(repo_root: &Path, hex_digest: &str) -> bool {
    object_path(repo_root, hex_digest).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn put_file_returns_content_hash() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        let payload = dir.path().join("payload.bin");
        fs::write(&payload, b"abc").unwrap();

        let hex = put_file(&repo, &payload).unwrap();
        assert_eq!(
            hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(object_exists(&repo, &hex));
    }

    #[test]
    fn object_path_splits_first_two_chars() {
        let repo = Path::new("/repo");
        let hex = "ab".to_string() + &"c".repeat(62);
        let p = object_path(repo, &hex);
        assert_eq!(p, Path::new("/repo/sha256/ab").join("c".repeat(62)));
    }

    #[test]
    fn second_put_is_noop_on_object_bytes() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        let payload = dir.path().join("payload.bin");
        fs::write(&payload, b"xyz").unwrap();

        let hex1 = put_file(&repo, &payload).unwrap();
        let obj_path = object_path(&repo, &hex1);
        let mtime1 = fs::metadata(&obj_path).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        let hex2 = put_file(&repo, &payload).unwrap();
        let mtime2 = fs::metadata(&obj_path).unwrap().modified().unwrap();

        assert_eq!(hex1, hex2);
        assert_eq!(mtime1, mtime2);
    }
}
