//! Strict INI-based configuration loader.
//!
//! Grounded on `core/config.h`: unknown sections/keys are rejected, and
//! the `[ingest]` numeric keys are range-checked. Resolution order for the
//! config file path: `--config`, then `TABLINUM_CONFIG`, then
//! `./tablinum.ini`.

use std::path::{Path, PathBuf};

use crate::error::{Result, TablinumError};
use crate::ini;
use crate::safe;

const CORE_KEYS: &[&str] = &["root", "spool", "repo", "db"];
const HTTP_KEYS: &[&str] = &["listen"];
const INGEST_KEYS: &[&str] = &["poll_seconds", "once", "max_jobs"];

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub spool: PathBuf,
    pub repo: PathBuf,
    pub db: PathBuf,
    pub http_listen: String,
    pub ingest_poll_seconds: u32,
    pub ingest_once: bool,
    pub ingest_max_jobs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            root: PathBuf::from("."),
            spool: PathBuf::from("spool"),
            repo: PathBuf::from("repo"),
            db: PathBuf::from("tablinum.db"),
            http_listen: "127.0.0.1:8080".to_string(),
            ingest_poll_seconds: 2,
            ingest_once: false,
            ingest_max_jobs: 0,
        }
    }
}

impl Config {
    /// Resolve `spool`/`repo` against `root` when they are relative.
    pub fn resolved_spool(&self) -> PathBuf {
        resolve(&self.root, &self.spool)
    }

    pub fn resolved_repo(&self) -> PathBuf {
        resolve(&self.root, &self.repo)
    }
}

fn resolve(root: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

/// Resolve the config path from an explicit CLI flag, `TABLINUM_CONFIG`,
/// or the default `./tablinum.ini`. Returns `None` when none of those are
/// set and the default file does not exist (built-in defaults apply).
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = explicit {
        if !p.is_file() {
            return Err(TablinumError::not_found(format!(
                "config file not found: {}",
                p.display()
            )));
        }
        return Ok(Some(p.to_path_buf()));
    }

    if let Ok(env_path) = std::env::var("TABLINUM_CONFIG") {
        let p = PathBuf::from(env_path);
        if !p.is_file() {
            return Err(TablinumError::not_found(format!(
                "config file not found: {}",
                p.display()
            )));
        }
        return Ok(Some(p));
    }

    let default = PathBuf::from("tablinum.ini");
    if default.is_file() {
        return Ok(Some(default));
    }

    Ok(None)
}

/// Load configuration. `explicit` is an optional `--config PATH`. Falls
/// back to built-in defaults when no config file can be found and none
/// was explicitly requested.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = resolve_config_path(explicit)?;
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let text = std::fs::read_to_string(&path).map_err(|e| TablinumError::io(&path, e))?;
    parse_config(&text)
}

fn parse_config(text: &str) -> Result<Config> {
    let entries = ini::parse(text).map_err(|e| TablinumError::schema(e.to_string()))?;

    let mut cfg = Config::default();

    for e in &entries {
        match e.section.as_str() {
            "core" => {
                if !CORE_KEYS.contains(&e.key.as_str()) {
                    return Err(TablinumError::schema(format!(
                        "unknown key [core].{} (line {})",
                        e.key, e.line_no
                    )));
                }
                match e.key.as_str() {
                    "root" => cfg.root = PathBuf::from(&e.value),
                    "spool" => cfg.spool = PathBuf::from(&e.value),
                    "repo" => cfg.repo = PathBuf::from(&e.value),
                    "db" => cfg.db = PathBuf::from(&e.value),
                    _ => unreachable!(),
                }
            }
            "http" => {
                if !HTTP_KEYS.contains(&e.key.as_str()) {
                    return Err(TablinumError::schema(format!(
                        "unknown key [http].{} (line {})",
                        e.key, e.line_no
                    )));
                }
                cfg.http_listen = e.value.clone();
            }
            "ingest" => {
                if !INGEST_KEYS.contains(&e.key.as_str()) {
                    return Err(TablinumError::schema(format!(
                        "unknown key [ingest].{} (line {})",
                        e.key, e.line_no
                    )));
                }
                match e.key.as_str() {
                    "poll_seconds" => {
                        let v = safe::parse_u32(&e.value).map_err(|_| {
                            TablinumError::schema(format!(
                                "invalid [ingest].poll_seconds (line {})",
                                e.line_no
                            ))
                        })?;
                        if v == 0 {
                            return Err(TablinumError::schema(format!(
                                "[ingest].poll_seconds must be > 0 (line {})",
                                e.line_no
                            )));
                        }
                        cfg.ingest_poll_seconds = v;
                    }
                    "once" => {
                        cfg.ingest_once = match e.value.as_str() {
                            "0" => false,
                            "1" => true,
                            _ => {
                                return Err(TablinumError::schema(format!(
                                    "[ingest].once must be 0 or 1 (line {})",
                                    e.line_no
                                )))
                            }
                        };
                    }
                    "max_jobs" => {
                        cfg.ingest_max_jobs = safe::parse_u32(&e.value).map_err(|_| {
                            TablinumError::schema(format!(
                                "invalid [ingest].max_jobs (line {})",
                                e.line_no
                            ))
                        })?;
                    }
                    _ => unreachable!(),
                }
            }
            other => {
                return Err(TablinumError::schema(format!(
                    "unknown section [{}] (line {})",
                    other, e.line_no
                )));
            }
        }
    }

    Ok(cfg)
}
