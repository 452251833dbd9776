pub mod cas;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod fs;
pub mod ini;
pub mod ingest;
pub mod logging;
pub mod package;
pub mod path;
pub mod pkgverify;
pub mod record;
pub mod safe;
pub mod sha256;
pub mod spool;
pub mod verify_job;
