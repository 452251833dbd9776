//! `clap`-derive CLI surface.
//!
//! Grounded on `src/cli/types.rs`'s `Cli`/`Commands` shape; the original
//! source's `core/args.h` role list (`all`, `serve`, `ingest`, `index`,
//! `worker`) maps onto the package/verify/export roles this engine adds.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "tablinum", version, about = "Content-addressed document-archive engine")]
pub struct Cli {
    /// Path to the INI configuration file. Falls back to
    /// `TABLINUM_CONFIG`, then `./tablinum.ini`, then built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Raise the log level one step per occurrence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
    Aip,
    Sip,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingest loop against the configured spool and repo.
    Ingest {
        /// Process exactly one job (or drain until empty) and exit.
        #[arg(long)]
        once: bool,
        /// Stop after this many jobs (0 = unlimited, overrides config).
        #[arg(long)]
        max_jobs: Option<u32>,
    },
    /// Recompute a job's CAS object hash and compare against its record.
    Verify { jobid: String },
    /// Produce a DIP-light export bundle for a job.
    Export { jobid: String, outdir: PathBuf },
    /// Build an AIP/SIP package for a job.
    Package {
        jobid: String,
        outdir: PathBuf,
        #[arg(long, value_enum, default_value = "aip")]
        format: PackageFormat,
    },
    /// Strictly verify a package directory.
    VerifyPackage { pkgdir: PathBuf },
    /// Verify, then ingest, a package directory into the local repo.
    IngestPackage { pkgdir: PathBuf },
    /// Replay the ops-audit hash chain and report the first break, if any.
    VerifyAudit,
    /// Reserved stub role.
    All,
    /// Reserved stub role.
    Serve,
    /// Reserved stub role.
    Index,
    /// Reserved stub role.
    Worker,
}
