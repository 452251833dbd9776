//! Dispatch a parsed `Commands` to its handler.
//!
//! Grounded on `src/cli/dispatch.rs`'s match-per-variant shape.

use tracing::info;

use crate::cli::types::{Commands, PackageFormat};
use crate::config::Config;
use crate::error::{Result, TablinumError};
use crate::{export, ingest, package, pkgverify, verify_job};

pub fn dispatch(command: Commands, cfg: &Config) -> Result<()> {
    let repo_root = cfg.resolved_repo();
    let spool_root = cfg.resolved_spool();

    match command {
        Commands::Ingest { once, max_jobs } => {
            let ingest_cfg = ingest::IngestConfig {
                spool_root,
                repo_root,
                once: once || cfg.ingest_once,
                poll_seconds: cfg.ingest_poll_seconds,
                max_jobs: max_jobs.unwrap_or(cfg.ingest_max_jobs),
            };
            let report = ingest::run(&ingest_cfg)?;
            info!(jobs_done = report.jobs_done, "ingest finished");
            Ok(())
        }

        Commands::Verify { jobid } => {
            if !crate::record::is_safe_id(&jobid) {
                return Err(TablinumError::usage(format!("unsafe job id: {jobid}")));
            }
            let outcome = verify_job::verify_job(&repo_root, &jobid)?;
            println!("{jobid}: {}", outcome_label(outcome));
            Ok(())
        }

        Commands::Export { jobid, outdir } => {
            if !crate::record::is_safe_id(&jobid) {
                return Err(TablinumError::usage(format!("unsafe job id: {jobid}")));
            }
            export::export(&repo_root, &jobid, &outdir)
        }

        Commands::Package { jobid, outdir, format } => {
            if !crate::record::is_safe_id(&jobid) {
                return Err(TablinumError::usage(format!("unsafe job id: {jobid}")));
            }
            let kind = match format {
                PackageFormat::Aip => package::Kind::Aip,
                PackageFormat::Sip => package::Kind::Sip,
            };
            package::build(&repo_root, &jobid, &outdir, kind)
        }

        Commands::VerifyPackage { pkgdir } => {
            pkgverify::verify_package(&pkgdir)?;
            println!("{}: OK", pkgdir.display());
            Ok(())
        }

        Commands::IngestPackage { pkgdir } => pkgverify::ingest_package(&pkgdir, &repo_root),

        Commands::VerifyAudit => {
            crate::events::verify_audit(&repo_root)?;
            println!("audit: OK");
            Ok(())
        }

        Commands::All => {
            info!("[all] not implemented");
            Ok(())
        }
        Commands::Serve => {
            info!(listen = %cfg.http_listen, "[serve] not implemented");
            Ok(())
        }
        Commands::Index => {
            info!(db = %cfg.db.display(), "[index] not implemented");
            Ok(())
        }
        Commands::Worker => {
            info!("[worker] not implemented");
            Ok(())
        }
    }
}

fn outcome_label(outcome: verify_job::VerifyOutcome) -> &'static str {
    match outcome {
        verify_job::VerifyOutcome::Ok => "OK",
        verify_job::VerifyOutcome::Skip => "SKIP",
    }
}
