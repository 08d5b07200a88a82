//! Verify subcommand: check chunk files against their manifests

use super::CliError;
use crate::catalog::{verify_root, ManifestStatus, VerifyReport};
use clap::Parser;
use std::path::PathBuf;

/// Verify command arguments
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// Output root to verify
    #[arg(long, default_value = "data/raw")]
    pub root: PathBuf,
}

impl VerifyArgs {
    /// Verify every manifest under the root; fails when any check fails
    pub fn execute(&self) -> Result<VerifyReport, CliError> {
        let report = verify_root(&self.root)?;
        print_report(&report);

        if report.is_ok() {
            return Ok(report);
        }
        let failed = report.failures().count();
        Err(CliError::VerificationFailed(format!(
            "{} of {} manifests failed, {} data files without a manifest",
            failed,
            report.checks.len(),
            report.orphan_data_files.len()
        )))
    }
}

fn print_report(report: &VerifyReport) {
    println!("Checked {} manifests", report.checks.len());
    for check in report.failures() {
        match &check.status {
            ManifestStatus::Ok => {}
            ManifestStatus::Unreadable(reason) => {
                println!("  UNREADABLE {}: {}", check.manifest.display(), reason)
            }
            ManifestStatus::MissingData(path) => {
                println!("  MISSING    {} (manifest {})", path.display(), check.manifest.display())
            }
            ManifestStatus::HashMismatch { expected, actual } => println!(
                "  MISMATCH   {}: expected {}, found {}",
                check.manifest.display(),
                expected,
                actual
            ),
        }
    }
    for orphan in &report.orphan_data_files {
        println!("  ORPHAN     {}", orphan.display());
    }
    if report.is_ok() {
        println!("All chunks verified");
    }
}
