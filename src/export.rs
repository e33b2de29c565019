//! Export validation feedback as CSV.
//!
//! Writes the ledger in insertion order with the columns
//! `id,timestamp,query,judgment,confidence_tier,notes`, for review in a
//! spreadsheet.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::feedback::FeedbackLedger;

/// Export all feedback records as CSV.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let ledger = FeedbackLedger::open(&config.feedback.dir)
        .context("Failed to open feedback ledger")?;
    let csv = ledger.export_csv()?;
    let count = ledger.get_stats()?.total_validations;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &csv)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} feedback records to {}", count, path.display());
        }
        None => {
            print!("{}", csv);
        }
    }

    Ok(())
}
