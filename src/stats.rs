//! Knowledge base and validation overview.
//!
//! Prints what is loaded for the configured manufacturer/version and how
//! the diagnostic answers have been judged so far. Used by `liftdx summary`
//! and `liftdx feedback stats`.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::feedback::FeedbackLedger;
use crate::loader;
use crate::models::{AccuracyStats, KnowledgeSummary};

/// Run the summary command: load the knowledge base and the ledger and
/// print both.
pub fn run_stats(config: &Config) -> Result<()> {
    let kb = loader::load_from_config(&config.knowledge).context("Failed to load knowledge base")?;
    let ledger = FeedbackLedger::open(&config.feedback.dir)
        .context("Failed to open feedback ledger")?;

    print_knowledge(&kb.summary());
    println!();
    print_accuracy(&ledger.get_stats()?);
    println!();
    Ok(())
}

/// Run `feedback stats`: accuracy only, without loading the knowledge base.
pub fn run_feedback_stats(config: &Config) -> Result<()> {
    let ledger = FeedbackLedger::open(&config.feedback.dir)
        .context("Failed to open feedback ledger")?;
    print_accuracy(&ledger.get_stats()?);
    println!();
    Ok(())
}

pub fn print_knowledge(s: &KnowledgeSummary) {
    println!("Lift Diagnostics - Knowledge Base");
    println!("=================================");
    println!();
    println!("  Controller:  {} {}", s.manufacturer, s.version);
    println!();
    println!("  Error codes: {:>6}", s.error_codes);
    println!("  Parameters:  {:>6}", s.parameters);
    println!("  Components:  {:>6}", s.components);
    println!("  Quirks:      {:>6}", s.quirks);
    println!("  Guides:      {:>6}", s.guides);
    println!("  Images:      {:>6}", s.images);
    println!("  {}", "-".repeat(19));
    println!("  Total:       {:>6}", s.total);
}

pub fn print_accuracy(stats: &AccuracyStats) {
    println!("Lift Diagnostics - Validation");
    println!("=============================");
    println!();
    println!("  Validations: {:>6}", stats.total_validations);
    println!("  Correct:     {:>6}", stats.correct);
    println!("  Incorrect:   {:>6}", stats.incorrect);
    println!("  Unsure:      {:>6}", stats.unsure);
    println!();
    println!("  Accuracy:    {}", format_accuracy(stats));
    let last = stats
        .last_updated
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    println!("  Last update: {}", last);
}

/// `75.0%`, or `n/a` while nothing has been judged correct or incorrect.
fn format_accuracy(stats: &AccuracyStats) -> String {
    if stats.correct + stats.incorrect == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", stats.accuracy)
    }
}
