//! Append-only feedback ledger with accuracy statistics.
//!
//! Technicians judge each diagnostic answer as correct, incorrect or
//! unsure. The ledger stores those judgments in `<dir>/feedback.json` and
//! caches the derived [`AccuracyStats`] in `<dir>/stats.json`.
//!
//! `feedback.json` is the source of truth. Stats are recomputed from it on
//! open and after every insertion, so a stale or hand-edited `stats.json`
//! is simply overwritten. Both files are replaced atomically by writing a
//! temporary sibling and renaming it.
//!
//! All insertions go through one writer lock that covers id assignment,
//! persistence and stats recomputation, so ids are `1..=N` without gaps even
//! when the HTTP server accepts feedback concurrently.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::models::{AccuracyStats, ConfidenceTier, FeedbackRecord, Judgment};

/// Maximum stored length of a response, in characters.
pub const MAX_RESPONSE_CHARS: usize = 500;

/// Number of records included in [`FeedbackLedger::summary`].
pub const RECENT_LIMIT: usize = 10;

const FEEDBACK_FILE: &str = "feedback.json";
const STATS_FILE: &str = "stats.json";
const CSV_HEADER: &str = "id,timestamp,query,judgment,confidence_tier,notes";

/// Stats plus the most recent records.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummary {
    pub stats: AccuracyStats,
    pub recent: Vec<FeedbackRecord>,
}

struct LedgerState {
    records: Vec<FeedbackRecord>,
    stats: AccuracyStats,
}

pub struct FeedbackLedger {
    feedback_path: PathBuf,
    stats_path: PathBuf,
    state: Mutex<LedgerState>,
}

impl FeedbackLedger {
    /// Open (or create) the ledger in `dir`.
    ///
    /// A missing directory or missing files are created. An existing
    /// `feedback.json` that does not parse is an error.
    pub fn open(dir: &Path) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(dir).map_err(|source| LedgerError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let feedback_path = dir.join(FEEDBACK_FILE);
        let stats_path = dir.join(STATS_FILE);

        let records = if feedback_path.exists() {
            read_records(&feedback_path)?
        } else {
            write_json(&feedback_path, &Vec::<FeedbackRecord>::new())?;
            Vec::new()
        };

        let stats = AccuracyStats::from_records(&records);
        write_json(&stats_path, &stats)?;

        info!(
            path = %feedback_path.display(),
            records = records.len(),
            accuracy = stats.accuracy,
            "opened feedback ledger"
        );

        Ok(Self {
            feedback_path,
            stats_path,
            state: Mutex::new(LedgerState { records, stats }),
        })
    }

    pub fn feedback_path(&self) -> &Path {
        &self.feedback_path
    }

    /// Append a judgment and return the stored record.
    ///
    /// If `feedback.json` cannot be written nothing is appended. A failure
    /// writing `stats.json` afterwards is reported but the record is kept,
    /// since the cache is rebuilt on the next open.
    pub fn add_feedback(
        &self,
        query: &str,
        response: &str,
        judgment: Judgment,
        confidence_tier: ConfidenceTier,
        notes: Option<&str>,
    ) -> Result<FeedbackRecord, LedgerError> {
        let mut state = self.state.lock().map_err(|_| LedgerError::Poisoned)?;

        let record = FeedbackRecord {
            id: state.records.len() as u64 + 1,
            timestamp: Utc::now(),
            query: query.to_string(),
            response: truncate_chars(response, MAX_RESPONSE_CHARS),
            judgment,
            confidence_tier,
            notes: notes.map(str::to_string).filter(|n| !n.is_empty()),
        };

        let mut records = state.records.clone();
        records.push(record.clone());
        write_json(&self.feedback_path, &records)?;

        let stats = AccuracyStats::from_records(&records);
        state.records = records;
        state.stats = stats.clone();
        write_json(&self.stats_path, &stats)?;

        debug!(id = record.id, judgment = %record.judgment, "feedback recorded");
        Ok(record)
    }

    pub fn get_stats(&self) -> Result<AccuracyStats, LedgerError> {
        let state = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        Ok(state.stats.clone())
    }

    /// Records newest first, optionally filtered by judgment and limited.
    pub fn get_feedback(
        &self,
        limit: Option<usize>,
        judgment: Option<Judgment>,
    ) -> Result<Vec<FeedbackRecord>, LedgerError> {
        let state = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        let mut records: Vec<FeedbackRecord> = state
            .records
            .iter()
            .filter(|r| judgment.map_or(true, |j| r.judgment == j))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    pub fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        Ok(LedgerSummary {
            stats: self.get_stats()?,
            recent: self.get_feedback(Some(RECENT_LIMIT), None)?,
        })
    }

    /// All records in insertion order as CSV with a header row.
    pub fn export_csv(&self) -> Result<String, LedgerError> {
        let state = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        let mut out = String::from(CSV_HEADER);
        out.push_str("\r\n");
        for r in &state.records {
            let fields = [
                r.id.to_string(),
                r.timestamp.to_rfc3339(),
                r.query.clone(),
                r.judgment.to_string(),
                r.confidence_tier.to_string(),
                r.notes.clone().unwrap_or_default(),
            ];
            let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
            out.push_str(&row.join(","));
            out.push_str("\r\n");
        }
        Ok(out)
    }
}

fn read_records(path: &Path) -> Result<Vec<FeedbackRecord>, LedgerError> {
    let content = std::fs::read_to_string(path).map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|source| LedgerError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), LedgerError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|source| LedgerError::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
