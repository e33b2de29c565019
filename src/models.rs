//! Core data models used throughout the diagnostic engine.
//!
//! These types represent the knowledge entries, conversation turns,
//! diagnostic results and feedback records that flow between the
//! loader, the session engine and the feedback ledger.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Knowledge category of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ErrorCode,
    Parameter,
    Component,
    Quirk,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::ErrorCode,
        Category::Parameter,
        Category::Component,
        Category::Quirk,
    ];

    /// Whether `code` must be unique within this category.
    pub fn has_unique_codes(self) -> bool {
        matches!(self, Category::ErrorCode | Category::Component)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::ErrorCode => "error codes",
            Category::Parameter => "parameters",
            Category::Component => "components",
            Category::Quirk => "quirks",
        };
        f.pad(label)
    }
}

/// A single error code, parameter, component or quirk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeEntry {
    pub code: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_page: Option<u32>,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_status: Option<String>,
    #[serde(flatten)]
    pub detail: EntryDetail,
}

/// Category-specific fields of a [`KnowledgeEntry`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryDetail {
    ErrorCode {
        #[serde(skip_serializing_if = "Option::is_none")]
        family: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        number: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cause_solution: Option<String>,
    },
    Parameter {
        #[serde(skip_serializing_if = "Option::is_none")]
        section: Option<String>,
    },
    Component {},
    Quirk {
        symptoms: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        frequency: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        solution: Option<String>,
    },
}

impl KnowledgeEntry {
    /// Cause/solution text; only error codes carry one.
    pub fn cause_solution(&self) -> Option<&str> {
        match &self.detail {
            EntryDetail::ErrorCode { cause_solution, .. } => cause_solution.as_deref(),
            _ => None,
        }
    }

    /// Manual section; only parameters carry one.
    pub fn section(&self) -> Option<&str> {
        match &self.detail {
            EntryDetail::Parameter { section } => section.as_deref(),
            _ => None,
        }
    }
}

/// A manufacturer-agnostic practical diagnostic guide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideEntry {
    pub title: String,
    pub problem: String,
    pub related_error_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<String>,
    pub diagnosis_steps: Vec<String>,
}

/// An image cross-reference (wiring diagram, board photo, manual figure).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRef {
    pub file: String,
    pub error_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_page: Option<u32>,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One (role, content) pair in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// How directly a diagnostic answer is grounded in the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ConfidenceTier::High => "HIGH",
            ConfidenceTier::Medium => "MEDIUM",
            ConfidenceTier::Low => "LOW",
        })
    }
}

impl FromStr for ConfidenceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HIGH" | "HOCH" => Ok(ConfidenceTier::High),
            "MEDIUM" | "MITTEL" => Ok(ConfidenceTier::Medium),
            "LOW" | "NIEDRIG" => Ok(ConfidenceTier::Low),
            other => Err(format!(
                "unknown confidence tier '{}': expected HIGH, MEDIUM or LOW",
                other
            )),
        }
    }
}

/// Structured view of one reasoning-engine answer.
///
/// Built only by [`crate::parser::parse`]; all fields are read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticResult {
    query: String,
    diagnosis_text: String,
    confidence_tier: ConfidenceTier,
    codes_referenced: Vec<String>,
    manual_pages: Vec<u32>,
    next_steps: Vec<String>,
}

impl DiagnosticResult {
    pub(crate) fn new(
        query: String,
        diagnosis_text: String,
        confidence_tier: ConfidenceTier,
        codes_referenced: Vec<String>,
        manual_pages: Vec<u32>,
        next_steps: Vec<String>,
    ) -> Self {
        Self {
            query,
            diagnosis_text,
            confidence_tier,
            codes_referenced,
            manual_pages,
            next_steps,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn diagnosis_text(&self) -> &str {
        &self.diagnosis_text
    }

    pub fn confidence_tier(&self) -> ConfidenceTier {
        self.confidence_tier
    }

    pub fn codes_referenced(&self) -> &[String] {
        &self.codes_referenced
    }

    pub fn manual_pages(&self) -> &[u32] {
        &self.manual_pages
    }

    pub fn next_steps(&self) -> &[String] {
        &self.next_steps
    }
}

/// A technician's verdict on one diagnostic answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Correct,
    Incorrect,
    Unsure,
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Judgment::Correct => "correct",
            Judgment::Incorrect => "incorrect",
            Judgment::Unsure => "unsure",
        })
    }
}

impl FromStr for Judgment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correct" => Ok(Judgment::Correct),
            "incorrect" => Ok(Judgment::Incorrect),
            "unsure" => Ok(Judgment::Unsure),
            other => Err(format!(
                "unknown judgment '{}': expected correct, incorrect or unsure",
                other
            )),
        }
    }
}

/// One append-only entry in the feedback ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: u64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub response: String,
    #[serde(alias = "feedback")]
    pub judgment: Judgment,
    #[serde(alias = "confidence")]
    pub confidence_tier: ConfidenceTier,
    #[serde(default)]
    pub notes: Option<String>,
}

/// RFC 3339, or a naive ISO 8601 timestamp read as UTC. Older ledgers were
/// written without an offset.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{}': {}", raw, e)))
}

/// Aggregate accuracy derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub total_validations: u64,
    pub correct: u64,
    pub incorrect: u64,
    pub unsure: u64,
    /// `correct / (correct + incorrect) * 100`, one decimal; unsure excluded.
    pub accuracy: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl AccuracyStats {
    pub fn empty() -> Self {
        Self {
            total_validations: 0,
            correct: 0,
            incorrect: 0,
            unsure: 0,
            accuracy: 0.0,
            last_updated: None,
        }
    }

    /// Recompute from the authoritative record list.
    pub fn from_records(records: &[FeedbackRecord]) -> Self {
        let mut stats = Self::empty();
        for r in records {
            stats.total_validations += 1;
            match r.judgment {
                Judgment::Correct => stats.correct += 1,
                Judgment::Incorrect => stats.incorrect += 1,
                Judgment::Unsure => stats.unsure += 1,
            }
        }
        let judged = stats.correct + stats.incorrect;
        if judged > 0 {
            let pct = stats.correct as f64 / judged as f64 * 100.0;
            stats.accuracy = (pct * 10.0).round() / 10.0;
        }
        stats.last_updated = records.iter().map(|r| r.timestamp).max();
        stats
    }
}

/// Entry counts of a loaded knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeSummary {
    pub manufacturer: String,
    pub version: String,
    pub error_codes: usize,
    pub parameters: usize,
    pub components: usize,
    pub quirks: usize,
    pub guides: usize,
    pub images: usize,
    /// Error codes + parameters + components.
    pub total: usize,
}
