//! Structured extraction from free-text engine answers.
//!
//! [`parse`] is pure and total: every input string produces a
//! [`DiagnosticResult`], and parsing the same text twice yields equal
//! results.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ConfidenceTier, DiagnosticResult};

/// Error codes: `F01 02`, `F0102`.
static ERROR_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"F\d{2}\s?\d{2}").expect("Valid error code regex"));

/// Parameter codes: `P0001`.
static PARAMETER_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"P\d{4}").expect("Valid parameter code regex"));

static PAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:Seite|Page):\s*(\d+)").expect("Valid page regex"));

static STEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s").expect("Valid step regex"));

/// Maximum number of next steps kept.
pub const MAX_NEXT_STEPS: usize = 5;

const HIGH_MARKERS: [&str; 6] = ["HOCH", "HIGH", "Handbuch", "Manual", "Seite", "Page"];

pub fn parse(question: &str, raw: &str) -> DiagnosticResult {
    DiagnosticResult::new(
        question.to_string(),
        raw.to_string(),
        confidence_tier(raw),
        referenced_codes(raw),
        manual_pages(raw),
        next_steps(raw),
    )
}

/// Every error code in text order, followed by every parameter code in
/// text order. Repeats are kept.
pub fn referenced_codes(text: &str) -> Vec<String> {
    ERROR_CODE_RE
        .find_iter(text)
        .chain(PARAMETER_CODE_RE.find_iter(text))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Citation words count as a direct knowledge-base hit.
///
/// There is no LOW path: an explicit `MITTEL`/`MEDIUM` marker and an
/// unmarked answer both yield MEDIUM.
pub fn confidence_tier(text: &str) -> ConfidenceTier {
    if HIGH_MARKERS.iter().any(|m| text.contains(m)) {
        ConfidenceTier::High
    } else {
        ConfidenceTier::Medium
    }
}

pub fn manual_pages(text: &str) -> Vec<u32> {
    PAGE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

pub fn next_steps(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| STEP_RE.is_match(line))
        .map(|line| line.trim().to_string())
        .take(MAX_NEXT_STEPS)
        .collect()
}
