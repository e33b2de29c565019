//! Query-relevant context selection.
//!
//! [`ContextBuilder`] picks the knowledge entries that a question mentions
//! and renders them as a Markdown block that is embedded in the message
//! sent to the reasoning engine. Three independent matchers run per query:
//!
//! 1. **Error codes**: the entry's code (uppercased) occurs in the
//!    uppercased query, or its description (lowercased) occurs in the
//!    lowercased query.
//! 2. **Parameters**: the query is a substring of the description, see
//!    [`KnowledgeBase::search_by_description`].
//! 3. **Components**: bidirectional containment, see
//!    [`KnowledgeBase::search_components`].
//!
//! Each section keeps the first `max_per_category` matches in stored order.
//! Sections without matches are omitted. The output depends only on the
//! knowledge base and the query.

use std::sync::Arc;

use crate::config::ContextConfig;
use crate::knowledge::KnowledgeBase;
use crate::models::{Category, KnowledgeEntry};

const TITLE: &str = "# VERFÜGBARE WISSENSDATENBANK";
const ERROR_CODES_HEADER: &str = "## Relevante Fehlercodes";
const PARAMETERS_HEADER: &str = "## Relevante Parameter";
const COMPONENTS_HEADER: &str = "## Relevante Komponenten";
const CAUSE_LABEL: &str = "Ursache/Lösung";
const ELLIPSIS: &str = "...";

/// Rendered context plus the codes it cites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub text: String,
    pub error_codes: Vec<String>,
    pub parameters: Vec<String>,
    pub components: Vec<String>,
}

impl ContextBlock {
    /// True when no category produced a match.
    pub fn is_empty(&self) -> bool {
        self.error_codes.is_empty() && self.parameters.is_empty() && self.components.is_empty()
    }
}

pub struct ContextBuilder {
    kb: Arc<KnowledgeBase>,
    max_per_category: usize,
    cause_excerpt_chars: usize,
}

impl ContextBuilder {
    pub fn new(kb: Arc<KnowledgeBase>, config: &ContextConfig) -> Self {
        Self {
            kb,
            max_per_category: config.max_per_category,
            cause_excerpt_chars: config.cause_excerpt_chars,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn build(&self, query: &str) -> ContextBlock {
        let errors = self.match_error_codes(query);
        let params: Vec<&KnowledgeEntry> = self
            .kb
            .search_by_description(Category::Parameter, query)
            .into_iter()
            .take(self.max_per_category)
            .collect();
        let components: Vec<&KnowledgeEntry> = self
            .kb
            .search_components(query)
            .into_iter()
            .take(self.max_per_category)
            .collect();

        let mut text = format!("{}\n\n", TITLE);

        if !errors.is_empty() {
            text.push_str(ERROR_CODES_HEADER);
            text.push('\n');
            for e in &errors {
                text.push_str(&format!("\n- **{}**: {}\n", e.code, e.description));
                if let Some(cause) = e.cause_solution() {
                    text.push_str(&format!(
                        "  {}: {}\n",
                        CAUSE_LABEL,
                        excerpt(cause, self.cause_excerpt_chars)
                    ));
                }
            }
        }

        for (header, entries) in [(PARAMETERS_HEADER, &params), (COMPONENTS_HEADER, &components)] {
            if entries.is_empty() {
                continue;
            }
            text.push('\n');
            text.push_str(header);
            text.push('\n');
            for e in entries.iter() {
                text.push_str(&format!("- **{}**: {}\n", e.code, e.description));
            }
        }

        ContextBlock {
            text,
            error_codes: codes(&errors),
            parameters: codes(&params),
            components: codes(&components),
        }
    }

    fn match_error_codes(&self, query: &str) -> Vec<&KnowledgeEntry> {
        let upper = query.to_uppercase();
        let lower = query.to_lowercase();
        self.kb
            .error_codes()
            .iter()
            .filter(|e| {
                upper.contains(&e.code.to_uppercase())
                    || lower.contains(&e.description.to_lowercase())
            })
            .take(self.max_per_category)
            .collect()
    }
}

fn codes(entries: &[&KnowledgeEntry]) -> Vec<String> {
    entries.iter().map(|e| e.code.clone()).collect()
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &text[..idx], ELLIPSIS),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::test_support::*;

    fn builder() -> ContextBuilder {
        ContextBuilder::new(Arc::new(sample_kb()), &ContextConfig::default())
    }

    #[test]
    fn test_exact_code_in_query_includes_description() {
        let block = builder().build("Was ist Fehlercode F01 02?");
        assert!(block.text.contains("Sicherheitskreis geöffnet"));
        assert!(block.text.contains(ERROR_CODES_HEADER));
        assert_eq!(block.error_codes, vec!["F01 02"]);
    }

    #[test]
    fn test_description_in_query_matches_error_code() {
        let block = builder().build("Meldung: safety circuit open seit heute");
        assert_eq!(block.error_codes, vec!["F0102"]);
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let block = builder().build("F02 01");
        assert!(block.text.contains(ERROR_CODES_HEADER));
        assert!(!block.text.contains(PARAMETERS_HEADER));
        assert!(!block.text.contains(COMPONENTS_HEADER));
    }

    #[test]
    fn test_no_match_yields_title_only() {
        let block = builder().build("zzz");
        assert!(block.is_empty());
        assert_eq!(block.text, format!("{}\n\n", TITLE));
    }

    #[test]
    fn test_parameter_and_component_sections() {
        let block = builder().build("fahrtdauer");
        assert_eq!(block.parameters, vec!["P0001"]);

        let block = builder().build("XTSS Stecker");
        assert!(block.components.contains(&"XTSS".to_string()));
        assert!(block.text.contains(COMPONENTS_HEADER));
    }

    #[test]
    fn test_each_category_is_capped() {
        let entries = (0..8)
            .map(|i| component(&format!("K{}", i), &format!("Klemme {}", i)))
            .collect();
        let kb = KnowledgeBase::from_entries("via", "v74", entries, Arc::new(vec![]), None);
        let block = ContextBuilder::new(Arc::new(kb), &ContextConfig::default()).build("klemme");
        assert_eq!(block.components, vec!["K0", "K1", "K2", "K3", "K4"]);
    }

    #[test]
    fn test_cause_excerpt_truncated_with_ellipsis() {
        let long = "ü".repeat(250);
        let kb = KnowledgeBase::from_entries(
            "via",
            "v74",
            vec![error_code("F03 01", "Fahrsicherung", Some(&long))],
            Arc::new(vec![]),
            None,
        );
        let block = ContextBuilder::new(Arc::new(kb), &ContextConfig::default()).build("F03 01");
        let expected = format!("{}: {}{}", CAUSE_LABEL, "ü".repeat(200), ELLIPSIS);
        assert!(block.text.contains(&expected));
        assert!(!block.text.contains(&"ü".repeat(201)));
    }

    #[test]
    fn test_short_cause_not_marked() {
        assert_eq!(excerpt("kurz", 200), "kurz");
        assert_eq!(excerpt("abcdef", 3), "abc...");
    }

    #[test]
    fn test_output_is_deterministic() {
        let b = builder();
        assert_eq!(b.build("F01 02 XTSS"), b.build("F01 02 XTSS"));
    }
}
