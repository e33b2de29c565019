//! In-memory knowledge base and lookup operations.
//!
//! A [`KnowledgeBase`] is built once by [`crate::loader::KnowledgeStore::load`]
//! and never mutated afterwards, so it can be shared across sessions behind
//! an `Arc` without locking. Reloading means building a new one.
//!
//! # Matching rules
//!
//! | Operation | Rule |
//! |-----------|------|
//! | [`by_exact_code`](KnowledgeBase::by_exact_code) | trimmed, case-insensitive equality |
//! | [`search_by_description`](KnowledgeBase::search_by_description) | query is a substring of the description (and cause/solution for error codes) |
//! | [`search_components`](KnowledgeBase::search_components) | bidirectional substring containment on code or description |
//! | [`search_guides`](KnowledgeBase::search_guides) | query is a substring of title, problem or a related code |
//! | [`search_images_by_error_code`](KnowledgeBase::search_images_by_error_code) | general bucket, then manufacturer bucket, no dedup |
//!
//! All searches return matches in stored order; nothing is ranked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::models::{Category, GuideEntry, ImageRef, KnowledgeEntry, KnowledgeSummary};

/// Name of the manufacturer-agnostic image bucket.
pub const GENERAL_BUCKET: &str = "general";

/// Canonical form used for code comparison.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Image references grouped into named buckets.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    buckets: HashMap<String, Vec<ImageRef>>,
}

impl ImageIndex {
    pub fn new(buckets: HashMap<String, Vec<ImageRef>>) -> Self {
        Self { buckets }
    }

    /// Key of the bucket holding images for one manufacturer/version.
    pub fn bucket_key(manufacturer: &str, version: &str) -> String {
        format!("{}/{}", manufacturer, version)
    }

    pub fn bucket(&self, key: &str) -> &[ImageRef] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    manufacturer: String,
    version: String,
    error_codes: Vec<KnowledgeEntry>,
    parameters: Vec<KnowledgeEntry>,
    components: Vec<KnowledgeEntry>,
    quirks: Vec<KnowledgeEntry>,
    guides: Arc<Vec<GuideEntry>>,
    images: Option<ImageIndex>,
}

impl KnowledgeBase {
    /// Assemble a knowledge base, partitioning `entries` by category and
    /// keeping their relative order.
    pub fn from_entries(
        manufacturer: &str,
        version: &str,
        entries: Vec<KnowledgeEntry>,
        guides: Arc<Vec<GuideEntry>>,
        images: Option<ImageIndex>,
    ) -> Self {
        let mut kb = Self {
            manufacturer: manufacturer.to_string(),
            version: version.to_string(),
            error_codes: Vec::new(),
            parameters: Vec::new(),
            components: Vec::new(),
            quirks: Vec::new(),
            guides,
            images,
        };
        for entry in entries {
            match entry.category {
                Category::ErrorCode => kb.error_codes.push(entry),
                Category::Parameter => kb.parameters.push(entry),
                Category::Component => kb.components.push(entry),
                Category::Quirk => kb.quirks.push(entry),
            }
        }
        kb
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn error_codes(&self) -> &[KnowledgeEntry] {
        &self.error_codes
    }

    pub fn parameters(&self) -> &[KnowledgeEntry] {
        &self.parameters
    }

    pub fn components(&self) -> &[KnowledgeEntry] {
        &self.components
    }

    pub fn quirks(&self) -> &[KnowledgeEntry] {
        &self.quirks
    }

    pub fn guides(&self) -> &[GuideEntry] {
        &self.guides
    }

    pub fn images(&self) -> Option<&ImageIndex> {
        self.images.as_ref()
    }

    pub fn entries(&self, category: Category) -> &[KnowledgeEntry] {
        match category {
            Category::ErrorCode => &self.error_codes,
            Category::Parameter => &self.parameters,
            Category::Component => &self.components,
            Category::Quirk => &self.quirks,
        }
    }

    /// Exact code lookup.
    ///
    /// Returns at most one entry for error codes and components (codes are
    /// unique there) and every matching entry for parameters, where one code
    /// carries different meanings in different manual sections.
    pub fn by_exact_code(&self, category: Category, code: &str) -> Vec<&KnowledgeEntry> {
        let wanted = normalize_code(code);
        let mut matches = self
            .entries(category)
            .iter()
            .filter(|e| normalize_code(&e.code) == wanted);
        if category.has_unique_codes() {
            matches.next().into_iter().collect()
        } else {
            matches.collect()
        }
    }

    pub fn error_code(&self, code: &str) -> Option<&KnowledgeEntry> {
        self.by_exact_code(Category::ErrorCode, code).into_iter().next()
    }

    pub fn component(&self, code: &str) -> Option<&KnowledgeEntry> {
        self.by_exact_code(Category::Component, code).into_iter().next()
    }

    pub fn parameters_by_code(&self, code: &str) -> Vec<&KnowledgeEntry> {
        self.by_exact_code(Category::Parameter, code)
    }

    /// Case-insensitive substring search over descriptions.
    ///
    /// For error codes the cause/solution text is searched as well.
    pub fn search_by_description(&self, category: Category, query: &str) -> Vec<&KnowledgeEntry> {
        let q = query.to_lowercase();
        self.entries(category)
            .iter()
            .filter(|e| {
                e.description.to_lowercase().contains(&q)
                    || (category == Category::ErrorCode
                        && e
                            .cause_solution()
                            .is_some_and(|c| c.to_lowercase().contains(&q)))
            })
            .collect()
    }

    /// Components whose code or description contains the query, or is
    /// contained in it.
    ///
    /// Component codes are short (`XTSS`, `1H`) and technicians embed them
    /// in longer phrases, so containment is checked in both directions.
    pub fn search_components(&self, query: &str) -> Vec<&KnowledgeEntry> {
        let q = query.to_lowercase();
        self.components
            .iter()
            .filter(|c| {
                let code = c.code.to_lowercase();
                let desc = c.description.to_lowercase();
                q.contains(&code) || q.contains(&desc) || code.contains(&q) || desc.contains(&q)
            })
            .collect()
    }

    /// Legacy name for [`search_components`](Self::search_components).
    pub fn search_abbreviations(&self, query: &str) -> Vec<&KnowledgeEntry> {
        self.search_components(query)
    }

    pub fn search_guides(&self, query: &str) -> Vec<&GuideEntry> {
        let q = query.to_lowercase();
        self.guides
            .iter()
            .filter(|g| {
                g.title.to_lowercase().contains(&q)
                    || g.problem.to_lowercase().contains(&q)
                    || g
                        .related_error_codes
                        .iter()
                        .any(|c| c.to_lowercase().contains(&q))
            })
            .collect()
    }

    /// Images referencing `code`: general bucket first, then the bucket of
    /// the active manufacturer/version.
    ///
    /// An image listed in both buckets is returned twice.
    pub fn search_images_by_error_code(&self, code: &str) -> Vec<&ImageRef> {
        let Some(index) = &self.images else {
            return Vec::new();
        };
        let wanted = normalize_code(code);
        let scoped = ImageIndex::bucket_key(&self.manufacturer, &self.version);

        [GENERAL_BUCKET, scoped.as_str()]
            .into_iter()
            .flat_map(|key| index.bucket(key))
            .filter(|img| img.error_codes.iter().any(|c| normalize_code(c) == wanted))
            .collect()
    }

    pub fn summary(&self) -> KnowledgeSummary {
        KnowledgeSummary {
            manufacturer: self.manufacturer.clone(),
            version: self.version.clone(),
            error_codes: self.error_codes.len(),
            parameters: self.parameters.len(),
            components: self.components.len(),
            quirks: self.quirks.len(),
            guides: self.guides.len(),
            images: self.images.as_ref().map_or(0, ImageIndex::len),
            total: self.error_codes.len() + self.parameters.len() + self.components.len(),
        }
    }

    /// Render the whole knowledge base as one Markdown document.
    ///
    /// Parameters are listed once per `(code, description)` pair even when
    /// they appear on several manual pages.
    pub fn export_for_ai_context(&self) -> String {
        let mut out = format!(
            "# {} {} Elevator Control Manual - Knowledge Base\n\n",
            self.manufacturer, self.version
        );

        out.push_str(&format!(
            "## ERROR CODES - {} entries\n",
            self.error_codes.len()
        ));
        for e in &self.error_codes {
            out.push_str(&format!("\n### {}\n", e.code));
            out.push_str(&format!("- Description: {}\n", e.description));
            if let Some(cause) = e.cause_solution() {
                out.push_str(&format!("- Cause/Solution: {}\n", cause));
            }
            push_page(&mut out, e.manual_page);
        }

        out.push_str(&format!(
            "\n\n## PARAMETERS - {} instances\n",
            self.parameters.len()
        ));
        let mut seen = HashSet::new();
        for p in &self.parameters {
            if !seen.insert((normalize_code(&p.code), p.description.as_str())) {
                continue;
            }
            out.push_str(&format!("\n### {}\n", p.code));
            out.push_str(&format!("- {}\n", p.description));
            if let Some(section) = p.section() {
                out.push_str(&format!("- Section: {}\n", section));
            }
            push_page(&mut out, p.manual_page);
        }

        out.push_str(&format!(
            "\n\n## COMPONENTS & ABBREVIATIONS - {} entries\n",
            self.components.len()
        ));
        for c in &self.components {
            out.push_str(&format!("\n### {}\n", c.code));
            out.push_str(&format!("- {}\n", c.description));
        }

        if !self.quirks.is_empty() {
            out.push_str(&format!("\n\n## KNOWN QUIRKS - {} entries\n", self.quirks.len()));
            for q in &self.quirks {
                out.push_str(&format!("\n### {}\n", q.code));
                out.push_str(&format!("- Problem: {}\n", q.description));
            }
        }

        if !self.guides.is_empty() {
            out.push_str(&format!(
                "\n\n## PRACTICAL DIAGNOSTIC GUIDES - {} guides\n",
                self.guides.len()
            ));
            for g in self.guides.iter() {
                out.push_str(&format!("\n### {}\n", g.title));
                out.push_str(&format!("- Problem: {}\n", g.problem));
                out.push_str(&format!(
                    "- Related Error Codes: {}\n",
                    g.related_error_codes.join(", ")
                ));
                if let Some(level) = &g.difficulty_level {
                    out.push_str(&format!("- Difficulty: {}\n", level));
                }
                if !g.diagnosis_steps.is_empty() {
                    out.push_str(&format!(
                        "- Diagnosis Steps: {} steps\n",
                        g.diagnosis_steps.len()
                    ));
                }
            }
        }

        out
    }
}

fn push_page(out: &mut String, page: Option<u32>) {
    if let Some(page) = page {
        out.push_str(&format!("- Manual Page: {}\n", page));
    }
}
