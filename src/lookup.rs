//! Direct knowledge lookups without the reasoning engine.
//!
//! Used by `liftdx lookup` and `liftdx context`. Neither command needs an
//! API key, so they work with `[engine] provider = "disabled"`.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::context::ContextBuilder;
use crate::knowledge::KnowledgeBase;
use crate::loader;
use crate::models::{Category, GuideEntry, ImageRef, KnowledgeEntry};

/// Everything the knowledge base holds for one code.
#[derive(Debug, Clone)]
pub struct CodeLookup<'a> {
    pub code: String,
    pub entries: Vec<&'a KnowledgeEntry>,
    pub guides: Vec<&'a GuideEntry>,
    pub images: Vec<&'a ImageRef>,
}

impl CodeLookup<'_> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.guides.is_empty() && self.images.is_empty()
    }
}

/// Exact lookup across all categories, plus guides and images that
/// reference the code.
pub fn lookup_code<'a>(kb: &'a KnowledgeBase, code: &str) -> CodeLookup<'a> {
    let entries = Category::ALL
        .into_iter()
        .flat_map(|c| kb.by_exact_code(c, code))
        .collect();
    CodeLookup {
        code: code.trim().to_string(),
        entries,
        guides: kb.search_guides(code.trim()),
        images: kb.search_images_by_error_code(code),
    }
}

pub fn run_lookup(config: &Config, code: &str) -> Result<()> {
    let kb = loader::load_from_config(&config.knowledge).context("Failed to load knowledge base")?;
    let found = lookup_code(&kb, code);

    if found.is_empty() {
        println!("No knowledge base entry for '{}'.", found.code);
        return Ok(());
    }

    for e in &found.entries {
        println!("{} [{}]", e.code, e.category);
        println!("  {}", e.description);
        if let Some(cause) = e.cause_solution() {
            println!("  Cause/Solution: {}", cause);
        }
        if let Some(section) = e.section() {
            println!("  Section: {}", section);
        }
        if let Some(page) = e.manual_page {
            println!("  Manual page: {}", page);
        }
        println!();
    }

    if !found.guides.is_empty() {
        println!("Diagnostic guides:");
        for g in &found.guides {
            println!("  - {} ({} steps)", g.title, g.diagnosis_steps.len());
            for (i, step) in g.diagnosis_steps.iter().enumerate() {
                println!("      {}. {}", i + 1, step);
            }
        }
        println!();
    }

    if !found.images.is_empty() {
        println!("Images:");
        for img in &found.images {
            match &img.caption {
                Some(caption) => println!("  - {} ({})", img.file, caption),
                None => println!("  - {}", img.file),
            }
        }
        println!();
    }

    Ok(())
}

/// Print the context block built for `query`, or the full knowledge
/// export when `full` is set.
pub fn run_context(config: &Config, query: Option<&str>, full: bool) -> Result<()> {
    let kb = loader::load_from_config(&config.knowledge).context("Failed to load knowledge base")?;

    if full {
        print!("{}", kb.export_for_ai_context());
        return Ok(());
    }

    let query = query.ok_or_else(|| anyhow::anyhow!("a query is required unless --full is set"))?;
    let block = ContextBuilder::new(Arc::new(kb), &config.context).build(query);
    print!("{}", block.text);
    if block.is_empty() {
        eprintln!("No knowledge base entries matched the query.");
    }
    Ok(())
}
