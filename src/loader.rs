//! Knowledge source resolution and loading.
//!
//! Each knowledge source is looked up through an ordered list of
//! [`Layout`]s; the first candidate path that exists wins:
//!
//! ```text
//! 1. <root>/manufacturers/<mfr>/<version>/knowledge/<category>.json   (hierarchical)
//! 2. <root>/<mfr>/<version>/<legacy-name>.json                        (legacy flat)
//! ```
//!
//! The legacy schema's field names (`description_de`, `abbreviations`,
//! `known_issues`, `related_errors`, ...) are accepted here and nowhere
//! else; everything past this module sees [`KnowledgeEntry`] and friends.
//!
//! | Source | Required | Failure when absent |
//! |--------|----------|---------------------|
//! | error codes | yes | [`LoadError::MissingRequired`] |
//! | parameters | yes | [`LoadError::MissingRequired`] |
//! | components | yes | [`LoadError::MissingRequired`] |
//! | quirks | no | logged |
//! | guides | no | logged |
//! | image index | no | logged |

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::KnowledgeConfig;
use crate::error::{display_paths, LoadError};
use crate::knowledge::{normalize_code, ImageIndex, KnowledgeBase};
use crate::models::{Category, EntryDetail, GuideEntry, ImageRef, KnowledgeEntry};

/// A knowledge source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Category(Category),
    Guides,
    Images,
}

impl Source {
    fn label(self) -> String {
        match self {
            Source::Category(c) => c.to_string(),
            Source::Guides => "diagnostic guides".to_string(),
            Source::Images => "image index".to_string(),
        }
    }
}

/// A directory layout that knowledge files may be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Hierarchical,
    LegacyFlat,
}

/// Resolution order: first existing path wins.
pub const RESOLUTION_ORDER: [Layout; 2] = [Layout::Hierarchical, Layout::LegacyFlat];

impl Layout {
    /// Candidate path for `source` under this layout.
    pub fn path_for(self, root: &Path, manufacturer: &str, version: &str, source: Source) -> PathBuf {
        match (self, source) {
            (Layout::Hierarchical, Source::Category(c)) => root
                .join("manufacturers")
                .join(manufacturer)
                .join(version)
                .join("knowledge")
                .join(hierarchical_file(c)),
            (Layout::LegacyFlat, Source::Category(c)) => root
                .join(manufacturer)
                .join(version)
                .join(legacy_file(c)),
            (Layout::Hierarchical, Source::Guides) => root
                .join("universal")
                .join("knowledge")
                .join("diagnostic_guides.json"),
            (Layout::LegacyFlat, Source::Guides) => root
                .join(manufacturer)
                .join(version)
                .join("practical_guides.json"),
            (Layout::Hierarchical, Source::Images) => root
                .join("universal")
                .join("images")
                .join("image_index.json"),
            (Layout::LegacyFlat, Source::Images) => root.join("images").join("image_index.json"),
        }
    }
}

fn hierarchical_file(category: Category) -> &'static str {
    match category {
        Category::ErrorCode => "error_codes.json",
        Category::Parameter => "parameters.json",
        Category::Component => "components.json",
        Category::Quirk => "quirks.json",
    }
}

fn legacy_file(category: Category) -> &'static str {
    match category {
        Category::Component => "abbreviations.json",
        other => hierarchical_file(other),
    }
}

/// Outcome of resolving one source across all layouts.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub found: Option<(Layout, PathBuf)>,
    pub tried: Vec<PathBuf>,
}

/// Loads [`KnowledgeBase`]s from a knowledge root directory.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    root: PathBuf,
}

impl KnowledgeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Try every layout in [`RESOLUTION_ORDER`] for `source`.
    pub fn resolve(&self, manufacturer: &str, version: &str, source: Source) -> Resolution {
        let mut tried = Vec::new();
        for layout in RESOLUTION_ORDER {
            let path = layout.path_for(&self.root, manufacturer, version, source);
            if path.is_file() {
                debug!("{} resolved via {:?}: {}", source.label(), layout, path.display());
                return Resolution {
                    found: Some((layout, path)),
                    tried,
                };
            }
            tried.push(path);
        }
        Resolution { found: None, tried }
    }

    /// Load the full knowledge base for one manufacturer/version.
    ///
    /// Fails if any required category is missing, malformed or violates an
    /// entry invariant. Optional sources that are missing or malformed are
    /// logged and left empty.
    pub fn load(&self, manufacturer: &str, version: &str) -> Result<KnowledgeBase, LoadError> {
        info!(
            "Loading knowledge base for {}/{} from {}",
            manufacturer,
            version,
            self.root.display()
        );

        let error_codes = self.load_required(manufacturer, version, Category::ErrorCode)?;
        let parameters = self.load_required(manufacturer, version, Category::Parameter)?;
        let components = self.load_required(manufacturer, version, Category::Component)?;
        let quirks = self.load_quirks(manufacturer, version);
        let guides = self.load_guides(manufacturer, version);
        let images = self.load_images(manufacturer, version);

        let mut entries = error_codes;
        entries.extend(parameters);
        entries.extend(components);
        entries.extend(quirks);

        Ok(KnowledgeBase::from_entries(
            manufacturer,
            version,
            entries,
            Arc::new(guides),
            images,
        ))
    }

    fn load_required(
        &self,
        manufacturer: &str,
        version: &str,
        category: Category,
    ) -> Result<Vec<KnowledgeEntry>, LoadError> {
        let resolution = self.resolve(manufacturer, version, Source::Category(category));
        let Some((_, path)) = resolution.found else {
            return Err(LoadError::MissingRequired {
                category,
                tried: resolution.tried,
            });
        };

        let entries = read_category(category, &path)?;
        validate_entries(category, &path, &entries)?;
        info!("Loaded {} {} from {}", entries.len(), category, path.display());
        Ok(entries)
    }

    fn load_quirks(&self, manufacturer: &str, version: &str) -> Vec<KnowledgeEntry> {
        let resolution = self.resolve(manufacturer, version, Source::Category(Category::Quirk));
        let Some((_, path)) = resolution.found else {
            warn!("Optional quirks not found (tried: {})", display_paths(&resolution.tried));
            return Vec::new();
        };
        match read_category(Category::Quirk, &path)
            .and_then(|entries| validate_entries(Category::Quirk, &path, &entries).map(|_| entries))
        {
            Ok(entries) => {
                info!("Loaded {} quirks from {}", entries.len(), path.display());
                entries
            }
            Err(e) => {
                warn!("Ignoring quirks: {}", e);
                Vec::new()
            }
        }
    }

    fn load_guides(&self, manufacturer: &str, version: &str) -> Vec<GuideEntry> {
        match self.load_optional::<GuidesFile>(manufacturer, version, Source::Guides) {
            Some((path, file)) => {
                let guides: Vec<GuideEntry> = file
                    .diagnostic_guides
                    .into_iter()
                    .map(RawGuide::into_guide)
                    .collect();
                info!("Loaded {} diagnostic guides from {}", guides.len(), path.display());
                guides
            }
            None => Vec::new(),
        }
    }

    fn load_images(&self, manufacturer: &str, version: &str) -> Option<ImageIndex> {
        let (path, file) =
            self.load_optional::<ImageIndexFile>(manufacturer, version, Source::Images)?;
        let buckets: HashMap<String, Vec<ImageRef>> = file
            .buckets
            .into_iter()
            .map(|(key, refs)| (key, refs.into_iter().map(RawImage::into_ref).collect()))
            .collect();
        let total: usize = buckets.values().map(Vec::len).sum();
        info!(
            "Loaded image index ({} buckets, {} references) from {}",
            buckets.len(),
            total,
            path.display()
        );
        Some(ImageIndex::new(buckets))
    }

    fn load_optional<T: DeserializeOwned>(
        &self,
        manufacturer: &str,
        version: &str,
        source: Source,
    ) -> Option<(PathBuf, T)> {
        let resolution = self.resolve(manufacturer, version, source);
        let Some((_, path)) = resolution.found else {
            warn!(
                "Optional {} not found (tried: {})",
                source.label(),
                display_paths(&resolution.tried)
            );
            return None;
        };
        match read_json::<T>(&path) {
            Ok(file) => Some((path, file)),
            Err(e) => {
                warn!("Ignoring optional {}: {}", source.label(), e);
                None
            }
        }
    }
}

/// Load the knowledge base named by the `[knowledge]` config section.
pub fn load_from_config(config: &KnowledgeConfig) -> Result<KnowledgeBase, LoadError> {
    KnowledgeStore::new(&config.root).load(&config.manufacturer, &config.version)
}

fn read_category(category: Category, path: &Path) -> Result<Vec<KnowledgeEntry>, LoadError> {
    let entries = match category {
        Category::ErrorCode => read_json::<ErrorCodesFile>(path)?
            .f_codes
            .into_iter()
            .map(RawErrorCode::into_entry)
            .collect(),
        Category::Parameter => read_json::<ParametersFile>(path)?
            .parameters
            .into_iter()
            .map(RawParameter::into_entry)
            .collect(),
        Category::Component => read_json::<ComponentsFile>(path)?
            .components
            .into_iter()
            .map(RawComponent::into_entry)
            .collect(),
        Category::Quirk => read_json::<QuirksFile>(path)?
            .quirks
            .into_iter()
            .map(RawQuirk::into_entry)
            .collect(),
    };
    Ok(entries)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LoadError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Enforce non-empty codes and descriptions, and per-category code uniqueness.
fn validate_entries(
    category: Category,
    path: &Path,
    entries: &[KnowledgeEntry],
) -> Result<(), LoadError> {
    let invalid = |reason: String| LoadError::InvalidEntry {
        category,
        path: path.to_path_buf(),
        reason,
    };

    let mut codes = HashSet::new();
    let mut triples = HashSet::new();

    for entry in entries {
        if entry.code.trim().is_empty() {
            return Err(invalid(format!(
                "entry '{}' has an empty code",
                entry.description
            )));
        }
        if entry.description.trim().is_empty() {
            return Err(invalid(format!("'{}' has an empty description", entry.code)));
        }
        let code = normalize_code(&entry.code);
        if category.has_unique_codes() {
            if !codes.insert(code) {
                return Err(invalid(format!("duplicate code '{}'", entry.code)));
            }
        } else if category == Category::Parameter
            && !triples.insert((code, entry.description.clone(), entry.manual_page))
        {
            return Err(invalid(format!(
                "duplicate parameter '{}' with identical description and page",
                entry.code
            )));
        }
    }
    Ok(())
}

/// Zero is not a valid manual page; extraction scripts use it for "unknown".
fn positive_page(page: Option<u32>) -> Option<u32> {
    page.filter(|p| *p > 0)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ============ On-disk schemas ============

#[derive(Deserialize)]
struct ErrorCodesFile {
    f_codes: Vec<RawErrorCode>,
}

#[derive(Deserialize)]
struct RawErrorCode {
    code: String,
    #[serde(alias = "description_de")]
    description: String,
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    cause_solution: Option<String>,
    #[serde(default)]
    manual_page: Option<u32>,
    #[serde(default)]
    extraction_status: Option<String>,
}

impl RawErrorCode {
    fn into_entry(self) -> KnowledgeEntry {
        KnowledgeEntry {
            code: self.code,
            description: self.description,
            manual_page: positive_page(self.manual_page),
            category: Category::ErrorCode,
            extraction_status: self.extraction_status,
            detail: EntryDetail::ErrorCode {
                family: self.family,
                number: self.number,
                cause_solution: non_blank(self.cause_solution),
            },
        }
    }
}

#[derive(Deserialize)]
struct ParametersFile {
    parameters: Vec<RawParameter>,
}

#[derive(Deserialize)]
struct RawParameter {
    code: String,
    #[serde(alias = "description_de")]
    description: String,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    manual_page: Option<u32>,
    #[serde(default)]
    extraction_status: Option<String>,
}

impl RawParameter {
    fn into_entry(self) -> KnowledgeEntry {
        KnowledgeEntry {
            code: self.code,
            description: self.description,
            manual_page: positive_page(self.manual_page),
            category: Category::Parameter,
            extraction_status: self.extraction_status,
            detail: EntryDetail::Parameter {
                section: non_blank(self.section),
            },
        }
    }
}

#[derive(Deserialize)]
struct ComponentsFile {
    #[serde(alias = "abbreviations")]
    components: Vec<RawComponent>,
}

#[derive(Deserialize)]
struct RawComponent {
    code: String,
    #[serde(alias = "description_de")]
    description: String,
    #[serde(default)]
    manual_page: Option<u32>,
    #[serde(default)]
    extraction_status: Option<String>,
}

impl RawComponent {
    fn into_entry(self) -> KnowledgeEntry {
        KnowledgeEntry {
            code: self.code,
            description: self.description,
            manual_page: positive_page(self.manual_page),
            category: Category::Component,
            extraction_status: self.extraction_status,
            detail: EntryDetail::Component {},
        }
    }
}

#[derive(Deserialize)]
struct QuirksFile {
    #[serde(alias = "known_issues")]
    quirks: Vec<RawQuirk>,
}

#[derive(Deserialize)]
struct RawQuirk {
    #[serde(alias = "code")]
    component: String,
    #[serde(alias = "description")]
    problem: String,
    #[serde(default)]
    symptoms: Vec<String>,
    #[serde(default, alias = "frequency_via")]
    frequency: Option<f64>,
    #[serde(default)]
    solution: Option<String>,
    #[serde(default)]
    manual_page: Option<u32>,
    #[serde(default)]
    extraction_status: Option<String>,
}

impl RawQuirk {
    fn into_entry(self) -> KnowledgeEntry {
        KnowledgeEntry {
            code: self.component,
            description: self.problem,
            manual_page: positive_page(self.manual_page),
            category: Category::Quirk,
            extraction_status: self.extraction_status,
            detail: EntryDetail::Quirk {
                symptoms: self.symptoms,
                frequency: self.frequency,
                solution: non_blank(self.solution),
            },
        }
    }
}

#[derive(Deserialize)]
struct GuidesFile {
    diagnostic_guides: Vec<RawGuide>,
}

#[derive(Deserialize)]
struct RawGuide {
    title: String,
    #[serde(default)]
    problem: String,
    #[serde(default, alias = "related_errors")]
    related_error_codes: Vec<String>,
    #[serde(default)]
    difficulty_level: Option<Value>,
    #[serde(default)]
    diagnosis_steps: Vec<Value>,
}

impl RawGuide {
    fn into_guide(self) -> GuideEntry {
        // relatedErrorCodes is a set: drop repeats, keep first-seen order.
        let mut seen = HashSet::new();
        let related_error_codes = self
            .related_error_codes
            .into_iter()
            .filter(|c| seen.insert(normalize_code(c)))
            .collect();

        GuideEntry {
            title: self.title,
            problem: self.problem,
            related_error_codes,
            difficulty_level: self.difficulty_level.and_then(|v| scalar_text(&v)),
            diagnosis_steps: self.diagnosis_steps.iter().filter_map(step_text).collect(),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(Some(s.clone())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Guides written by hand store steps either as plain strings or as
/// objects such as `{"step": 1, "action": "..."}`.
fn step_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(Some(s.clone())),
        Value::Object(map) => ["action", "description", "text", "title"]
            .iter()
            .find_map(|k| map.get(*k).and_then(scalar_text)),
        _ => None,
    }
}

#[derive(Deserialize)]
struct ImageIndexFile {
    buckets: HashMap<String, Vec<RawImage>>,
}

#[derive(Deserialize)]
struct RawImage {
    #[serde(alias = "path")]
    file: String,
    #[serde(default, alias = "related_errors")]
    error_codes: Vec<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    manual_page: Option<u32>,
}

impl RawImage {
    fn into_ref(self) -> ImageRef {
        ImageRef {
            file: self.file,
            error_codes: self.error_codes,
            caption: non_blank(self.caption),
            manual_page: positive_page(self.manual_page),
        }
    }
}
