//! TOML configuration.
//!
//! Only `[knowledge]` is mandatory; every other section falls back to
//! defaults suitable for a single-site deployment.
//!
//! ```toml
//! [knowledge]
//! root = "./data"
//! manufacturer = "via"
//! version = "v74"
//!
//! [engine]
//! provider = "anthropic"
//! model = "claude-sonnet-4-20250514"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    pub root: PathBuf,
    pub manufacturer: String,
    pub version: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_max_per_category")]
    pub max_per_category: usize,
    #[serde(default = "default_cause_excerpt_chars")]
    pub cause_excerpt_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_per_category: default_max_per_category(),
            cause_excerpt_chars: default_cause_excerpt_chars(),
        }
    }
}

fn default_max_per_category() -> usize {
    5
}
fn default_cause_excerpt_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
        }
    }
}

impl EngineConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_max_tokens() -> u32 {
    1500
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}
fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Maximum number of turns sent to the engine per call.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
        }
    }
}

fn default_history_window() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_dir")]
    pub dir: PathBuf,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            dir: default_feedback_dir(),
        }
    }
}

fn default_feedback_dir() -> PathBuf {
    PathBuf::from("./data/validation")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Config {
    /// Configuration pointing at `./data` for the default manufacturer,
    /// with every optional section at its default.
    pub fn minimal() -> Self {
        Self {
            knowledge: KnowledgeConfig {
                root: PathBuf::from("./data"),
                manufacturer: "via".to_string(),
                version: "v74".to_string(),
            },
            context: ContextConfig::default(),
            engine: EngineConfig::default(),
            session: SessionConfig::default(),
            feedback: FeedbackConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.knowledge.manufacturer.trim().is_empty() {
        anyhow::bail!("knowledge.manufacturer must not be empty");
    }
    if config.knowledge.version.trim().is_empty() {
        anyhow::bail!("knowledge.version must not be empty");
    }

    if config.context.max_per_category == 0 {
        anyhow::bail!("context.max_per_category must be >= 1");
    }

    if config.session.history_window == 0 {
        anyhow::bail!("session.history_window must be >= 1");
    }

    if config.engine.timeout_secs == 0 {
        anyhow::bail!("engine.timeout_secs must be > 0");
    }
    if config.engine.max_tokens == 0 {
        anyhow::bail!("engine.max_tokens must be > 0");
    }

    match config.engine.provider.as_str() {
        "disabled" | "anthropic" => {}
        other => anyhow::bail!(
            "Unknown engine provider: '{}'. Must be disabled or anthropic.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let cfg = parse(
            r#"
            [knowledge]
            root = "/srv/kb"
            manufacturer = "via"
            version = "v74"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.context.max_per_category, 5);
        assert_eq!(cfg.context.cause_excerpt_chars, 200);
        assert_eq!(cfg.engine.api_key_env, "ANTHROPIC_API_KEY");
        assert!(!cfg.engine.is_enabled());
        assert_eq!(cfg.session.history_window, 20);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse(
            r#"
            [knowledge]
            root = "/srv/kb"
            manufacturer = "via"
            version = "v74"

            [engine]
            provider = "openai"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown engine provider"));
    }

    #[test]
    fn test_zero_history_window_rejected() {
        let err = parse(
            r#"
            [knowledge]
            root = "/srv/kb"
            manufacturer = "via"
            version = "v74"

            [session]
            history_window = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("history_window"));
    }

    #[test]
    fn test_missing_knowledge_section_fails() {
        assert!(parse("[engine]\nprovider = \"disabled\"\n").is_err());
    }
}
