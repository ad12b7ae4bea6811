/// Configuration module for raggedy.
///
/// Handles loading, validating, and providing default configuration values.
/// Values come from a JSON file, then environment overrides, then CLI flags.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::answer::DocumentMode;
use crate::corpus::IndexOptions;
use crate::llm::Provider;
use crate::pipeline::PipelineOptions;
use crate::usage::{ModelRates, PriceTable};

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "raggedy.json";

// ── Default value functions ──────────────────────────────────────────

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_selected() -> usize {
    4
}

fn default_head_chars() -> usize {
    500
}

fn default_full_corpus_threshold() -> usize {
    100_000
}

// ── Config struct ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub provider: Provider,

    /// Answer model; defaults per provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Model for the selection call; falls back to `model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Environment variable holding the API key; defaults per provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Cap on documents the selector may return.
    #[serde(default = "default_max_selected")]
    pub max_selected: usize,

    /// Characters of each document shown in its outline.
    #[serde(default = "default_head_chars")]
    pub head_chars: usize,

    /// Corpora at or under this many characters skip selection.
    #[serde(default = "default_full_corpus_threshold")]
    pub full_corpus_threshold: usize,

    /// Defaults per provider when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_mode: Option<DocumentMode>,

    /// Glob patterns, relative to the corpus root, to leave out.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Per-model price overrides, USD per million tokens.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub pricing: HashMap<String, ModelRates>,
}

// ── Default impl ─────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            selector_model: None,
            api_base: None,
            api_key_env: None,
            max_tokens: default_max_tokens(),
            max_selected: default_max_selected(),
            head_chars: default_head_chars(),
            full_corpus_threshold: default_full_corpus_threshold(),
            document_mode: None,
            exclude: Vec::new(),
            request_timeout_secs: None,
            pricing: HashMap::new(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration.
    ///
    /// With an explicit `path` the file must exist. Otherwise `./raggedy.json`
    /// and then `<config dir>/raggedy/config.json` are tried, falling back to
    /// defaults when neither exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_file(path);
        }

        for candidate in default_locations() {
            if candidate.is_file() {
                return Self::load_file(&candidate);
            }
        }

        info!("no config file found, using defaults");
        Ok(Self::default())
    }

    fn load_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid config JSON: {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Apply `RAGGEDY_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("RAGGEDY_PROVIDER") {
            self.provider = provider
                .parse()
                .map_err(|e: String| anyhow::anyhow!("RAGGEDY_PROVIDER: {e}"))?;
        }
        if let Some(model) = lookup("RAGGEDY_MODEL") {
            self.model = Some(model);
        }
        if let Some(value) = lookup("RAGGEDY_FULL_CORPUS_THRESHOLD") {
            self.full_corpus_threshold = value
                .trim()
                .parse()
                .with_context(|| format!("RAGGEDY_FULL_CORPUS_THRESHOLD: invalid number {value:?}"))?;
        }
        if let Some(value) = lookup("RAGGEDY_MAX_SELECTED") {
            self.max_selected = value
                .trim()
                .parse()
                .with_context(|| format!("RAGGEDY_MAX_SELECTED: invalid number {value:?}"))?;
        }
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_selected > 0, "max_selected must be positive");
        anyhow::ensure!(self.head_chars > 0, "head_chars must be positive");
        anyhow::ensure!(self.max_tokens > 0, "max_tokens must be positive");
        anyhow::ensure!(!self.model().trim().is_empty(), "model must not be empty");
        if self.request_timeout_secs == Some(0) {
            warn!("request_timeout_secs is 0; requests will time out immediately");
        }
        self.exclude_set()?;

        let prices = self.price_table();
        prices.rates(self.model())?;
        prices.rates(self.selector_model())?;
        Ok(())
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    #[must_use]
    pub fn selector_model(&self) -> &str {
        self.selector_model.as_deref().unwrap_or_else(|| self.model())
    }

    #[must_use]
    pub fn api_key_env(&self) -> String {
        self.api_key_env
            .clone()
            .unwrap_or_else(|| self.provider.default_api_key_env().to_string())
    }

    #[must_use]
    pub fn document_mode(&self) -> DocumentMode {
        self.document_mode.unwrap_or(match self.provider {
            Provider::Anthropic => DocumentMode::Auxiliary,
            Provider::OpenAi => DocumentMode::Inline,
        })
    }

    #[must_use]
    pub fn price_table(&self) -> PriceTable {
        PriceTable::with_overrides(&self.pricing)
    }

    /// Compile the exclude patterns.
    pub fn exclude_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            builder.add(
                Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {pattern}"))?,
            );
        }
        builder.build().context("failed to build exclude set")
    }

    pub fn index_options(&self) -> Result<IndexOptions> {
        Ok(IndexOptions {
            head_chars: self.head_chars,
            exclude: self.exclude_set()?,
        })
    }

    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            full_corpus_threshold: self.full_corpus_threshold,
            max_selected: self.max_selected,
            max_tokens: self.max_tokens,
            document_mode: self.document_mode(),
        }
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("raggedy").join("config.json"));
    }
    paths
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider, Provider::Anthropic);
        assert_eq!(config.max_selected, 4);
        assert_eq!(config.head_chars, 500);
        assert_eq!(config.full_corpus_threshold, 100_000);
        assert_eq!(config.model(), "claude-3-5-sonnet-latest");
        assert_eq!(config.selector_model(), config.model());
        assert_eq!(config.api_key_env(), "ANTHROPIC_API_KEY");
        assert_eq!(config.document_mode(), DocumentMode::Auxiliary);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"provider": "openai", "model": "gpt-4o-mini", "max_selected": 6}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.max_selected, 6);
        // Other fields should have defaults
        assert_eq!(config.head_chars, 500);
        assert_eq!(config.api_key_env(), "OPENAI_API_KEY");
        assert_eq!(config.document_mode(), DocumentMode::Inline);
    }

    #[test]
    fn test_model_follows_provider() {
        let config: Config = serde_json::from_str(r#"{"provider": "openai"}"#).unwrap();
        assert_eq!(config.model(), "gpt-4o");
        assert_eq!(config.selector_model(), "gpt-4o");
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.apply_env(env(&[("RAGGEDY_PROVIDER", "openai")])).unwrap();
        assert_eq!(config.model(), "gpt-4o");

        // An explicit model still wins
        config.model = Some("gpt-4o-mini".to_string());
        assert_eq!(config.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.json"))).is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raggedy.json");
        let mut config = Config::default();
        config.selector_model = Some("claude-3-5-haiku-latest".to_string());
        config.exclude = vec!["drafts/**".to_string()];
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.selector_model(), "claude-3-5-haiku-latest");
        assert_eq!(loaded.exclude, vec!["drafts/**"]);
    }

    #[test]
    fn test_invalid_json_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("RAGGEDY_PROVIDER", "openai"),
                ("RAGGEDY_MODEL", "gpt-4o-mini"),
                ("RAGGEDY_FULL_CORPUS_THRESHOLD", " 2500 "),
                ("RAGGEDY_MAX_SELECTED", "2"),
            ]))
            .unwrap();
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.model(), "gpt-4o-mini");
        assert_eq!(config.full_corpus_threshold, 2500);
        assert_eq!(config.max_selected, 2);
    }

    #[test]
    fn test_env_bad_number() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("RAGGEDY_FULL_CORPUS_THRESHOLD", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("RAGGEDY_FULL_CORPUS_THRESHOLD"));
    }

    #[test]
    fn test_validate_bad_values() {
        let mut config = Config::default();
        config.max_selected = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.head_chars = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.exclude = vec!["[unclosed".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_model() {
        let mut config = Config::default();
        config.model = Some("mystery-model".to_string());
        assert!(config.validate().is_err());

        // A pricing entry makes it acceptable
        config
            .pricing
            .insert("mystery-model".to_string(), ModelRates::new(1.0, 1.0, 0.0, 0.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_options_follow_config() {
        let mut config = Config::default();
        config.full_corpus_threshold = 42;
        config.document_mode = Some(DocumentMode::Inline);
        let opts = config.pipeline_options();
        assert_eq!(opts.full_corpus_threshold, 42);
        assert_eq!(opts.document_mode, DocumentMode::Inline);
    }
}
