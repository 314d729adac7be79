
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::matcher::taxonomy::{
    Category, default_category_keywords, default_exclusion_keywords, default_topic_category_map,
    default_topic_keyword_map,
};

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Connection settings for the external embedding service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "all-minilm:latest".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

/// Settings for the external crawl backend (actor-run API).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrawlConfig {
    pub base_url: String,
    pub actor_id: String,
    /// Bearer token; the ADMATCH_CRAWL_TOKEN environment variable takes
    /// precedence over the config file.
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
    pub poll_interval_seconds: u64,
}

impl Default for CrawlConfig {
    #[inline]
    fn default() -> Self {
        Self {
            base_url: "https://api.apify.com/v2".to_string(),
            actor_id: "tropical_lease~web-context-extractor".to_string(),
            api_token: None,
            timeout_seconds: 300,
            poll_interval_seconds: 5,
        }
    }
}

impl CrawlConfig {
    /// Token resolution order: environment variable, then config file.
    #[inline]
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var("ADMATCH_CRAWL_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.api_token.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// How long an enriched context stays servable.
    pub context_ttl_seconds: u64,
    /// Staleness window for the is-crawling flag; a crawl that never
    /// reached a terminal state stops blocking retriggers after this long.
    pub crawl_window_seconds: u64,
}

impl Default for CacheConfig {
    #[inline]
    fn default() -> Self {
        Self {
            context_ttl_seconds: 86_400,
            crawl_window_seconds: 300,
        }
    }
}

/// Tunables and keyword tables for the product matcher. The numeric
/// defaults are empirically chosen; they live in config so experiments
/// don't touch the algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    pub top_k: usize,
    pub min_score: f32,
    pub category_boost: f32,
    pub category_penalty: f32,
    pub dominance_threshold: f32,
    pub exclusion_keywords: BTreeMap<String, Vec<String>>,
    pub category_keywords: BTreeMap<Category, Vec<String>>,
    pub topic_category_map: BTreeMap<String, Category>,
    pub topic_keyword_map: BTreeMap<String, Vec<String>>,
}

impl Default for MatchingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.0,
            category_boost: 1.15,
            category_penalty: 0.7,
            dominance_threshold: 0.66,
            exclusion_keywords: default_exclusion_keywords(),
            category_keywords: default_category_keywords(),
            topic_category_map: default_topic_category_map(),
            topic_keyword_map: default_topic_keyword_map(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid actor id: {0} (cannot be empty)")]
    InvalidActorId(String),
    #[error("Invalid crawl timeout: {0} (must be between 10 and 3600 seconds)")]
    InvalidCrawlTimeout(u64),
    #[error("Invalid poll interval: {0} (must be at least 1 second and below the crawl timeout)")]
    InvalidPollInterval(u64),
    #[error("Invalid cache TTL: {0} (must be at least 60 seconds)")]
    InvalidCacheTtl(u64),
    #[error("Invalid crawl window: {0} (must be at least 10 seconds)")]
    InvalidCrawlWindow(u64),
    #[error("Invalid top-k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid min score: {0} (must be between 0 and 1)")]
    InvalidMinScore(f32),
    #[error("Invalid category boost: {0} (must be between 1 and 2)")]
    InvalidCategoryBoost(f32),
    #[error("Invalid category penalty: {0} (must be between 0 and 1)")]
    InvalidCategoryPenalty(f32),
    #[error("Invalid dominance threshold: {0} (must be between 0.5 and 1)")]
    InvalidDominanceThreshold(f32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                embedding: EmbeddingConfig::default(),
                crawl: CrawlConfig::default(),
                cache: CacheConfig::default(),
                matching: MatchingConfig::default(),
                base_dir: config_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.crawl.validate()?;
        self.cache.validate()?;
        self.matching.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Path of the SQLite database backing the stores.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join("admatch.db")
    }

    /// Directory scanned by the product auto-loader.
    #[inline]
    pub fn products_dir(&self) -> PathBuf {
        self.get_base_dir().join("products")
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn service_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if self.actor_id.trim().is_empty() {
            return Err(ConfigError::InvalidActorId(self.actor_id.clone()));
        }

        if !(10..=3600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidCrawlTimeout(self.timeout_seconds));
        }

        if self.poll_interval_seconds == 0 || self.poll_interval_seconds >= self.timeout_seconds {
            return Err(ConfigError::InvalidPollInterval(self.poll_interval_seconds));
        }

        Ok(())
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context_ttl_seconds < 60 {
            return Err(ConfigError::InvalidCacheTtl(self.context_ttl_seconds));
        }

        if self.crawl_window_seconds < 10 {
            return Err(ConfigError::InvalidCrawlWindow(self.crawl_window_seconds));
        }

        Ok(())
    }
}

impl MatchingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 || self.top_k > 100 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ConfigError::InvalidMinScore(self.min_score));
        }

        if !(1.0..=2.0).contains(&self.category_boost) {
            return Err(ConfigError::InvalidCategoryBoost(self.category_boost));
        }

        if !(0.0..=1.0).contains(&self.category_penalty) {
            return Err(ConfigError::InvalidCategoryPenalty(self.category_penalty));
        }

        if !(0.5..=1.0).contains(&self.dominance_threshold) {
            return Err(ConfigError::InvalidDominanceThreshold(
                self.dominance_threshold,
            ));
        }

        Ok(())
    }
}
