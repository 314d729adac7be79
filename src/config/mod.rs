// Configuration management module
// TOML-backed settings plus the interactive editor

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    CacheConfig, Config, ConfigError, CrawlConfig, DEFAULT_EMBEDDING_DIMENSION, EmbeddingConfig,
    MatchingConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|base| base.join("admatch"))
        .ok_or(ConfigError::DirectoryError)
}
