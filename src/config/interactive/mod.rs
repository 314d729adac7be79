
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::settings::{Config, CrawlConfig, EmbeddingConfig};
use super::get_config_dir;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 admatch Configuration Setup").bold().cyan());
    eprintln!();

    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    let mut config = match Config::load(&config_dir) {
        Ok(config) => config,
        Err(_) => {
            eprintln!(
                "{}",
                style("Existing configuration could not be read. Using defaults.").yellow()
            );
            Config {
                embedding: EmbeddingConfig::default(),
                crawl: CrawlConfig::default(),
                cache: crate::config::CacheConfig::default(),
                matching: crate::config::MatchingConfig::default(),
                base_dir: config_dir.clone(),
            }
        }
    };

    eprintln!("{}", style("Embedding Service").bold().yellow());
    eprintln!("Configure the embedding service used for pages and products.");
    eprintln!();
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Crawl Backend").bold().yellow());
    configure_crawl(&mut config.crawl)?;

    eprintln!();
    eprintln!("{}", style("Testing embedding service...").yellow());
    if test_embedding_connection(&config.embedding) {
        eprintln!("{}", style("✓ Embedding service reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the embedding service").yellow()
        );
        eprintln!("You can continue, but enrichment will run without embeddings until it is up.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    let config = Config::load(&config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Service:").bold().yellow());
    eprintln!("  Host: {}", style(&config.embedding.host).cyan());
    eprintln!("  Port: {}", style(config.embedding.port).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!(
        "  Dimension: {}",
        style(config.embedding.embedding_dimension).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Crawl Backend:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.crawl.base_url).cyan());
    eprintln!("  Actor: {}", style(&config.crawl.actor_id).cyan());
    eprintln!(
        "  Token: {}",
        if config.crawl.resolve_token().is_some() {
            style("configured").green()
        } else {
            style("missing").red()
        }
    );
    eprintln!(
        "  Timeout: {}s, poll every {}s",
        style(config.crawl.timeout_seconds).cyan(),
        style(config.crawl.poll_interval_seconds).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Cache:").bold().yellow());
    eprintln!(
        "  Context TTL: {}s",
        style(config.cache.context_ttl_seconds).cyan()
    );
    eprintln!(
        "  Crawl window: {}s",
        style(config.cache.crawl_window_seconds).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Matching:").bold().yellow());
    eprintln!("  Top K: {}", style(config.matching.top_k).cyan());
    eprintln!(
        "  Boost/penalty: {} / {}",
        style(config.matching.category_boost).cyan(),
        style(config.matching.category_penalty).cyan()
    );
    eprintln!(
        "  Dominance threshold: {}",
        style(config.matching.dominance_threshold).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedding.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Embedding service protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;
    embedding.protocol = protocols[protocol_index].to_string();

    embedding.host = Input::new()
        .with_prompt("Embedding service host")
        .default(embedding.host.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Host cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.port = Input::new()
        .with_prompt("Embedding service port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.model = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.validate().map_err(anyhow::Error::from)?;
    Ok(())
}

fn configure_crawl(crawl: &mut CrawlConfig) -> Result<()> {
    crawl.actor_id = Input::new()
        .with_prompt("Crawl actor id")
        .default(crawl.actor_id.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Actor id cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    crawl.timeout_seconds = Input::new()
        .with_prompt("Overall crawl timeout (seconds)")
        .default(crawl.timeout_seconds)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if !(10..=3600).contains(input) {
                Err("Timeout must be between 10 and 3600 seconds")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    crawl.validate().map_err(anyhow::Error::from)?;
    Ok(())
}

fn test_embedding_connection(embedding: &EmbeddingConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        embedding.protocol, embedding.host, embedding.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
