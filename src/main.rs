use admatch::Result;
use admatch::commands::{
    clear_cache, enrich_url, ingest_products, invalidate_url, list_products, match_products,
    show_status,
};
use admatch::config::{run_interactive_config, show_config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "admatch")]
#[command(about = "Contextual product matching: page enrichment plus embedding-based ranking")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding service and crawl backend
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load products from a directory of image + description pairs
    Ingest {
        /// Directory to scan (defaults to the configured products dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List the product catalog
    Products,
    /// Enrich a page URL, crawling it on a cache miss
    Enrich {
        /// Page URL to enrich
        url: String,
    },
    /// Rank catalog products against a page
    Match {
        /// Page URL to match against
        url: String,
        /// Number of products to return
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum cosine similarity threshold
        #[arg(long)]
        min_score: Option<f32>,
    },
    /// Drop the cached context for a URL
    Invalidate {
        /// Page URL to evict
        url: String,
    },
    /// Drop every cached page context
    ClearCache,
    /// Show catalog, cache, and service status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { dir } => {
            ingest_products(dir).await?;
        }
        Commands::Products => {
            list_products().await?;
        }
        Commands::Enrich { url } => {
            enrich_url(&url).await?;
        }
        Commands::Match {
            url,
            top_k,
            min_score,
        } => {
            match_products(&url, top_k, min_score).await?;
        }
        Commands::Invalidate { url } => {
            invalidate_url(&url).await?;
        }
        Commands::ClearCache => {
            clear_cache().await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["admatch", "products"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Products);
        }
    }

    #[test]
    fn enrich_command_with_url() {
        let cli = Cli::try_parse_from(["admatch", "enrich", "https://example.com/article"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Enrich { url } = parsed.command {
                assert_eq!(url, "https://example.com/article");
            }
        }
    }

    #[test]
    fn match_command_with_options() {
        let cli = Cli::try_parse_from([
            "admatch",
            "match",
            "https://example.com/article",
            "--top-k",
            "3",
            "--min-score",
            "0.4",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Match {
                url,
                top_k,
                min_score,
            } = parsed.command
            {
                assert_eq!(url, "https://example.com/article");
                assert_eq!(top_k, Some(3));
                assert_eq!(min_score, Some(0.4));
            }
        }
    }

    #[test]
    fn ingest_command_with_dir() {
        let cli = Cli::try_parse_from(["admatch", "ingest", "--dir", "/tmp/products"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { dir } = parsed.command {
                assert_eq!(dir, Some(PathBuf::from("/tmp/products")));
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["admatch", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["admatch", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["admatch", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
