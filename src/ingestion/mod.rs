
use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::embeddings::{EmbeddingClient, product_text};
use crate::models::{NewProduct, ProductUpdate};
use crate::storage::ProductCatalog;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Fields parsed from a `{name}_description.txt` file: `key: value`
/// metadata lines followed by the free-text description.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDescription {
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub landing_url: String,
}

/// An image file and its sibling description file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPair {
    pub image: PathBuf,
    pub description: PathBuf,
}

/// Outcome of one auto-load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub loaded: usize,
    pub skipped: usize,
    pub embedded: usize,
}

/// Parse a description file. The header is `key: value` lines; the first
/// line that doesn't look like one starts the description body.
#[inline]
pub fn parse_description_file(path: &Path) -> Result<ParsedDescription> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read description file: {}", path.display()))?;

    let mut metadata: BTreeMap<String, String> = BTreeMap::new();
    let mut description_lines: Vec<&str> = Vec::new();
    let mut in_description = false;

    for line in content.lines() {
        if !in_description && line.contains(':') && !line.starts_with(' ') {
            if let Some((key, value)) = line.split_once(':') {
                metadata.insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        } else {
            in_description = true;
            if !line.trim().is_empty() {
                description_lines.push(line);
            }
        }
    }

    let name = metadata
        .get("name")
        .filter(|n| !n.is_empty())
        .cloned()
        .ok_or_else(|| anyhow!("Product 'name' is required in {}", path.display()))?;

    let landing_url = metadata
        .get("url")
        .filter(|u| !u.is_empty())
        .cloned()
        .ok_or_else(|| anyhow!("Product 'url' is required in {}", path.display()))?;

    let price = metadata.get("price").and_then(|p| p.parse::<f64>().ok());

    let mut description = description_lines.join("\n").trim().to_string();
    if description.is_empty() {
        description = name.clone();
    }

    Ok(ParsedDescription {
        name,
        description,
        price,
        landing_url,
    })
}

/// Scan a directory for `{base}.{jpg,...}` + `{base}_description.txt`
/// pairs, keyed by base name.
#[inline]
pub fn find_product_pairs(products_dir: &Path) -> Result<BTreeMap<String, ProductPair>> {
    let mut pairs = BTreeMap::new();

    let entries = fs::read_dir(products_dir)
        .with_context(|| format!("Failed to read products dir: {}", products_dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let lowered = ext.to_lowercase();
                IMAGE_EXTENSIONS.contains(&lowered.as_str())
            });
        if !is_image {
            continue;
        }

        let Some(base_name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let description = products_dir.join(format!("{base_name}_description.txt"));
        if description.exists() {
            pairs.insert(
                base_name.to_string(),
                ProductPair {
                    image: path.clone(),
                    description,
                },
            );
        }
    }

    Ok(pairs)
}

/// Load products from the flat file layout, then back-fill embeddings
/// for anything in the catalog that still lacks one. Malformed files are
/// skipped, embedding failures leave products serviceable without one.
#[inline]
pub async fn auto_load(
    catalog: &ProductCatalog,
    embedder: &EmbeddingClient,
    products_dir: &Path,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    if catalog.is_empty() {
        if !products_dir.exists() {
            warn!("Products directory not found: {}", products_dir.display());
            return Ok(stats);
        }

        let pairs = find_product_pairs(products_dir)?;
        if pairs.is_empty() {
            warn!(
                "No product files found in {} (expected [name].jpg plus [name]_description.txt)",
                products_dir.display()
            );
            return Ok(stats);
        }

        info!("Found {} product pairs", pairs.len());

        for (base_name, pair) in &pairs {
            match parse_description_file(&pair.description) {
                Ok(parsed) => {
                    let new_product = NewProduct {
                        name: parsed.name,
                        description: parsed.description,
                        price: parsed.price,
                        currency: "USD".to_string(),
                        image_url: pair.image.to_string_lossy().to_string(),
                        landing_url: parsed.landing_url,
                    };
                    let product = catalog.create(new_product).await?;
                    info!("Loaded: {} ({})", product.name, base_name);
                    stats.loaded += 1;
                }
                Err(e) => {
                    warn!("Skipping {}: {e:#}", base_name);
                    stats.skipped += 1;
                }
            }
        }
    } else {
        info!("{} products already loaded", catalog.len());
    }

    stats.embedded = backfill_embeddings(catalog, embedder).await?;
    Ok(stats)
}

/// Generate embeddings for products that don't have one yet.
#[inline]
pub async fn backfill_embeddings(
    catalog: &ProductCatalog,
    embedder: &EmbeddingClient,
) -> Result<usize> {
    let missing = catalog.missing_embeddings();
    if missing.is_empty() {
        info!("All products have embeddings");
        return Ok(0);
    }

    info!("Generating embeddings for {} products", missing.len());

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(missing.len() as u64).with_style(
            ProgressStyle::with_template("{bar:30} [{pos}/{len}] Embedding {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut embedded = 0usize;
    for product in missing {
        bar.set_message(product.name.clone());

        match embedder.embed(&product_text(&product)) {
            Ok(embedding) => {
                let update = ProductUpdate {
                    embedding: Some(embedding),
                    ..ProductUpdate::default()
                };
                if let Err(e) = catalog.update(&product.id, update).await {
                    warn!("Failed to store embedding for {}: {e:#}", product.name);
                } else {
                    embedded += 1;
                }
            }
            Err(e) => {
                warn!("Embedding failed for {}: {e:#}", product.name);
            }
        }

        bar.inc(1);
    }

    bar.finish_and_clear();
    Ok(embedded)
}
