
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::sqlite::{Database, DbPool, ProductQueries};
use crate::models::{NewProduct, Product, ProductUpdate};

/// In-memory product catalog with sqlite write-through. All mutation
/// goes through these operations.
#[derive(Debug)]
pub struct ProductCatalog {
    pool: DbPool,
    products: RwLock<HashMap<String, Product>>,
}

impl ProductCatalog {
    /// Load every persisted product, skipping malformed rows.
    #[inline]
    pub async fn load(database: &Database) -> Result<Self> {
        let rows = ProductQueries::list_all(database.pool())
            .await
            .context("Failed to load products")?;

        let total = rows.len();
        let products: HashMap<String, Product> = rows
            .into_iter()
            .filter_map(|row| row.into_product())
            .map(|product| (product.id.clone(), product))
            .collect();

        if products.len() < total {
            warn!(
                "Dropped {} malformed product rows on load",
                total - products.len()
            );
        }
        info!("Loaded {} products", products.len());

        Ok(Self {
            pool: database.pool().clone(),
            products: RwLock::new(products),
        })
    }

    #[inline]
    pub async fn create(&self, new_product: NewProduct) -> Result<Product> {
        let now = Utc::now();
        let product = Product {
            id: format!("prod_{}", Uuid::new_v4()),
            name: new_product.name,
            description: new_product.description,
            price: new_product.price,
            currency: new_product.currency,
            image_url: new_product.image_url,
            landing_url: new_product.landing_url,
            active: true,
            created_at: now,
            updated_at: now,
            embedding: None,
        };

        self.persist(product.clone()).await?;
        Ok(product)
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<Product> {
        self.products.read().ok()?.get(id).cloned()
    }

    /// All products, oldest first. `active_only` filters out paused ones.
    #[inline]
    pub fn get_all(&self, active_only: bool) -> Vec<Product> {
        let Ok(products) = self.products.read() else {
            return Vec::new();
        };

        let mut list: Vec<Product> = products
            .values()
            .filter(|p| !active_only || p.active)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        list
    }

    /// Active products still waiting for an embedding back-fill.
    #[inline]
    pub fn missing_embeddings(&self) -> Vec<Product> {
        self.get_all(false)
            .into_iter()
            .filter(|p| !p.has_embedding())
            .collect()
    }

    /// Apply a partial update. An embedding in the update is only taken
    /// when the product has none yet; embeddings are append-only until a
    /// re-ingest replaces the record.
    #[inline]
    pub async fn update(&self, id: &str, update: ProductUpdate) -> Result<Option<Product>> {
        let Some(mut product) = self.get(id) else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = description;
        }
        if let Some(price) = update.price {
            product.price = Some(price);
        }
        if let Some(currency) = update.currency {
            product.currency = currency;
        }
        if let Some(image_url) = update.image_url {
            product.image_url = image_url;
        }
        if let Some(landing_url) = update.landing_url {
            product.landing_url = landing_url;
        }
        if let Some(active) = update.active {
            product.active = active;
        }
        if let Some(embedding) = update.embedding {
            if product.has_embedding() {
                debug!("Product {} already has an embedding; keeping it", id);
            } else {
                product.embedding = Some(embedding);
            }
        }

        product.updated_at = Utc::now();
        self.persist(product.clone()).await?;
        Ok(Some(product))
    }

    #[inline]
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let existed = ProductQueries::delete(&self.pool, id)
            .await
            .context("Failed to delete product")?;

        let mut products = self.products.write().map_err(|_| poisoned())?;
        products.remove(id);
        Ok(existed)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.products.read().map(|p| p.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durable write first, then the in-memory view.
    async fn persist(&self, product: Product) -> Result<()> {
        ProductQueries::upsert(&self.pool, &product)
            .await
            .context("Failed to persist product")?;

        let mut products = self.products.write().map_err(|_| poisoned())?;
        products.insert(product.id.clone(), product);
        Ok(())
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("Product catalog lock poisoned")
}
