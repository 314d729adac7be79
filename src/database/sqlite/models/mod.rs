
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::warn;

use crate::models::{EnrichedPageContext, PageContextEntry, Product};

/// Raw `products` row; the embedding column is a JSON array.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub currency: String,
    pub image_url: String,
    pub landing_url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub embedding: Option<String>,
}

impl ProductRow {
    /// Decode into the domain type. A row whose embedding column holds
    /// unparseable JSON is treated as malformed and dropped.
    #[inline]
    pub fn into_product(self) -> Option<Product> {
        let embedding = match self.embedding {
            None => None,
            Some(raw) => match serde_json::from_str::<Vec<f32>>(&raw) {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!(
                        "Skipping product {} with malformed embedding column: {}",
                        self.id, e
                    );
                    return None;
                }
            },
        };

        Some(Product {
            id: self.id,
            name: self.name,
            description: self.description,
            price: self.price,
            currency: self.currency,
            image_url: self.image_url,
            landing_url: self.landing_url,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            embedding,
        })
    }
}

/// Raw `page_contexts` row; the context column is the full enrichment
/// document as JSON.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PageContextRow {
    pub url: String,
    pub context: Option<String>,
    pub is_crawling: bool,
    pub last_crawl_triggered: Option<DateTime<Utc>>,
    pub cached_at: DateTime<Utc>,
}

impl PageContextRow {
    /// Decode into the domain cache entry, dropping rows whose context
    /// document no longer parses.
    #[inline]
    pub fn into_entry(self) -> Option<PageContextEntry> {
        let context = match self.context {
            None => None,
            Some(raw) => match serde_json::from_str::<EnrichedPageContext>(&raw) {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!(
                        "Skipping page context {} with malformed document: {}",
                        self.url, e
                    );
                    return None;
                }
            },
        };

        Some(PageContextEntry {
            url: self.url,
            context,
            is_crawling: self.is_crawling,
            last_crawl_triggered: self.last_crawl_triggered,
            cached_at: self.cached_at,
        })
    }
}
