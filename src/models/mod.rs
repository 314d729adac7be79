#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A catalog product eligible for ad insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub image_url: String,
    pub landing_url: String,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Populated lazily by the ingestion back-fill; immutable once set.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Product {
    #[inline]
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Lowercased name + description, the text keyword tables match against.
    #[inline]
    pub fn search_text(&self) -> String {
        format!("{} {}", self.name, self.description).to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub image_url: String,
    pub landing_url: String,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
    pub landing_url: Option<String>,
    pub active: Option<bool>,
    pub embedding: Option<Vec<f32>>,
}

/// Per-URL enrichment produced by one successful crawl. Immutable after
/// creation except for the embedding back-fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPageContext {
    pub url: String,
    pub title: Option<String>,
    #[serde(default)]
    pub headings: Vec<String>,
    pub main_content: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub visual_styles: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub system_info: BTreeMap<String, serde_json::Value>,
    pub description: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    pub crawl_run_id: Option<String>,
    pub crawled_at: DateTime<Utc>,
}

impl EnrichedPageContext {
    #[inline]
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Cache entry keyed by normalized URL. The enriched context is replaced
/// wholesale on a successful crawl; only the crawl-state fields mutate
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContextEntry {
    pub url: String,
    #[serde(default)]
    pub context: Option<EnrichedPageContext>,
    #[serde(default)]
    pub is_crawling: bool,
    #[serde(default)]
    pub last_crawl_triggered: Option<DateTime<Utc>>,
    pub cached_at: DateTime<Utc>,
}

/// Minimal per-request context supplied by the ad slot, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdRequestContext {
    pub url: String,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    pub user_agent: Option<String>,
    pub slot_id: String,
    pub slot_width: Option<u32>,
    pub slot_height: Option<u32>,
}

impl AdRequestContext {
    /// A bare request carrying only the page URL and slot id.
    #[inline]
    pub fn for_url(url: &str, slot_id: &str) -> Self {
        Self {
            url: url.to_string(),
            device_type: default_device_type(),
            viewport_width: None,
            viewport_height: None,
            user_agent: None,
            slot_id: slot_id.to_string(),
            slot_width: None,
            slot_height: None,
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_device_type() -> String {
    "desktop".to_string()
}

fn default_true() -> bool {
    true
}
