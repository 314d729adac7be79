
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CacheConfig;
use crate::database::sqlite::{Database, DbPool, PageContextQueries};
use crate::models::{EnrichedPageContext, PageContextEntry};

/// Normalize a URL to its cache key: scheme + host + path, no query, no
/// fragment, no trailing slash except at the root. Unparseable input is
/// used verbatim.
#[inline]
pub fn normalize_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let Some(host) = parsed.host_str() else {
        return url.to_string();
    };

    let mut normalized = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };

    let path = parsed.path();
    if path == "/" {
        normalized.push('/');
    } else {
        normalized.push_str(path.trim_end_matches('/'));
    }

    normalized
}

/// TTL-aware cache of per-URL enrichment state, loaded whole at startup
/// and written through to sqlite on every mutation.
#[derive(Debug)]
pub struct PageContextStore {
    pool: DbPool,
    cache: RwLock<HashMap<String, PageContextEntry>>,
    ttl: Duration,
    crawl_window: Duration,
}

impl PageContextStore {
    /// Load every persisted entry, skipping malformed rows.
    #[inline]
    pub async fn load(database: &Database, config: &CacheConfig) -> Result<Self> {
        let rows = PageContextQueries::list_all(database.pool())
            .await
            .context("Failed to load page contexts")?;

        let total = rows.len();
        let cache: HashMap<String, PageContextEntry> = rows
            .into_iter()
            .filter_map(|row| row.into_entry())
            .map(|entry| (entry.url.clone(), entry))
            .collect();

        if cache.len() < total {
            warn!(
                "Dropped {} malformed page context rows on load",
                total - cache.len()
            );
        }
        info!("Loaded {} page contexts", cache.len());

        Ok(Self {
            pool: database.pool().clone(),
            cache: RwLock::new(cache),
            ttl: Duration::seconds(config.context_ttl_seconds as i64),
            crawl_window: Duration::seconds(config.crawl_window_seconds as i64),
        })
    }

    /// Fetch an entry if it is still within its TTL. Expired entries are
    /// reported absent but kept; the next successful crawl overwrites
    /// them in place.
    #[inline]
    pub fn get(&self, url: &str) -> Option<PageContextEntry> {
        let key = normalize_url(url);
        let cache = self.cache.read().ok()?;
        let entry = cache.get(&key)?;

        if Utc::now() - entry.cached_at > self.ttl {
            debug!("Cache entry for {} expired", key);
            return None;
        }

        Some(entry.clone())
    }

    #[inline]
    pub fn get_enriched(&self, url: &str) -> Option<EnrichedPageContext> {
        self.get(url).and_then(|entry| entry.context)
    }

    /// True while a crawl is marked in progress and its trigger is fresh
    /// enough. The window keeps a crawl that hung without reaching a
    /// terminal state from starving the URL forever.
    #[inline]
    pub fn is_being_crawled(&self, url: &str) -> bool {
        let key = normalize_url(url);
        let Ok(cache) = self.cache.read() else {
            return false;
        };

        cache.get(&key).is_some_and(|entry| {
            entry.is_crawling
                && entry
                    .last_crawl_triggered
                    .is_some_and(|triggered| Utc::now() - triggered < self.crawl_window)
        })
    }

    /// Flip the crawl-in-progress flag, recording the trigger time when
    /// turning it on.
    #[inline]
    pub async fn set_crawling_status(&self, url: &str, is_crawling: bool) -> Result<()> {
        let key = normalize_url(url);
        let now = Utc::now();

        let mut entry = {
            let cache = self.cache.read().map_err(|_| poisoned())?;
            cache.get(&key).cloned().unwrap_or_else(|| PageContextEntry {
                url: key.clone(),
                context: None,
                is_crawling: false,
                last_crawl_triggered: None,
                cached_at: now,
            })
        };

        entry.is_crawling = is_crawling;
        if is_crawling {
            entry.last_crawl_triggered = Some(now);
        }

        self.persist(entry).await
    }

    /// Idempotent upsert of a freshly crawled context; replaces any prior
    /// content wholesale and resets the crawl state.
    #[inline]
    pub async fn store_enriched_context(&self, context: EnrichedPageContext) -> Result<()> {
        let key = normalize_url(&context.url);

        let entry = PageContextEntry {
            url: key,
            context: Some(context),
            is_crawling: false,
            last_crawl_triggered: None,
            cached_at: Utc::now(),
        };

        self.persist(entry).await
    }

    #[inline]
    pub async fn invalidate(&self, url: &str) -> Result<()> {
        let key = normalize_url(url);

        PageContextQueries::delete(&self.pool, &key)
            .await
            .context("Failed to delete page context")?;

        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        cache.remove(&key);
        Ok(())
    }

    #[inline]
    pub async fn clear(&self) -> Result<()> {
        PageContextQueries::clear(&self.pool)
            .await
            .context("Failed to clear page contexts")?;

        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        cache.clear();
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durable write first, then the in-memory view; a crash in between
    /// is repaired by the next load.
    async fn persist(&self, entry: PageContextEntry) -> Result<()> {
        PageContextQueries::upsert(&self.pool, &entry)
            .await
            .context("Failed to persist page context")?;

        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        cache.insert(entry.url.clone(), entry);
        Ok(())
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("Page context cache lock poisoned")
}
