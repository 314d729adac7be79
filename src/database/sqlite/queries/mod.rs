
use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{PageContextRow, ProductRow};
use crate::models::{PageContextEntry, Product};

pub struct ProductQueries;

impl ProductQueries {
    /// Insert-or-replace write-through for a whole product record.
    #[inline]
    pub async fn upsert(pool: &SqlitePool, product: &Product) -> Result<()> {
        let embedding = product
            .embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to encode product embedding")?;

        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, description, price, currency, image_url, landing_url,
                 active, created_at, updated_at, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                price = excluded.price,
                currency = excluded.currency,
                image_url = excluded.image_url,
                landing_url = excluded.landing_url,
                active = excluded.active,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                embedding = excluded.embedding
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.currency)
        .bind(&product.image_url)
        .bind(&product.landing_url)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(embedding)
        .execute(pool)
        .await
        .context("Failed to upsert product")?;

        Ok(())
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<ProductRow>> {
        sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, description, price, currency, image_url, landing_url,
                   active, created_at, updated_at, embedding
            FROM products ORDER BY created_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to list products")
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete product")?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct PageContextQueries;

impl PageContextQueries {
    /// Insert-or-replace write-through for a cache entry keyed by
    /// normalized URL.
    #[inline]
    pub async fn upsert(pool: &SqlitePool, entry: &PageContextEntry) -> Result<()> {
        let context = entry
            .context
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to encode page context document")?;

        sqlx::query(
            r#"
            INSERT INTO page_contexts
                (url, context, is_crawling, last_crawl_triggered, cached_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                context = excluded.context,
                is_crawling = excluded.is_crawling,
                last_crawl_triggered = excluded.last_crawl_triggered,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(&entry.url)
        .bind(context)
        .bind(entry.is_crawling)
        .bind(entry.last_crawl_triggered)
        .bind(entry.cached_at)
        .execute(pool)
        .await
        .context("Failed to upsert page context")?;

        Ok(())
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<PageContextRow>> {
        sqlx::query_as::<_, PageContextRow>(
            r#"
            SELECT url, context, is_crawling, last_crawl_triggered, cached_at
            FROM page_contexts
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to list page contexts")
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, url: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM page_contexts WHERE url = ?")
            .bind(url)
            .execute(pool)
            .await
            .context("Failed to delete page context")?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn clear(pool: &SqlitePool) -> Result<()> {
        sqlx::query("DELETE FROM page_contexts")
            .execute(pool)
            .await
            .context("Failed to clear page contexts")?;

        Ok(())
    }
}
