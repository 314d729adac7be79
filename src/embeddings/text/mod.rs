#[cfg(test)]
mod tests;

use crate::models::{EnrichedPageContext, Product};

const MAX_KEYWORDS: usize = 20;
const MAX_CONTENT_CHARS: usize = 1000;
const MAX_HEADINGS: usize = 10;

/// Truncate to a character count without splitting a code point.
#[inline]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text.get(..byte_index).unwrap_or(text),
        None => text,
    }
}

/// Combined text representation of a page, strongest signals first:
/// title, topics, description, keywords, a content excerpt, headings.
#[inline]
pub fn page_text(context: &EnrichedPageContext) -> String {
    let mut parts = Vec::new();

    if let Some(title) = context.title.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!("Title: {title}"));
    }

    if !context.topics.is_empty() {
        parts.push(format!("Topics: {}", context.topics.join(", ")));
    }

    if let Some(description) = context.description.as_deref().filter(|d| !d.is_empty()) {
        parts.push(format!("Description: {description}"));
    }

    if !context.keywords.is_empty() {
        let keywords: Vec<&str> = context
            .keywords
            .iter()
            .take(MAX_KEYWORDS)
            .map(String::as_str)
            .collect();
        parts.push(format!("Keywords: {}", keywords.join(", ")));
    }

    if let Some(content) = context.main_content.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!(
            "Content: {}",
            truncate_chars(content, MAX_CONTENT_CHARS)
        ));
    }

    if !context.headings.is_empty() {
        let headings: Vec<&str> = context
            .headings
            .iter()
            .take(MAX_HEADINGS)
            .map(String::as_str)
            .collect();
        parts.push(format!("Headings: {}", headings.join(", ")));
    }

    parts.join("\n\n")
}

/// Combined text representation of a product, including a coarse price
/// tier signal for audience matching.
#[inline]
pub fn product_text(product: &Product) -> String {
    let mut parts = Vec::new();

    if !product.name.is_empty() {
        parts.push(format!("Product: {}", product.name));
    }

    if let Some(price) = product.price {
        let tier = if price > 100.0 {
            "luxury"
        } else if price > 30.0 {
            "mid-range"
        } else {
            "budget"
        };
        parts.push(format!("Price tier: {tier}"));
    }

    if !product.description.is_empty() {
        parts.push(format!("Description: {}", product.description));
    }

    parts.join("\n\n")
}
