
pub mod taxonomy;

use itertools::Itertools;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::config::MatchingConfig;
use crate::models::Product;
use taxonomy::{Category, categorize};

/// One ranked candidate for an ad slot. Recomputed per request, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub product: Product,
    /// Score after category boost/penalty; this is the ranking key.
    pub score: f32,
    /// Cosine similarity before adjustment.
    pub raw_score: f32,
    pub category: Category,
}

/// How the page's topics collapse into categories.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageProfile {
    /// No topics, or none of them map to a category.
    Unfocused,
    /// One category, either exclusively or by dominance.
    Single(Category),
    /// Distinct categories in original topic order.
    Multi(Vec<Category>),
}

/// Cosine similarity clamped to [0, 1]. Zero-norm inputs score 0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let dot = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>();

    // Rounding can push the ratio slightly past 1
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Rule-based relevance engine over precomputed embeddings.
#[derive(Debug, Clone)]
pub struct ProductMatcher {
    config: MatchingConfig,
}

impl ProductMatcher {
    #[inline]
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Rank the catalog against a page embedding: similarity, topic
    /// exclusion veto, category boost/penalty, then category-aware
    /// selection. Returns at most `top_k` results, best first.
    #[inline]
    pub fn find_best_products(
        &self,
        page_embedding: Option<&[f32]>,
        products: &[Product],
        top_k: usize,
        min_score: f32,
        page_topics: &[String],
    ) -> Vec<MatchResult> {
        let Some(page_embedding) = page_embedding.filter(|e| !e.is_empty()) else {
            debug!("No page embedding provided; returning no matches");
            return Vec::new();
        };

        let profile = self.page_profile(page_topics);

        let mut scored = Vec::new();
        let mut excluded_count = 0usize;

        for product in products {
            if !product.active || !product.has_embedding() {
                continue;
            }

            let text = product.search_text();

            if self.is_excluded(&text, page_topics) {
                excluded_count += 1;
                continue;
            }

            let Some(embedding) = product.embedding.as_deref() else {
                continue;
            };
            let similarity = cosine_similarity(page_embedding, embedding);
            if similarity < min_score {
                continue;
            }

            let category = categorize(&text, &self.config.category_keywords);
            let score = match profile {
                PageProfile::Single(preferred) if category == preferred => {
                    (similarity * self.config.category_boost).min(1.0)
                }
                PageProfile::Single(_) if category != Category::Other => {
                    similarity * self.config.category_penalty
                }
                _ => similarity,
            };

            scored.push(MatchResult {
                product: product.clone(),
                score,
                raw_score: similarity,
                category,
            });
        }

        if excluded_count > 0 {
            debug!(
                excluded = excluded_count,
                topics = ?page_topics,
                "Excluded products via topic filters"
            );
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        let selected = match profile {
            PageProfile::Unfocused => scored.into_iter().take(top_k).collect(),
            PageProfile::Single(preferred) => select_single_category(scored, preferred, top_k),
            PageProfile::Multi(ref categories) => {
                select_diversified(scored, categories, top_k)
            }
        };

        debug!(returned = selected.len(), top_k, "Matcher selection complete");
        selected
    }

    /// Embedding-free fallback: every active product whose text contains
    /// a keyword associated with any page topic, each at most once.
    #[inline]
    pub fn match_by_topics(
        &self,
        page_topics: &[String],
        products: &[Product],
        topic_keyword_map: Option<&BTreeMap<String, Vec<String>>>,
    ) -> Vec<Product> {
        if page_topics.is_empty() {
            return Vec::new();
        }

        let map = topic_keyword_map.unwrap_or(&self.config.topic_keyword_map);
        let mut matched = Vec::new();

        for product in products {
            if !product.active {
                continue;
            }

            let text = product.search_text();
            let hit = page_topics.iter().any(|topic| {
                map.get(topic).map_or_else(
                    || text.contains(topic.as_str()),
                    |keywords| keywords.iter().any(|k| text.contains(k.as_str())),
                )
            });

            if hit {
                matched.push(product.clone());
            }
        }

        debug!(
            matched = matched.len(),
            topics = ?page_topics,
            "Topic-based fallback matching"
        );
        matched
    }

    fn is_excluded(&self, product_text: &str, page_topics: &[String]) -> bool {
        page_topics.iter().any(|topic| {
            self.config
                .exclusion_keywords
                .get(topic)
                .is_some_and(|keywords| keywords.iter().any(|k| product_text.contains(k.as_str())))
        })
    }

    /// Collapse page topics into a category profile, treating a category
    /// holding at least `dominance_threshold` of the mapped topics as the
    /// page's single category.
    fn page_profile(&self, page_topics: &[String]) -> PageProfile {
        let mapped: Vec<Category> = page_topics
            .iter()
            .filter_map(|topic| self.config.topic_category_map.get(topic).copied())
            .collect();

        if mapped.is_empty() {
            return PageProfile::Unfocused;
        }

        let ordered: Vec<Category> = mapped.iter().copied().unique().collect();
        if ordered.len() == 1 {
            return PageProfile::Single(ordered[0]);
        }

        let counts: HashMap<Category, usize> = mapped.iter().copied().counts();

        // Ties resolve to the earliest category in topic order
        let (dominant, dominant_count) = ordered
            .iter()
            .map(|c| (*c, counts[c]))
            .reduce(|best, current| if current.1 > best.1 { current } else { best })
            .unwrap_or((ordered[0], 0));

        let ratio = dominant_count as f32 / mapped.len() as f32;
        if ratio >= self.config.dominance_threshold {
            debug!(
                category = %dominant,
                count = dominant_count,
                total = mapped.len(),
                "Dominant category detected"
            );
            PageProfile::Single(dominant)
        } else {
            PageProfile::Multi(ordered)
        }
    }
}

/// Fill from the preferred category first, then backfill with the
/// next-best products from the rest.
fn select_single_category(
    scored: Vec<MatchResult>,
    preferred: Category,
    top_k: usize,
) -> Vec<MatchResult> {
    let (mut preferred_items, other_items): (Vec<_>, Vec<_>) = scored
        .into_iter()
        .partition(|item| item.category == preferred);

    preferred_items.truncate(top_k);
    if preferred_items.len() < top_k {
        let remaining = top_k - preferred_items.len();
        preferred_items.extend(other_items.into_iter().take(remaining));
    }

    preferred_items
}

/// Round-robin one product per matched category per round, then fill any
/// remaining slots from the global score order. No product repeats.
fn select_diversified(
    scored: Vec<MatchResult>,
    page_categories: &[Category],
    top_k: usize,
) -> Vec<MatchResult> {
    let mut by_category: HashMap<Category, Vec<&MatchResult>> = HashMap::new();
    for item in &scored {
        by_category.entry(item.category).or_default().push(item);
    }

    let mut result: Vec<MatchResult> = Vec::with_capacity(top_k);
    let mut used: HashSet<String> = HashSet::new();

    'rounds: loop {
        let before = result.len();
        for category in page_categories {
            if result.len() >= top_k {
                break 'rounds;
            }
            let Some(items) = by_category.get(category) else {
                continue;
            };
            if let Some(next) = items.iter().find(|item| !used.contains(&item.product.id)) {
                used.insert(next.product.id.clone());
                result.push((*next).clone());
            }
        }
        if result.len() == before {
            // Matched categories are exhausted
            break;
        }
    }

    if result.len() < top_k {
        for item in &scored {
            if result.len() >= top_k {
                break;
            }
            if !used.contains(&item.product.id) {
                used.insert(item.product.id.clone());
                result.push(item.clone());
            }
        }
    }

    result
}
