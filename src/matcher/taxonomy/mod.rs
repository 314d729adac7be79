
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fixed four-way product classification used for boosting and
/// diversification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Technology,
    Outdoor,
    Lifestyle,
    Other,
}

impl std::fmt::Display for Category {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Category::Technology => write!(f, "technology"),
            Category::Outdoor => write!(f, "outdoor"),
            Category::Lifestyle => write!(f, "lifestyle"),
            Category::Other => write!(f, "other"),
        }
    }
}

/// Assignment priority. Technology is checked first so tech items that
/// also mention a home keyword classify as technology.
pub const CATEGORY_PRIORITY: [Category; 3] =
    [Category::Technology, Category::Outdoor, Category::Lifestyle];

/// Assign a product text to exactly one category by first keyword match
/// in priority order.
#[inline]
pub fn categorize(text: &str, category_keywords: &BTreeMap<Category, Vec<String>>) -> Category {
    for category in CATEGORY_PRIORITY {
        if category_keywords
            .get(&category)
            .is_some_and(|keywords| keywords.iter().any(|k| text.contains(k.as_str())))
        {
            return category;
        }
    }
    Category::Other
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

/// Per-topic hard-veto keyword lists: a product whose text contains any
/// of these is excluded for pages carrying that topic.
#[inline]
pub fn default_exclusion_keywords() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "lifestyle".to_string(),
            words(&[
                "camping",
                "outdoor",
                "hiking",
                "trail",
                "backpacking",
                "wilderness",
                "tent",
                "lantern",
                "survival",
                "cot",
                "headphone",
                "earphone",
                "bluetooth",
                "wireless",
                "technology",
                "electronic",
                "projector",
                "ipad",
                "tablet",
                "printer",
            ]),
        ),
        (
            "health".to_string(),
            words(&[
                "camping",
                "outdoor",
                "hiking",
                "adventure",
                "headphone",
                "earphone",
                "technology",
                "electronic",
            ]),
        ),
        (
            "outdoor".to_string(),
            words(&[
                "headphone",
                "earphone",
                "ipad",
                "tablet",
                "printer",
                "projector",
                "technology",
                "electronic",
                "bedding",
                "comforter",
                "pillow",
                "mirror",
                "vase",
                "silverware",
                "decor",
                "furniture",
            ]),
        ),
        (
            "technology".to_string(),
            words(&[
                "camping",
                "outdoor",
                "hiking",
                "tent",
                "lantern",
                "cot",
                "backpacking",
                "bedding",
                "comforter",
                "pillow",
                "mirror",
                "vase",
                "silverware",
                "decor",
                "furniture",
            ]),
        ),
    ])
}

/// Keyword lists that assign a product to a category.
#[inline]
pub fn default_category_keywords() -> BTreeMap<Category, Vec<String>> {
    BTreeMap::from([
        (
            Category::Technology,
            words(&[
                "headphone",
                "earphone",
                "sleep headphone",
                "bluetooth headphone",
                "ipad",
                "tablet",
                "computer",
                "laptop",
                "printer",
                "projector",
                "tech",
                "electronic",
                "bluetooth",
                "wireless",
                "gadget",
                "camera",
            ]),
        ),
        (
            Category::Outdoor,
            words(&[
                "camping",
                "outdoor",
                "hiking",
                "trail",
                "backpacking",
                "wilderness",
                "tent",
                "lantern",
                "survival",
                "cot",
                "camping cot",
                "camping tent",
                "camping light",
            ]),
        ),
        (
            Category::Lifestyle,
            words(&[
                "bedding",
                "comforter",
                "pillow",
                "mirror",
                "vase",
                "ceramic vase",
                "silverware",
                "decor",
                "furniture",
                "home",
                "fashion",
                "beauty",
                "jewelry",
                "necklace",
                "farmhouse",
                "irregular mirror",
            ]),
        ),
    ])
}

/// Page topics collapse into the same four categories; health counts as
/// lifestyle, tech as technology.
#[inline]
pub fn default_topic_category_map() -> BTreeMap<String, Category> {
    BTreeMap::from([
        ("lifestyle".to_string(), Category::Lifestyle),
        ("health".to_string(), Category::Lifestyle),
        ("outdoor".to_string(), Category::Outdoor),
        ("technology".to_string(), Category::Technology),
        ("tech".to_string(), Category::Technology),
    ])
}

/// Topic-to-keyword lists for the embedding-free fallback matcher.
#[inline]
pub fn default_topic_keyword_map() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "outdoor".to_string(),
            words(&["camping", "outdoor", "adventure", "hiking", "survival"]),
        ),
        (
            "technology".to_string(),
            words(&["tech", "computer", "software", "gadget", "electronic"]),
        ),
        (
            "lifestyle".to_string(),
            words(&["fashion", "home", "decor", "wellness", "beauty"]),
        ),
        (
            "health".to_string(),
            words(&["fitness", "health", "wellness", "medical"]),
        ),
        (
            "business".to_string(),
            words(&["business", "professional", "office", "productivity"]),
        ),
    ])
}
