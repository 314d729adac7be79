// Storage module
// In-memory stores with sqlite write-through persistence

pub mod page_context;
pub mod products;

pub use page_context::{PageContextStore, normalize_url};
pub use products::ProductCatalog;
