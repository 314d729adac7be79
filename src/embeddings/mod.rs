// Embeddings module
// External embedding service client and text preparation

pub mod client;
pub mod text;

pub use client::EmbeddingClient;
pub use text::{page_text, product_text, truncate_chars};
