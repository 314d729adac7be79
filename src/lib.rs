use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdMatchError>;

#[derive(Error, Debug)]
pub enum AdMatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod context;
pub mod crawler;
pub mod database;
pub mod embeddings;
pub mod ingestion;
pub mod matcher;
pub mod models;
pub mod storage;
