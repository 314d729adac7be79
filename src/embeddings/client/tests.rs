use super::*;

fn config() -> EmbeddingConfig {
    EmbeddingConfig {
        protocol: "http".to_string(),
        host: "embedding-host".to_string(),
        port: 9876,
        model: "test-model".to_string(),
        batch_size: 8,
        embedding_dimension: 128,
    }
}

#[test]
fn client_configuration() {
    let client = EmbeddingClient::new(&config()).expect("client should build");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 8);
    assert_eq!(client.dimension(), 128);
    assert_eq!(client.base_url.host_str(), Some("embedding-host"));
    assert_eq!(client.base_url.port(), Some(9876));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = EmbeddingClient::new(&config())
        .expect("client should build")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);
}

#[test]
fn blank_text_embeds_to_zero_vector_without_network() {
    // Host is never contacted for blank input, so the bogus host is fine
    let client = EmbeddingClient::new(&config()).expect("client should build");

    let embedding = client.embed("   \n\t ").expect("blank embed should succeed");
    assert_eq!(embedding.len(), 128);
    assert!(embedding.iter().all(|v| *v == 0.0));
}

#[test]
fn empty_batch_returns_empty() {
    let client = EmbeddingClient::new(&config()).expect("client should build");
    let result = client.embed_batch(&[]).expect("empty batch should succeed");
    assert!(result.is_empty());
}

#[test]
fn all_blank_batch_substitutes_zero_vectors_in_order() {
    let client = EmbeddingClient::new(&config()).expect("client should build");

    let texts = vec![String::new(), "  ".to_string(), "\n".to_string()];
    let result = client
        .embed_batch(&texts)
        .expect("blank batch should succeed");

    assert_eq!(result.len(), 3);
    assert!(result.iter().all(|v| v.len() == 128));
    assert!(result.iter().flatten().all(|v| *v == 0.0));
}
