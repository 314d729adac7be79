use super::*;
use chrono::Utc;

fn sample_product() -> Product {
    Product {
        id: "prod-1".to_string(),
        name: "Trail Lantern".to_string(),
        description: "Rechargeable camping lantern for tents".to_string(),
        price: Some(39.99),
        currency: "USD".to_string(),
        image_url: "/assets/lantern.jpg".to_string(),
        landing_url: "https://shop.example.com/lantern".to_string(),
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        embedding: None,
    }
}

#[test]
fn search_text_is_lowercased_name_and_description() {
    let product = sample_product();
    assert_eq!(
        product.search_text(),
        "trail lantern rechargeable camping lantern for tents"
    );
}

#[test]
fn has_embedding_requires_non_empty_vector() {
    let mut product = sample_product();
    assert!(!product.has_embedding());

    product.embedding = Some(Vec::new());
    assert!(!product.has_embedding());

    product.embedding = Some(vec![0.1, 0.2]);
    assert!(product.has_embedding());
}

#[test]
fn product_deserializes_with_defaults() {
    let json = r#"{
        "id": "prod-2",
        "name": "Ceramic Vase",
        "description": "Handmade decor piece",
        "price": null,
        "image_url": "/assets/vase.jpg",
        "landing_url": "https://shop.example.com/vase",
        "created_at": "2025-06-01T00:00:00Z",
        "updated_at": "2025-06-01T00:00:00Z"
    }"#;

    let product: Product = serde_json::from_str(json).expect("product should deserialize");
    assert!(product.active);
    assert_eq!(product.currency, "USD");
    assert_eq!(product.embedding, None);
}

#[test]
fn page_context_entry_round_trips_through_json() {
    let entry = PageContextEntry {
        url: "https://example.com/article".to_string(),
        context: Some(EnrichedPageContext {
            url: "https://example.com/article".to_string(),
            title: Some("Gear Guide".to_string()),
            headings: vec!["Intro".to_string(), "Picks".to_string()],
            main_content: Some("Our favorite gear this year".to_string()),
            keywords: vec!["gear".to_string()],
            topics: vec!["outdoor".to_string()],
            visual_styles: BTreeMap::new(),
            system_info: BTreeMap::new(),
            description: None,
            author: None,
            embedding: Some(vec![0.5, 0.5]),
            crawl_run_id: Some("run-123".to_string()),
            crawled_at: Utc::now(),
        }),
        is_crawling: false,
        last_crawl_triggered: None,
        cached_at: Utc::now(),
    };

    let json = serde_json::to_string(&entry).expect("entry should serialize");
    let parsed: PageContextEntry = serde_json::from_str(&json).expect("entry should deserialize");
    assert_eq!(parsed, entry);
}

#[test]
fn ad_request_for_url_fills_defaults() {
    let request = AdRequestContext::for_url("https://example.com", "slot-1");
    assert_eq!(request.device_type, "desktop");
    assert_eq!(request.slot_id, "slot-1");
    assert_eq!(request.viewport_width, None);
}
