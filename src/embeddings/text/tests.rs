use super::*;
use chrono::Utc;
use std::collections::BTreeMap;

fn context() -> EnrichedPageContext {
    EnrichedPageContext {
        url: "https://example.com/gear".to_string(),
        title: Some("Camping Gear Guide".to_string()),
        headings: vec!["Tents".to_string(), "Lighting".to_string()],
        main_content: Some("Everything you need for a weekend outdoors.".to_string()),
        keywords: vec!["camping".to_string(), "tents".to_string()],
        topics: vec!["outdoor".to_string()],
        visual_styles: BTreeMap::new(),
        system_info: BTreeMap::new(),
        description: Some("Our annual roundup".to_string()),
        author: None,
        embedding: None,
        crawl_run_id: None,
        crawled_at: Utc::now(),
    }
}

#[test]
fn page_text_orders_fields_by_weight() {
    let text = page_text(&context());

    let title_pos = text.find("Title:").expect("title section missing");
    let topics_pos = text.find("Topics:").expect("topics section missing");
    let description_pos = text.find("Description:").expect("description section missing");
    let keywords_pos = text.find("Keywords:").expect("keywords section missing");
    let content_pos = text.find("Content:").expect("content section missing");
    let headings_pos = text.find("Headings:").expect("headings section missing");

    assert!(title_pos < topics_pos);
    assert!(topics_pos < description_pos);
    assert!(description_pos < keywords_pos);
    assert!(keywords_pos < content_pos);
    assert!(content_pos < headings_pos);
}

#[test]
fn page_text_skips_empty_fields() {
    let mut ctx = context();
    ctx.title = None;
    ctx.description = Some(String::new());
    ctx.keywords.clear();

    let text = page_text(&ctx);
    assert!(!text.contains("Title:"));
    assert!(!text.contains("Description:"));
    assert!(!text.contains("Keywords:"));
    assert!(text.contains("Topics: outdoor"));
}

#[test]
fn page_text_caps_keywords_and_headings() {
    let mut ctx = context();
    ctx.keywords = (0..30).map(|i| format!("kw{i}")).collect();
    ctx.headings = (0..15).map(|i| format!("h{i}")).collect();

    let text = page_text(&ctx);
    assert!(text.contains("kw19"));
    assert!(!text.contains("kw20"));
    assert!(text.contains("h9,") || text.ends_with("h9"));
    assert!(!text.contains("h10"));
}

#[test]
fn page_text_truncates_long_content() {
    let mut ctx = context();
    ctx.main_content = Some("x".repeat(5000));

    let text = page_text(&ctx);
    let content_section = text
        .split("Content: ")
        .nth(1)
        .expect("content section missing");
    let content_body = content_section
        .split("\n\n")
        .next()
        .expect("content body missing");
    assert_eq!(content_body.chars().count(), 1000);
}

#[test]
fn truncate_chars_respects_multibyte_boundaries() {
    let text = "héllo wörld";
    assert_eq!(truncate_chars(text, 4), "héll");
    assert_eq!(truncate_chars(text, 100), text);
    assert_eq!(truncate_chars("", 5), "");
}

#[test]
fn product_text_includes_price_tier() {
    let mut product = crate::models::Product {
        id: "p1".to_string(),
        name: "Noise Canceling Headphones".to_string(),
        description: "Over-ear wireless audio".to_string(),
        price: Some(299.99),
        currency: "USD".to_string(),
        image_url: "/assets/p1.jpg".to_string(),
        landing_url: "https://shop.example.com/p1".to_string(),
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        embedding: None,
    };

    let text = product_text(&product);
    assert!(text.contains("Product: Noise Canceling Headphones"));
    assert!(text.contains("Price tier: luxury"));
    assert!(text.contains("Description: Over-ear wireless audio"));

    product.price = Some(45.0);
    assert!(product_text(&product).contains("Price tier: mid-range"));

    product.price = Some(12.0);
    assert!(product_text(&product).contains("Price tier: budget"));

    product.price = None;
    assert!(!product_text(&product).contains("Price tier"));
}
