//! Shared fixtures: a small multi-region catalog on the in-memory backend.

use std::sync::Arc;

use federated_catalog::{CollectionName, InMemoryBackend, Query, SearchBackend};
use serde_json::json;
use tracing_subscriber::EnvFilter;

pub const EU: &str = "catalog-eu";
pub const US: &str = "catalog-us";
pub const APAC: &str = "catalog-apac";
pub const BOLT_ONS: &str = "bolt-ons";

/// Honors `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn names(list: &[&str]) -> Vec<CollectionName> {
    list.iter().map(|name| CollectionName::from(*name)).collect()
}

pub fn match_all() -> Query {
    Query::new(json!({ "match_all": {} }))
}

pub fn title_query(text: &str) -> Query {
    Query::new(json!({ "match": { "title": text } }))
}

/// EU and US hold channel packages; APAC exists but is empty.
pub async fn regional_catalog() -> Arc<InMemoryBackend> {
    init_tracing();
    let backend = InMemoryBackend::new();

    let eu = [
        ("eu-sports", "Sports Pack", 1.5),
        ("eu-movies", "Classic Movies Pack", 3.0),
        ("eu-news", "News Pack", 1.0),
    ];
    let us = [
        ("us-movies", "Turner Classic Movies", 2.0),
        ("us-kids", "Kids Pack", 0.5),
    ];

    for (id, title, boost) in eu {
        backend
            .insert_document(EU, id, json!({ "title": title, "boost": boost }))
            .unwrap();
    }
    for (id, title, boost) in us {
        backend
            .insert_document(US, id, json!({ "title": title, "boost": boost }))
            .unwrap();
    }
    backend
        .create_collection(&CollectionName::from(APAC), &json!({ "fields": ["title"] }))
        .await
        .unwrap();

    Arc::new(backend)
}

/// A bolt-on product carrying one price window.
pub fn bolton_catalog() -> Arc<InMemoryBackend> {
    init_tracing();
    let backend = InMemoryBackend::new();
    backend
        .insert_document(
            BOLT_ONS,
            "BOLTON-TRUTV-TCM",
            json!({
                "name": "truTV + TCM",
                "priceWindows": [{
                    "billingReferenceId": "1",
                    "startDate": "2024-02-07",
                    "endDate": "2050-12-31",
                    "amount": 4.99,
                    "currency": "USD"
                }]
            }),
        )
        .unwrap();
    Arc::new(backend)
}
