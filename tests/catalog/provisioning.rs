//! Collection provisioning and config-driven catalogs.

use std::time::Duration;

use federated_catalog::{Catalog, CatalogConfig, CollectionName, ConfigError};
use serde_json::json;

use crate::support::{match_all, names, regional_catalog, APAC, EU};

#[tokio::test]
async fn ensure_collection_creates_once() {
    let backend = regional_catalog().await;
    let catalog = Catalog::new(backend.clone());
    let latam = CollectionName::from("catalog-latam");
    let schema = json!({ "fields": ["title", "boost"] });

    assert!(catalog.ensure_collection(&latam, &schema).await.unwrap());
    assert!(!catalog.ensure_collection(&latam, &schema).await.unwrap());
    assert!(!catalog
        .ensure_collection(&CollectionName::from(EU), &schema)
        .await
        .unwrap());
    assert_eq!(backend.schema(&latam), Some(schema));

    let result = catalog
        .federated_search(&match_all(), &[latam], Default::default())
        .await
        .unwrap();
    assert_eq!(result.total_count, 0);
}

#[tokio::test(start_paused = true)]
async fn catalog_honors_configured_cache_ttl() {
    let backend = regional_catalog().await;
    let config = CatalogConfig::from_json_str(r#"{ "cache": { "ttl_ms": 1000, "max_entries": 8 } }"#)
        .unwrap();
    let catalog = Catalog::from_config(backend.clone(), &config).unwrap();
    let collections = names(&[EU, APAC]);

    catalog.cached_search(&match_all(), &collections).await.unwrap();
    catalog.cached_search(&match_all(), &collections).await.unwrap();
    assert_eq!(backend.search_calls(), 2);

    tokio::time::advance(Duration::from_millis(1_001)).await;
    catalog.cached_search(&match_all(), &collections).await.unwrap();
    assert_eq!(backend.search_calls(), 4);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_building() {
    let backend = regional_catalog().await;
    let config = CatalogConfig {
        cache: federated_catalog::CacheSettings {
            ttl_ms: 1_000,
            max_entries: Some(0),
        },
        ..CatalogConfig::default()
    };

    assert!(matches!(
        Catalog::from_config(backend, &config),
        Err(ConfigError::Invalid(_))
    ));
}
