//! Price window upserts through the catalog.

use std::time::Duration;

use federated_catalog::{
    Catalog, CollectionName, PriceWindow, UpdateError, UpsertAction, PRICE_WINDOWS_FIELD,
};
use serde_json::{json, Value};

use crate::support::{bolton_catalog, BOLT_ONS};

const PRODUCT: &str = "BOLTON-TRUTV-TCM";

fn bolt_ons() -> CollectionName {
    CollectionName::from(BOLT_ONS)
}

fn windows(body: &Value) -> &Vec<Value> {
    body[PRICE_WINDOWS_FIELD].as_array().unwrap()
}

#[tokio::test]
async fn appending_keeps_existing_windows_in_place() {
    let backend = bolton_catalog();
    let before = backend.document(&bolt_ons(), PRODUCT).unwrap();
    let catalog = Catalog::new(backend.clone());

    let outcome = catalog
        .update_price_window(
            &bolt_ons(),
            PRODUCT,
            PriceWindow::new("2")
                .with_validity("2024-04-02", "2050-12-31")
                .with_amount(6.99, "USD"),
            3,
        )
        .await
        .unwrap();

    assert_eq!(outcome.change, UpsertAction::Appended { index: 1 });
    assert_eq!(outcome.attempts, 1);

    let after = backend.document(&bolt_ons(), PRODUCT).unwrap();
    assert_eq!(windows(&after).len(), windows(&before).len() + 1);
    assert_eq!(windows(&after)[0], windows(&before)[0]);
    assert_eq!(windows(&after)[1]["billingReferenceId"], "2");
    assert_eq!(windows(&after)[1]["startInstant"], 1_712_016_000_000_i64);
    assert_eq!(after["name"], before["name"]);
}

#[tokio::test]
async fn replacing_keeps_the_window_at_its_index() {
    let backend = bolton_catalog();
    let catalog = Catalog::new(backend.clone());

    let outcome = catalog
        .update_price_window(
            &bolt_ons(),
            PRODUCT,
            PriceWindow::new("1")
                .with_validity("2024-02-07", "2030-12-31")
                .with_amount(5.49, "USD"),
            3,
        )
        .await
        .unwrap();

    assert_eq!(outcome.change, UpsertAction::Replaced { index: 0 });
    let after = backend.document(&bolt_ons(), PRODUCT).unwrap();
    assert_eq!(windows(&after).len(), 1);
    assert_eq!(windows(&after)[0]["amount"], 5.49);
    assert_eq!(windows(&after)[0]["endDate"], "2030-12-31");
}

#[tokio::test]
async fn bolt_on_price_window_lifecycle() {
    let backend = bolton_catalog();
    let catalog = Catalog::new(backend.clone());
    let original = windows(&backend.document(&bolt_ons(), PRODUCT).unwrap())[0].clone();

    let added = catalog
        .update_price_window(
            &bolt_ons(),
            PRODUCT,
            PriceWindow::new("2")
                .with_validity("2024-04-02", "2050-12-31")
                .with_amount(4.99, "USD"),
            5,
        )
        .await
        .unwrap();
    assert_eq!(added.change, UpsertAction::Appended { index: 1 });

    let repriced = catalog
        .update_price_window(
            &bolt_ons(),
            PRODUCT,
            PriceWindow::new("2")
                .with_validity("2024-04-02", "2050-12-31")
                .with_amount(9.99, "USD"),
            5,
        )
        .await
        .unwrap();
    assert_eq!(repriced.change, UpsertAction::Replaced { index: 1 });
    assert!(repriced.token.seq_no > added.token.seq_no);

    let stored = backend.document(&bolt_ons(), PRODUCT).unwrap();
    assert_eq!(windows(&stored).len(), 2);
    assert_eq!(windows(&stored)[0], original);
    assert_eq!(
        windows(&stored)[1],
        json!({
            "billingReferenceId": "2",
            "startDate": "2024-04-02",
            "endDate": "2050-12-31",
            "startInstant": 1_712_016_000_000_i64,
            "endInstant": 2_556_143_999_999_i64,
            "amount": 9.99,
            "currency": "USD"
        })
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_updates_to_different_windows_both_land() {
    let backend = bolton_catalog();
    // Both writers read the same revision before either writes.
    backend.set_latency(BOLT_ONS, Duration::from_millis(50));
    let catalog = Catalog::new(backend.clone());
    let collection = bolt_ons();

    let (left, right) = tokio::join!(
        catalog.update_price_window(
            &collection,
            PRODUCT,
            PriceWindow::new("2").with_amount(1.99, "USD"),
            5,
        ),
        catalog.update_price_window(
            &collection,
            PRODUCT,
            PriceWindow::new("3").with_amount(2.99, "USD"),
            5,
        ),
    );
    let (left, right) = (left.unwrap(), right.unwrap());

    assert_eq!(left.attempts + right.attempts, 3);
    let stored = backend.document(&bolt_ons(), PRODUCT).unwrap();
    let mut keys: Vec<_> = windows(&stored)
        .iter()
        .map(|w| w["billingReferenceId"].as_str().unwrap().to_string())
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn unknown_product_is_reported_without_writing() {
    let backend = bolton_catalog();
    let catalog = Catalog::new(backend.clone());

    let err = catalog
        .update_price_window(&bolt_ons(), "BOLTON-MISSING", PriceWindow::new("1"), 3)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        UpdateError::ProductNotFound {
            collection: bolt_ons(),
            document_id: "BOLTON-MISSING".into(),
        }
    );
    assert_eq!(backend.put_calls(), 0);
}

#[tokio::test]
async fn window_ending_before_it_starts_is_rejected() {
    let backend = bolton_catalog();
    let catalog = Catalog::new(backend.clone());

    let err = catalog
        .update_price_window(
            &bolt_ons(),
            PRODUCT,
            PriceWindow::new("2").with_validity("2050-12-31", "2024-04-02"),
            3,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::InvalidArgument(_)));
    assert_eq!(backend.get_calls(), 0);
}
