//! Federated search across regional collections.

use std::time::Duration;

use federated_catalog::{
    BackendError, CancellationToken, Catalog, CollectionName, FailureReason, FederatedSearch,
    FederationError, FederationMode, Query,
};
use serde_json::json;

use crate::support::{match_all, names, regional_catalog, title_query, APAC, EU, US};

#[tokio::test]
async fn hits_are_ranked_across_collections() {
    let backend = regional_catalog().await;
    let search = FederatedSearch::new(backend);
    let collections = names(&[EU, US, APAC]);

    let result = search.search(&match_all(), &collections).await.unwrap();

    let ids: Vec<_> = result.hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["eu-movies", "us-movies", "eu-sports", "eu-news", "us-kids"]);
    assert!(result
        .hits
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
    assert!(result.hits.iter().all(|h| collections.contains(&h.collection)));
    assert!(!result.is_partial());
}

#[tokio::test]
async fn total_count_sums_every_collection_including_empty_ones() {
    let backend = regional_catalog().await;
    let search = FederatedSearch::new(backend);

    let everything = search
        .search(&match_all().with_size(1), &names(&[EU, US, APAC]))
        .await
        .unwrap();
    assert_eq!(everything.hits.len(), 2);
    assert_eq!(everything.total_count, 5);

    let movies = search
        .search(&title_query("classic movies"), &names(&[EU, US, APAC]))
        .await
        .unwrap();
    assert_eq!(movies.total_count, 2);
    assert_eq!(movies.hits[0].collection, CollectionName::from(EU));
    assert_eq!(movies.hits[0].score, 6.0);
    assert_eq!(movies.hits[1].collection, CollectionName::from(US));
}

#[tokio::test]
async fn strict_mode_fails_on_any_collection_error() {
    let backend = regional_catalog().await;
    backend.fail_collection(US, BackendError::Unavailable("connection reset".into()));
    let catalog = Catalog::new(backend);

    let err = catalog
        .federated_search(&match_all(), &names(&[EU, US, APAC]), FederationMode::Strict)
        .await
        .unwrap_err();

    match err {
        FederationError::Backend { collection, source } => {
            assert_eq!(collection, CollectionName::from(US));
            assert!(source.is_transient());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn best_effort_mode_reports_failed_collections() {
    let backend = regional_catalog().await;
    backend.fail_collection(US, BackendError::Timeout(Duration::from_secs(2)));
    let catalog = Catalog::new(backend);

    let result = catalog
        .federated_search(&match_all(), &names(&[EU, US, APAC]), FederationMode::BestEffort)
        .await
        .unwrap();

    assert!(result.is_partial());
    assert_eq!(result.failed_collections(), vec![&CollectionName::from(US)]);
    assert_eq!(
        result.failed[0].reason,
        FailureReason::Backend(BackendError::Timeout(Duration::from_secs(2)))
    );
    assert_eq!(result.total_count, 3);
    assert!(result
        .hits
        .iter()
        .all(|h| h.collection == CollectionName::from(EU)));
}

#[tokio::test]
async fn best_effort_with_every_collection_down_is_empty_but_annotated() {
    let backend = regional_catalog().await;
    backend.fail_collection(EU, BackendError::Unavailable("down".into()));
    backend.fail_collection(US, BackendError::Unavailable("down".into()));
    let search = FederatedSearch::new(backend).with_mode(FederationMode::BestEffort);

    let result = search.search(&match_all(), &names(&[US, EU])).await.unwrap();

    assert!(result.hits.is_empty());
    assert_eq!(result.total_count, 0);
    assert_eq!(
        result.failed_collections(),
        vec![&CollectionName::from(US), &CollectionName::from(EU)]
    );
}

#[tokio::test]
async fn unknown_collection_is_a_backend_failure() {
    let backend = regional_catalog().await;
    let search = FederatedSearch::new(backend);

    let err = search
        .search(&match_all(), &names(&[EU, "catalog-mars"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FederationError::Backend {
            source: BackendError::CollectionNotFound(_),
            ..
        }
    ));
}

#[tokio::test]
async fn malformed_query_is_a_caller_error_in_every_mode() {
    let backend = regional_catalog().await;
    let catalog = Catalog::new(backend);
    let malformed = Query::new(json!({ "nonsense": {} }));
    let collections = names(&[EU, US, APAC]);

    for mode in [FederationMode::Strict, FederationMode::BestEffort] {
        let err = catalog
            .federated_search(&malformed, &collections, mode)
            .await
            .unwrap_err();
        assert!(
            matches!(err, FederationError::InvalidArgument(_)),
            "{mode:?}: {err:?}"
        );
    }
}

#[tokio::test]
async fn malformed_query_against_only_empty_collections_is_rejected() {
    let backend = regional_catalog().await;
    let search = FederatedSearch::new(backend).with_mode(FederationMode::BestEffort);

    let err = search
        .search(&Query::new(json!({ "nonsense": {} })), &names(&[APAC]))
        .await
        .unwrap_err();

    assert!(matches!(err, FederationError::InvalidArgument(_)));
}

#[tokio::test(start_paused = true)]
async fn strict_deadline_names_pending_collections() {
    let backend = regional_catalog().await;
    backend.set_latency(US, Duration::from_secs(5));
    let search = FederatedSearch::new(backend).with_deadline(Duration::from_secs(1));

    let err = search
        .search(&match_all(), &names(&[EU, US, APAC]))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FederationError::Timeout {
            pending: vec![CollectionName::from(US)]
        }
    );
}

#[tokio::test(start_paused = true)]
async fn best_effort_deadline_returns_what_finished() {
    let backend = regional_catalog().await;
    backend.set_latency(US, Duration::from_secs(5));
    let search = FederatedSearch::new(backend)
        .with_mode(FederationMode::BestEffort)
        .with_deadline(Duration::from_secs(1));

    let result = search
        .search(&match_all(), &names(&[EU, US, APAC]))
        .await
        .unwrap();

    assert_eq!(result.total_count, 3);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].collection, CollectionName::from(US));
    assert_eq!(result.failed[0].reason, FailureReason::DeadlineExceeded);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_waiting_on_slow_collections() {
    let backend = regional_catalog().await;
    for name in [EU, US, APAC] {
        backend.set_latency(name, Duration::from_secs(10));
    }
    let search = FederatedSearch::new(backend);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = search
        .search_with_cancel(&match_all(), &names(&[EU, US, APAC]), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, FederationError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn completion_order_does_not_leak_into_ranking() {
    let fast = regional_catalog().await;
    let slow_best = regional_catalog().await;
    // The collection holding the best hit answers last.
    slow_best.set_latency(EU, Duration::from_millis(300));
    slow_best.set_latency(US, Duration::from_millis(10));

    let collections = names(&[EU, US, APAC]);
    let expected = FederatedSearch::new(fast)
        .search(&match_all(), &collections)
        .await
        .unwrap();
    let actual = FederatedSearch::new(slow_best)
        .search(&match_all(), &collections)
        .await
        .unwrap();

    assert_eq!(expected.hits, actual.hits);
    assert_eq!(expected.total_count, actual.total_count);
}
