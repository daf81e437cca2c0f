//! Merging per-collection responses into one ranked result.

use std::cmp::Ordering;

use crate::backend::{CollectionName, SearchResponse};

use super::{FederatedResult, Hit};

/// Merge responses given in caller collection order.
///
/// Hits are concatenated in that order, tagged with their collection, then
/// stably sorted by descending score, so equal scores keep collection order
/// and then the backend's own order. NaN scores sink to the end.
pub fn merge_responses<I>(responses: I) -> FederatedResult
where
    I: IntoIterator<Item = (CollectionName, SearchResponse)>,
{
    let mut result = FederatedResult::default();

    for (collection, response) in responses {
        result.total_count += response.total_count;
        result.elapsed += response.elapsed;
        result
            .hits
            .extend(response.hits.into_iter().map(|raw| Hit {
                collection: collection.clone(),
                id: raw.id,
                score: raw.score,
                source: raw.source,
            }));
    }

    result.hits.sort_by(|a, b| by_score_desc(a.score, b.score));
    result
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
