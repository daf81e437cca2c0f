//! PriceWindow - a keyed, time-bounded price entry inside a product document.

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{UpdateError, UpsertAction};

/// Document field holding the ordered array of price windows.
pub const PRICE_WINDOWS_FIELD: &str = "priceWindows";

const KEY_FIELD: &str = "billingReferenceId";

/// One price window. `billing_reference_id` is unique within a document.
///
/// `start_instant`/`end_instant` are derived from the calendar dates
/// (epoch milliseconds, UTC) so the backend can run numeric range queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceWindow {
    pub billing_reference_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_instant: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_instant: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Any other payload fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PriceWindow {
    pub fn new(billing_reference_id: impl Into<String>) -> Self {
        PriceWindow {
            billing_reference_id: billing_reference_id.into(),
            start_date: None,
            end_date: None,
            start_instant: None,
            end_instant: None,
            amount: None,
            currency: None,
            extra: Map::new(),
        }
    }

    pub fn with_validity(mut self, start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self.end_date = Some(end_date.into());
        self
    }

    pub fn with_amount(mut self, amount: f64, currency: impl Into<String>) -> Self {
        self.amount = Some(amount);
        self.currency = Some(currency.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Recompute the derived instants from the calendar dates.
    ///
    /// Pure and idempotent: applying it twice yields the same window.
    pub fn with_derived_instants(mut self) -> Result<Self, UpdateError> {
        if self.billing_reference_id.trim().is_empty() {
            return Err(UpdateError::InvalidArgument(
                "billingReferenceId must not be empty".into(),
            ));
        }

        self.start_instant = self
            .start_date
            .as_deref()
            .map(|date| parse_instant(date, Bound::Start))
            .transpose()?;
        self.end_instant = self
            .end_date
            .as_deref()
            .map(|date| parse_instant(date, Bound::End))
            .transpose()?;

        if let (Some(start), Some(end)) = (self.start_instant, self.end_instant) {
            if start > end {
                return Err(UpdateError::InvalidArgument(format!(
                    "price window {} ends before it starts",
                    self.billing_reference_id
                )));
            }
        }
        Ok(self)
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// `YYYY-MM-DD` covers the whole day; RFC 3339 timestamps are taken as-is.
fn parse_instant(raw: &str, bound: Bound) -> Result<i64, UpdateError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = match bound {
            Bound::Start => NaiveTime::MIN,
            Bound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
                .ok_or_else(|| UpdateError::InvalidArgument("invalid end of day".into()))?,
        };
        return Ok(date.and_time(time).and_utc().timestamp_millis());
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.timestamp_millis())
        .map_err(|e| UpdateError::InvalidArgument(format!("invalid date '{}': {}", raw, e)))
}

/// Replace the window with the same key in place, or append it.
///
/// Extra entries sharing the key are dropped so the key stays unique.
pub fn upsert_price_window(body: &mut Value, window: &PriceWindow) -> Result<UpsertAction, UpdateError> {
    let document = body
        .as_object_mut()
        .ok_or_else(|| UpdateError::InvalidDocument("document body is not an object".into()))?;
    let windows = document
        .entry(PRICE_WINDOWS_FIELD)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| {
            UpdateError::InvalidDocument(format!("{} is not an array", PRICE_WINDOWS_FIELD))
        })?;

    let encoded = serde_json::to_value(window)
        .map_err(|e| UpdateError::InvalidArgument(format!("unencodable price window: {}", e)))?;

    let matching: Vec<usize> = windows
        .iter()
        .enumerate()
        .filter(|(_, existing)| key_matches(existing, &window.billing_reference_id))
        .map(|(index, _)| index)
        .collect();

    match matching.split_first() {
        Some((&first, duplicates)) => {
            for &index in duplicates.iter().rev() {
                windows.remove(index);
            }
            windows[first] = encoded;
            Ok(UpsertAction::Replaced { index: first })
        }
        None => {
            windows.push(encoded);
            Ok(UpsertAction::Appended {
                index: windows.len() - 1,
            })
        }
    }
}

/// Stored keys may be numbers in older documents; `2` and `"2"` are the same key.
fn key_matches(existing: &Value, key: &str) -> bool {
    match existing.get(KEY_FIELD) {
        Some(Value::String(stored)) => stored == key,
        Some(Value::Number(stored)) => stored.to_string() == key,
        _ => false,
    }
}
