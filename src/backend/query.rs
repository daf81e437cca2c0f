//! Minimal query evaluation for the in-memory backend.
//!
//! Supports just enough of a search DSL to drive tests:
//! `match_all`, `term` (exact field equality), `match` (word overlap
//! scoring) and `bool.must` (conjunction, scores summed). A numeric
//! `boost` field on a document multiplies its score.

use serde_json::Value;

use super::BackendError;

/// Score `doc` against `query`. `Ok(None)` means the document does not match.
pub(crate) fn score(query: &Value, doc: &Value) -> Result<Option<f64>, BackendError> {
    let base = match raw_score(query, doc)? {
        Some(score) => score,
        None => return Ok(None),
    };
    let boost = doc.get("boost").and_then(Value::as_f64).unwrap_or(1.0);
    Ok(Some(base * boost))
}

/// Check the shape of `query` without evaluating it against any document.
pub(crate) fn validate(query: &Value) -> Result<(), BackendError> {
    let (kind, args) = clause(query)?;
    match kind {
        "match_all" => Ok(()),
        "term" => single_field(kind, args).map(|_| ()),
        "match" => {
            let (_, text) = single_field(kind, args)?;
            text.as_str()
                .map(|_| ())
                .ok_or_else(|| BackendError::InvalidQuery("match expects a string".into()))
        }
        "bool" => must_clauses(args)?.iter().try_for_each(validate),
        other => Err(unsupported(other)),
    }
}

fn clause(query: &Value) -> Result<(&str, &Value), BackendError> {
    query
        .as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.iter().next())
        .map(|(kind, args)| (kind.as_str(), args))
        .ok_or_else(|| BackendError::InvalidQuery("expected a single-clause object".into()))
}

fn must_clauses(args: &Value) -> Result<&Vec<Value>, BackendError> {
    args.get("must")
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::InvalidQuery("bool expects a must array".into()))
}

fn unsupported(kind: &str) -> BackendError {
    BackendError::InvalidQuery(format!("unsupported clause '{}'", kind))
}

fn raw_score(query: &Value, doc: &Value) -> Result<Option<f64>, BackendError> {
    let (kind, args) = clause(query)?;

    match kind {
        "match_all" => Ok(Some(1.0)),
        "term" => {
            let (field, expected) = single_field(kind, args)?;
            Ok((lookup(doc, field) == Some(expected)).then_some(1.0))
        }
        "match" => {
            let (field, text) = single_field(kind, args)?;
            let text = text
                .as_str()
                .ok_or_else(|| BackendError::InvalidQuery("match expects a string".into()))?;
            let haystack = match lookup(doc, field).and_then(Value::as_str) {
                Some(value) => tokenize(value),
                None => return Ok(None),
            };
            let found = tokenize(text)
                .iter()
                .filter(|word| haystack.contains(word))
                .count();
            Ok((found > 0).then_some(found as f64))
        }
        "bool" => {
            let mut total = 0.0;
            for inner in must_clauses(args)? {
                match raw_score(inner, doc)? {
                    Some(score) => total += score,
                    None => return Ok(None),
                }
            }
            Ok(Some(total))
        }
        other => Err(unsupported(other)),
    }
}

fn single_field<'a>(kind: &str, args: &'a Value) -> Result<(&'a str, &'a Value), BackendError> {
    args.as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.iter().next())
        .map(|(field, value)| (field.as_str(), value))
        .ok_or_else(|| BackendError::InvalidQuery(format!("{} expects exactly one field", kind)))
}

/// Resolve a dotted path such as `"brand.name"`.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}
