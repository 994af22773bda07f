//! ESIP OpenSearch query strings and result-feed helpers.

use crate::xml::XmlDocument;

/// Parameters of the ESIP OpenSearch endpoint, in the order the service
/// documents them.
pub const QUERY_KEYS: [&str; 11] = [
    "si",
    "ct",
    "st",
    "bbox",
    "rel",
    "loc",
    "ts",
    "te",
    "lac",
    "luc",
    "outputFormat",
];

/// Builds `?si=&ct=&st=...` with every known key present.
///
/// Overrides replace the value of a known key in place; unknown keys are
/// appended after the fixed set in the order given. Values are written as
/// is, so callers pass already-escaped text.
pub fn query_string(overrides: &[(&str, &str)]) -> String {
    let mut params: Vec<(String, String)> = QUERY_KEYS
        .iter()
        .map(|key| (key.to_string(), String::new()))
        .collect();
    for (key, value) in overrides {
        match params.iter_mut().find(|(existing, _)| existing == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => params.push((key.to_string(), value.to_string())),
        }
    }
    let joined = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("?{joined}")
}

/// `opensearch:totalResults` of a result feed, zero when absent or malformed.
pub fn total_results(document: &XmlDocument) -> u64 {
    document
        .select(&["feed", "totalResults"])
        .first()
        .and_then(|element| element.text().trim().parse().ok())
        .unwrap_or(0)
}

/// Text of each `relevance:score` entry; only present when Lucene ranking is on.
pub fn relevance_scores(document: &XmlDocument) -> Vec<String> {
    document
        .select(&["feed", "entry", "score"])
        .iter()
        .map(|element| element.text())
        .collect()
}
