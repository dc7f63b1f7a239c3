//! Typed result envelope returned by the search backend's select handler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};


/// Full body of a select response. Every member is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchResponse {
    #[serde(rename = "responseHeader")]
    pub response_header: Option<ResponseHeader>,
    pub response: ResultSet,
    pub highlighting: Option<Highlighting>,
    pub facet_counts: Option<FacetCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResponseHeader {
    pub status: i64,
    #[serde(rename = "QTime")]
    pub q_time: u64,
    pub params: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResultSet {
    #[serde(rename = "numFound")]
    pub num_found: u64,
    pub start: u64,
    #[serde(rename = "maxScore", skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    pub docs: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl ResultSet {
    /// `{numFound: 0, start: 0, docs: []}`, stored after a failed update.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Document id -> field -> highlighted snippets.
pub type Highlighting = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FacetCounts {
    pub facet_queries: BTreeMap<String, u64>,
    /// Per-field term counts in whatever shape `json.nl` asked for; read them
    /// through [`FacetCounts::field_values`].
    pub facet_fields: BTreeMap<String, serde_json::Value>,
    pub facet_ranges: BTreeMap<String, serde_json::Value>,
    pub facet_dates: BTreeMap<String, serde_json::Value>,
    pub facet_pivot: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetValueCount {
    pub value: String,
    pub count: u64,
}

impl FacetCounts {
    /// Term counts of `field`, keeping backend order. Understands the flat
    /// `[term, count, ...]` list (the default), `{term: count}` maps,
    /// `[[term, count], ...]` and `[{term: count}, ...]`. Entries whose count
    /// is not a non-negative integer are skipped.
    pub fn field_values(&self, field: &str) -> Vec<FacetValueCount> {
        use serde_json::Value;

        match self.facet_fields.get(field) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(term, count)| facet_value_count(&Value::String(term.clone()), count))
                .collect(),
            Some(Value::Array(items)) if items.iter().all(|i| i.is_array()) && !items.is_empty() => items
                .iter()
                .filter_map(|pair| match pair.as_array().map(|p| p.as_slice()) {
                    Some([term, count]) => facet_value_count(term, count),
                    _ => None,
                })
                .collect(),
            Some(Value::Array(items)) if items.iter().all(|i| i.is_object()) && !items.is_empty() => items
                .iter()
                .filter_map(|entry| match entry.as_object() {
                    Some(map) if map.len() == 1 => map
                        .iter()
                        .next()
                        .and_then(|(term, count)| facet_value_count(&Value::String(term.clone()), count)),
                    _ => None,
                })
                .collect(),
            Some(Value::Array(flat)) => flat
                .chunks_exact(2)
                .filter_map(|pair| facet_value_count(&pair[0], &pair[1]))
                .collect(),
            _ => vec![],
        }
    }
}

fn facet_value_count(term: &serde_json::Value, count: &serde_json::Value) -> Option<FacetValueCount> {
    let value = match term {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => return None,
        other => other.to_string(),
    };
    let count = count.as_u64()?;
    Some(FacetValueCount { value, count })
}
