//! Rebuilds a [`Query`] from a location hash. The inverse of
//! [`Query::location_hash`], lenient about hand-edited input: fragments it
//! cannot make sense of are skipped, never reported.

use tracing::debug;

use crate::search_const::NEAR_MATCH_MARKER;
use crate::search_query::Query;
use crate::uri_encoding::decode_uri;


/// Parses `hash` on top of [`Query::with_defaults`].
pub fn parse_hash(hash: &str, base_url: &str) -> Query {
    parse_hash_into(hash, Query::with_defaults(base_url))
}

/// Parses `hash` on top of an already defaulted `query`, so callers can
/// choose which baseline applies.
pub fn parse_hash_into(hash: &str, mut query: Query) -> Query {
    let decoded = decode_uri(strip_location_prefix(hash));

    for element in decoded.split('&') {
        if element.is_empty() {
            continue;
        }
        if let Some(user_query) = user_query_value(element) {
            let mut components = split_components(user_query).into_iter();
            if let Some(first) = components.next() {
                query.set_user_query(first);
            }
            for component in components {
                query.add_query_parameter(component);
            }
        } else if element.starts_with("fq") {
            let constraint = element.get(3..).unwrap_or("");
            match constraint.split_once(':') {
                Some((field, value)) if !field.is_empty() => {
                    let facet = query.create_facet(field, value);
                    query.add_facet(facet);
                }
                _ => debug!("skipping filter without field in hash: {element:?}"),
            }
        } else {
            let parts = element.split('=').collect::<Vec<_>>();
            match parts.as_slice() {
                [name, value] => query.set_option(*name, *value),
                [name] => query.set_option(*name, ""),
                _ => debug!("skipping option with more than one '=' in hash: {element:?}"),
            }
        }
    }

    if let Some(stripped) = query.user_query().strip_suffix(NEAR_MATCH_MARKER) {
        let stripped = stripped.to_string();
        query.set_user_query(stripped);
        query.set_near_match(true);
    }
    query
}

/// Splits the value of `q` into the bare user query followed by each
/// `+clause` / `-clause`. A clause starts at a space followed by a sign; the
/// space is dropped and the sign kept.
pub fn split_components(input: &str) -> Vec<String> {
    let mut components = Vec::new();
    let mut rest = input;
    loop {
        rest = rest.trim_start();
        let plus = rest.find(" +");
        let minus = rest.find(" -");
        let next = match (plus, minus) {
            (Some(p), Some(m)) => Some(p.min(m)),
            (Some(p), None) => Some(p),
            (None, Some(m)) => Some(m),
            (None, None) => None,
        };
        match next {
            Some(position) => {
                components.push(rest[..position].to_string());
                rest = &rest[position + 1..];
            }
            None => {
                components.push(rest.to_string());
                break;
            }
        }
    }
    components
}

fn strip_location_prefix(hash: &str) -> &str {
    let hash = hash.strip_prefix('#').unwrap_or(hash);
    hash.strip_prefix('/').unwrap_or(hash)
}

fn user_query_value(element: &str) -> Option<&str> {
    if element == "q" {
        Some("")
    } else {
        element.strip_prefix("q=")
    }
}
