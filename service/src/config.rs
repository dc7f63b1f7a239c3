//! Environment-driven settings for the update service.

use std::sync::Arc;
use std::time::Duration;

use common::search_const::{DEFAULT_ROWS, OPTION_JSONP_CALLBACK, OPTION_ROWS};
use common::search_query::{Query, apply_baseline_defaults};
use tracing::warn;

use crate::registry::DefaultQueryFn;

pub const DEFAULT_CORE_URL: &str = "http://127.0.0.1:8983/solr/collection1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub core_url: String,
    pub request_timeout: Duration,
    pub default_rows: u32,
    pub jsonp_callback: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            core_url: DEFAULT_CORE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_rows: DEFAULT_ROWS,
            jsonp_callback: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let core_url = lookup("SEARCH_CORE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.core_url);
        let request_timeout = parse_or("SEARCH_REQUEST_TIMEOUT_MS", lookup("SEARCH_REQUEST_TIMEOUT_MS"), defaults.request_timeout.as_millis() as u64);
        let default_rows = parse_or("SEARCH_DEFAULT_ROWS", lookup("SEARCH_DEFAULT_ROWS"), defaults.default_rows);
        let jsonp_callback = lookup("SEARCH_JSONP_CALLBACK").filter(|cb| !cb.is_empty());
        Self {
            core_url,
            request_timeout: Duration::from_millis(request_timeout),
            default_rows,
            jsonp_callback,
        }
    }

    /// Default-query strategy for a registry: the baseline options, this
    /// config's row count and, if configured, the JSONP callback.
    pub fn default_query_fn(&self) -> DefaultQueryFn {
        let rows = self.default_rows.to_string();
        let callback = self.jsonp_callback.clone();
        Arc::new(move |query: &mut Query| {
            apply_baseline_defaults(query);
            query.set_option(OPTION_ROWS, rows.clone());
            if let Some(callback) = &callback {
                query.set_option(OPTION_JSONP_CALLBACK, callback.clone());
            }
        })
    }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, raw: Option<String>, fallback: T) -> T {
    match raw {
        None => fallback,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{key}={raw:?} is not a valid number, using {fallback}");
            fallback
        }),
    }
}
