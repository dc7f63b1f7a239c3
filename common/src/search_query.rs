//! The query aggregate: user query, boolean clauses, facets, backend options
//! and the state of the last fetch.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::facet::Facet;
use crate::search_const::{
    DEFAULT_FIELD_LIST, DEFAULT_RESPONSE_WRITER, DEFAULT_ROWS, MATCH_ALL_QUERY, NEAR_MATCH_MARKER,
    OPTION_FIELD_LIST, OPTION_FILTER_QUERY, OPTION_RESPONSE_WRITER, OPTION_ROWS, SELECT_PATH,
};
use crate::search_result::{FacetCounts, Highlighting, ResponseHeader, ResultSet, SearchResponse};
use crate::uri_encoding::encode_uri;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    base_url: String,
    user_query: String,
    near_match: bool,
    query_parameters: Vec<String>,
    options: IndexMap<String, String>,
    facets: Vec<Facet>,

    response: ResultSet,
    response_header: Option<ResponseHeader>,
    highlighting: Option<Highlighting>,
    facet_counts: Option<FacetCounts>,
    error_message: Option<String>,
}

impl Query {
    /// A bare query against `base_url`: match-all user query, no options.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_query: MATCH_ALL_QUERY.to_string(),
            near_match: false,
            query_parameters: Vec::new(),
            options: IndexMap::new(),
            facets: Vec::new(),
            response: ResultSet::empty(),
            response_header: None,
            highlighting: None,
            facet_counts: None,
            error_message: None,
        }
    }

    /// [`Query::new`] plus the baseline options (`fl=*`, `rows=10`, `wt=json`).
    pub fn with_defaults(base_url: impl Into<String>) -> Self {
        let mut query = Self::new(base_url);
        apply_baseline_defaults(&mut query);
        query
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    pub fn set_user_query(&mut self, user_query: impl Into<String>) {
        self.user_query = user_query.into();
    }

    pub fn near_match(&self) -> bool {
        self.near_match
    }

    pub fn set_near_match(&mut self, near_match: bool) {
        self.near_match = near_match;
    }

    /// Adds a fully specified clause such as `+field:"value"`. Duplicates are ignored.
    pub fn add_query_parameter(&mut self, parameter: impl Into<String>) {
        let parameter = parameter.into();
        if !self.query_parameters.contains(&parameter) {
            self.query_parameters.push(parameter);
        }
    }

    /// Replaces the clause list wholesale, as given.
    pub fn set_query_parameters(&mut self, parameters: Vec<String>) {
        self.query_parameters = parameters;
    }

    pub fn user_query_parameters(&self) -> &[String] {
        &self.query_parameters
    }

    /// Upserts an option. `fq` is special: if the stored value is exactly the
    /// empty string, the new value is appended as `" +" + value` instead of
    /// replacing it. Any other stored `fq` value is overwritten.
    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if name == OPTION_FILTER_QUERY {
            if let Some(existing) = self.options.get_mut(&name) {
                if existing.is_empty() {
                    existing.push_str(" +");
                    existing.push_str(&value);
                    return;
                }
            }
        }
        self.options.insert(name, value);
    }

    /// Looks up an option the way widgets read it: empty and `"0"` values
    /// count as unset. Use [`Query::raw_option`] to see the stored value.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.raw_option(name)
            .filter(|value| !value.is_empty() && *value != "0")
    }

    pub fn raw_option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(|v| v.as_str())
    }

    pub fn remove_option(&mut self, name: &str) -> Option<String> {
        self.options.shift_remove(name)
    }

    pub fn options(&self) -> &IndexMap<String, String> {
        &self.options
    }

    /// Builds a facet for this query without adding it.
    pub fn create_facet(&self, field: impl Into<String>, value: impl Into<String>) -> Facet {
        Facet::new(field, value)
    }

    /// Appends `facet` unless one with the same field and value is present.
    pub fn add_facet(&mut self, facet: Facet) {
        if !self.facets.iter().any(|f| f.same_constraint(&facet)) {
            self.facets.push(facet);
        }
    }

    /// First facet on `field`.
    pub fn facet(&self, field: &str) -> Option<&Facet> {
        self.facets.iter().find(|f| f.field() == field)
    }

    /// Sets an option on the first facet on `field`. Returns false when no
    /// such facet exists.
    pub fn set_facet_option(&mut self, field: &str, name: impl Into<String>, value: impl Into<String>) -> bool {
        match self.facets.iter_mut().find(|f| f.field() == field) {
            Some(facet) => {
                facet.set_option(name, value);
                true
            }
            None => false,
        }
    }

    pub fn has_facet(&self, field: &str) -> bool {
        self.facet(field).is_some()
    }

    /// Removes the first facet on `field`.
    pub fn remove_facet(&mut self, field: &str) -> Option<Facet> {
        let index = self.facets.iter().position(|f| f.field() == field)?;
        Some(self.facets.remove(index))
    }

    pub fn remove_facet_by_index(&mut self, index: usize) -> Option<Facet> {
        if index < self.facets.len() {
            Some(self.facets.remove(index))
        } else {
            None
        }
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    pub fn response(&self) -> &ResultSet {
        &self.response
    }

    pub fn set_response(&mut self, response: ResultSet) {
        self.response = response;
    }

    pub fn response_header(&self) -> Option<&ResponseHeader> {
        self.response_header.as_ref()
    }

    pub fn set_response_header(&mut self, header: Option<ResponseHeader>) {
        self.response_header = header;
    }

    pub fn highlighting(&self) -> Option<&Highlighting> {
        self.highlighting.as_ref()
    }

    pub fn set_highlighting(&mut self, highlighting: Option<Highlighting>) {
        self.highlighting = highlighting;
    }

    pub fn facet_counts(&self) -> Option<&FacetCounts> {
        self.facet_counts.as_ref()
    }

    pub fn set_facet_counts(&mut self, facet_counts: Option<FacetCounts>) {
        self.facet_counts = facet_counts;
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn set_error_message(&mut self, message: Option<String>) {
        self.error_message = message;
    }

    /// Stores a successful fetch. Facet counts are only replaced when the
    /// envelope carries them.
    pub fn record_success(&mut self, envelope: SearchResponse) {
        self.error_message = None;
        self.highlighting = envelope.highlighting;
        if envelope.facet_counts.is_some() {
            self.facet_counts = envelope.facet_counts;
        }
        self.response = envelope.response;
        self.response_header = envelope.response_header;
    }

    /// Stores a failed fetch: the message plus an empty result set.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.response = ResultSet::empty();
        self.facet_counts = None;
        self.highlighting = None;
        self.response_header = None;
    }

    /// Canonical query string: user query, near-match marker, clauses,
    /// facet fragments, then options.
    pub fn to_query_string(&self) -> String {
        let mut out = format!("q={}", self.user_query);
        if self.near_match {
            out.push(NEAR_MATCH_MARKER);
        }
        for parameter in self.query_parameters.iter() {
            out.push(' ');
            out.push_str(parameter);
        }
        for facet in self.facets.iter() {
            out.push_str(&facet.to_query_fragment());
        }
        for (name, value) in self.options.iter() {
            out.push('&');
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out
    }

    pub fn solr_query_url(&self) -> String {
        format!("{}{}{}", self.base_url, SELECT_PATH, encode_uri(&self.to_query_string()))
    }

    /// The string pushed into the location bar: `"/" + query string`.
    pub fn location_hash(&self) -> String {
        format!("/{}", self.to_query_string())
    }
}

/// Applies `fl=*`, `rows=10`, `wt=json` and the match-all user query.
pub fn apply_baseline_defaults(query: &mut Query) {
    query.set_option(OPTION_FIELD_LIST, DEFAULT_FIELD_LIST);
    query.set_option(OPTION_ROWS, DEFAULT_ROWS.to_string());
    query.set_option(OPTION_RESPONSE_WRITER, DEFAULT_RESPONSE_WRITER);
    query.set_user_query(MATCH_ALL_QUERY);
}
