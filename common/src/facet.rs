//! Field/value filter constraints attached to a query.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};


/// A `field:value` filter. The value carries any range or grouping syntax
/// (`[a TO b]`, `(x OR y)`) verbatim. Options are extra request parameters
/// scoped to this facet, e.g. a per-field minimum count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Facet {
    field: String,
    value: String,
    options: IndexMap<String, String>,
}

impl Facet {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            options: IndexMap::new(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.insert(name.into(), value.into());
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(|v| v.as_str())
    }

    pub fn options(&self) -> &IndexMap<String, String> {
        &self.options
    }

    /// Two facets constrain the same thing when field and value match;
    /// options are not considered.
    pub fn same_constraint(&self, other: &Facet) -> bool {
        self.field == other.field && self.value == other.value
    }

    /// `&fq=field:value` followed by `&name=value` for each option, in
    /// insertion order.
    pub fn to_query_fragment(&self) -> String {
        let mut fragment = format!("&fq={}:{}", self.field, self.value);
        for (name, value) in self.options.iter() {
            fragment.push('&');
            fragment.push_str(name);
            fragment.push('=');
            fragment.push_str(value);
        }
        fragment
    }
}
