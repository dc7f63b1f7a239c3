//! Location-hash helpers: the string a router owns and hands back to us.

use std::{convert::Infallible, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::query_parser::parse_hash_into;
use crate::search_query::Query;


/// The query portion of a location hash, stored without the leading `#`/`/`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LocationHash(pub String);

impl LocationHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuilds the query on top of [`Query::with_defaults`].
    pub fn to_query(&self, base_url: &str) -> Query {
        self.to_query_from(Query::with_defaults(base_url))
    }

    /// Rebuilds the query on top of a caller-defaulted query.
    pub fn to_query_from(&self, base: Query) -> Query {
        parse_hash_into(&self.0, base)
    }
}

impl From<&Query> for LocationHash {
    fn from(query: &Query) -> Self {
        LocationHash(query.to_query_string())
    }
}

// Renders the same string as `Query::location_hash`
impl Display for LocationHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl FromStr for LocationHash {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix('#').unwrap_or(s);
        let s = s.strip_prefix('/').unwrap_or(s);
        Ok(LocationHash(s.to_string()))
    }
}
