//! Query object model shared by every search widget: facets, queries, the
//! location-hash codec and the typed result envelope.

extern crate serde;


pub mod facet;
pub mod search_query;
pub mod query_parser;
pub mod uri_encoding;
pub mod search_result;
pub mod search_const;
pub mod location;
