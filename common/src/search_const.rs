//! Baseline values applied to freshly created queries.

/// Query that matches every document in the index.
pub const MATCH_ALL_QUERY: &str = "*:*";

/// Marker appended to the user query when near matching is enabled.
pub const NEAR_MATCH_MARKER: char = '~';

pub const DEFAULT_ROWS: u32 = 10;
pub const DEFAULT_FIELD_LIST: &str = "*";
pub const DEFAULT_RESPONSE_WRITER: &str = "json";

/// Option names the baseline defaults touch.
pub const OPTION_ROWS: &str = "rows";
pub const OPTION_FIELD_LIST: &str = "fl";
pub const OPTION_RESPONSE_WRITER: &str = "wt";
pub const OPTION_FILTER_QUERY: &str = "fq";
pub const OPTION_JSONP_CALLBACK: &str = "json.wrf";

/// Path appended to the core url for search requests.
pub const SELECT_PATH: &str = "/select?";
