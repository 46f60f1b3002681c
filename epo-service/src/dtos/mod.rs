pub mod search;
pub mod status;

pub use search::{SearchParams, SearchRequest, MAX_QUERY_LENGTH};
pub use status::StatusResponse;
