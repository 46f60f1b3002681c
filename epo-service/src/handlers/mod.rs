pub mod health;
pub mod metrics;
pub mod search;
pub mod status;

pub use health::{health_check, readiness_check};
pub use metrics::metrics;
pub use search::{search_get, search_post};
pub use status::status;
