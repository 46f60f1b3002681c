use serde::{Deserialize, Serialize};

/// Fixed liveness payload returned by `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

impl StatusResponse {
    pub fn current() -> Self {
        Self {
            status: "ok".to_string(),
            service: "epo".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
