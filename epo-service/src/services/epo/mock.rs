//! In-process search backend for local runs and router tests.

use super::{PatentSearch, UpstreamError, UpstreamPayload, DEFAULT_CONTENT_TYPE};
use async_trait::async_trait;
use axum::body::Bytes;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

enum Behavior {
    /// Echo the query back in an empty OPS-shaped result.
    EmptyResult,
    Payload(UpstreamPayload),
    Fail(UpstreamError),
}

/// Mock search backend that records how often it was called.
pub struct MockPatentSearch {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl Default for MockPatentSearch {
    fn default() -> Self {
        Self {
            behavior: Behavior::EmptyResult,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockPatentSearch {
    /// Always answer with `body` as `application/json`.
    pub fn with_payload(body: impl Into<Bytes>) -> Self {
        Self {
            behavior: Behavior::Payload(UpstreamPayload {
                body: body.into(),
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with `error`.
    pub fn failing(error: UpstreamError) -> Self {
        Self {
            behavior: Behavior::Fail(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of searches received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PatentSearch for MockPatentSearch {
    async fn search(
        &self,
        query: &str,
        _request_id: Option<&str>,
    ) -> Result<UpstreamPayload, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::EmptyResult => {
                let body = json!({
                    "ops:world-patent-data": {
                        "ops:biblio-search": {
                            "@total-result-count": "0",
                            "ops:query": { "$": query },
                            "ops:search-result": {}
                        }
                    }
                });
                Ok(UpstreamPayload {
                    body: Bytes::from(body.to_string()),
                    content_type: DEFAULT_CONTENT_TYPE.to_string(),
                })
            }
            Behavior::Payload(payload) => Ok(payload.clone()),
            Behavior::Fail(err) => Err(err.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
