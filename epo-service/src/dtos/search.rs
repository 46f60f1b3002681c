use serde::Deserialize;
use service_core::error::AppError;
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

pub const MAX_QUERY_LENGTH: usize = 1000;

/// Body of `POST /search`. A missing or `null` `query` is treated the same as
/// an empty one.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
}

/// Query string of `GET /search?q=...`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

impl From<SearchParams> for SearchRequest {
    fn from(params: SearchParams) -> Self {
        Self { query: params.q }
    }
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
        }
    }

    /// Check the request and return the query to forward, trimmed.
    ///
    /// Blank queries are a 400; over-long ones fail validation (422). Length
    /// is counted in characters on the trimmed query.
    pub fn validated_query(&self) -> Result<&str, AppError> {
        let query = self.query.as_deref().unwrap_or_default().trim();
        if query.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Query cannot be empty"
            )));
        }

        if query.chars().count() > MAX_QUERY_LENGTH {
            return Err(query_too_long().into());
        }

        Ok(query)
    }
}

fn query_too_long() -> ValidationErrors {
    let mut error = ValidationError::new("length");
    error.message = Some(Cow::Owned(format!(
        "Query must be at most {} characters",
        MAX_QUERY_LENGTH
    )));
    error.add_param(Cow::Borrowed("max"), &MAX_QUERY_LENGTH);

    let mut errors = ValidationErrors::new();
    errors.add("query", error);
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(
            SearchRequest::new("  CRISPR \n").validated_query().unwrap(),
            "CRISPR"
        );
    }

    #[test]
    fn rejects_empty_and_blank_queries() {
        for query in ["", "   ", "\t\n"] {
            let err = SearchRequest::new(query).validated_query().unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "query {:?}", query);
        }
    }

    #[test]
    fn rejects_overlong_queries() {
        let long = "a".repeat(MAX_QUERY_LENGTH + 1);
        let err = SearchRequest::new(long).validated_query().unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn length_limit_applies_after_trimming() {
        let padded = format!("  {}\n", "a".repeat(MAX_QUERY_LENGTH));
        let request = SearchRequest::new(padded);
        assert_eq!(request.validated_query().unwrap().len(), MAX_QUERY_LENGTH);
    }

    #[test]
    fn length_is_counted_in_characters() {
        let query = "é".repeat(MAX_QUERY_LENGTH);
        assert!(SearchRequest::new(query).validated_query().is_ok());
    }

    #[test]
    fn missing_or_null_query_is_empty() {
        for body in ["{}", r#"{"query":null}"#] {
            let req: SearchRequest = serde_json::from_str(body).unwrap();
            let err = req.validated_query().unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "body {}", body);
        }
    }

    #[test]
    fn get_params_convert_to_request() {
        let req = SearchRequest::from(SearchParams {
            q: Some("ti=solar".to_string()),
        });
        assert_eq!(req.validated_query().unwrap(), "ti=solar");
    }
}
