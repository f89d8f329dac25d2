//! Axum integration
//!
//! [`RequestParams`] is an extractor, and [`SearchableResponse`](crate::response::SearchableResponse),
//! [`ValidationError`](crate::responses::ValidationError) and [`Error`](crate::error::Error)
//! implement `IntoResponse`, so a list handler reads:
//!
//! ```rust,ignore
//! async fn list_users(
//!     State(engine): State<Arc<MemoryEngine>>,
//!     params: RequestParams,
//! ) -> Result<SearchableResponse> {
//!     SearchableBuilder::new(engine)
//!         .query(SearchFilter::new(["name", "email"]))?
//!         .paginate(25)
//!         .execute(&params)
//!         .await
//! }
//! ```

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::params::RequestParams;

impl<S> FromRequestParts<S> for RequestParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .uri
            .query()
            .map(RequestParams::parse)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(uri: &str) -> RequestParams {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        RequestParams::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_extracts_query_string() {
        let params = extract("/users?search=ada%40test.com&role[]=admin&role[]=editor").await;
        assert_eq!(params.get_str("search"), Some("ada@test.com"));
        assert_eq!(
            params.get("role"),
            Some(&serde_json::json!(["admin", "editor"]))
        );
    }

    #[tokio::test]
    async fn test_missing_query_string_is_empty() {
        assert!(extract("/users").await.is_empty());
    }
}
