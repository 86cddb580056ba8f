//! Company scope extractor.
//!
//! The scope token is opaque to this service: it is read from the
//! `x-company-id` header, folded into cache keys, and forwarded to the remote
//! peer. A missing or blank header means the unscoped view.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use procura_core::CompanyScope;
use std::convert::Infallible;

/// Header carrying the opaque company scope.
pub const COMPANY_HEADER: &str = "x-company-id";

/// The caller's company scope.
///
/// # Example
///
/// ```rust,ignore
/// async fn list(Scope(scope): Scope, State(source): State<Arc<CachedSource>>) {
///     source.list_companies(&scope).await;
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope(pub CompanyScope);

#[async_trait]
impl<S> FromRequestParts<S> for Scope
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let scope = parts
            .headers
            .get(COMPANY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(CompanyScope::new)
            .unwrap_or_else(CompanyScope::unscoped);
        Ok(Scope(scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Scope {
        let (mut parts, _) = request.into_parts();
        match Scope::from_request_parts(&mut parts, &()).await {
            Ok(scope) => scope,
            Err(never) => match never {},
        }
    }

    #[tokio::test]
    async fn test_header_becomes_scope() -> Result<(), axum::http::Error> {
        let request = Request::builder()
            .header(COMPANY_HEADER, " acme ")
            .body(())?;
        assert_eq!(extract(request).await, Scope(CompanyScope::new("acme")));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_is_unscoped() -> Result<(), axum::http::Error> {
        let missing = Request::builder().body(())?;
        let blank = Request::builder().header(COMPANY_HEADER, "").body(())?;
        assert_eq!(extract(missing).await, Scope(CompanyScope::unscoped()));
        assert_eq!(extract(blank).await, Scope(CompanyScope::unscoped()));
        Ok(())
    }
}
