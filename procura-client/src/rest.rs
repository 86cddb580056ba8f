//! Plain REST client for the Procura API.
//!
//! No caching happens here; see [`crate::gateway::CachedClient`] for the
//! read-through layer.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Header carrying the opaque company scope.
pub const COMPANY_HEADER: &str = "x-company-id";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    company_id: Option<String>,
}

impl RestClient {
    pub fn new(base_url: &str, company_id: Option<String>, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            company_id,
        })
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(
            &config.api_base_url,
            config.company_id.clone(),
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn company_id(&self) -> Option<&str> {
        self.company_id.as_deref()
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{}", self.base_url, endpoint));
        match &self.company_id {
            Some(company) => request.header(COMPANY_HEADER, company),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn get_json(
        &self,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> ClientResult<Value> {
        debug!(endpoint = %endpoint, params = params.len(), "GET");
        self.send(self.request(Method::GET, endpoint).query(params)).await
    }

    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> ClientResult<Value> {
        debug!(method = %method, endpoint = %endpoint, "Write");
        let request = self.request(method, endpoint);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        self.send(request).await
    }

    /// Ask the server to run a full invalidation. Returns its report.
    pub async fn clear_server_cache(&self) -> ClientResult<Value> {
        self.send(self.request(Method::POST, "/cache/clear")).await
    }
}

fn api_error(status: StatusCode, text: &str) -> ClientError {
    let parsed: Option<ErrorBody> = serde_json::from_str(text).ok();
    let (code, message) = match parsed {
        Some(body) => (
            body.code,
            body.message.unwrap_or_else(|| text.to_string()),
        ),
        None => (None, text.to_string()),
    };
    ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_is_parsed() {
        let err = api_error(
            StatusCode::NOT_FOUND,
            r#"{"code":"SCHEMA_NOT_FOUND","message":"Schema nope not found"}"#,
        );
        match err {
            ClientError::Api { status, code, message } => {
                assert_eq!(status, 404);
                assert_eq!(code.as_deref(), Some("SCHEMA_NOT_FOUND"));
                assert_eq!(message, "Schema nope not found");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_plain_error_body_kept_as_message() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("upstream down"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_base_url_trimmed() -> ClientResult<()> {
        let client = RestClient::new("http://localhost:3000/", Some("c-1".into()), Duration::from_secs(1))?;
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.company_id(), Some("c-1"));
        Ok(())
    }
}
