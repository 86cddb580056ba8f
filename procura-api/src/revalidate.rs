//! Page revalidation over HTTP.
//!
//! The page renderer exposes a hook that drops its cached copy of one path.
//! [`HttpRevalidator`] posts `{ "path": ... }` to it once per path.

use async_trait::async_trait;
use procura_core::{InvalidationError, ProcuraResult};
use procura_storage::PageRevalidator;
use serde_json::json;
use std::time::Duration;

pub struct HttpRevalidator {
    client: reqwest::Client,
    url: String,
}

impl HttpRevalidator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ProcuraResult<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InvalidationError::RevalidationFailed {
                path: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl PageRevalidator for HttpRevalidator {
    async fn revalidate(&self, path: &str) -> ProcuraResult<()> {
        let failed = |reason: String| InvalidationError::RevalidationFailed {
            path: path.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "path": path }))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("renderer answered HTTP {}", status.as_u16())).into());
        }
        tracing::debug!(path = %path, "Page revalidated");
        Ok(())
    }
}
