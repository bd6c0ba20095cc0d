// Remote page source
//
// The fetcher only needs "GET this URL, give me status and body"; keeping that
// behind a trait lets tests script responses without a server.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::time::Duration;

use super::error::TransportError;
use crate::config::SourceConfig;

/// Raw HTTP response for one page request.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Issue a GET for `url`. Any HTTP status is a successful response here;
    /// only connection-level failures are errors.
    async fn get_page(&self, url: &str) -> Result<PageResponse, TransportError>;
}

/// `reqwest` backed page source sending `Authorization: Token <credential>`.
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(config: &SourceConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref() {
            let mut value = HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| TransportError::new(format!("Invalid API token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("gastos2parquet/", env!("CARGO_PKG_VERSION")));

        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder.build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn get_page(&self, url: &str) -> Result<PageResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(PageResponse { status, body })
    }
}
