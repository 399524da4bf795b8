use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header;
use url::Url;

use crate::error::Result;

/// One fetched asset: status plus the two cache-relevant headers and the
/// body bytes.
#[derive(Debug, Clone)]
pub struct AssetResponse {
    pub status: StatusCode,
    /// Raw `Last-Modified` header value, if present.
    pub last_modified: Option<String>,
    /// Raw `Expires` header value, if present.
    pub expires: Option<String>,
    pub body: Vec<u8>,
}

impl AssetResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// HTTP boundary for asset downloads. The synchronizer and generator only
/// ever GET; everything else about the transport stays behind this trait.
#[async_trait]
pub trait AssetTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<AssetResponse>;
}

/// Default transport on a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

#[async_trait]
impl AssetTransport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<AssetResponse> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let header_string = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let last_modified = header_string(header::LAST_MODIFIED);
        let expires = header_string(header::EXPIRES);
        let body = response.bytes().await?.to_vec();

        Ok(AssetResponse {
            status,
            last_modified,
            expires,
            body,
        })
    }
}
