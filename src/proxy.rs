//! Proxy forwarding to upstream origins.

use crate::error::ProxyError;
use crate::request::Request;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Headers the HTTP client recomputes for the buffered body.
const FRAMING_HEADERS: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

/// Request sent to an upstream origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Response received from an upstream origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// HTTP client used for proxied calls.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError>;
}

/// Connection-pooled HTTP/1.1 client used for proxied calls.
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Upstream client backed by the hyper-util pooled client.
///
/// Only the caller's headers are sent; `Host` is filled in from the target
/// when the caller omits it. Redirects are passed through.
pub struct HyperUpstream {
    client: HttpClient,
}

impl HyperUpstream {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.set_connect_timeout(Some(connect_timeout));
        http_connector.enforce_http(false);

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build(https_connector);
        Self { client }
    }
}

#[async_trait]
impl UpstreamClient for HyperUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError> {
        let url = request.url;
        let invalid = |message: String| ProxyError::InvalidRequest {
            url: url.clone(),
            message,
        };

        let mut builder = hyper::Request::builder()
            .method(request.method.as_str())
            .uri(url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let upstream_req = builder
            .body(Full::new(request.body))
            .map_err(|e| invalid(e.to_string()))?;

        let response = self.client.request(upstream_req).await.map_err(|e| {
            if e.is_connect() {
                ProxyError::Connect {
                    url: url.clone(),
                    message: e.to_string(),
                }
            } else {
                ProxyError::Upstream {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let (parts, body) = response.into_parts();
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = body
            .collect()
            .await
            .map_err(|e| ProxyError::Upstream {
                url: url.clone(),
                message: e.to_string(),
            })?
            .to_bytes();

        Ok(UpstreamResponse {
            status: parts.status.as_u16(),
            headers,
            body,
        })
    }
}

/// Forwards matched requests to a stub's proxy base URL.
pub struct ProxyForwarder {
    client: Arc<dyn UpstreamClient>,
    timeout: Duration,
    preserve_host_header: bool,
}

impl ProxyForwarder {
    pub fn new(client: Arc<dyn UpstreamClient>, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            preserve_host_header: false,
        }
    }

    pub fn with_preserve_host_header(mut self, preserve: bool) -> Self {
        self.preserve_host_header = preserve;
        self
    }

    /// Send the request to `base_url` + its path and query.
    ///
    /// The call is cancelled once the timeout elapses.
    pub async fn forward(
        &self,
        base_url: &str,
        request: &Request,
    ) -> Result<UpstreamResponse, ProxyError> {
        let url = target_url(base_url, &request.url);
        let headers = request
            .headers
            .iter()
            .filter(|(name, _)| self.forwards_header(name))
            .cloned()
            .collect();

        debug!(method = %request.method, target = %url, "Forwarding to upstream");

        let upstream = UpstreamRequest {
            method: request.method.clone(),
            url: url.clone(),
            headers,
            body: request.body.clone(),
        };

        match tokio::time::timeout(self.timeout, self.client.send(upstream)).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::Timeout {
                url,
                timeout: self.timeout,
            }),
        }
    }

    fn forwards_header(&self, name: &str) -> bool {
        if FRAMING_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
            return false;
        }
        self.preserve_host_header || !name.eq_ignore_ascii_case("host")
    }
}

/// Join a proxy base URL and a request's path and query.
pub fn target_url(base_url: &str, url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if url.is_empty() || url.starts_with('/') {
        format!("{}{}", base, url)
    } else {
        format!("{}/{}", base, url)
    }
}
