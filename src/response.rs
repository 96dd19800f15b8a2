//! Response rendering.

use crate::error::{ProxyError, RenderError};
use crate::files::FileSource;
use crate::proxy::{ProxyForwarder, UpstreamResponse};
use crate::request::Request;
use crate::stub::{BodySource, StubMapping};
use crate::template::TemplateEngine;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Response handed back to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl MockResponse {
    /// Fallback when no stub matches.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn render_failed(err: &RenderError) -> Self {
        Self::plain_text(500, err.to_string())
    }

    pub fn proxy_failed(err: &ProxyError) -> Self {
        Self::plain_text(err.status(), err.to_string())
    }

    fn plain_text(status: u16, message: String) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: Bytes::from(message),
        }
    }

    /// First value of a header, matching the name case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl From<UpstreamResponse> for MockResponse {
    fn from(upstream: UpstreamResponse) -> Self {
        Self {
            status: upstream.status,
            headers: upstream.headers,
            body: upstream.body,
        }
    }
}

/// Builds responses from matched stubs, locally or by proxying.
pub struct ResponseRenderer {
    files: Arc<dyn FileSource>,
    templates: TemplateEngine,
    forwarder: ProxyForwarder,
}

impl ResponseRenderer {
    pub fn new(files: Arc<dyn FileSource>, forwarder: ProxyForwarder) -> Self {
        Self {
            files,
            templates: TemplateEngine::new(),
            forwarder,
        }
    }

    /// Render a matched stub. Failures become 5xx responses.
    pub async fn render(&self, stub: &StubMapping, request: &Request) -> MockResponse {
        if let Some(delay) = &stub.response.delay {
            let delay = delay.calculate();
            if !delay.is_zero() {
                debug!(stub_id = %stub.id, delay_ms = delay.as_millis() as u64, "Applying delay");
                tokio::time::sleep(delay).await;
            }
        }

        if let Some(base_url) = &stub.response.proxy_base_url {
            return match self.forwarder.forward(base_url, request).await {
                Ok(upstream) => upstream.into(),
                Err(e) => {
                    warn!(stub_id = %stub.id, error = %e, "Proxying failed");
                    MockResponse::proxy_failed(&e)
                }
            };
        }

        match self.render_local(stub, request) {
            Ok(response) => response,
            Err(e) => {
                warn!(stub_id = %stub.id, error = %e, "Rendering failed");
                MockResponse::render_failed(&e)
            }
        }
    }

    /// Build a non-proxied response: defined status and headers only.
    pub fn render_local(
        &self,
        stub: &StubMapping,
        request: &Request,
    ) -> Result<MockResponse, RenderError> {
        let definition = &stub.response;

        let mut body = match &definition.body {
            BodySource::Inline(bytes) => bytes.clone(),
            BodySource::File(path) => self.files.read(path)?,
            BodySource::Absent => Bytes::new(),
        };

        if definition.templated {
            let captures = stub.request.url().captures(&request.url);
            let rendered = self
                .templates
                .render(&String::from_utf8_lossy(&body), request, captures)?;
            body = Bytes::from(rendered);
        }

        Ok(MockResponse {
            status: definition.status,
            headers: definition
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DelayConfig, RequestDefinition, ResponseBody, ResponseConfig, StubDefinition, UrlPattern,
    };
    use crate::files::FilesystemSource;
    use crate::proxy::{UpstreamClient, UpstreamRequest};
    use crate::request::RequestMethod;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    struct EchoUpstream;

    #[async_trait]
    impl UpstreamClient for EchoUpstream {
        async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError> {
            Ok(UpstreamResponse {
                status: 200,
                headers: vec![("x-proxied-url".to_string(), request.url)],
                body: request.body,
            })
        }
    }

    struct DownUpstream;

    #[async_trait]
    impl UpstreamClient for DownUpstream {
        async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError> {
            Err(ProxyError::Connect {
                url: request.url,
                message: "connection refused".to_string(),
            })
        }
    }

    fn renderer_with(root: &std::path::Path, upstream: Arc<dyn UpstreamClient>) -> ResponseRenderer {
        ResponseRenderer::new(
            Arc::new(FilesystemSource::new(root)),
            ProxyForwarder::new(upstream, Duration::from_secs(5)),
        )
    }

    fn stub(url: UrlPattern, response: ResponseConfig) -> StubMapping {
        StubMapping::compile(
            StubDefinition {
                id: None,
                name: None,
                request: RequestDefinition::new(RequestMethod::Get, url),
                response,
                priority: None,
            },
            5,
        )
        .unwrap()
    }

    fn exact(url: &str) -> UrlPattern {
        UrlPattern::Exact {
            value: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_inline_body_and_headers_only() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer_with(dir.path(), Arc::new(EchoUpstream));
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Etag".to_string(), "b13894794wb".to_string());
        let stub = stub(
            exact("/whatever"),
            ResponseConfig {
                headers,
                body: Some(ResponseBody::Text {
                    content: "{}".to_string(),
                }),
                ..Default::default()
            },
        );

        let response = renderer.render(&stub, &Request::new("GET", "/whatever")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.headers.len(), 2);
        assert_eq!(response.header("etag"), Some("b13894794wb"));
        assert_eq!(response.body_text(), "{}");
    }

    #[tokio::test]
    async fn test_absent_body_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer_with(dir.path(), Arc::new(EchoUpstream));
        let stub = stub(
            exact("/x"),
            ResponseConfig {
                status: 204,
                ..Default::default()
            },
        );
        let response = renderer.render(&stub, &Request::new("GET", "/x")).await;
        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
        assert!(response.headers.is_empty());
    }

    #[tokio::test]
    async fn test_file_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("path/to")).unwrap();
        std::fs::write(dir.path().join("path/to/myfile.xml"), "<file/>").unwrap();
        let renderer = renderer_with(dir.path(), Arc::new(EchoUpstream));
        let stub = stub(
            exact("/body-file"),
            ResponseConfig {
                body: Some(ResponseBody::File {
                    path: "path/to/myfile.xml".to_string(),
                }),
                ..Default::default()
            },
        );

        let response = renderer.render(&stub, &Request::new("GET", "/body-file")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body_text(), "<file/>");
    }

    #[tokio::test]
    async fn test_missing_file_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer_with(dir.path(), Arc::new(EchoUpstream));
        let stub = stub(
            exact("/body-file"),
            ResponseConfig {
                body: Some(ResponseBody::File {
                    path: "missing.xml".to_string(),
                }),
                ..Default::default()
            },
        );

        let response = renderer.render(&stub, &Request::new("GET", "/body-file")).await;
        assert_eq!(response.status, 500);
        assert!(response.body_text().contains("missing.xml"));
    }

    #[tokio::test]
    async fn test_binary_body() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer_with(dir.path(), Arc::new(EchoUpstream));
        let stub = stub(
            exact("/binary-body"),
            ResponseConfig {
                body: Some(ResponseBody::Base64 {
                    content: "AQIDBA==".to_string(),
                }),
                ..Default::default()
            },
        );
        let response = renderer.render(&stub, &Request::new("GET", "/binary-body")).await;
        assert_eq!(response.body.as_ref(), &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_templated_body() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer_with(dir.path(), Arc::new(EchoUpstream));
        let stub = stub(
            UrlPattern::Regex {
                pattern: "/users/(?P<id>[0-9]+)".to_string(),
            },
            ResponseConfig {
                body: Some(ResponseBody::Text {
                    content: "user {{request.captures.id}} via {{request.method}}".to_string(),
                }),
                template: true,
                ..Default::default()
            },
        );
        let response = renderer.render(&stub, &Request::new("GET", "/users/42")).await;
        assert_eq!(response.body_text(), "user 42 via GET");
    }

    #[tokio::test]
    async fn test_proxy_delegation() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer_with(dir.path(), Arc::new(EchoUpstream));
        let stub = stub(
            UrlPattern::Regex {
                pattern: "/other/service/.*".to_string(),
            },
            ResponseConfig {
                proxied_from: Some("http://otherhost.com/approot".to_string()),
                ..Default::default()
            },
        );

        let response = renderer
            .render(&stub, &Request::new("GET", "/other/service/a").with_body("ping"))
            .await;
        assert_eq!(
            response.header("x-proxied-url"),
            Some("http://otherhost.com/approot/other/service/a")
        );
        assert_eq!(response.body_text(), "ping");
    }

    #[tokio::test]
    async fn test_proxy_failure_is_gateway_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer_with(dir.path(), Arc::new(DownUpstream));
        let stub = stub(
            exact("/down"),
            ResponseConfig {
                proxied_from: Some("http://otherhost.com".to_string()),
                ..Default::default()
            },
        );
        let response = renderer.render(&stub, &Request::new("GET", "/down")).await;
        assert_eq!(response.status, 502);
    }

    #[tokio::test]
    async fn test_fixed_delay() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer_with(dir.path(), Arc::new(EchoUpstream));
        let stub = stub(
            exact("/slow"),
            ResponseConfig {
                delay: Some(DelayConfig {
                    fixed_ms: 30,
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let started = Instant::now();
        renderer.render(&stub, &Request::new("GET", "/slow")).await;
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
