//! Minimal HTTP/1.1 transport.
//!
//! Accepts connections, buffers each request into a [`Request`], and hands
//! it to the admin API or to [`MockServer::handle`].

use crate::admin;
use crate::request::Request;
use crate::response::MockResponse;
use crate::server::MockServer;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Response;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Headers hyper computes for the outgoing body.
const FRAMING_HEADERS: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

/// Bound HTTP server over a [`MockServer`].
pub struct HttpServer {
    listener: TcpListener,
    server: Arc<MockServer>,
}

impl HttpServer {
    /// Bind the listener. Port 0 picks a free port.
    pub async fn bind(addr: SocketAddr, server: Arc<MockServer>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, server })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve connections until the task is dropped.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(address = %self.local_addr()?, "Mock server listening");

        loop {
            let (stream, peer) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = Arc::clone(&self.server);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { dispatch(req, server).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(peer = %peer, error = %e, "Connection error");
                }
            });
        }
    }
}

async fn dispatch(
    req: hyper::Request<Incoming>,
    server: Arc<MockServer>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let request = match into_request(req).await {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Failed to read request body");
            return Ok(into_response(MockResponse {
                status: 400,
                headers: Vec::new(),
                body: Bytes::new(),
            }));
        }
    };

    let response = if admin::is_admin_path(request.path()) {
        admin::handle(&server, &request)
    } else {
        server.handle(request).await
    };
    Ok(into_response(response))
}

/// Buffer a hyper request into the normalized form.
async fn into_request(req: hyper::Request<Incoming>) -> Result<Request, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
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

    Ok(Request {
        method: parts.method.as_str().to_string(),
        url,
        headers,
        body,
    })
}

fn into_response(response: MockResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        if FRAMING_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(Full::new(response.body)).unwrap_or_else(|e| {
        debug!(error = %e, "Invalid response parts");
        let mut fallback = Response::new(Full::new(Bytes::from("Internal Server Error")));
        *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalSettings;
    use crate::dsl::*;

    async fn start(settings: GlobalSettings) -> (Arc<MockServer>, String) {
        let server = Arc::new(MockServer::new(settings).unwrap());
        let http = HttpServer::bind("127.0.0.1:0".parse().unwrap(), Arc::clone(&server))
            .await
            .unwrap();
        let base = format!("http://{}", http.local_addr().unwrap());
        tokio::spawn(http.run());
        (server, base)
    }

    #[tokio::test]
    async fn test_serves_stub_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let (server, base) = start(GlobalSettings {
            files_root: dir.path().to_path_buf(),
            ..Default::default()
        })
        .await;
        server
            .stub_for(
                get(url_equal_to("/some/thing")).will_return(
                    a_response()
                        .with_status(200)
                        .with_header("Content-Type", "text/plain")
                        .with_body("Hello world!"),
                ),
            )
            .unwrap();

        let client = reqwest::Client::new();
        let response = client
            .get(format!("{base}/some/thing"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(response.text().await.unwrap(), "Hello world!");

        let response = client
            .get(format!("{base}/some/thing/else"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
        assert!(response.text().await.unwrap().is_empty());

        let pattern = get_requested_for(url_matching("/some/thing.*")).build().unwrap();
        assert_eq!(server.count(&pattern), 2);
    }

    #[tokio::test]
    async fn test_admin_api_over_http() {
        let (server, base) = start(GlobalSettings::default()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/__admin/mappings"))
            .body(r#"{"request": {"method": "POST", "url": {"type": "exact", "value": "/items"}}, "response": {"status": 201}}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);

        let response = client
            .post(format!("{base}/items"))
            .body("payload")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);

        let count = client
            .post(format!("{base}/__admin/requests/count"))
            .body(r#"{"method": "POST", "url": {"type": "exact", "value": "/items"}}"#)
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let count: serde_json::Value = serde_json::from_str(&count).unwrap();
        assert_eq!(count["count"], 1);

        // Only the stubbed call was journaled
        assert_eq!(server.all_requests().len(), 1);
        assert_eq!(server.all_requests()[0].body().as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_proxies_to_another_instance() {
        let (origin, origin_base) = start(GlobalSettings::default()).await;
        origin
            .stub_for(
                get(url_equal_to("/anything/else"))
                    .will_return(a_response().with_status(202).with_body("from origin")),
            )
            .unwrap();

        let (front, front_base) = start(GlobalSettings::default()).await;
        front
            .stub_for(
                get(url_matching(".*"))
                    .at_priority(10)
                    .will_return(a_response().proxied_from(origin_base.as_str())),
            )
            .unwrap();
        front
            .stub_for(
                get(url_equal_to("/api/override/123"))
                    .at_priority(1)
                    .will_return(a_response().with_status(503)),
            )
            .unwrap();

        let client = reqwest::Client::new();
        let response = client
            .get(format!("{front_base}/anything/else"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 202);
        assert_eq!(response.text().await.unwrap(), "from origin");

        let response = client
            .get(format!("{front_base}/api/override/123"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 503);

        // The override never reached the origin
        assert_eq!(origin.all_requests().len(), 1);
        assert_eq!(origin.all_requests()[0].url(), "/anything/else");
    }

    #[tokio::test]
    async fn test_proxied_request_adds_no_headers() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (origin, origin_base) = start(GlobalSettings::default()).await;
        origin
            .stub_for(any(url_matching(".*")).will_return(a_response().with_status(200)))
            .unwrap();

        let (front, front_base) = start(GlobalSettings::default()).await;
        front
            .stub_for(
                any(url_matching(".*"))
                    .will_return(a_response().proxied_from(origin_base.as_str())),
            )
            .unwrap();

        // Hand-written request so the inbound header set is exact
        let addr = front_base.trim_start_matches("http://");
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"GET /headers/check HTTP/1.1\r\nHost: front.test\r\nX-Only: one\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        assert!(String::from_utf8_lossy(&raw).starts_with("HTTP/1.1 200"));

        let logged = origin.all_requests();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].url(), "/headers/check");
        assert_eq!(logged[0].header("x-only"), Some("one"));
        for (name, _) in logged[0].headers() {
            let name = name.to_ascii_lowercase();
            assert!(
                matches!(name.as_str(), "x-only" | "host" | "content-length"),
                "unexpected header forwarded to origin: {name}"
            );
        }
    }
}
