//! JSON admin API served under `/__admin`.
//!
//! Routes:
//!
//! | Method | Path                      | Action                          |
//! |--------|---------------------------|---------------------------------|
//! | GET    | `/__admin/mappings`       | list stubs                      |
//! | POST   | `/__admin/mappings`       | add a stub                      |
//! | DELETE | `/__admin/mappings/{id}`  | remove a stub                   |
//! | POST   | `/__admin/reset`          | clear stubs and journal         |
//! | GET    | `/__admin/requests`       | list the journal                |
//! | POST   | `/__admin/requests/find`  | journal entries matching a body |
//! | POST   | `/__admin/requests/count` | count of matching entries       |
//!
//! Admin calls are never journaled.

use crate::config::{RequestDefinition, StubDefinition};
use crate::journal::LoggedRequest;
use crate::pattern::RequestPattern;
use crate::request::Request;
use crate::response::MockResponse;
use crate::server::MockServer;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ADMIN_PREFIX: &str = "/__admin";

/// Whether a path belongs to the admin API.
pub fn is_admin_path(path: &str) -> bool {
    path == ADMIN_PREFIX
        || path
            .strip_prefix(ADMIN_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MappingsResponse {
    pub mappings: Vec<StubDefinition>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestsResponse {
    pub requests: Vec<LoggedRequestView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// JSON form of a journal entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoggedRequestView {
    pub sequence: u64,
    pub logged_at: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossy
    pub body: String,
    pub body_base64: String,
}

impl From<&LoggedRequest> for LoggedRequestView {
    fn from(entry: &LoggedRequest) -> Self {
        Self {
            sequence: entry.sequence,
            logged_at: entry.logged_at,
            method: entry.method().to_string(),
            url: entry.url().to_string(),
            headers: entry.headers().to_vec(),
            body: entry.request.body_text().into_owned(),
            body_base64: base64::engine::general_purpose::STANDARD.encode(entry.body()),
        }
    }
}

/// Serve one admin request.
pub fn handle(server: &MockServer, request: &Request) -> MockResponse {
    let path = request.path();
    let route = path.strip_prefix(ADMIN_PREFIX).unwrap_or(path);
    let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();

    debug!(method = %request.method, path = %path, "Admin API");

    match (request.method.to_ascii_uppercase().as_str(), segments.as_slice()) {
        ("GET", ["mappings"]) => list_mappings(server),
        ("POST", ["mappings"]) => create_mapping(server, &request.body),
        ("DELETE", ["mappings", id]) => delete_mapping(server, id),
        ("POST", ["reset"]) => {
            server.reset();
            json_response(200, &serde_json::json!({}))
        }
        ("GET", ["requests"]) => requests_response(&server.all_requests()),
        ("POST", ["requests", "find"]) => match parse_pattern(&request.body) {
            Ok(pattern) => requests_response(&server.find_all(&pattern)),
            Err(response) => response,
        },
        ("POST", ["requests", "count"]) => match parse_pattern(&request.body) {
            Ok(pattern) => json_response(
                200,
                &CountResponse {
                    count: server.count(&pattern),
                },
            ),
            Err(response) => response,
        },
        _ => error_response(404, "Not Found"),
    }
}

fn list_mappings(server: &MockServer) -> MockResponse {
    let mappings = server
        .stubs()
        .iter()
        .map(|stub| {
            let mut definition = stub.definition.clone();
            definition.id = Some(stub.id.clone());
            definition.priority = Some(stub.priority);
            definition
        })
        .collect();
    json_response(200, &MappingsResponse { mappings })
}

fn create_mapping(server: &MockServer, body: &Bytes) -> MockResponse {
    let definition: StubDefinition = match serde_json::from_slice(body) {
        Ok(d) => d,
        Err(e) => return error_response(400, &format!("Invalid stub JSON: {e}")),
    };
    match server.stub_for(definition) {
        Ok(id) => json_response(201, &CreatedResponse { id }),
        Err(e) => error_response(400, &e.to_string()),
    }
}

fn delete_mapping(server: &MockServer, id: &str) -> MockResponse {
    if server.remove(id) {
        json_response(200, &serde_json::json!({}))
    } else {
        error_response(404, &format!("No stub with id {id}"))
    }
}

fn parse_pattern(body: &Bytes) -> Result<RequestPattern, MockResponse> {
    let definition: RequestDefinition = serde_json::from_slice(body)
        .map_err(|e| error_response(400, &format!("Invalid request pattern JSON: {e}")))?;
    RequestPattern::compile(definition).map_err(|e| error_response(400, &e.to_string()))
}

fn requests_response(entries: &[std::sync::Arc<LoggedRequest>]) -> MockResponse {
    let requests = entries.iter().map(|e| LoggedRequestView::from(&**e)).collect();
    json_response(200, &RequestsResponse { requests })
}

fn json_response<T: Serialize>(status: u16, body: &T) -> MockResponse {
    let json = serde_json::to_vec_pretty(body).unwrap_or_else(|_| b"{}".to_vec());
    MockResponse {
        status,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: Bytes::from(json),
    }
}

fn error_response(status: u16, message: &str) -> MockResponse {
    json_response(
        status,
        &ErrorResponse {
            error: message.to_string(),
        },
    )
}
