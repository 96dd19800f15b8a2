//! Error taxonomy.
//!
//! Only [`ConfigurationError`] (at registration) and [`VerificationError`]
//! (at assertion) are meant to reach test code. Render and proxy failures
//! are turned into HTTP responses by the server.

use crate::verification::CountMatchingStrategy;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A stub or request pattern could not be compiled or registered.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("priority must be at least 1, got {0}")]
    InvalidPriority(u32),

    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    #[error("a response cannot both proxy and define a body")]
    ProxyWithBody,

    #[error("a stub with id {0:?} is already registered")]
    DuplicateId(String),

    #[error("header {0:?} has an empty matcher list")]
    EmptyHeaderMatchers(String),

    #[error("invalid base64 body: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid proxy base url {url:?}: {reason}")]
    InvalidProxyUrl { url: String, reason: String },
}

/// A matched response could not be built.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("body file not found: {}", .0.display())]
    BodyFileNotFound(PathBuf),

    #[error("failed to read body file {}: {source}", path.display())]
    BodyFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("body file path escapes the content root: {0}")]
    BodyFileOutsideRoot(String),

    #[error("template rendering failed: {0}")]
    Template(String),
}

/// Forwarding to an upstream origin failed.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream {url} did not respond within {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("could not connect to upstream {url}: {message}")]
    Connect { url: String, message: String },

    #[error("upstream call to {url} failed: {message}")]
    Upstream { url: String, message: String },

    #[error("could not build upstream request for {url}: {message}")]
    InvalidRequest { url: String, message: String },
}

impl ProxyError {
    /// Status code returned to the client.
    pub fn status(&self) -> u16 {
        match self {
            ProxyError::Timeout { .. } => 504,
            _ => 502,
        }
    }
}

/// The journal did not contain the expected number of matching requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} requests matching {pattern}, but received {actual}")]
pub struct VerificationError {
    pub expected: CountMatchingStrategy,
    pub actual: usize,
    pub pattern: String,
}
