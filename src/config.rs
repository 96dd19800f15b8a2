//! Configuration for the mock server.
//!
//! Holds the serde forms of stubs and request patterns. These are what the
//! YAML config file, the admin API and the [`dsl`](crate::dsl) builders
//! produce; they are compiled into [`StubMapping`](crate::stub::StubMapping)
//! and [`RequestPattern`](crate::pattern::RequestPattern) before use.

use crate::request::RequestMethod;
use crate::stub::StubMapping;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Priority given to stubs that do not declare one.
///
/// 1 is the highest precedence; larger values act as catch-alls. Override
/// per server with `settings.default_priority`.
pub const DEFAULT_PRIORITY: u32 = 5;

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// Stubs registered at startup
    #[serde(default)]
    pub stubs: Vec<StubDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl MockServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Compile every stub without registering it.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.settings.default_priority == 0 {
            anyhow::bail!("default_priority must be at least 1");
        }
        for (i, stub) in self.stubs.iter().enumerate() {
            StubMapping::compile(stub.clone(), self.settings.default_priority)
                .map_err(|e| anyhow::anyhow!("Stub {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// A single stub definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StubDefinition {
    /// Identifier; a UUID is generated when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Optional name/description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Request pattern
    pub request: RequestDefinition,

    /// Response to return
    #[serde(default)]
    pub response: ResponseConfig,

    /// Priority (1 = matched first); `DEFAULT_PRIORITY` when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

/// Request pattern definition, used both for stubs and journal queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDefinition {
    /// HTTP method (ANY when omitted)
    #[serde(default)]
    pub method: RequestMethod,

    /// URL (path and query) matching
    pub url: UrlPattern,

    /// Header matching; every matcher listed for a header must hold
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, Vec<ValuePattern>>,

    /// Body matching; every matcher must hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<ValuePattern>,
}

impl RequestDefinition {
    pub fn new(method: RequestMethod, url: UrlPattern) -> Self {
        Self {
            method,
            url,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }
}

/// URL matching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UrlPattern {
    /// Exact path and query match
    Exact { value: String },
    /// Regex over the whole path and query
    Regex { pattern: String },
}

/// String value matching, for headers and bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValuePattern {
    /// Exact value match
    EqualTo { value: String },
    /// Whole-value regex match
    Matches { pattern: String },
    /// Whole-value regex must not match
    DoesNotMatch { pattern: String },
    /// Value must contain substring
    Contains { value: String },
}

/// Response definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseConfig {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ResponseBody>,

    /// Forward matched requests to this base URL instead of rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxied_from: Option<String>,

    /// Whether the body is a Handlebars template
    #[serde(default)]
    pub template: bool,

    /// Latency simulation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<DelayConfig>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: HashMap::new(),
            body: None,
            proxied_from: None,
            template: false,
            delay: None,
        }
    }
}

fn default_status() -> u16 {
    200
}

/// Response body configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Plain text body
    Text { content: String },
    /// JSON body
    Json { content: serde_json::Value },
    /// Base64 encoded binary
    Base64 { content: String },
    /// Load from a file under the content root
    File { path: String },
}

/// Delay/latency simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelayConfig {
    /// Fixed delay in milliseconds
    #[serde(default)]
    pub fixed_ms: u64,

    /// Minimum delay for random range (ms)
    #[serde(default)]
    pub min_ms: u64,

    /// Maximum delay for random range (ms)
    #[serde(default)]
    pub max_ms: u64,
}

impl DelayConfig {
    /// Pick the delay to apply to one response.
    pub fn calculate(&self) -> Duration {
        if self.fixed_ms > 0 {
            return Duration::from_millis(self.fixed_ms);
        }
        if self.max_ms > self.min_ms {
            use rand::Rng;
            let mut rng = rand::thread_rng();
            return Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms));
        }
        Duration::from_millis(self.min_ms)
    }
}

/// Global settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Address the HTTP transport listens on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Content root for file-backed response bodies
    #[serde(default = "default_files_root")]
    pub files_root: PathBuf,

    /// Upper bound on a proxied upstream call
    #[serde(default = "default_proxy_timeout_ms")]
    pub proxy_timeout_ms: u64,

    /// Priority for stubs that omit one
    #[serde(default = "default_priority")]
    pub default_priority: u32,

    /// Forward the inbound Host header when proxying
    #[serde(default)]
    pub preserve_host_header: bool,

    /// Log all matched stubs
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

impl GlobalSettings {
    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_millis(self.proxy_timeout_ms)
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            files_root: default_files_root(),
            proxy_timeout_ms: default_proxy_timeout_ms(),
            default_priority: default_priority(),
            preserve_host_header: false,
            log_matches: true,
            log_unmatched: true,
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_files_root() -> PathBuf {
    PathBuf::from("__files")
}

fn default_proxy_timeout_ms() -> u64 {
    30_000
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

fn default_true() -> bool {
    true
}
