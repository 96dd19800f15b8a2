//! Stub mappings and response definitions.

use crate::config::{DelayConfig, ResponseBody, ResponseConfig, StubDefinition};
use crate::error::ConfigurationError;
use crate::pattern::RequestPattern;
use base64::Engine;
use bytes::Bytes;
use std::collections::HashMap;

/// Where a local response body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    Inline(Bytes),
    /// Path relative to the content root, read at render time
    File(String),
    Absent,
}

/// What to send back for a matched request.
#[derive(Debug, Clone)]
pub struct ResponseDefinition {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: BodySource,
    pub proxy_base_url: Option<String>,
    pub templated: bool,
    pub delay: Option<DelayConfig>,
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: BodySource::Absent,
            proxy_base_url: None,
            templated: false,
            delay: None,
        }
    }
}

impl ResponseDefinition {
    pub fn compile(config: &ResponseConfig) -> Result<Self, ConfigurationError> {
        if !(100..=599).contains(&config.status) {
            return Err(ConfigurationError::InvalidStatus(config.status));
        }

        let body = match &config.body {
            None => BodySource::Absent,
            Some(ResponseBody::Text { content }) => BodySource::Inline(Bytes::from(content.clone())),
            Some(ResponseBody::Json { content }) => {
                BodySource::Inline(Bytes::from(serde_json::to_vec(content)?))
            }
            Some(ResponseBody::Base64 { content }) => BodySource::Inline(Bytes::from(
                base64::engine::general_purpose::STANDARD.decode(content)?,
            )),
            Some(ResponseBody::File { path }) => BodySource::File(path.clone()),
        };

        if let Some(url) = &config.proxied_from {
            if body != BodySource::Absent {
                return Err(ConfigurationError::ProxyWithBody);
            }
            validate_proxy_url(url)?;
        }

        Ok(Self {
            status: config.status,
            headers: config.headers.clone(),
            body,
            proxy_base_url: config.proxied_from.clone(),
            templated: config.template,
            delay: config.delay.clone(),
        })
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy_base_url.is_some()
    }
}

fn validate_proxy_url(url: &str) -> Result<(), ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidProxyUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = url
        .parse::<hyper::Uri>()
        .map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme {}", other))),
        None => return Err(invalid("missing scheme".to_string())),
    }
    if parsed.authority().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}

/// A registered stub. Immutable once added.
#[derive(Debug, Clone)]
pub struct StubMapping {
    pub id: String,
    pub name: Option<String>,
    pub request: RequestPattern,
    pub response: ResponseDefinition,
    pub priority: u32,
    /// Assigned by the registry on insertion
    pub sequence: u64,
    pub definition: StubDefinition,
}

impl StubMapping {
    /// Compile a definition. `default_priority` applies when it omits one.
    pub fn compile(
        definition: StubDefinition,
        default_priority: u32,
    ) -> Result<Self, ConfigurationError> {
        let priority = definition.priority.unwrap_or(default_priority);
        if priority == 0 {
            return Err(ConfigurationError::InvalidPriority(priority));
        }

        let request = RequestPattern::compile(definition.request.clone())?;
        let response = ResponseDefinition::compile(&definition.response)?;
        let id = definition
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Self {
            id,
            name: definition.name.clone(),
            request,
            response,
            priority,
            sequence: 0,
            definition,
        })
    }
}
