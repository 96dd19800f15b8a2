//! Fluent builders for stubs and request patterns.
//!
//! ```
//! use httpdouble::dsl::*;
//!
//! let stub = get(url_equal_to("/some/thing")).will_return(
//!     a_response()
//!         .with_status(200)
//!         .with_header("Content-Type", "text/plain")
//!         .with_body("Hello world!"),
//! );
//! assert_eq!(stub.response.status, 200);
//! ```
//!
//! Builders only assemble definitions. Validation happens when the result
//! is compiled, e.g. by [`MockServer::stub_for`](crate::server::MockServer::stub_for)
//! or [`RequestPatternBuilder::build`].

use crate::config::{
    DelayConfig, RequestDefinition, ResponseBody, ResponseConfig, StubDefinition, UrlPattern,
    ValuePattern,
};
use crate::error::ConfigurationError;
use crate::pattern::RequestPattern;
use crate::request::RequestMethod;
use base64::Engine;

// URL patterns

pub fn url_equal_to(url: impl Into<String>) -> UrlPattern {
    UrlPattern::Exact { value: url.into() }
}

pub fn url_matching(pattern: impl Into<String>) -> UrlPattern {
    UrlPattern::Regex {
        pattern: pattern.into(),
    }
}

// Value patterns

pub fn equal_to(value: impl Into<String>) -> ValuePattern {
    ValuePattern::EqualTo {
        value: value.into(),
    }
}

pub fn matching(pattern: impl Into<String>) -> ValuePattern {
    ValuePattern::Matches {
        pattern: pattern.into(),
    }
}

pub fn not_matching(pattern: impl Into<String>) -> ValuePattern {
    ValuePattern::DoesNotMatch {
        pattern: pattern.into(),
    }
}

pub fn containing(value: impl Into<String>) -> ValuePattern {
    ValuePattern::Contains {
        value: value.into(),
    }
}

/// Accumulates request matchers. Shared by stub and pattern builders.
#[derive(Debug, Clone)]
struct RequestParts {
    definition: RequestDefinition,
}

impl RequestParts {
    fn new(method: RequestMethod, url: UrlPattern) -> Self {
        Self {
            definition: RequestDefinition::new(method, url),
        }
    }

    fn header(&mut self, name: String, pattern: ValuePattern) {
        self.definition
            .headers
            .entry(name)
            .or_default()
            .push(pattern);
    }

    fn body(&mut self, pattern: ValuePattern) {
        self.definition.body.push(pattern);
    }
}

// Stubs

/// Builder for a [`StubDefinition`].
#[derive(Debug, Clone)]
pub struct MappingBuilder {
    request: RequestParts,
    id: Option<String>,
    name: Option<String>,
    priority: Option<u32>,
}

impl MappingBuilder {
    pub fn new(method: RequestMethod, url: UrlPattern) -> Self {
        Self {
            request: RequestParts::new(method, url),
            id: None,
            name: None,
            priority: None,
        }
    }

    /// Add a header matcher. Repeat for several matchers on one header.
    pub fn with_header(mut self, name: impl Into<String>, pattern: ValuePattern) -> Self {
        self.request.header(name.into(), pattern);
        self
    }

    pub fn with_request_body(mut self, pattern: ValuePattern) -> Self {
        self.request.body(pattern);
        self
    }

    pub fn at_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn will_return(self, response: ResponseBuilder) -> StubDefinition {
        StubDefinition {
            id: self.id,
            name: self.name,
            request: self.request.definition,
            response: response.config,
            priority: self.priority,
        }
    }
}

pub fn get(url: UrlPattern) -> MappingBuilder {
    MappingBuilder::new(RequestMethod::Get, url)
}

pub fn post(url: UrlPattern) -> MappingBuilder {
    MappingBuilder::new(RequestMethod::Post, url)
}

pub fn put(url: UrlPattern) -> MappingBuilder {
    MappingBuilder::new(RequestMethod::Put, url)
}

pub fn delete(url: UrlPattern) -> MappingBuilder {
    MappingBuilder::new(RequestMethod::Delete, url)
}

pub fn patch(url: UrlPattern) -> MappingBuilder {
    MappingBuilder::new(RequestMethod::Patch, url)
}

pub fn any(url: UrlPattern) -> MappingBuilder {
    MappingBuilder::new(RequestMethod::Any, url)
}

// Responses

/// Builder for a [`ResponseConfig`]. Starts as an empty 200.
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    config: ResponseConfig,
}

pub fn a_response() -> ResponseBuilder {
    ResponseBuilder::default()
}

impl ResponseBuilder {
    pub fn with_status(mut self, status: u16) -> Self {
        self.config.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.config.body = Some(ResponseBody::Text {
            content: body.into(),
        });
        self
    }

    pub fn with_body_bytes(mut self, body: &[u8]) -> Self {
        self.config.body = Some(ResponseBody::Base64 {
            content: base64::engine::general_purpose::STANDARD.encode(body),
        });
        self
    }

    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.config.body = Some(ResponseBody::Json { content: body });
        self
    }

    /// Serve a file under the content root, read on every request.
    pub fn with_body_file(mut self, path: impl Into<String>) -> Self {
        self.config.body = Some(ResponseBody::File { path: path.into() });
        self
    }

    pub fn proxied_from(mut self, base_url: impl Into<String>) -> Self {
        self.config.proxied_from = Some(base_url.into());
        self
    }

    pub fn with_fixed_delay(mut self, millis: u64) -> Self {
        self.config.delay = Some(DelayConfig {
            fixed_ms: millis,
            ..Default::default()
        });
        self
    }

    pub fn with_random_delay(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.config.delay = Some(DelayConfig {
            min_ms,
            max_ms,
            ..Default::default()
        });
        self
    }

    /// Render the body as a Handlebars template.
    pub fn templated(mut self) -> Self {
        self.config.template = true;
        self
    }

    pub fn build(self) -> ResponseConfig {
        self.config
    }
}

// Journal queries

/// Builder for a [`RequestPattern`] used to query the journal.
#[derive(Debug, Clone)]
pub struct RequestPatternBuilder {
    request: RequestParts,
}

impl RequestPatternBuilder {
    pub fn new(method: RequestMethod, url: UrlPattern) -> Self {
        Self {
            request: RequestParts::new(method, url),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, pattern: ValuePattern) -> Self {
        self.request.header(name.into(), pattern);
        self
    }

    pub fn with_request_body(mut self, pattern: ValuePattern) -> Self {
        self.request.body(pattern);
        self
    }

    pub fn build(self) -> Result<RequestPattern, ConfigurationError> {
        RequestPattern::compile(self.request.definition)
    }
}

pub fn get_requested_for(url: UrlPattern) -> RequestPatternBuilder {
    RequestPatternBuilder::new(RequestMethod::Get, url)
}

pub fn post_requested_for(url: UrlPattern) -> RequestPatternBuilder {
    RequestPatternBuilder::new(RequestMethod::Post, url)
}

pub fn put_requested_for(url: UrlPattern) -> RequestPatternBuilder {
    RequestPatternBuilder::new(RequestMethod::Put, url)
}

pub fn delete_requested_for(url: UrlPattern) -> RequestPatternBuilder {
    RequestPatternBuilder::new(RequestMethod::Delete, url)
}

pub fn any_requested_for(url: UrlPattern) -> RequestPatternBuilder {
    RequestPatternBuilder::new(RequestMethod::Any, url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    #[test]
    fn test_stub_builder_matches_yaml_definition() {
        let built = get(url_equal_to("/some/thing"))
            .with_id("hello")
            .at_priority(1)
            .with_header("Accept", matching("text/.*"))
            .with_request_body(containing("OK"))
            .will_return(
                a_response()
                    .with_status(200)
                    .with_header("Content-Type", "text/plain")
                    .with_body("Hello world!"),
            );

        let yaml = r#"
id: hello
priority: 1
request:
  method: GET
  url: { type: exact, value: /some/thing }
  headers:
    Accept: [{ type: matches, pattern: "text/.*" }]
  body: [{ type: contains, value: "OK" }]
response:
  status: 200
  headers: { Content-Type: text/plain }
  body: { type: text, content: "Hello world!" }
"#;
        let parsed: StubDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_repeated_header_matchers_accumulate() {
        let built = any(url_matching(".*"))
            .with_header("Accept", containing("xml"))
            .with_header("Accept", not_matching(".*json.*"))
            .will_return(a_response());
        assert_eq!(built.request.headers["Accept"].len(), 2);
        assert_eq!(built.request.method, RequestMethod::Any);
    }

    #[test]
    fn test_response_builder_variants() {
        let config = a_response().with_body_bytes(&[0xff, 0x00]).build();
        assert_eq!(
            config.body,
            Some(ResponseBody::Base64 {
                content: "/wA=".to_string()
            })
        );

        let config = a_response()
            .proxied_from("http://otherhost.com")
            .with_fixed_delay(20)
            .build();
        assert_eq!(config.proxied_from.as_deref(), Some("http://otherhost.com"));
        assert_eq!(config.delay.unwrap().fixed_ms, 20);

        let config = a_response()
            .with_json_body(serde_json::json!({"ok": true}))
            .templated()
            .build();
        assert!(config.template);
        assert!(matches!(config.body, Some(ResponseBody::Json { .. })));
    }

    #[test]
    fn test_request_pattern_builder() {
        let pattern = post_requested_for(url_equal_to("/3/of/these"))
            .with_request_body(equal_to("x"))
            .build()
            .unwrap();
        assert!(pattern.matches(&Request::new("POST", "/3/of/these").with_body("x")));
        assert!(!pattern.matches(&Request::new("POST", "/3/of/these").with_body("y")));
        assert!(!pattern.matches(&Request::new("PUT", "/3/of/these").with_body("x")));
    }

    #[test]
    fn test_invalid_pattern_fails_on_build() {
        let result = get_requested_for(url_matching("[unclosed")).build();
        assert!(matches!(result, Err(ConfigurationError::InvalidRegex { .. })));
    }
}
