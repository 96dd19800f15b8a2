//! Compiled request patterns.

use crate::config::RequestDefinition;
use crate::error::ConfigurationError;
use crate::matcher::{Matcher, UrlMatcher};
use crate::request::{Request, RequestMethod};
use std::fmt;

/// Method, URL, header and body constraints that must all hold.
#[derive(Debug, Clone)]
pub struct RequestPattern {
    method: RequestMethod,
    url: UrlMatcher,
    headers: Vec<(String, Vec<Matcher>)>,
    body: Vec<Matcher>,
}

impl RequestPattern {
    /// Compile a request definition, failing on any invalid matcher.
    pub fn compile(definition: RequestDefinition) -> Result<Self, ConfigurationError> {
        let url = UrlMatcher::compile(&definition.url)?;

        let mut headers = Vec::with_capacity(definition.headers.len());
        for (name, patterns) in &definition.headers {
            if patterns.is_empty() {
                return Err(ConfigurationError::EmptyHeaderMatchers(name.clone()));
            }
            let matchers = patterns
                .iter()
                .map(Matcher::compile)
                .collect::<Result<Vec<_>, _>>()?;
            headers.push((name.clone(), matchers));
        }
        // Stable order for descriptions
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let body = definition
            .body
            .iter()
            .map(Matcher::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            method: definition.method,
            url,
            headers,
            body,
        })
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn url(&self) -> &UrlMatcher {
        &self.url
    }

    pub fn matches(&self, request: &Request) -> bool {
        if !self.method.matches(&request.method) {
            return false;
        }
        if !self.url.matches(&request.url) {
            return false;
        }

        for (name, matchers) in &self.headers {
            if !matchers
                .iter()
                .all(|m| m.matches_any(request.header_values(name)))
            {
                return false;
            }
        }

        if !self.body.is_empty() {
            let body = request.body_text();
            if !self.body.iter().all(|m| m.matches(Some(body.as_ref()))) {
                return false;
            }
        }

        true
    }
}

impl fmt::Display for RequestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        for (name, matchers) in &self.headers {
            for matcher in matchers {
                write!(f, ", header {} {}", name, matcher)?;
            }
        }
        for matcher in &self.body {
            write!(f, ", body {}", matcher)?;
        }
        Ok(())
    }
}
