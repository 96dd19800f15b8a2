//! String and URL matchers.
//!
//! Matchers are compiled from [`ValuePattern`] / [`UrlPattern`] definitions.
//! Regexes are compiled once, here, so an invalid pattern is reported when
//! the stub is built and never while a request is being matched.

use crate::config::{UrlPattern, ValuePattern};
use crate::error::ConfigurationError;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// A regex anchored to match the whole candidate.
#[derive(Debug, Clone)]
pub struct WholeRegex {
    source: String,
    regex: Regex,
}

impl WholeRegex {
    pub fn new(pattern: &str) -> Result<Self, ConfigurationError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            ConfigurationError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Predicate over a single string value.
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Regex(WholeRegex),
    NotRegex(WholeRegex),
    Contains(String),
}

impl Matcher {
    pub fn exact(value: impl Into<String>) -> Self {
        Matcher::Exact(value.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, ConfigurationError> {
        WholeRegex::new(pattern).map(Matcher::Regex)
    }

    pub fn not_regex(pattern: &str) -> Result<Self, ConfigurationError> {
        WholeRegex::new(pattern).map(Matcher::NotRegex)
    }

    pub fn contains(substring: impl Into<String>) -> Self {
        Matcher::Contains(substring.into())
    }

    /// Compile a value pattern definition.
    pub fn compile(pattern: &ValuePattern) -> Result<Self, ConfigurationError> {
        match pattern {
            ValuePattern::EqualTo { value } => Ok(Matcher::exact(value.as_str())),
            ValuePattern::Matches { pattern } => Matcher::regex(pattern),
            ValuePattern::DoesNotMatch { pattern } => Matcher::not_regex(pattern),
            ValuePattern::Contains { value } => Ok(Matcher::contains(value.as_str())),
        }
    }

    /// Test a candidate. An absent candidate never matches.
    pub fn matches(&self, candidate: Option<&str>) -> bool {
        let Some(value) = candidate else {
            return false;
        };
        match self {
            Matcher::Exact(expected) => value == expected,
            Matcher::Regex(regex) => regex.is_match(value),
            Matcher::NotRegex(regex) => !regex.is_match(value),
            Matcher::Contains(needle) => value.contains(needle.as_str()),
        }
    }

    /// Test every value of a possibly repeated header.
    ///
    /// Positive matchers hold when any value satisfies them; the negated
    /// regex holds only when no value matches. No values means absent.
    pub fn matches_any<'a>(&self, values: impl IntoIterator<Item = &'a str>) -> bool {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return false;
        }
        match self {
            Matcher::NotRegex(regex) => values.all(|v| !regex.is_match(v)),
            _ => values.any(|v| self.matches(Some(v))),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(value) => write!(f, "equal to {:?}", value),
            Matcher::Regex(regex) => write!(f, "matching {:?}", regex.as_str()),
            Matcher::NotRegex(regex) => write!(f, "not matching {:?}", regex.as_str()),
            Matcher::Contains(value) => write!(f, "containing {:?}", value),
        }
    }
}

/// Predicate over a request's path and query.
#[derive(Debug, Clone)]
pub enum UrlMatcher {
    Exact(String),
    Regex(WholeRegex),
}

impl UrlMatcher {
    pub fn compile(pattern: &UrlPattern) -> Result<Self, ConfigurationError> {
        match pattern {
            UrlPattern::Exact { value } => Ok(UrlMatcher::Exact(value.clone())),
            UrlPattern::Regex { pattern } => WholeRegex::new(pattern).map(UrlMatcher::Regex),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlMatcher::Exact(expected) => url == expected,
            UrlMatcher::Regex(regex) => regex.is_match(url),
        }
    }

    /// Capture groups of a regex URL, keyed by index and by name.
    pub fn captures(&self, url: &str) -> HashMap<String, String> {
        let mut captured = HashMap::new();
        let UrlMatcher::Regex(whole) = self else {
            return captured;
        };
        let Some(captures) = whole.regex.captures(url) else {
            return captured;
        };
        for (i, cap) in captures.iter().enumerate().skip(1) {
            if let Some(m) = cap {
                captured.insert(i.to_string(), m.as_str().to_string());
            }
        }
        for name in whole.regex.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                captured.insert(name.to_string(), m.as_str().to_string());
            }
        }
        captured
    }
}

impl fmt::Display for UrlMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlMatcher::Exact(value) => write!(f, "url equal to {:?}", value),
            UrlMatcher::Regex(regex) => write!(f, "url matching {:?}", regex.as_str()),
        }
    }
}
