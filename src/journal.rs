//! Append-only request journal.

use crate::pattern::RequestPattern;
use crate::request::Request;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// A received request, as recorded. Never mutated after append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    /// Arrival order; strictly increasing across the journal's lifetime
    pub sequence: u64,
    pub logged_at: DateTime<Utc>,
    pub request: Request,
}

impl LoggedRequest {
    pub fn method(&self) -> &str {
        &self.request.method
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.request.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.request.body
    }
}

struct JournalState {
    entries: Vec<Arc<LoggedRequest>>,
    next_sequence: u64,
}

/// Record of every request the server received.
///
/// Appends hold the write lock only for a push; queries copy the entry
/// handles under the read lock and match outside it.
pub struct RequestJournal {
    state: RwLock<JournalState>,
}

impl RequestJournal {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(JournalState {
                entries: Vec::new(),
                next_sequence: 0,
            }),
        }
    }

    /// Record a request and return the logged entry.
    pub fn append(&self, request: &Request) -> Arc<LoggedRequest> {
        let logged_at = Utc::now();
        let mut state = self.state.write();
        state.next_sequence += 1;
        let entry = Arc::new(LoggedRequest {
            sequence: state.next_sequence,
            logged_at,
            request: request.clone(),
        });
        state.entries.push(Arc::clone(&entry));
        entry
    }

    /// All entries, in arrival order.
    pub fn all(&self) -> Vec<Arc<LoggedRequest>> {
        self.state.read().entries.clone()
    }

    /// Entries matching a pattern, in arrival order. Evaluated on each call.
    pub fn find_all(&self, pattern: &RequestPattern) -> Vec<Arc<LoggedRequest>> {
        self.all()
            .into_iter()
            .filter(|entry| pattern.matches(&entry.request))
            .collect()
    }

    pub fn count(&self, pattern: &RequestPattern) -> usize {
        self.all()
            .iter()
            .filter(|entry| pattern.matches(&entry.request))
            .count()
    }

    /// Drop every entry. Sequence numbers keep increasing afterwards.
    pub(crate) fn clear(&self) {
        self.state.write().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RequestJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RequestDefinition, UrlPattern};
    use crate::request::RequestMethod;

    fn pattern(method: RequestMethod, regex: &str) -> RequestPattern {
        RequestPattern::compile(RequestDefinition::new(
            method,
            UrlPattern::Regex {
                pattern: regex.to_string(),
            },
        ))
        .unwrap()
    }

    #[test]
    fn test_append_preserves_order() {
        let journal = RequestJournal::new();
        journal.append(&Request::new("PUT", "/api/one"));
        journal.append(&Request::new("GET", "/api/two"));
        journal.append(&Request::new("PUT", "/api/three"));

        let found = journal.find_all(&pattern(RequestMethod::Put, "/api/.*"));
        let urls: Vec<_> = found.iter().map(|e| e.url()).collect();
        assert_eq!(urls, vec!["/api/one", "/api/three"]);
        assert!(found[0].sequence < found[1].sequence);
    }

    #[test]
    fn test_find_all_is_not_cached() {
        let journal = RequestJournal::new();
        let any_put = pattern(RequestMethod::Put, ".*");
        assert!(journal.find_all(&any_put).is_empty());

        journal.append(&Request::new("PUT", "/x"));
        assert_eq!(journal.find_all(&any_put).len(), 1);
        assert_eq!(journal.count(&any_put), 1);
    }

    #[test]
    fn test_logged_request_keeps_body_and_headers() {
        let journal = RequestJournal::new();
        let entry = journal.append(
            &Request::new("POST", "/verify/this")
                .with_header("Content-Type", "text/xml")
                .with_body("<a/>"),
        );
        assert_eq!(entry.method(), "POST");
        assert_eq!(entry.header("content-type"), Some("text/xml"));
        assert_eq!(entry.body().as_ref(), b"<a/>");
    }

    #[test]
    fn test_clear_keeps_sequence_monotonic() {
        let journal = RequestJournal::new();
        let first = journal.append(&Request::new("GET", "/a"));
        journal.clear();
        assert!(journal.is_empty());

        let second = journal.append(&Request::new("GET", "/a"));
        assert!(second.sequence > first.sequence);
    }

    #[test]
    fn test_concurrent_appends_recorded_once() {
        let journal = Arc::new(RequestJournal::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let journal = Arc::clone(&journal);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        journal.append(&Request::new("GET", format!("/{t}/{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = journal.all();
        assert_eq!(entries.len(), 800);
        assert!(entries.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }
}
