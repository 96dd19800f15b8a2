//! Stub resolution.

use crate::request::Request;
use crate::stub::StubMapping;
use std::cmp::Ordering;
use std::sync::Arc;

/// Pick the stub that answers a request.
///
/// Lowest priority value wins; among equal priorities the most recently
/// added stub wins. `None` means no stub matched.
pub fn resolve(request: &Request, stubs: &[Arc<StubMapping>]) -> Option<Arc<StubMapping>> {
    stubs
        .iter()
        .filter(|stub| stub.request.matches(request))
        .min_by(|a, b| precedence(a, b))
        .cloned()
}

fn precedence(a: &StubMapping, b: &StubMapping) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.sequence.cmp(&a.sequence))
}
