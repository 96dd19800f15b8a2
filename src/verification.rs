//! Verification of received requests against expected counts.

use crate::error::VerificationError;
use crate::journal::RequestJournal;
use crate::pattern::RequestPattern;
use std::fmt;

/// Expected number of matching requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountMatchingStrategy {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
}

impl CountMatchingStrategy {
    pub fn is_satisfied_by(&self, actual: usize) -> bool {
        match *self {
            CountMatchingStrategy::Exactly(n) => actual == n,
            CountMatchingStrategy::AtLeast(n) => actual >= n,
            CountMatchingStrategy::AtMost(n) => actual <= n,
        }
    }
}

impl Default for CountMatchingStrategy {
    /// At least once.
    fn default() -> Self {
        CountMatchingStrategy::AtLeast(1)
    }
}

impl fmt::Display for CountMatchingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountMatchingStrategy::Exactly(n) => write!(f, "exactly {}", n),
            CountMatchingStrategy::AtLeast(n) => write!(f, "at least {}", n),
            CountMatchingStrategy::AtMost(n) => write!(f, "at most {}", n),
        }
    }
}

/// A request pattern plus the count it is expected to reach.
#[derive(Debug, Clone)]
pub struct VerificationQuery {
    pub pattern: RequestPattern,
    pub count: CountMatchingStrategy,
}

impl VerificationQuery {
    /// Expect at least one matching request.
    pub fn new(pattern: RequestPattern) -> Self {
        Self {
            pattern,
            count: CountMatchingStrategy::default(),
        }
    }

    pub fn exactly(mut self, n: usize) -> Self {
        self.count = CountMatchingStrategy::Exactly(n);
        self
    }

    pub fn at_least(mut self, n: usize) -> Self {
        self.count = CountMatchingStrategy::AtLeast(n);
        self
    }

    pub fn at_most(mut self, n: usize) -> Self {
        self.count = CountMatchingStrategy::AtMost(n);
        self
    }
}

impl From<RequestPattern> for VerificationQuery {
    fn from(pattern: RequestPattern) -> Self {
        Self::new(pattern)
    }
}

/// Check the journal against a query. Never mutates the journal.
pub fn verify(journal: &RequestJournal, query: &VerificationQuery) -> Result<(), VerificationError> {
    let actual = journal.count(&query.pattern);
    if query.count.is_satisfied_by(actual) {
        Ok(())
    } else {
        Err(VerificationError {
            expected: query.count,
            actual,
            pattern: query.pattern.to_string(),
        })
    }
}
