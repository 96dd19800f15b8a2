//! Stub registry.
//!
//! Mutations replace the stub list copy-on-write under a write lock; readers
//! clone an `Arc` of the current list and match against it without holding
//! any lock, so a resolution never sees a half-applied add or reset.

use crate::error::ConfigurationError;
use crate::journal::RequestJournal;
use crate::stub::{BodySource, StubMapping};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Immutable view of the registered stubs, in insertion order.
pub type StubSnapshot = Arc<Vec<Arc<StubMapping>>>;

struct RegistryState {
    stubs: StubSnapshot,
    next_sequence: u64,
}

/// Holds stub mappings; single writer, many readers.
pub struct StubRegistry {
    state: RwLock<RegistryState>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                stubs: Arc::new(Vec::new()),
                next_sequence: 0,
            }),
        }
    }

    /// Validate and insert a mapping, returning its id.
    ///
    /// On error the registry is left unchanged.
    pub fn add(&self, mut mapping: StubMapping) -> Result<String, ConfigurationError> {
        validate(&mapping)?;

        let mut state = self.state.write();
        if state.stubs.iter().any(|s| s.id == mapping.id) {
            return Err(ConfigurationError::DuplicateId(mapping.id));
        }

        state.next_sequence += 1;
        mapping.sequence = state.next_sequence;
        let id = mapping.id.clone();

        let mut stubs = Vec::clone(&state.stubs);
        stubs.push(Arc::new(mapping));
        state.stubs = Arc::new(stubs);

        debug!(stub_id = %id, stubs = state.stubs.len(), "Stub added");
        Ok(id)
    }

    /// Remove a mapping by id. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.state.write();
        if !state.stubs.iter().any(|s| s.id == id) {
            return false;
        }
        let stubs: Vec<_> = state
            .stubs
            .iter()
            .filter(|s| s.id != id)
            .cloned()
            .collect();
        state.stubs = Arc::new(stubs);
        debug!(stub_id = %id, "Stub removed");
        true
    }

    /// Clear every mapping and the journal in one step.
    ///
    /// The write lock is held while the journal is cleared, so no reader can
    /// observe one cleared without the other.
    pub fn reset(&self, journal: &RequestJournal) {
        let mut state = self.state.write();
        journal.clear();
        state.stubs = Arc::new(Vec::new());
        debug!("Registry and journal reset");
    }

    pub fn snapshot(&self) -> StubSnapshot {
        Arc::clone(&self.state.read().stubs)
    }

    pub fn get(&self, id: &str) -> Option<Arc<StubMapping>> {
        self.snapshot().iter().find(|s| s.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-check invariants; mapping fields are public and may have been edited
/// after compilation.
fn validate(mapping: &StubMapping) -> Result<(), ConfigurationError> {
    if mapping.priority == 0 {
        return Err(ConfigurationError::InvalidPriority(mapping.priority));
    }
    let response = &mapping.response;
    if !(100..=599).contains(&response.status) {
        return Err(ConfigurationError::InvalidStatus(response.status));
    }
    if response.proxy_base_url.is_some() && response.body != BodySource::Absent {
        return Err(ConfigurationError::ProxyWithBody);
    }
    Ok(())
}
