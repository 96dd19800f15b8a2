//! The mock server context.
//!
//! `MockServer` owns the stub registry, the request journal and the
//! response renderer. Tests hold it (usually behind an `Arc`) and call the
//! control and query methods directly; the HTTP transport calls
//! [`MockServer::handle`] for every inbound request.

use crate::config::{GlobalSettings, MockServerConfig, StubDefinition};
use crate::error::{ConfigurationError, VerificationError};
use crate::files::{FileSource, FilesystemSource};
use crate::journal::{LoggedRequest, RequestJournal};
use crate::pattern::RequestPattern;
use crate::proxy::{HyperUpstream, ProxyForwarder, UpstreamClient};
use crate::registry::{StubRegistry, StubSnapshot};
use crate::request::Request;
use crate::resolver::resolve;
use crate::response::{MockResponse, ResponseRenderer};
use crate::stub::StubMapping;
use crate::verification::{self, VerificationQuery};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Stub-matching HTTP test double.
pub struct MockServer {
    settings: GlobalSettings,
    registry: StubRegistry,
    journal: RequestJournal,
    renderer: ResponseRenderer,
    requests_total: AtomicU64,
    requests_matched: AtomicU64,
    requests_unmatched: AtomicU64,
}

impl MockServer {
    /// Create a server that reads body files from disk and proxies with
    /// a real HTTP client.
    pub fn new(settings: GlobalSettings) -> anyhow::Result<Self> {
        let files = Arc::new(FilesystemSource::new(settings.files_root.clone()));
        let upstream = Arc::new(HyperUpstream::new(settings.proxy_timeout()));
        Ok(Self::with_parts(settings, files, upstream))
    }

    /// Create a server over the given file source and upstream client.
    pub fn with_parts(
        settings: GlobalSettings,
        files: Arc<dyn FileSource>,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        let forwarder = ProxyForwarder::new(upstream, settings.proxy_timeout())
            .with_preserve_host_header(settings.preserve_host_header);

        Self {
            renderer: ResponseRenderer::new(files, forwarder),
            settings,
            registry: StubRegistry::new(),
            journal: RequestJournal::new(),
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Build a server and register every stub in the configuration.
    pub fn from_config(config: MockServerConfig) -> anyhow::Result<Self> {
        let server = Self::new(config.settings)?;
        for (i, stub) in config.stubs.into_iter().enumerate() {
            server
                .stub_for(stub)
                .map_err(|e| anyhow::anyhow!("Stub {}: {}", i, e))?;
        }

        info!(
            stubs = server.registry.len(),
            files_root = %server.settings.files_root.display(),
            "Mock server initialized"
        );
        Ok(server)
    }

    // Registry control

    /// Register a compiled stub, returning its id.
    pub fn add(&self, mapping: StubMapping) -> Result<String, ConfigurationError> {
        self.registry.add(mapping)
    }

    /// Compile and register a stub definition.
    pub fn stub_for(&self, definition: StubDefinition) -> Result<String, ConfigurationError> {
        let mapping = StubMapping::compile(definition, self.settings.default_priority)?;
        self.add(mapping)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.registry.remove(id)
    }

    /// Clear every stub and the journal.
    pub fn reset(&self) {
        self.registry.reset(&self.journal);
    }

    /// Registered stubs, in registration order.
    pub fn stubs(&self) -> StubSnapshot {
        self.registry.snapshot()
    }

    // Journal queries

    pub fn all_requests(&self) -> Vec<Arc<LoggedRequest>> {
        self.journal.all()
    }

    pub fn find_all(&self, pattern: &RequestPattern) -> Vec<Arc<LoggedRequest>> {
        self.journal.find_all(pattern)
    }

    pub fn count(&self, pattern: &RequestPattern) -> usize {
        self.journal.count(pattern)
    }

    pub fn verify(&self, query: &VerificationQuery) -> Result<(), VerificationError> {
        verification::verify(&self.journal, query)
    }

    // Counters

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }

    /// Journal the request, resolve it and produce the response.
    ///
    /// Never fails: render and proxy errors come back as 5xx responses and
    /// an unmatched request gets an empty 404.
    pub async fn handle(&self, request: Request) -> MockResponse {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.journal.append(&request);

        let snapshot = self.registry.snapshot();
        match resolve(&request, &snapshot) {
            Some(stub) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_matches {
                    info!(
                        stub_id = %stub.id,
                        method = %request.method,
                        url = %request.url,
                        "Request matched stub"
                    );
                }
                self.renderer.render(&stub, &request).await
            }
            None => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_unmatched {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        "No matching stub found"
                    );
                }
                MockResponse::not_found()
            }
        }
    }
}
