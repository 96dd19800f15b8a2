//! httpdouble
//!
//! An HTTP test double. Register stubs that pair a request pattern with a
//! response; the server answers each request with the highest-precedence
//! matching stub, journals every request, and lets tests verify what was
//! received.
//!
//! # Features
//!
//! - **Request Matching**: method, exact or regex URL, header and body
//!   matchers (equal to, matching, not matching, containing)
//! - **Priorities**: lower value wins; ties go to the most recent stub
//! - **Responses**: inline text, JSON, binary or file bodies, with headers
//! - **Proxying**: forward matched requests to another origin
//! - **Verification**: find, count and assert on journaled requests
//! - **Dynamic Templates**: Handlebars bodies with request data
//! - **Latency Simulation**: fixed or random delays
//!
//! # Example
//!
//! ```
//! use httpdouble::dsl::*;
//! use httpdouble::{GlobalSettings, MockServer, Request, VerificationQuery};
//!
//! # tokio_test::block_on(async {
//! let server = MockServer::new(GlobalSettings::default()).unwrap();
//! server
//!     .stub_for(
//!         get(url_equal_to("/some/thing"))
//!             .will_return(a_response().with_status(200).with_body("Hello world!")),
//!     )
//!     .unwrap();
//!
//! let response = server.handle(Request::new("GET", "/some/thing")).await;
//! assert_eq!(response.body_text(), "Hello world!");
//!
//! let pattern = get_requested_for(url_equal_to("/some/thing")).build().unwrap();
//! server.verify(&VerificationQuery::new(pattern).exactly(1)).unwrap();
//! # });
//! ```

pub mod admin;
pub mod config;
pub mod dsl;
pub mod error;
pub mod files;
pub mod http;
pub mod journal;
pub mod matcher;
pub mod pattern;
pub mod proxy;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod response;
pub mod server;
pub mod stub;
pub mod template;
pub mod verification;

pub use config::{GlobalSettings, MockServerConfig, StubDefinition, DEFAULT_PRIORITY};
pub use error::{ConfigurationError, ProxyError, RenderError, VerificationError};
pub use http::HttpServer;
pub use journal::LoggedRequest;
pub use pattern::RequestPattern;
pub use request::{Request, RequestMethod};
pub use response::MockResponse;
pub use server::MockServer;
pub use stub::StubMapping;
pub use verification::{CountMatchingStrategy, VerificationQuery};
