// Mock Fixture Server - JSON fixtures over HTTP
// Path-scoped patches and status overrides for test suites

// Module declarations
pub mod body;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod http;
pub mod mutation;
pub mod pipeline;
pub mod session;

// Re-exports for convenience
pub use body::ResponseBody;
pub use config::{CorsConfig, ServerConfig};
pub use error::{ErrorCode, FixtureError};
pub use fixtures::FixtureCatalog;
pub use http::MockServer;
pub use pipeline::{PipelineOutcome, ResponsePipeline};
pub use session::{ObservedResponse, ResponseOverride, Scenario, Session};

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "mock_fixture_server=info,tower_http=info";

/// Install a fmt subscriber honoring `RUST_LOG`, writing to stderr.
///
/// Safe to call more than once; later calls are no-ops. `log` records from
/// the library modules are forwarded through the same subscriber.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
