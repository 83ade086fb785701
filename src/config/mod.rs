//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (API_BASE_URL, SYSTEM_PROMPT_REPLACEMENT, CUSTOM_HEADERS)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → turned into an Arc<Forwarder> shared by all requests
//! ```
//!
//! # Design Decisions
//! - Config is read once per process; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Malformed custom headers degrade to an empty set

pub mod custom_headers;
pub mod loader;
pub mod schema;
pub mod validation;

pub use custom_headers::CustomHeaders;
pub use schema::ProxyConfig;
pub use schema::{
    HeadersConfig, ListenerConfig, ObservabilityConfig, RewriteConfig, TimeoutConfig,
    UpstreamConfig,
};
