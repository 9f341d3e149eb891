//! Hemmer provider for SumoLogic collector sources.
//!
//! The provider manages sources attached to SumoLogic collectors through the
//! SumoLogic REST API and speaks the Hemmer provider protocol over gRPC.
//!
//! # Resources
//!
//! - `sumologic_cloudsyslog_source`: syslog over TLS, with a server-issued token
//! - `sumologic_http_source`: uploads to a server-issued URL
//!
//! Both share the common source attributes (name, category, timezone, date
//! formats, filters, ...) plus three that steer the lifecycle:
//!
//! - `collector_id`: the collector owning the source
//! - `lookup_by_name`: on create, adopt an existing source with the same name
//! - `destroy`: when false, deleting the resource leaves the source in place
//!
//! Existing sources are imported with the id `<collector_id>/<source_id>`.
//!
//! # Layers
//!
//! - [`client`]: the [`RestClient`](client::RestClient) capability and its `reqwest` implementation
//! - [`sources`]: API records and the source accessors of [`SumoClient`](sources::SumoClient)
//! - [`resources`]: resource state, the state/API mapping, and CRUD semantics
//! - [`provider`]: [`SumoLogicProvider`], dispatching protocol calls by resource type
//! - [`server`]: the gRPC service and [`serve`]
//!
//! # Handshake Protocol
//!
//! When started via [`serve`], the provider prints one line to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`. Logs go to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod sources;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

#[cfg(test)]
#[allow(missing_docs)]
pub(crate) mod testing;

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::SumoLogicProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_on, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{validate, validate_result};
