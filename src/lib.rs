//! Standardized telemetry events for search pipeline services
//!
//! Services describe what happened (a pattern matched, a query ran, a rate
//! limit tripped) with typed payloads from [`schema`], and ship them to the
//! event collector as JSON over HTTP with an [`EventClient`]. [`track`] wraps
//! ordinary functions so their outcome is reported automatically.

pub mod client;
pub mod config;
pub mod error;
pub mod schema;
pub mod track;

pub use client::{
    EventClient, GenericClient, PatternMatcherClient, QueryExecutorClient, QueryInterpreterClient, SearchGatewayClient,
    SendResult, global_client, init_global_client, install_global_client, send_global,
};
pub use config::ClientConfig;
pub use error::{ConfigurationError, DeliveryError, EventError, Result, ValidationError};
pub use schema::{Event, EventType, MatchType, QueryErrorKind, ServiceName};
pub use track::Tracker;
