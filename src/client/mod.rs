//! Event clients
//!
//! - [`EventClient`] - builds events for one service and POSTs them as JSON
//! - Service clients - domain-named wrappers with a fixed service name
//! - Global client - optional set-once client for code without one at hand

pub mod event_client;
pub mod global;
pub mod services;

pub use event_client::{EventClient, SendResult};
pub use global::{global_client, init_global_client, install_global_client, send_global};
pub use services::{GenericClient, PatternMatcherClient, QueryExecutorClient, QueryInterpreterClient, SearchGatewayClient};
