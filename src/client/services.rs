//! Service-specific clients
//!
//! Each wraps an [`EventClient`] whose service name is fixed to its domain
//! and exposes methods named after that domain's events.

use serde_json::{Map, Value};

use super::{EventClient, SendResult};
use crate::config::ClientConfig;
use crate::error::{ConfigurationError, Result};
use crate::schema::{MatchType, QueryErrorKind, RateLimitHitData, SearchRequestData, ServiceLifecycleData, ServiceName};

macro_rules! service_client {
    ($(#[$meta:meta])* $name:ident, $service:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            client: EventClient,
        }

        impl $name {
            pub const SERVICE: ServiceName = $service;

            /// Build a dedicated client; the config's service name is overridden
            pub fn new(config: ClientConfig) -> std::result::Result<Self, ConfigurationError> {
                Ok(Self {
                    client: EventClient::new(config.with_service_name(Self::SERVICE))?,
                })
            }

            /// Build from `EVENTS_API_URL` when `api_url` is not given
            pub fn from_env(api_url: Option<&str>) -> std::result::Result<Self, ConfigurationError> {
                Ok(Self {
                    client: EventClient::from_env(api_url, Some(Self::SERVICE))?,
                })
            }

            /// Share the connection pool of an existing client
            pub fn from_client(client: &EventClient) -> Self {
                Self {
                    client: client.with_service(Self::SERVICE),
                }
            }

            pub fn client(&self) -> &EventClient {
                &self.client
            }

            pub fn close(self) {
                self.client.close();
            }
        }
    };
}

service_client!(
    /// Events emitted by the pattern matcher
    PatternMatcherClient,
    ServiceName::PatternMatcher
);

service_client!(
    /// Events emitted by the query executor
    QueryExecutorClient,
    ServiceName::QueryExecutor
);

service_client!(
    /// Events emitted by the query interpreter
    QueryInterpreterClient,
    ServiceName::QueryInterpreter
);

service_client!(
    /// Events emitted by the search gateway
    SearchGatewayClient,
    ServiceName::SearchGateway
);

impl PatternMatcherClient {
    /// A pattern matched the query
    pub async fn pattern_found(
        &self,
        query: &str,
        pattern: &str,
        confidence: f64,
        match_type: MatchType,
        processing_time_ms: u64,
    ) -> Result<SendResult> {
        self.client
            .send_pattern_match(query, pattern, confidence, match_type, Some(processing_time_ms))
            .await
    }

    /// No pattern matched the query
    pub async fn pattern_not_found(
        &self,
        query: &str,
        attempted_patterns: Vec<String>,
        processing_time_ms: u64,
    ) -> Result<SendResult> {
        self.client
            .send_pattern_no_match(query, attempted_patterns, Some(processing_time_ms))
            .await
    }
}

impl QueryExecutorClient {
    pub async fn query_executed(
        &self,
        query: &str,
        results_count: u64,
        execution_time_ms: u64,
        data_source: &str,
        filters_applied: Vec<String>,
    ) -> Result<SendResult> {
        self.client
            .send_query_execution(query, results_count, execution_time_ms, data_source, filters_applied)
            .await
    }

    pub async fn query_failed(
        &self,
        query: &str,
        error_type: QueryErrorKind,
        error_message: &str,
        execution_time_ms: u64,
    ) -> Result<SendResult> {
        self.client
            .send_query_error(query, error_type, error_message, execution_time_ms)
            .await
    }
}

impl QueryInterpreterClient {
    pub async fn query_interpreted(
        &self,
        original_query: &str,
        interpreted_query: &str,
        interpretation_confidence: f64,
        processing_time_ms: u64,
    ) -> Result<SendResult> {
        self.client
            .send_query_interpretation(
                original_query,
                interpreted_query,
                interpretation_confidence,
                Some(processing_time_ms),
            )
            .await
    }
}

impl SearchGatewayClient {
    pub async fn search_requested(&self, request: SearchRequestData) -> Result<SendResult> {
        self.client.send_search_request(request).await
    }

    pub async fn rate_limit_hit(&self, hit: RateLimitHitData) -> Result<SendResult> {
        self.client.send_rate_limit_hit(hit).await
    }
}

/// Lifecycle and error events for any service
#[derive(Debug, Clone)]
pub struct GenericClient {
    client: EventClient,
}

impl GenericClient {
    /// Uses the service name carried by `config`
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ConfigurationError> {
        Ok(Self {
            client: EventClient::new(config)?,
        })
    }

    pub fn from_client(client: &EventClient) -> Self {
        Self { client: client.clone() }
    }

    pub fn client(&self) -> &EventClient {
        &self.client
    }

    pub fn close(self) {
        self.client.close();
    }

    pub async fn error_occurred(
        &self,
        error_type: &str,
        error_message: &str,
        stack_trace: Option<String>,
        context: Map<String, Value>,
    ) -> Result<SendResult> {
        self.client
            .send_error(error_type, error_message, stack_trace, context)
            .await
    }

    pub async fn service_started(&self, lifecycle: ServiceLifecycleData) -> Result<SendResult> {
        self.client.send_service_start(lifecycle).await
    }

    pub async fn service_stopped(&self, lifecycle: ServiceLifecycleData) -> Result<SendResult> {
        self.client.send_service_stop(lifecycle).await
    }
}
