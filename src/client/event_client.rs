//! Event construction and delivery over HTTP

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::error::{ConfigurationError, DeliveryError, Result};
use crate::schema::{
    self, ErrorData, Event, EventFields, EventType, MatchType, PatternMatchData, PatternNoMatchData, QueryErrorData,
    QueryErrorKind, QueryExecutionData, QueryInterpretationData, RateLimitHitData, SearchRequestData,
    ServiceLifecycleData, ServiceName,
};

const API_KEY_HEADER: &str = "x-api-key";

/// Collector response to an accepted event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub status: u16,
    pub body: String,
}

impl SendResult {
    /// Response body parsed as JSON, if it is JSON
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Sends events for one service to the collector
///
/// The client owns a pooled HTTP transport. Clones and [`EventClient::with_service`]
/// handles share that pool, which is safe to use from concurrent sends; it is
/// released when the last handle is dropped or closed.
#[derive(Debug, Clone)]
pub struct EventClient {
    http: reqwest::Client,
    endpoint: Url,
    config: ClientConfig,
}

impl EventClient {
    /// Build a client from an explicit configuration
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ConfigurationError> {
        let endpoint = config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(ref key) = config.api_key {
            let mut value = HeaderValue::from_str(key).map_err(|e| ConfigurationError::InvalidApiKey {
                reason: e.to_string(),
            })?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ConfigurationError::Transport)?;

        log::debug!("Event client for {} sending to {}", config.service_name, endpoint);
        Ok(Self { http, endpoint, config })
    }

    /// Build a client, filling missing values from `EVENTS_API_URL` / `SERVICE_NAME`
    pub fn from_env(
        api_url: Option<&str>,
        service_name: Option<ServiceName>,
    ) -> std::result::Result<Self, ConfigurationError> {
        Self::new(ClientConfig::resolve(api_url, service_name)?)
    }

    /// A handle for another service sharing this client's connection pool
    pub fn with_service(&self, service_name: ServiceName) -> Self {
        Self {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            config: self.config.clone().with_service_name(service_name),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn service_name(&self) -> ServiceName {
        self.config.service_name
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Release this handle's share of the connection pool
    pub fn close(self) {
        log::debug!("Closing event client for {}", self.config.service_name);
    }

    /// Validate `fields` against the schema of `event_type` and send the event
    pub async fn send(&self, event_type: EventType, fields: Map<String, Value>) -> Result<SendResult> {
        schema::validate_fields(event_type, &fields)?;
        self.dispatch(event_type, fields).await
    }

    /// POST an already built event
    pub async fn send_event(&self, event: &Event) -> std::result::Result<SendResult, DeliveryError> {
        log::debug!(
            "Sending {} event from {} to {}",
            event.event_type(),
            event.service_name(),
            self.endpoint
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(event)
            .send()
            .await
            .map_err(DeliveryError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(DeliveryError::Transport)?;

        if !status.is_success() {
            log::debug!("Collector rejected {} event: HTTP {}", event.event_type(), status);
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(SendResult {
            status: status.as_u16(),
            body,
        })
    }

    pub(crate) async fn send_data<D: EventFields>(&self, event_type: EventType, data: D) -> Result<SendResult> {
        let fields = data.into_fields()?;
        self.dispatch(event_type, fields).await
    }

    async fn dispatch(&self, event_type: EventType, fields: Map<String, Value>) -> Result<SendResult> {
        let event = Event::new(self.config.service_name, event_type, fields)?;
        Ok(self.send_event(&event).await?)
    }

    pub async fn send_pattern_match(
        &self,
        query: &str,
        pattern: &str,
        confidence: f64,
        match_type: MatchType,
        processing_time_ms: Option<u64>,
    ) -> Result<SendResult> {
        let data = PatternMatchData {
            query: query.to_string(),
            pattern: pattern.to_string(),
            confidence,
            match_type,
            processing_time_ms,
        };
        self.send_data(EventType::PatternMatch, data).await
    }

    pub async fn send_pattern_no_match(
        &self,
        query: &str,
        attempted_patterns: Vec<String>,
        processing_time_ms: Option<u64>,
    ) -> Result<SendResult> {
        let data = PatternNoMatchData {
            query: query.to_string(),
            attempted_patterns,
            processing_time_ms,
        };
        self.send_data(EventType::PatternNoMatch, data).await
    }

    pub async fn send_query_execution(
        &self,
        query: &str,
        results_count: u64,
        execution_time_ms: u64,
        data_source: &str,
        filters_applied: Vec<String>,
    ) -> Result<SendResult> {
        let data = QueryExecutionData {
            query: query.to_string(),
            results_count,
            execution_time_ms,
            data_source: data_source.to_string(),
            filters_applied,
        };
        self.send_data(EventType::QueryExecution, data).await
    }

    pub async fn send_query_error(
        &self,
        query: &str,
        error_type: QueryErrorKind,
        error_message: &str,
        execution_time_ms: u64,
    ) -> Result<SendResult> {
        let data = QueryErrorData {
            query: query.to_string(),
            error_type,
            error_message: error_message.to_string(),
            execution_time_ms,
        };
        self.send_data(EventType::QueryError, data).await
    }

    pub async fn send_query_interpretation(
        &self,
        original_query: &str,
        interpreted_query: &str,
        interpretation_confidence: f64,
        processing_time_ms: Option<u64>,
    ) -> Result<SendResult> {
        let data = QueryInterpretationData {
            original_query: original_query.to_string(),
            interpreted_query: interpreted_query.to_string(),
            interpretation_confidence,
            processing_time_ms,
        };
        self.send_data(EventType::QueryInterpretation, data).await
    }

    pub async fn send_search_request(&self, request: SearchRequestData) -> Result<SendResult> {
        self.send_data(EventType::SearchRequest, request).await
    }

    pub async fn send_rate_limit_hit(&self, hit: RateLimitHitData) -> Result<SendResult> {
        self.send_data(EventType::RateLimitHit, hit).await
    }

    pub async fn send_service_start(&self, lifecycle: ServiceLifecycleData) -> Result<SendResult> {
        self.send_data(EventType::ServiceStart, lifecycle).await
    }

    pub async fn send_service_stop(&self, lifecycle: ServiceLifecycleData) -> Result<SendResult> {
        self.send_data(EventType::ServiceStop, lifecycle).await
    }

    pub async fn send_error(
        &self,
        error_type: &str,
        error_message: &str,
        stack_trace: Option<String>,
        context: Map<String, Value>,
    ) -> Result<SendResult> {
        let data = ErrorData {
            error_type: error_type.to_string(),
            error_message: error_message.to_string(),
            stack_trace,
            context,
        };
        self.send_data(EventType::Error, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;
    use serde_json::json;
    use std::time::Duration;

    // Discard port: validation failures must be reported before anything is sent
    const UNREACHABLE: &str = "http://127.0.0.1:9/collect";

    fn client() -> EventClient {
        EventClient::new(ClientConfig::new(UNREACHABLE, ServiceName::PatternMatcher)).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let err = EventClient::new(ClientConfig::new("not a url", ServiceName::Generic)).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidApiUrl { .. }));
    }

    #[test]
    fn test_new_rejects_unprintable_api_key() {
        let config = ClientConfig::new(UNREACHABLE, ServiceName::Generic).with_api_key("line\nbreak");
        let err = EventClient::new(config).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidApiKey { .. }));
    }

    #[test]
    fn test_with_service_keeps_endpoint() {
        let base = EventClient::new(
            ClientConfig::new(UNREACHABLE, ServiceName::Generic).with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let derived = base.with_service(ServiceName::SearchGateway);
        assert_eq!(derived.service_name(), ServiceName::SearchGateway);
        assert_eq!(base.service_name(), ServiceName::Generic);
        assert_eq!(derived.endpoint(), base.endpoint());
        assert_eq!(derived.config().timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_send_result_json() {
        let result = SendResult {
            status: 200,
            body: r#"{"accepted": true}"#.to_string(),
        };
        assert_eq!(result.json(), Some(json!({"accepted": true})));
        assert_eq!(
            SendResult {
                status: 204,
                body: String::new()
            }
            .json(),
            None
        );
    }

    #[tokio::test]
    async fn test_invalid_confidence_fails_before_sending() {
        let err = client()
            .send_pattern_match("Apple stock price", "financial_data", 1.5, MatchType::Exact, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Validation(ref e) if e.field == "confidence"));
    }

    #[tokio::test]
    async fn test_send_missing_required_field() {
        let fields = json!({"query": "q", "pattern": "p", "match_type": "exact"});
        let Value::Object(fields) = fields else { unreachable!() };
        let err = client().send(EventType::PatternMatch, fields).await.unwrap_err();
        assert!(matches!(err, EventError::Validation(ref e) if e.field == "confidence"));
    }

    #[tokio::test]
    async fn test_send_reserved_field() {
        let fields = json!({"query": "q", "service_name": "search-gateway"});
        let Value::Object(fields) = fields else { unreachable!() };
        let err = client().send(EventType::SearchRequest, fields).await.unwrap_err();
        assert!(matches!(err, EventError::Validation(ref e) if e.field == "service_name"));
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_delivery_error() {
        let err = client()
            .send_search_request(SearchRequestData {
                query: "laptops".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Delivery(DeliveryError::Transport(_))));
    }
}
