//! Event schemas shared by every search pipeline service
//!
//! An [`Event`] is the unit put on the wire: the emitting service, the event
//! type, a UTC timestamp and the event-specific fields flattened alongside.
//! The typed payloads in [`data`] describe and validate those fields.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

pub mod data;

pub use data::{
    ErrorData, EventFields, MatchType, PatternMatchData, PatternNoMatchData, QueryErrorData, QueryErrorKind,
    QueryExecutionData, QueryInterpretationData, RateLimitHitData, SearchRequestData, ServiceLifecycleData,
};

/// Services allowed to emit events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceName {
    PatternMatcher,
    QueryExecutor,
    QueryInterpreter,
    SearchGateway,
    #[default]
    Generic,
}

impl ServiceName {
    pub const ALL: [ServiceName; 5] = [
        ServiceName::PatternMatcher,
        ServiceName::QueryExecutor,
        ServiceName::QueryInterpreter,
        ServiceName::SearchGateway,
        ServiceName::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::PatternMatcher => "pattern-matcher",
            ServiceName::QueryExecutor => "query-executor",
            ServiceName::QueryInterpreter => "query-interpreter",
            ServiceName::SearchGateway => "search-gateway",
            ServiceName::Generic => "generic",
        }
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ServiceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "pattern-matcher" => Ok(ServiceName::PatternMatcher),
            "query-executor" => Ok(ServiceName::QueryExecutor),
            "query-interpreter" => Ok(ServiceName::QueryInterpreter),
            "search-gateway" => Ok(ServiceName::SearchGateway),
            "generic" => Ok(ServiceName::Generic),
            _ => Err(format!("Unknown service name: {}", s)),
        }
    }
}

/// Event types, grouped by the service that usually emits them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Pattern matcher
    PatternMatch,
    PatternNoMatch,

    // Query executor
    QueryExecution,
    QueryError,

    // Query interpreter
    QueryInterpretation,

    // Search gateway
    SearchRequest,
    RateLimitHit,

    // Generic
    ServiceStart,
    ServiceStop,
    Error,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        EventType::PatternMatch,
        EventType::PatternNoMatch,
        EventType::QueryExecution,
        EventType::QueryError,
        EventType::QueryInterpretation,
        EventType::SearchRequest,
        EventType::RateLimitHit,
        EventType::ServiceStart,
        EventType::ServiceStop,
        EventType::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PatternMatch => "pattern_match",
            EventType::PatternNoMatch => "pattern_no_match",
            EventType::QueryExecution => "query_execution",
            EventType::QueryError => "query_error",
            EventType::QueryInterpretation => "query_interpretation",
            EventType::SearchRequest => "search_request",
            EventType::RateLimitHit => "rate_limit_hit",
            EventType::ServiceStart => "service_start",
            EventType::ServiceStop => "service_stop",
            EventType::Error => "error",
        }
    }

    /// Fields that must be present (and non-null) for this event type
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            EventType::PatternMatch => &["query", "pattern", "confidence", "match_type"],
            EventType::PatternNoMatch => &["query", "attempted_patterns"],
            EventType::QueryExecution => &["query", "results_count", "execution_time_ms", "data_source"],
            EventType::QueryError => &["query", "error_type", "error_message", "execution_time_ms"],
            EventType::QueryInterpretation => &["original_query", "interpreted_query", "interpretation_confidence"],
            EventType::SearchRequest => &["query"],
            EventType::RateLimitHit => &["limit_type", "current_count", "limit"],
            EventType::ServiceStart | EventType::ServiceStop => &[],
            EventType::Error => &["error_type", "error_message"],
        }
    }

    pub fn optional_fields(&self) -> &'static [&'static str] {
        match self {
            EventType::PatternMatch | EventType::PatternNoMatch | EventType::QueryInterpretation => {
                &["processing_time_ms"]
            }
            EventType::QueryExecution => &["filters_applied"],
            EventType::QueryError => &[],
            EventType::SearchRequest => &["user_id", "session_id", "ip_address", "user_agent"],
            EventType::RateLimitHit => &["user_id", "ip_address"],
            EventType::ServiceStart | EventType::ServiceStop => &["service_version", "environment", "startup_time_ms"],
            EventType::Error => &["stack_trace", "context"],
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown event type: {}", s))
    }
}

/// A single telemetry record as sent to the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    service_name: ServiceName,
    event_type: EventType,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Event {
    /// Keys owned by the envelope; event fields may not use them
    pub const RESERVED_FIELDS: [&'static str; 3] = ["service_name", "event_type", "timestamp"];

    /// Create an event stamped with the current time
    pub fn new(
        service_name: ServiceName,
        event_type: EventType,
        fields: Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        Self::at(service_name, event_type, Utc::now(), fields)
    }

    pub fn at(
        service_name: ServiceName,
        event_type: EventType,
        timestamp: DateTime<Utc>,
        fields: Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        if let Some(key) = Self::RESERVED_FIELDS.iter().find(|k| fields.contains_key(**k)) {
            return Err(ValidationError::new(*key, "is reserved for the event envelope"));
        }

        Ok(Self {
            service_name,
            event_type,
            timestamp,
            fields,
        })
    }

    pub fn service_name(&self) -> ServiceName {
        self.service_name
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Check a raw field map against the schema of `event_type`.
///
/// Required fields must be present and non-null, every known field must have
/// the right JSON type, and the typed payload's own rules must hold. Unknown
/// extra fields pass through untouched.
pub fn validate_fields(event_type: EventType, fields: &Map<String, Value>) -> Result<(), ValidationError> {
    for name in event_type.required_fields() {
        match fields.get(*name) {
            None | Some(Value::Null) => return Err(ValidationError::new(*name, "is required")),
            Some(_) => {}
        }
    }

    match event_type {
        EventType::PatternMatch => check::<PatternMatchData>(event_type, fields),
        EventType::PatternNoMatch => check::<PatternNoMatchData>(event_type, fields),
        EventType::QueryExecution => check::<QueryExecutionData>(event_type, fields),
        EventType::QueryError => check::<QueryErrorData>(event_type, fields),
        EventType::QueryInterpretation => check::<QueryInterpretationData>(event_type, fields),
        EventType::SearchRequest => check::<SearchRequestData>(event_type, fields),
        EventType::RateLimitHit => check::<RateLimitHitData>(event_type, fields),
        EventType::ServiceStart | EventType::ServiceStop => check::<ServiceLifecycleData>(event_type, fields),
        EventType::Error => check::<ErrorData>(event_type, fields),
    }
}

/// Field name reported when a payload is present but has the wrong shape
/// and no single field can be blamed
pub const FIELDS_LABEL: &str = "fields";

fn check<D: EventFields + DeserializeOwned>(
    event_type: EventType,
    fields: &Map<String, Value>,
) -> Result<(), ValidationError> {
    let data: D = serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|e| ValidationError::new(blame(event_type, fields), e.to_string()))?;
    data.validate()
}

/// The first declared field that fails to deserialize on its own
fn blame(event_type: EventType, fields: &Map<String, Value>) -> String {
    event_type
        .required_fields()
        .iter()
        .chain(event_type.optional_fields())
        .find(|name| {
            fields
                .get(**name)
                .is_some_and(|value| !value.is_null() && !field_shape_ok(event_type, name, value))
        })
        .map(|name| name.to_string())
        .unwrap_or_else(|| FIELDS_LABEL.to_string())
}

fn field_shape_ok(event_type: EventType, name: &str, value: &Value) -> bool {
    match name {
        "match_type" => serde_json::from_value::<MatchType>(value.clone()).is_ok(),
        "error_type" if event_type == EventType::QueryError => {
            serde_json::from_value::<QueryErrorKind>(value.clone()).is_ok()
        }
        "confidence" | "interpretation_confidence" => value.is_f64() || value.is_i64() || value.is_u64(),
        "results_count" | "execution_time_ms" | "processing_time_ms" | "current_count" | "limit"
        | "startup_time_ms" => value.is_u64(),
        "attempted_patterns" | "filters_applied" => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        "context" => value.is_object(),
        _ => value.is_string(),
    }
}

/// Machine-readable description of every event type and service name
pub fn catalog() -> Value {
    let event_types: Map<String, Value> = EventType::ALL
        .iter()
        .map(|t| {
            (
                t.as_str().to_string(),
                serde_json::json!({
                    "required": t.required_fields(),
                    "optional": t.optional_fields(),
                }),
            )
        })
        .collect();

    serde_json::json!({
        "envelope": Event::RESERVED_FIELDS,
        "service_names": ServiceName::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        "event_types": event_types,
    })
}
