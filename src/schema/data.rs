//! Typed payloads for each event type
//!
//! Every payload knows how to validate itself and how to flatten into the
//! field map carried by an [`Event`](super::Event). Counts and durations are
//! unsigned, so negative values are unrepresentable rather than checked.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A payload that can be attached to an event
pub trait EventFields: Serialize {
    fn validate(&self) -> Result<(), ValidationError>;

    /// Validate, then flatten into an event field map
    fn into_fields(self) -> Result<Map<String, Value>, ValidationError>
    where
        Self: Sized,
    {
        self.validate()?;
        match serde_json::to_value(&self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ValidationError::new("fields", format!("expected an object, got {}", other))),
            Err(e) => Err(ValidationError::new("fields", e.to_string())),
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::blank(field));
    }
    Ok(())
}

fn require_unit_interval(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::new(field, format!("must be within [0, 1], got {}", value)));
    }
    Ok(())
}

/// How a pattern matched the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Semantic,
}

impl std::str::FromStr for MatchType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(MatchType::Exact),
            "fuzzy" => Ok(MatchType::Fuzzy),
            "semantic" => Ok(MatchType::Semantic),
            _ => Err(ValidationError::new(
                "match_type",
                format!("expected exact, fuzzy or semantic, got '{}'", s),
            )),
        }
    }
}

/// Failure class of a query execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryErrorKind {
    Timeout,
    Connection,
    Validation,
    Unknown,
}

impl std::str::FromStr for QueryErrorKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "timeout" => Ok(QueryErrorKind::Timeout),
            "connection" => Ok(QueryErrorKind::Connection),
            "validation" => Ok(QueryErrorKind::Validation),
            "unknown" => Ok(QueryErrorKind::Unknown),
            _ => Err(ValidationError::new(
                "error_type",
                format!("expected timeout, connection, validation or unknown, got '{}'", s),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatchData {
    pub query: String,
    pub pattern: String,
    pub confidence: f64,
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl EventFields for PatternMatchData {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("query", &self.query)?;
        require_text("pattern", &self.pattern)?;
        require_unit_interval("confidence", self.confidence)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternNoMatchData {
    pub query: String,
    pub attempted_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl EventFields for PatternNoMatchData {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("query", &self.query)?;
        if self.attempted_patterns.is_empty() {
            return Err(ValidationError::new("attempted_patterns", "must list at least one pattern"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExecutionData {
    pub query: String,
    pub results_count: u64,
    pub execution_time_ms: u64,
    pub data_source: String,
    #[serde(default)]
    pub filters_applied: Vec<String>,
}

impl EventFields for QueryExecutionData {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("query", &self.query)?;
        require_text("data_source", &self.data_source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryErrorData {
    pub query: String,
    pub error_type: QueryErrorKind,
    pub error_message: String,
    pub execution_time_ms: u64,
}

impl EventFields for QueryErrorData {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("query", &self.query)?;
        require_text("error_message", &self.error_message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInterpretationData {
    pub original_query: String,
    pub interpreted_query: String,
    pub interpretation_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl EventFields for QueryInterpretationData {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("original_query", &self.original_query)?;
        require_text("interpreted_query", &self.interpreted_query)?;
        require_unit_interval("interpretation_confidence", self.interpretation_confidence)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequestData {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl EventFields for SearchRequestData {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("query", &self.query)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitHitData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub limit_type: String,
    pub current_count: u64,
    pub limit: u64,
}

impl EventFields for RateLimitHitData {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("limit_type", &self.limit_type)?;
        if self.limit == 0 {
            return Err(ValidationError::new("limit", "must be at least 1"));
        }
        Ok(())
    }
}

/// Payload for `service_start` and `service_stop`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceLifecycleData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_time_ms: Option<u64>,
}

impl EventFields for ServiceLifecycleData {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub error_type: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl EventFields for ErrorData {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("error_type", &self.error_type)?;
        require_text("error_message", &self.error_message)
    }
}
