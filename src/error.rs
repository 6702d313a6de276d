//! Error taxonomy for event construction and delivery

/// Raised while resolving configuration or building a client.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no collector URL: pass api_url or set EVENTS_API_URL")]
    MissingApiUrl,

    #[error("invalid collector URL '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },

    #[error("unknown service name '{value}'")]
    InvalidServiceName { value: String },

    #[error("invalid API key: {reason}")]
    InvalidApiKey { reason: String },

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("global event client already initialized")]
    GlobalClientAlreadyInitialized,

    #[error("global event client not initialized")]
    GlobalClientNotInitialized,
}

/// A caller supplied an incomplete or malformed event field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field '{field}': {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn blank(field: &str) -> Self {
        Self::new(field, "must not be empty")
    }
}

/// The collector could not be reached or rejected the event.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("collector responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request to collector failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl DeliveryError {
    /// HTTP status of a rejected event, if the collector answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Status { status, .. } => Some(*status),
            DeliveryError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DeliveryError::Transport(e) if e.is_timeout())
    }
}

/// Any failure surfaced by this crate
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

pub type Result<T> = std::result::Result<T, EventError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("confidence", "must be within [0, 1], got 1.5");
        assert_eq!(err.to_string(), "invalid field 'confidence': must be within [0, 1], got 1.5");
    }

    #[test]
    fn test_status_error_exposes_code() {
        let err = DeliveryError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_event_error_is_transparent() {
        let err: EventError = ConfigurationError::MissingApiUrl.into();
        assert!(matches!(err, EventError::Configuration(ConfigurationError::MissingApiUrl)));
        assert!(err.to_string().contains("EVENTS_API_URL"));
    }
}
