//! Optional process-wide event client
//!
//! Installed at most once, typically during service startup. Trackers fall
//! back to it when they are not given a client explicitly.

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};

use super::{EventClient, SendResult};
use crate::config::ClientConfig;
use crate::error::{ConfigurationError, Result};
use crate::schema::EventType;

static GLOBAL_CLIENT: OnceCell<EventClient> = OnceCell::new();

/// Build a client from `config` and install it as the process-wide client
pub fn init_global_client(config: ClientConfig) -> std::result::Result<&'static EventClient, ConfigurationError> {
    install_global_client(EventClient::new(config)?)
}

/// Install an existing client as the process-wide client
pub fn install_global_client(client: EventClient) -> std::result::Result<&'static EventClient, ConfigurationError> {
    let service = client.service_name();
    GLOBAL_CLIENT
        .set(client)
        .map_err(|_| ConfigurationError::GlobalClientAlreadyInitialized)?;
    log::debug!("Installed global event client for {}", service);
    global_client().ok_or(ConfigurationError::GlobalClientNotInitialized)
}

pub fn global_client() -> Option<&'static EventClient> {
    GLOBAL_CLIENT.get()
}

/// Send through the process-wide client
pub async fn send_global(event_type: EventType, fields: Map<String, Value>) -> Result<SendResult> {
    match global_client() {
        Some(client) => client.send(event_type, fields).await,
        None => {
            log::warn!("Global event client not initialized, dropping {} event", event_type);
            Err(ConfigurationError::GlobalClientNotInitialized.into())
        }
    }
}
