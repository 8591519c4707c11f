//! Event creation backend.
//!
//! [`EventCreator`] is the only way a wizard session talks to the hosted
//! backend. [`HttpEventCreator`] speaks the events API envelope:
//! `{ "data": { "id": ... } }` on success and
//! `{ "error": "...", "code": "..." }` on failure.

use std::time::Duration;

use async_trait::async_trait;
use gatherly_core::types::EntityId;
use gatherly_core::wizard::CreateEventPayload;
use serde::{Deserialize, Serialize};

use crate::config::WizardConfig;
use crate::error::CreateError;

/// Identifier of a newly created event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: EntityId,
}

#[async_trait]
pub trait EventCreator: Send + Sync {
    /// Send one create request. Implementations must not retry.
    async fn create_event(
        &self,
        payload: &CreateEventPayload,
    ) -> Result<CreatedEvent, CreateError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

pub struct HttpEventCreator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEventCreator {
    /// Client for `{base_url}/events` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CreateError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/events", base_url.trim_end_matches('/')),
        })
    }

    /// Client for the configured events API and request timeout.
    pub fn from_config(config: &WizardConfig) -> Result<Self, CreateError> {
        Self::new(&config.events_api_url, config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventCreator for HttpEventCreator {
    async fn create_event(
        &self,
        payload: &CreateEventPayload,
    ) -> Result<CreatedEvent, CreateError> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(endpoint = %self.endpoint, status, "Create event response");
        parse_response(status, &body)
    }
}

#[derive(Deserialize)]
struct DataEnvelope {
    data: DataId,
}

#[derive(Deserialize)]
struct DataId {
    id: serde_json::Value,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: Option<String>,
}

/// Interpret a response from the events API.
pub fn parse_response(status: u16, body: &str) -> Result<CreatedEvent, CreateError> {
    if (200..300).contains(&status) {
        let envelope: DataEnvelope = serde_json::from_str(body)
            .map_err(|e| CreateError::InvalidResponse(e.to_string()))?;
        let id = match envelope.data.id {
            serde_json::Value::String(s) if !s.is_empty() => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(CreateError::InvalidResponse(format!(
                    "unusable event id {other}"
                )))
            }
        };
        return Ok(CreatedEvent { id });
    }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => Err(CreateError::Rejected {
            status: Some(status),
            code: envelope.code,
            message: envelope.error,
        }),
        Err(_) => Err(CreateError::Rejected {
            status: Some(status),
            code: None,
            message: String::new(),
        }),
    }
}
