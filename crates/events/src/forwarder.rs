//! Webhook forwarding of analytics events.
//!
//! [`AnalyticsForwarder`] subscribes to the bus and hands each event, as a
//! [`WebhookBody`], to an [`AnalyticsTransport`]. Retryable failures are
//! retried on a [`RetrySchedule`] (1 s, 2 s, 4 s by default). Failures are
//! logged and dropped; the wizard never sees them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatherly_core::types::Timestamp;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bus::TrackedEvent;

/// HTTP request timeout for a single attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Value of the `source` field in every webhook body.
pub const WEBHOOK_SOURCE: &str = "gatherly-wizard";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    /// No response: connection, DNS or timeout failure.
    #[error("Analytics webhook unreachable: {0}")]
    Unreachable(String),

    /// The receiver answered with a non-2xx status.
    #[error("Analytics webhook rejected the event with HTTP {status}")]
    Rejected { status: u16 },
}

impl ForwardError {
    /// Client errors other than 408/429 mean the body will never be
    /// accepted, so they are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::Rejected { status } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
        }
    }
}

impl From<reqwest::Error> for ForwardError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unreachable(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Webhook body
// ---------------------------------------------------------------------------

/// JSON body posted for one analytics event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookBody {
    pub source: &'static str,
    pub event: String,
    pub session_id: Option<Uuid>,
    pub actor_id: Option<String>,
    pub properties: serde_json::Value,
    pub occurred_at: Timestamp,
    /// 1 for the first try, incremented on every retry.
    pub attempt: u32,
}

impl WebhookBody {
    pub fn from_event(event: &TrackedEvent, attempt: u32) -> Self {
        Self {
            source: WEBHOOK_SOURCE,
            event: event.name.clone(),
            session_id: event.session_id,
            actor_id: event.actor_id.clone(),
            properties: event.properties.clone(),
            occurred_at: event.timestamp,
            attempt,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Sends one webhook body. Implementations make a single attempt.
#[async_trait]
pub trait AnalyticsTransport: Send + Sync {
    async fn send(&self, body: &WebhookBody) -> Result<(), ForwardError>;
}

/// POSTs bodies to a URL with reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AnalyticsTransport for HttpTransport {
    async fn send(&self, body: &WebhookBody) -> Result<(), ForwardError> {
        let response = self.client.post(&self.url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Retry schedule
// ---------------------------------------------------------------------------

/// Delays between attempts. One retry per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ])
    }
}

// ---------------------------------------------------------------------------
// AnalyticsForwarder
// ---------------------------------------------------------------------------

/// Counts of a finished forwarding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ForwardSummary {
    pub delivered: u64,
    pub dropped: u64,
}

/// Delivers analytics events to an external webhook.
pub struct AnalyticsForwarder {
    transport: Arc<dyn AnalyticsTransport>,
    retry: RetrySchedule,
}

impl AnalyticsForwarder {
    /// Forwarder posting to `url` with the default retry schedule.
    pub fn new(url: impl Into<String>) -> Result<Self, ForwardError> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(url)?)))
    }

    pub fn with_transport(transport: Arc<dyn AnalyticsTransport>) -> Self {
        Self {
            transport,
            retry: RetrySchedule::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetrySchedule) -> Self {
        self.retry = retry;
        self
    }

    /// Forward events until cancelled or the bus closes.
    pub async fn run(
        &self,
        mut receiver: broadcast::Receiver<TrackedEvent>,
        cancel: CancellationToken,
    ) -> ForwardSummary {
        let mut summary = ForwardSummary::default();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Analytics forwarder cancelled");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => match self.deliver(&event).await {
                        Ok(_) => summary.delivered += 1,
                        Err(_) => summary.dropped += 1,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Analytics forwarder lagged");
                        summary.dropped += n;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, analytics forwarder shutting down");
                        break;
                    }
                }
            }
        }
        tracing::debug!(
            delivered = summary.delivered,
            dropped = summary.dropped,
            "Analytics forwarder stopped"
        );
        summary
    }

    /// Deliver one event, retrying on the schedule. Returns the number of
    /// attempts it took.
    pub async fn deliver(&self, event: &TrackedEvent) -> Result<u32, ForwardError> {
        let mut delays = self.retry.delays().iter();
        let mut attempt: u32 = 1;
        loop {
            let error = match self.transport.send(&WebhookBody::from_event(event, attempt)).await {
                Ok(()) => return Ok(attempt),
                Err(e) => e,
            };
            let next_delay = if error.is_retryable() { delays.next() } else { None };
            let Some(delay) = next_delay else {
                tracing::error!(
                    event = %event.name,
                    attempts = attempt,
                    error = %error,
                    "Analytics event dropped"
                );
                return Err(error);
            };
            tracing::warn!(
                event = %event.name,
                attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Analytics delivery attempt failed"
            );
            tokio::time::sleep(*delay).await;
            attempt += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
