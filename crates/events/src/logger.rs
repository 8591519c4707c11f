//! Structured-log consumer for the event bus.
//!
//! [`AnalyticsLogger`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every event to the `tracing` pipeline. It runs as a background
//! task and stops when the bus is dropped.

use tokio::sync::broadcast;

use crate::bus::TrackedEvent;

/// Background service that logs analytics events.
pub struct AnalyticsLogger;

impl AnalyticsLogger {
    /// Run the logging loop until the channel closes.
    ///
    /// Returns the number of events logged.
    pub async fn run(mut receiver: broadcast::Receiver<TrackedEvent>) -> u64 {
        let mut logged = 0u64;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::log(&event);
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Analytics logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, analytics logger shutting down");
                    break;
                }
            }
        }
        logged
    }

    fn log(event: &TrackedEvent) {
        tracing::info!(
            event = %event.name,
            session_id = ?event.session_id,
            actor_id = ?event.actor_id,
            properties = %event.properties,
            "analytics"
        );
    }
}
