//! Analytics reporting seam.

use std::sync::Arc;

use crate::bus::{EventBus, TrackedEvent};

/// Destination for analytics events.
///
/// Tracking is fire-and-forget: implementations must not block and never
/// report failure to the caller.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: TrackedEvent);
}

impl AnalyticsSink for EventBus {
    fn track(&self, event: TrackedEvent) {
        self.publish(event);
    }
}

impl<T: AnalyticsSink + ?Sized> AnalyticsSink for Arc<T> {
    fn track(&self, event: TrackedEvent) {
        (**self).track(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn track(&self, _event: TrackedEvent) {}
}
