//! Gatherly analytics events.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`TrackedEvent`] -- the analytics event envelope.
//! - [`AnalyticsSink`] -- the seam the wizard reports through.
//! - [`AnalyticsLogger`] -- background consumer that logs every event.
//! - [`AnalyticsForwarder`] -- background consumer that POSTs events to a
//!   webhook through an [`AnalyticsTransport`], retrying on a
//!   [`RetrySchedule`].

pub mod bus;
pub mod forwarder;
pub mod logger;
pub mod names;
pub mod sink;

pub use bus::{EventBus, TrackedEvent};
pub use forwarder::{
    AnalyticsForwarder, AnalyticsTransport, ForwardError, ForwardSummary, HttpTransport,
    RetrySchedule, WebhookBody,
};
pub use logger::AnalyticsLogger;
pub use sink::{AnalyticsSink, NoopSink};
