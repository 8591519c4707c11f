//! Starter templates for common event types.
//!
//! A template pre-fills the parts of the form that are typical for a kind of
//! event. It never sets the title or dates; those are always the organizer's.

use serde::Serialize;

use crate::error::CoreError;

use super::form::{EventFormat, FormValues, Visibility};

/// A named preset applied to a fresh form.
#[derive(Clone, Copy, Serialize)]
pub struct EventTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub apply: fn(&mut FormValues),
}

impl std::fmt::Debug for EventTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTemplate")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|t| t.to_string()).collect()
}

fn apply_conference(v: &mut FormValues) {
    v.category = "Conference".to_string();
    v.tags = tags(&["conference", "talks", "networking"]);
    v.event_format = EventFormat::Hybrid;
    v.capacity = Some(500);
    v.is_free = false;
    v.refund_policy = "Full refund up to 14 days before the event".to_string();
    v.allow_waitlist = true;
}

fn apply_workshop(v: &mut FormValues) {
    v.category = "Education".to_string();
    v.tags = tags(&["workshop", "hands-on"]);
    v.event_format = EventFormat::InPerson;
    v.capacity = Some(25);
    v.is_free = false;
    v.requires_approval = true;
    v.allow_waitlist = true;
}

fn apply_meetup(v: &mut FormValues) {
    v.category = "Community".to_string();
    v.tags = tags(&["meetup", "community"]);
    v.event_format = EventFormat::InPerson;
    v.capacity = Some(60);
    v.is_free = true;
    v.ticket_price_cents = None;
    v.early_bird_price_cents = None;
}

fn apply_webinar(v: &mut FormValues) {
    v.category = "Education".to_string();
    v.tags = tags(&["webinar", "online"]);
    v.event_format = EventFormat::Virtual;
    v.virtual_platform = "Zoom".to_string();
    v.capacity = Some(1000);
    v.is_free = true;
    v.ticket_price_cents = None;
    v.early_bird_price_cents = None;
}

fn apply_concert(v: &mut FormValues) {
    v.category = "Music".to_string();
    v.tags = tags(&["concert", "live-music"]);
    v.event_format = EventFormat::InPerson;
    v.capacity = Some(300);
    v.is_free = false;
    v.visibility = Visibility::Public;
    v.refund_policy = "No refunds; tickets are transferable".to_string();
}

/// Every available template.
pub const TEMPLATES: &[EventTemplate] = &[
    EventTemplate {
        id: "conference",
        name: "Conference",
        description: "Multi-track talks with in-person and remote attendance",
        apply: apply_conference,
    },
    EventTemplate {
        id: "workshop",
        name: "Workshop",
        description: "Small hands-on session with approved attendees",
        apply: apply_workshop,
    },
    EventTemplate {
        id: "meetup",
        name: "Meetup",
        description: "Free community gathering",
        apply: apply_meetup,
    },
    EventTemplate {
        id: "webinar",
        name: "Webinar",
        description: "Free online presentation",
        apply: apply_webinar,
    },
    EventTemplate {
        id: "concert",
        name: "Concert",
        description: "Ticketed live music",
        apply: apply_concert,
    },
];

impl EventTemplate {
    /// Look up a template by id.
    pub fn find(id: &str) -> Result<&'static EventTemplate, CoreError> {
        TEMPLATES
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "EventTemplate",
                id: id.to_string(),
            })
    }

    /// A default form with this template applied.
    pub fn initial_values(&self) -> FormValues {
        let mut values = FormValues::default();
        (self.apply)(&mut values);
        values
    }
}
