//! Event creation request body.
//!
//! Built from the form at submit time. Strings are trimmed and empty
//! optional strings are dropped so the backend never receives `""` where a
//! value is absent.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::EntityId;

use super::form::{Collaborator, EventFormat, FormValues, SponsorshipTier, Visibility};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePayload {
    pub start_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPayload {
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub virtual_url: Option<String>,
    pub virtual_platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPayload {
    pub is_free: bool,
    pub ticket_price_cents: Option<i64>,
    pub currency: String,
    pub early_bird_price_cents: Option<i64>,
    pub early_bird_deadline: Option<NaiveDate>,
    pub refund_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub cover_image_url: Option<String>,
    pub gallery_urls: Vec<String>,
    pub video_url: Option<String>,
}

/// Metadata keys the wizard stamps itself. User metadata may not override
/// them.
pub const RESERVED_METADATA_KEYS: &[&str] = &["template_id", "wizard_session_id"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    pub template_id: Option<String>,
    pub wizard_session_id: Uuid,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of the create-event request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEventPayload {
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub format: EventFormat,
    pub schedule: SchedulePayload,
    pub location: LocationPayload,
    pub capacity: Option<u32>,
    pub pricing: PricingPayload,
    pub media: MediaPayload,
    pub visibility: Visibility,
    pub requires_approval: bool,
    pub allow_waitlist: bool,
    pub collaborators: Vec<Collaborator>,
    pub sponsorship_tiers: Vec<SponsorshipTier>,
    pub organizer_id: EntityId,
    pub metadata: PayloadMetadata,
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn trimmed_list(items: &[String]) -> Vec<String> {
    items.iter().filter_map(|s| non_empty(s)).collect()
}

impl CreateEventPayload {
    /// Build the request body for `organizer_id`.
    ///
    /// Fails when no start date is set. Paid-only pricing fields are dropped
    /// for free events, and location fields the format does not use are
    /// dropped too. User metadata under a reserved key is ignored.
    pub fn from_form(
        values: &FormValues,
        organizer_id: &str,
        template_id: Option<&str>,
        wizard_session_id: Uuid,
    ) -> Result<Self, CoreError> {
        let start_date = values.start_date.ok_or_else(|| {
            CoreError::Validation("A start date is required to create an event".to_string())
        })?;

        let paid = !values.is_free;
        let format = values.event_format;

        Ok(Self {
            title: values.title.trim().to_string(),
            description: values.description.trim().to_string(),
            category: values.category.trim().to_string(),
            tags: trimmed_list(&values.tags),
            format,
            schedule: SchedulePayload {
                start_date,
                start_time: values.start_time,
                end_date: values.end_date,
                end_time: values.end_time,
                timezone: non_empty(&values.timezone),
            },
            location: LocationPayload {
                venue_name: non_empty(&values.venue_name).filter(|_| format.has_venue()),
                address: non_empty(&values.address).filter(|_| format.has_venue()),
                virtual_url: non_empty(&values.virtual_url).filter(|_| format.has_virtual()),
                virtual_platform: non_empty(&values.virtual_platform)
                    .filter(|_| format.has_virtual()),
            },
            capacity: values.capacity,
            pricing: PricingPayload {
                is_free: values.is_free,
                ticket_price_cents: values.ticket_price_cents.filter(|_| paid),
                currency: values.currency.trim().to_uppercase(),
                early_bird_price_cents: values.early_bird_price_cents.filter(|_| paid),
                early_bird_deadline: values.early_bird_deadline.filter(|_| paid),
                refund_policy: non_empty(&values.refund_policy),
            },
            media: MediaPayload {
                cover_image_url: non_empty(&values.cover_image_url),
                gallery_urls: trimmed_list(&values.gallery_urls),
                video_url: non_empty(&values.video_url),
            },
            visibility: values.visibility,
            requires_approval: values.requires_approval,
            allow_waitlist: values.allow_waitlist,
            collaborators: values.collaborators.clone(),
            sponsorship_tiers: values.sponsorship_tiers.clone(),
            organizer_id: organizer_id.to_string(),
            metadata: PayloadMetadata {
                template_id: template_id.map(str::to_string),
                wizard_session_id,
                extra: values
                    .metadata
                    .iter()
                    .filter(|(key, _)| !RESERVED_METADATA_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
