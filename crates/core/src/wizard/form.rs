//! Typed form values for the event-creation wizard.
//!
//! [`FormValues`] is the single record edited across all steps. Every field
//! has a default, so a partially-filled or restored record always has the
//! full shape. [`FormField`] gives each field a stable key for generic
//! get/set access from a UI layer.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// How attendees join the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFormat {
    #[default]
    InPerson,
    Virtual,
    Hybrid,
}

impl EventFormat {
    /// Whether a physical venue is part of the event.
    pub fn has_venue(self) -> bool {
        matches!(self, Self::InPerson | Self::Hybrid)
    }

    /// Whether an online stream/meeting is part of the event.
    pub fn has_virtual(self) -> bool {
        matches!(self, Self::Virtual | Self::Hybrid)
    }
}

/// Who can discover the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

/// Role of a collaborator on the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    #[default]
    CoHost,
    Moderator,
    Speaker,
}

// ---------------------------------------------------------------------------
// Nested entities
// ---------------------------------------------------------------------------

/// A person invited to help run the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: CollaboratorRole,
}

/// A purchasable sponsorship package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorshipTier {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub max_sponsors: Option<u32>,
}

// ---------------------------------------------------------------------------
// FormValues
// ---------------------------------------------------------------------------

/// Current values of every wizard field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormValues {
    // Basics
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,

    // Schedule & location
    pub event_format: EventFormat,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
    pub timezone: String,
    pub venue_name: String,
    pub address: String,
    pub virtual_url: String,
    pub virtual_platform: String,

    // Tickets
    pub capacity: Option<u32>,
    pub is_free: bool,
    pub ticket_price_cents: Option<i64>,
    pub currency: String,
    pub early_bird_price_cents: Option<i64>,
    pub early_bird_deadline: Option<NaiveDate>,
    pub refund_policy: String,

    // Media
    pub cover_image_url: String,
    pub gallery_urls: Vec<String>,
    pub video_url: String,

    // Team & visibility
    pub visibility: Visibility,
    pub requires_approval: bool,
    pub allow_waitlist: bool,
    pub collaborators: Vec<Collaborator>,
    pub sponsorship_tiers: Vec<SponsorshipTier>,
    pub metadata: serde_json::Map<String, Value>,

    // Review
    pub accept_terms: bool,
}

/// Currency used when the organizer has not picked one.
pub const DEFAULT_CURRENCY: &str = "USD";

impl Default for FormValues {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            category: String::new(),
            tags: Vec::new(),
            event_format: EventFormat::default(),
            start_date: None,
            start_time: None,
            end_date: None,
            end_time: None,
            timezone: String::new(),
            venue_name: String::new(),
            address: String::new(),
            virtual_url: String::new(),
            virtual_platform: String::new(),
            capacity: None,
            is_free: false,
            ticket_price_cents: None,
            currency: DEFAULT_CURRENCY.to_string(),
            early_bird_price_cents: None,
            early_bird_deadline: None,
            refund_policy: String::new(),
            cover_image_url: String::new(),
            gallery_urls: Vec::new(),
            video_url: String::new(),
            visibility: Visibility::default(),
            requires_approval: false,
            allow_waitlist: false,
            collaborators: Vec::new(),
            sponsorship_tiers: Vec::new(),
            metadata: serde_json::Map::new(),
            accept_terms: false,
        }
    }
}

// ---------------------------------------------------------------------------
// FormField
// ---------------------------------------------------------------------------

/// Addressable form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Title,
    Description,
    Category,
    Tags,
    EventFormat,
    StartDate,
    StartTime,
    EndDate,
    EndTime,
    Timezone,
    VenueName,
    Address,
    VirtualUrl,
    VirtualPlatform,
    Capacity,
    IsFree,
    TicketPriceCents,
    Currency,
    EarlyBirdPriceCents,
    EarlyBirdDeadline,
    RefundPolicy,
    CoverImageUrl,
    GalleryUrls,
    VideoUrl,
    Visibility,
    RequiresApproval,
    AllowWaitlist,
    Collaborators,
    SponsorshipTiers,
    Metadata,
    AcceptTerms,
}

impl FormField {
    /// Every field, in form order.
    pub const ALL: &'static [FormField] = &[
        Self::Title,
        Self::Description,
        Self::Category,
        Self::Tags,
        Self::EventFormat,
        Self::StartDate,
        Self::StartTime,
        Self::EndDate,
        Self::EndTime,
        Self::Timezone,
        Self::VenueName,
        Self::Address,
        Self::VirtualUrl,
        Self::VirtualPlatform,
        Self::Capacity,
        Self::IsFree,
        Self::TicketPriceCents,
        Self::Currency,
        Self::EarlyBirdPriceCents,
        Self::EarlyBirdDeadline,
        Self::RefundPolicy,
        Self::CoverImageUrl,
        Self::GalleryUrls,
        Self::VideoUrl,
        Self::Visibility,
        Self::RequiresApproval,
        Self::AllowWaitlist,
        Self::Collaborators,
        Self::SponsorshipTiers,
        Self::Metadata,
        Self::AcceptTerms,
    ];

    /// Serialized key of the field (matches the [`FormValues`] JSON shape).
    pub fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Category => "category",
            Self::Tags => "tags",
            Self::EventFormat => "event_format",
            Self::StartDate => "start_date",
            Self::StartTime => "start_time",
            Self::EndDate => "end_date",
            Self::EndTime => "end_time",
            Self::Timezone => "timezone",
            Self::VenueName => "venue_name",
            Self::Address => "address",
            Self::VirtualUrl => "virtual_url",
            Self::VirtualPlatform => "virtual_platform",
            Self::Capacity => "capacity",
            Self::IsFree => "is_free",
            Self::TicketPriceCents => "ticket_price_cents",
            Self::Currency => "currency",
            Self::EarlyBirdPriceCents => "early_bird_price_cents",
            Self::EarlyBirdDeadline => "early_bird_deadline",
            Self::RefundPolicy => "refund_policy",
            Self::CoverImageUrl => "cover_image_url",
            Self::GalleryUrls => "gallery_urls",
            Self::VideoUrl => "video_url",
            Self::Visibility => "visibility",
            Self::RequiresApproval => "requires_approval",
            Self::AllowWaitlist => "allow_waitlist",
            Self::Collaborators => "collaborators",
            Self::SponsorshipTiers => "sponsorship_tiers",
            Self::Metadata => "metadata",
            Self::AcceptTerms => "accept_terms",
        }
    }

    /// Parse a field from its serialized key.
    pub fn from_key(key: &str) -> Result<Self, CoreError> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.key() == key)
            .ok_or_else(|| CoreError::Validation(format!("Unknown form field '{key}'")))
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn assign<T: DeserializeOwned>(
    slot: &mut T,
    field: FormField,
    value: Value,
) -> Result<(), CoreError> {
    *slot = serde_json::from_value(value).map_err(|e| {
        CoreError::Validation(format!("Invalid value for field '{}': {e}", field.key()))
    })?;
    Ok(())
}

impl FormValues {
    /// Current value of a field as JSON. Never fails; unset optional fields
    /// are `null`.
    pub fn get_value(&self, field: FormField) -> Value {
        match field {
            FormField::Title => to_json(&self.title),
            FormField::Description => to_json(&self.description),
            FormField::Category => to_json(&self.category),
            FormField::Tags => to_json(&self.tags),
            FormField::EventFormat => to_json(&self.event_format),
            FormField::StartDate => to_json(&self.start_date),
            FormField::StartTime => to_json(&self.start_time),
            FormField::EndDate => to_json(&self.end_date),
            FormField::EndTime => to_json(&self.end_time),
            FormField::Timezone => to_json(&self.timezone),
            FormField::VenueName => to_json(&self.venue_name),
            FormField::Address => to_json(&self.address),
            FormField::VirtualUrl => to_json(&self.virtual_url),
            FormField::VirtualPlatform => to_json(&self.virtual_platform),
            FormField::Capacity => to_json(&self.capacity),
            FormField::IsFree => to_json(&self.is_free),
            FormField::TicketPriceCents => to_json(&self.ticket_price_cents),
            FormField::Currency => to_json(&self.currency),
            FormField::EarlyBirdPriceCents => to_json(&self.early_bird_price_cents),
            FormField::EarlyBirdDeadline => to_json(&self.early_bird_deadline),
            FormField::RefundPolicy => to_json(&self.refund_policy),
            FormField::CoverImageUrl => to_json(&self.cover_image_url),
            FormField::GalleryUrls => to_json(&self.gallery_urls),
            FormField::VideoUrl => to_json(&self.video_url),
            FormField::Visibility => to_json(&self.visibility),
            FormField::RequiresApproval => to_json(&self.requires_approval),
            FormField::AllowWaitlist => to_json(&self.allow_waitlist),
            FormField::Collaborators => to_json(&self.collaborators),
            FormField::SponsorshipTiers => to_json(&self.sponsorship_tiers),
            FormField::Metadata => to_json(&self.metadata),
            FormField::AcceptTerms => to_json(&self.accept_terms),
        }
    }

    /// Replace a field's value.
    ///
    /// The JSON value must deserialize into the field's type; on mismatch a
    /// [`CoreError::Validation`] is returned and the form is unchanged.
    /// Collaborator and tier lists go through the same checks as
    /// [`add_collaborator`](Self::add_collaborator) and
    /// [`add_sponsorship_tier`](Self::add_sponsorship_tier).
    pub fn set_value(&mut self, field: FormField, value: Value) -> Result<(), CoreError> {
        match field {
            FormField::Title => assign(&mut self.title, field, value),
            FormField::Description => assign(&mut self.description, field, value),
            FormField::Category => assign(&mut self.category, field, value),
            FormField::Tags => assign(&mut self.tags, field, value),
            FormField::EventFormat => assign(&mut self.event_format, field, value),
            FormField::StartDate => assign(&mut self.start_date, field, value),
            FormField::StartTime => assign(&mut self.start_time, field, value),
            FormField::EndDate => assign(&mut self.end_date, field, value),
            FormField::EndTime => assign(&mut self.end_time, field, value),
            FormField::Timezone => assign(&mut self.timezone, field, value),
            FormField::VenueName => assign(&mut self.venue_name, field, value),
            FormField::Address => assign(&mut self.address, field, value),
            FormField::VirtualUrl => assign(&mut self.virtual_url, field, value),
            FormField::VirtualPlatform => assign(&mut self.virtual_platform, field, value),
            FormField::Capacity => assign(&mut self.capacity, field, value),
            FormField::IsFree => assign(&mut self.is_free, field, value),
            FormField::TicketPriceCents => assign(&mut self.ticket_price_cents, field, value),
            FormField::Currency => assign(&mut self.currency, field, value),
            FormField::EarlyBirdPriceCents => {
                assign(&mut self.early_bird_price_cents, field, value)
            }
            FormField::EarlyBirdDeadline => assign(&mut self.early_bird_deadline, field, value),
            FormField::RefundPolicy => assign(&mut self.refund_policy, field, value),
            FormField::CoverImageUrl => assign(&mut self.cover_image_url, field, value),
            FormField::GalleryUrls => assign(&mut self.gallery_urls, field, value),
            FormField::VideoUrl => assign(&mut self.video_url, field, value),
            FormField::Visibility => assign(&mut self.visibility, field, value),
            FormField::RequiresApproval => assign(&mut self.requires_approval, field, value),
            FormField::AllowWaitlist => assign(&mut self.allow_waitlist, field, value),
            FormField::Collaborators => {
                let mut incoming: Vec<Collaborator> = Vec::new();
                assign(&mut incoming, field, value)?;
                self.collaborators = normalize_collaborators(incoming)?;
                Ok(())
            }
            FormField::SponsorshipTiers => {
                let mut incoming: Vec<SponsorshipTier> = Vec::new();
                assign(&mut incoming, field, value)?;
                self.sponsorship_tiers = normalize_sponsorship_tiers(incoming)?;
                Ok(())
            }
            FormField::Metadata => assign(&mut self.metadata, field, value),
            FormField::AcceptTerms => assign(&mut self.accept_terms, field, value),
        }
    }

    // -----------------------------------------------------------------------
    // Collaborators
    // -----------------------------------------------------------------------

    /// Invite a collaborator. Returns the generated id.
    ///
    /// The email is trimmed and lowercased; invalid addresses and addresses
    /// already on the list are rejected.
    pub fn add_collaborator(
        &mut self,
        email: &str,
        name: &str,
        role: CollaboratorRole,
    ) -> Result<Uuid, CoreError> {
        let email = checked_email(email)?;
        if self.collaborators.iter().any(|c| c.email == email) {
            return Err(CoreError::Conflict(format!(
                "{email} is already a collaborator"
            )));
        }
        let id = Uuid::new_v4();
        self.collaborators.push(Collaborator {
            id,
            email,
            name: name.trim().to_string(),
            role,
        });
        Ok(id)
    }

    /// Remove a collaborator by id. Returns `true` if one was removed.
    pub fn remove_collaborator(&mut self, id: Uuid) -> bool {
        let before = self.collaborators.len();
        self.collaborators.retain(|c| c.id != id);
        self.collaborators.len() != before
    }

    // -----------------------------------------------------------------------
    // Sponsorship tiers
    // -----------------------------------------------------------------------

    /// Add a sponsorship tier. Returns the generated id.
    pub fn add_sponsorship_tier(
        &mut self,
        name: &str,
        price_cents: i64,
        benefits: Vec<String>,
        max_sponsors: Option<u32>,
    ) -> Result<Uuid, CoreError> {
        let name = checked_tier_name(name)?;
        if self
            .sponsorship_tiers
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(&name))
        {
            return Err(CoreError::Conflict(format!(
                "A sponsorship tier named '{name}' already exists"
            )));
        }
        let id = Uuid::new_v4();
        self.sponsorship_tiers.push(SponsorshipTier {
            id,
            name,
            price_cents,
            benefits,
            max_sponsors,
        });
        Ok(id)
    }

    /// Remove a sponsorship tier by id. Returns `true` if one was removed.
    pub fn remove_sponsorship_tier(&mut self, id: Uuid) -> bool {
        let before = self.sponsorship_tiers.len();
        self.sponsorship_tiers.retain(|t| t.id != id);
        self.sponsorship_tiers.len() != before
    }

    /// Check the collaborator and tier lists against the rules the
    /// mutators enforce. Used for values that did not come through them,
    /// such as a restored draft.
    pub fn check_nested(&self) -> Result<(), CoreError> {
        normalize_collaborators(self.collaborators.clone())?;
        normalize_sponsorship_tiers(self.sponsorship_tiers.clone())?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sample data
    // -----------------------------------------------------------------------

    /// A fully-populated form that satisfies every validation rule.
    ///
    /// Used by the "fill sample data" helper and by tests.
    pub fn sample() -> Self {
        Self {
            title: "Summer Rooftop Jazz Night".to_string(),
            description: "An evening of live jazz with local trios, small plates and a \
                          sunset view over the river."
                .to_string(),
            category: "Music".to_string(),
            tags: vec!["jazz".to_string(), "live-music".to_string()],
            event_format: EventFormat::Hybrid,
            start_date: NaiveDate::from_ymd_opt(2030, 7, 12),
            start_time: NaiveTime::from_hms_opt(19, 0, 0),
            end_date: NaiveDate::from_ymd_opt(2030, 7, 12),
            end_time: NaiveTime::from_hms_opt(23, 0, 0),
            timezone: "America/New_York".to_string(),
            venue_name: "The Skyline Terrace".to_string(),
            address: "120 River St, Hoboken, NJ".to_string(),
            virtual_url: "https://stream.example.com/jazz-night".to_string(),
            virtual_platform: "Livestream".to_string(),
            capacity: Some(150),
            is_free: false,
            ticket_price_cents: Some(4500),
            currency: DEFAULT_CURRENCY.to_string(),
            early_bird_price_cents: Some(3500),
            early_bird_deadline: NaiveDate::from_ymd_opt(2030, 6, 30),
            refund_policy: "Full refund up to 7 days before the event".to_string(),
            cover_image_url: "https://images.example.com/jazz-cover.jpg".to_string(),
            gallery_urls: vec!["https://images.example.com/jazz-1.jpg".to_string()],
            video_url: String::new(),
            visibility: Visibility::Public,
            requires_approval: false,
            allow_waitlist: true,
            collaborators: vec![Collaborator {
                id: Uuid::new_v4(),
                email: "host@example.com".to_string(),
                name: "Dana Host".to_string(),
                role: CollaboratorRole::CoHost,
            }],
            sponsorship_tiers: vec![SponsorshipTier {
                id: Uuid::new_v4(),
                name: "Gold".to_string(),
                price_cents: 50_000,
                benefits: vec!["Logo on stage banner".to_string()],
                max_sponsors: Some(3),
            }],
            metadata: serde_json::Map::new(),
            accept_terms: true,
        }
    }
}

/// Trimmed, lowercased email, or a validation error.
fn checked_email(email: &str) -> Result<String, CoreError> {
    let email = email.trim().to_lowercase();
    if !email.validate_email() {
        return Err(CoreError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(email)
}

fn checked_tier_name(name: &str) -> Result<String, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation(
            "Sponsorship tier name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn checked_id(id: Uuid, what: &str) -> Result<Uuid, CoreError> {
    if id.is_nil() {
        return Err(CoreError::Validation(format!("{what} is missing an id")));
    }
    Ok(id)
}

/// Normalize a whole collaborator list. Emails must be valid and unique,
/// ids must be set and unique.
fn normalize_collaborators(list: Vec<Collaborator>) -> Result<Vec<Collaborator>, CoreError> {
    let mut emails = HashSet::new();
    let mut ids = HashSet::new();
    list.into_iter()
        .map(|c| {
            let id = checked_id(c.id, "Collaborator")?;
            let email = checked_email(&c.email)?;
            if !ids.insert(id) {
                return Err(CoreError::Conflict(format!(
                    "Collaborator id {id} is listed more than once"
                )));
            }
            if !emails.insert(email.clone()) {
                return Err(CoreError::Conflict(format!(
                    "{email} is listed more than once"
                )));
            }
            Ok(Collaborator {
                id,
                email,
                name: c.name.trim().to_string(),
                role: c.role,
            })
        })
        .collect()
}

/// Normalize a whole tier list. Names must be non-empty and unique
/// (ignoring ASCII case), ids must be set and unique.
fn normalize_sponsorship_tiers(
    list: Vec<SponsorshipTier>,
) -> Result<Vec<SponsorshipTier>, CoreError> {
    let mut names = HashSet::new();
    let mut ids = HashSet::new();
    list.into_iter()
        .map(|t| {
            let id = checked_id(t.id, "Sponsorship tier")?;
            let name = checked_tier_name(&t.name)?;
            if !ids.insert(id) {
                return Err(CoreError::Conflict(format!(
                    "Sponsorship tier id {id} is listed more than once"
                )));
            }
            if !names.insert(name.to_ascii_lowercase()) {
                return Err(CoreError::Conflict(format!(
                    "A sponsorship tier named '{name}' already exists"
                )));
            }
            Ok(SponsorshipTier { id, name, ..t })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
