//! Declarative validation rule catalog.
//!
//! Each rule is bound to a [`StepKind`] and carries a pure predicate over
//! [`FormValues`]. Rules with an `applies_when` precondition pass whenever
//! the precondition is false, so inapplicable fields never block navigation.

use serde::Serialize;
use validator::{ValidateEmail, ValidateUrl};

use super::form::{FormField, FormValues, Visibility};
use super::steps::StepKind;

/// Minimum description length (in characters, after trimming).
pub const MIN_DESCRIPTION_CHARS: usize = 20;

/// Title length bounds (in characters, after trimming).
pub const MIN_TITLE_CHARS: usize = 3;
pub const MAX_TITLE_CHARS: usize = 100;

/// Grouping shown next to each rule in the progress checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Content,
    Schedule,
    Location,
    Pricing,
    Media,
    People,
    Legal,
}

/// A single declarative validation rule.
#[derive(Clone, Copy)]
pub struct ValidationRule {
    pub id: &'static str,
    pub label: &'static str,
    /// User-facing explanation, shown inline while the rule fails.
    pub description: &'static str,
    /// Required rules gate forward navigation past their step.
    pub required: bool,
    pub step: StepKind,
    pub category: RuleCategory,
    /// Fields the rule reads; failing rules attach their message to these.
    pub fields: &'static [FormField],
    pub applies_when: Option<fn(&FormValues) -> bool>,
    pub check: fn(&FormValues) -> bool,
}

impl std::fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationRule")
            .field("id", &self.id)
            .field("required", &self.required)
            .field("step", &self.step)
            .field("category", &self.category)
            .field("conditional", &self.applies_when.is_some())
            .finish()
    }
}

impl ValidationRule {
    /// Evaluate the rule. Inapplicable rules pass.
    pub fn passes(&self, values: &FormValues) -> bool {
        if let Some(applies) = self.applies_when {
            if !applies(values) {
                return true;
            }
        }
        (self.check)(values)
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

fn char_len(s: &str) -> usize {
    s.trim().chars().count()
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn is_url(s: &str) -> bool {
    s.trim().validate_url()
}

fn title_present(v: &FormValues) -> bool {
    !is_blank(&v.title)
}

fn title_length(v: &FormValues) -> bool {
    let n = char_len(&v.title);
    n == 0 || (MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&n)
}

fn description_length(v: &FormValues) -> bool {
    char_len(&v.description) >= MIN_DESCRIPTION_CHARS
}

fn category_selected(v: &FormValues) -> bool {
    !is_blank(&v.category)
}

fn tags_added(v: &FormValues) -> bool {
    v.tags.iter().any(|t| !is_blank(t))
}

fn start_date_set(v: &FormValues) -> bool {
    v.start_date.is_some()
}

fn has_end_date(v: &FormValues) -> bool {
    v.end_date.is_some()
}

fn end_after_start(v: &FormValues) -> bool {
    match (v.start_date, v.end_date) {
        (Some(start), Some(end)) if end == start => match (v.start_time, v.end_time) {
            (Some(st), Some(et)) => et > st,
            _ => true,
        },
        (Some(start), Some(end)) => end > start,
        // Without a start date the start_date_set rule reports the problem.
        _ => true,
    }
}

fn has_venue(v: &FormValues) -> bool {
    v.event_format.has_venue()
}

fn venue_set(v: &FormValues) -> bool {
    !is_blank(&v.venue_name) || !is_blank(&v.address)
}

fn has_virtual(v: &FormValues) -> bool {
    v.event_format.has_virtual()
}

fn virtual_url_valid(v: &FormValues) -> bool {
    is_url(&v.virtual_url)
}

fn timezone_set(v: &FormValues) -> bool {
    !is_blank(&v.timezone)
}

fn capacity_positive(v: &FormValues) -> bool {
    matches!(v.capacity, Some(n) if n > 0)
}

fn is_paid(v: &FormValues) -> bool {
    !v.is_free
}

fn price_set(v: &FormValues) -> bool {
    matches!(v.ticket_price_cents, Some(p) if p > 0)
}

fn has_early_bird(v: &FormValues) -> bool {
    !v.is_free && v.early_bird_price_cents.is_some()
}

fn early_bird_below_price(v: &FormValues) -> bool {
    match (v.early_bird_price_cents, v.ticket_price_cents) {
        (Some(early), Some(full)) => early > 0 && early < full,
        _ => false,
    }
}

fn currency_code(v: &FormValues) -> bool {
    v.currency.len() == 3 && v.currency.chars().all(|c| c.is_ascii_uppercase())
}

fn refund_policy_set(v: &FormValues) -> bool {
    v.is_free || !is_blank(&v.refund_policy)
}

fn cover_image_set(v: &FormValues) -> bool {
    !is_blank(&v.cover_image_url)
}

fn cover_image_url_valid(v: &FormValues) -> bool {
    is_url(&v.cover_image_url)
}

fn gallery_urls_valid(v: &FormValues) -> bool {
    v.gallery_urls.iter().all(|u| is_url(u))
}

fn has_video(v: &FormValues) -> bool {
    !is_blank(&v.video_url)
}

fn video_url_valid(v: &FormValues) -> bool {
    is_url(&v.video_url)
}

fn collaborator_emails_valid(v: &FormValues) -> bool {
    v.collaborators.iter().all(|c| c.email.validate_email())
}

fn has_tiers(v: &FormValues) -> bool {
    !v.sponsorship_tiers.is_empty()
}

fn sponsorship_tiers_priced(v: &FormValues) -> bool {
    v.sponsorship_tiers
        .iter()
        .all(|t| !is_blank(&t.name) && t.price_cents > 0)
}

fn is_private(v: &FormValues) -> bool {
    v.visibility == Visibility::Private
}

fn private_requires_approval(v: &FormValues) -> bool {
    v.requires_approval
}

fn terms_accepted(v: &FormValues) -> bool {
    v.accept_terms
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Every validation rule of the event-creation wizard.
pub const RULES: &[ValidationRule] = &[
    // -- Basics --
    ValidationRule {
        id: "title_present",
        label: "Event title",
        description: "Give your event a title",
        required: true,
        step: StepKind::Basics,
        category: RuleCategory::Content,
        fields: &[FormField::Title],
        applies_when: None,
        check: title_present,
    },
    ValidationRule {
        id: "title_length",
        label: "Title length",
        description: "Titles must be between 3 and 100 characters",
        required: true,
        step: StepKind::Basics,
        category: RuleCategory::Content,
        fields: &[FormField::Title],
        applies_when: None,
        check: title_length,
    },
    ValidationRule {
        id: "description_length",
        label: "Description",
        description: "Describe your event in at least 20 characters",
        required: true,
        step: StepKind::Basics,
        category: RuleCategory::Content,
        fields: &[FormField::Description],
        applies_when: None,
        check: description_length,
    },
    ValidationRule {
        id: "category_selected",
        label: "Category",
        description: "Pick a category so attendees can find your event",
        required: true,
        step: StepKind::Basics,
        category: RuleCategory::Content,
        fields: &[FormField::Category],
        applies_when: None,
        check: category_selected,
    },
    ValidationRule {
        id: "tags_added",
        label: "Tags",
        description: "Add at least one tag to improve discovery",
        required: false,
        step: StepKind::Basics,
        category: RuleCategory::Content,
        fields: &[FormField::Tags],
        applies_when: None,
        check: tags_added,
    },
    // -- Schedule --
    ValidationRule {
        id: "start_date_set",
        label: "Start date",
        description: "Choose when your event starts",
        required: true,
        step: StepKind::Schedule,
        category: RuleCategory::Schedule,
        fields: &[FormField::StartDate],
        applies_when: None,
        check: start_date_set,
    },
    ValidationRule {
        id: "end_after_start",
        label: "End after start",
        description: "The event must end after it starts",
        required: true,
        step: StepKind::Schedule,
        category: RuleCategory::Schedule,
        fields: &[FormField::EndDate, FormField::EndTime],
        applies_when: Some(has_end_date),
        check: end_after_start,
    },
    ValidationRule {
        id: "venue_set",
        label: "Venue",
        description: "In-person and hybrid events need a venue or address",
        required: true,
        step: StepKind::Schedule,
        category: RuleCategory::Location,
        fields: &[FormField::VenueName, FormField::Address],
        applies_when: Some(has_venue),
        check: venue_set,
    },
    ValidationRule {
        id: "virtual_url_valid",
        label: "Virtual event link",
        description: "Virtual and hybrid events need a valid meeting or stream URL",
        required: true,
        step: StepKind::Schedule,
        category: RuleCategory::Location,
        fields: &[FormField::VirtualUrl],
        applies_when: Some(has_virtual),
        check: virtual_url_valid,
    },
    ValidationRule {
        id: "timezone_set",
        label: "Timezone",
        description: "Set a timezone so attendees see the right local time",
        required: false,
        step: StepKind::Schedule,
        category: RuleCategory::Schedule,
        fields: &[FormField::Timezone],
        applies_when: None,
        check: timezone_set,
    },
    // -- Tickets --
    ValidationRule {
        id: "capacity_positive",
        label: "Capacity",
        description: "Set how many attendees can join",
        required: true,
        step: StepKind::Tickets,
        category: RuleCategory::Pricing,
        fields: &[FormField::Capacity],
        applies_when: None,
        check: capacity_positive,
    },
    ValidationRule {
        id: "price_set",
        label: "Ticket price",
        description: "Paid events need a ticket price above zero",
        required: true,
        step: StepKind::Tickets,
        category: RuleCategory::Pricing,
        fields: &[FormField::TicketPriceCents],
        applies_when: Some(is_paid),
        check: price_set,
    },
    ValidationRule {
        id: "early_bird_below_price",
        label: "Early-bird price",
        description: "Early-bird tickets must cost less than regular tickets",
        required: true,
        step: StepKind::Tickets,
        category: RuleCategory::Pricing,
        fields: &[FormField::EarlyBirdPriceCents],
        applies_when: Some(has_early_bird),
        check: early_bird_below_price,
    },
    ValidationRule {
        id: "currency_code",
        label: "Currency",
        description: "Use a three-letter currency code such as USD",
        required: true,
        step: StepKind::Tickets,
        category: RuleCategory::Pricing,
        fields: &[FormField::Currency],
        applies_when: Some(is_paid),
        check: currency_code,
    },
    ValidationRule {
        id: "refund_policy_set",
        label: "Refund policy",
        description: "Let attendees know your refund policy",
        required: false,
        step: StepKind::Tickets,
        category: RuleCategory::Legal,
        fields: &[FormField::RefundPolicy],
        applies_when: None,
        check: refund_policy_set,
    },
    // -- Media --
    ValidationRule {
        id: "cover_image_set",
        label: "Cover image",
        description: "Events with a cover image get more views",
        required: false,
        step: StepKind::Media,
        category: RuleCategory::Media,
        fields: &[FormField::CoverImageUrl],
        applies_when: None,
        check: cover_image_set,
    },
    ValidationRule {
        id: "cover_image_url_valid",
        label: "Cover image link",
        description: "The cover image must be a valid URL",
        required: true,
        step: StepKind::Media,
        category: RuleCategory::Media,
        fields: &[FormField::CoverImageUrl],
        applies_when: Some(cover_image_set),
        check: cover_image_url_valid,
    },
    ValidationRule {
        id: "gallery_urls_valid",
        label: "Gallery links",
        description: "Every gallery image must be a valid URL",
        required: true,
        step: StepKind::Media,
        category: RuleCategory::Media,
        fields: &[FormField::GalleryUrls],
        applies_when: None,
        check: gallery_urls_valid,
    },
    ValidationRule {
        id: "video_url_valid",
        label: "Promo video link",
        description: "The promo video must be a valid URL",
        required: true,
        step: StepKind::Media,
        category: RuleCategory::Media,
        fields: &[FormField::VideoUrl],
        applies_when: Some(has_video),
        check: video_url_valid,
    },
    // -- Team --
    ValidationRule {
        id: "collaborator_emails_valid",
        label: "Collaborator emails",
        description: "Every collaborator needs a valid email address",
        required: true,
        step: StepKind::Team,
        category: RuleCategory::People,
        fields: &[FormField::Collaborators],
        applies_when: None,
        check: collaborator_emails_valid,
    },
    ValidationRule {
        id: "sponsorship_tiers_priced",
        label: "Sponsorship tiers",
        description: "Each sponsorship tier needs a name and a price above zero",
        required: true,
        step: StepKind::Team,
        category: RuleCategory::Pricing,
        fields: &[FormField::SponsorshipTiers],
        applies_when: Some(has_tiers),
        check: sponsorship_tiers_priced,
    },
    ValidationRule {
        id: "private_requires_approval",
        label: "Approval for private events",
        description: "Private events usually require organizer approval to join",
        required: false,
        step: StepKind::Team,
        category: RuleCategory::People,
        fields: &[FormField::RequiresApproval],
        applies_when: Some(is_private),
        check: private_requires_approval,
    },
    // -- Review --
    ValidationRule {
        id: "terms_accepted",
        label: "Organizer terms",
        description: "Accept the organizer terms to publish",
        required: true,
        step: StepKind::Review,
        category: RuleCategory::Legal,
        fields: &[FormField::AcceptTerms],
        applies_when: None,
        check: terms_accepted,
    },
];

/// Look up a rule by id.
pub fn find_rule(id: &str) -> Option<&'static ValidationRule> {
    RULES.iter().find(|r| r.id == id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::form::EventFormat;
    use chrono::{NaiveDate, NaiveTime};

    fn rule(id: &str) -> &'static ValidationRule {
        find_rule(id).unwrap_or_else(|| panic!("rule {id} missing"))
    }

    #[test]
    fn rule_ids_are_unique() {
        let mut ids: Vec<&str> = RULES.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), RULES.len());
    }

    #[test]
    fn every_rule_names_at_least_one_field() {
        for r in RULES {
            assert!(!r.fields.is_empty(), "{} has no fields", r.id);
        }
    }

    #[test]
    fn sample_passes_every_rule() {
        let sample = FormValues::sample();
        for r in RULES {
            assert!(r.passes(&sample), "sample fails {}", r.id);
        }
    }

    #[test]
    fn empty_title_fails_presence_but_not_length() {
        let form = FormValues::default();
        assert!(!rule("title_present").passes(&form));
        assert!(rule("title_length").passes(&form));
    }

    #[test]
    fn title_length_bounds() {
        let mut form = FormValues::default();
        form.title = "ab".to_string();
        assert!(!rule("title_length").passes(&form));
        form.title = "abc".to_string();
        assert!(rule("title_length").passes(&form));
        form.title = "x".repeat(101);
        assert!(!rule("title_length").passes(&form));
    }

    #[test]
    fn description_needs_twenty_trimmed_chars() {
        let mut form = FormValues::default();
        form.description = format!("   {}   ", "a".repeat(19));
        assert!(!rule("description_length").passes(&form));
        form.description = "a".repeat(20);
        assert!(rule("description_length").passes(&form));
    }

    #[test]
    fn virtual_rule_passes_for_in_person_regardless_of_url() {
        let mut form = FormValues::default();
        form.event_format = EventFormat::InPerson;
        form.virtual_url = String::new();
        assert!(rule("virtual_url_valid").passes(&form));
        form.virtual_url = "not a url".to_string();
        assert!(rule("virtual_url_valid").passes(&form));
    }

    #[test]
    fn virtual_rule_applies_to_virtual_and_hybrid() {
        for format in [EventFormat::Virtual, EventFormat::Hybrid] {
            let mut form = FormValues::default();
            form.event_format = format;
            assert!(!rule("virtual_url_valid").passes(&form));
            form.virtual_url = "https://meet.example.com/abc".to_string();
            assert!(rule("virtual_url_valid").passes(&form));
        }
    }

    #[test]
    fn venue_rule_skipped_for_virtual_events() {
        let mut form = FormValues::default();
        form.event_format = EventFormat::Virtual;
        assert!(rule("venue_set").passes(&form));
        form.event_format = EventFormat::InPerson;
        assert!(!rule("venue_set").passes(&form));
        form.address = "1 Main St".to_string();
        assert!(rule("venue_set").passes(&form));
    }

    #[test]
    fn end_after_start_same_day_compares_times() {
        let mut form = FormValues::default();
        let day = NaiveDate::from_ymd_opt(2030, 1, 1);
        form.start_date = day;
        form.end_date = day;
        form.start_time = NaiveTime::from_hms_opt(18, 0, 0);
        form.end_time = NaiveTime::from_hms_opt(17, 0, 0);
        assert!(!rule("end_after_start").passes(&form));
        form.end_time = NaiveTime::from_hms_opt(21, 0, 0);
        assert!(rule("end_after_start").passes(&form));
    }

    #[test]
    fn end_before_start_date_fails() {
        let mut form = FormValues::default();
        form.start_date = NaiveDate::from_ymd_opt(2030, 1, 2);
        form.end_date = NaiveDate::from_ymd_opt(2030, 1, 1);
        assert!(!rule("end_after_start").passes(&form));
    }

    #[test]
    fn free_events_skip_price_rules() {
        let mut form = FormValues::default();
        form.is_free = true;
        form.currency = "dollars".to_string();
        form.early_bird_price_cents = Some(9999);
        assert!(rule("price_set").passes(&form));
        assert!(rule("currency_code").passes(&form));
        assert!(rule("early_bird_below_price").passes(&form));
    }

    #[test]
    fn early_bird_must_undercut_regular_price() {
        let mut form = FormValues::default();
        form.ticket_price_cents = Some(2000);
        form.early_bird_price_cents = Some(2000);
        assert!(!rule("early_bird_below_price").passes(&form));
        form.early_bird_price_cents = Some(1500);
        assert!(rule("early_bird_below_price").passes(&form));
    }

    #[test]
    fn currency_code_shape() {
        let mut form = FormValues::default();
        assert!(rule("currency_code").passes(&form));
        form.currency = "usd".to_string();
        assert!(!rule("currency_code").passes(&form));
        form.currency = "EURO".to_string();
        assert!(!rule("currency_code").passes(&form));
    }

    #[test]
    fn gallery_rule_rejects_bad_links() {
        let mut form = FormValues::default();
        assert!(rule("gallery_urls_valid").passes(&form));
        form.gallery_urls = vec!["https://ok.example.com/a.png".into(), "nope".into()];
        assert!(!rule("gallery_urls_valid").passes(&form));
    }

    #[test]
    fn sponsorship_rule_requires_positive_prices() {
        let mut form = FormValues::default();
        assert!(rule("sponsorship_tiers_priced").passes(&form));
        form.add_sponsorship_tier("Bronze", 0, vec![], None).unwrap();
        assert!(!rule("sponsorship_tiers_priced").passes(&form));
    }

    #[test]
    fn private_approval_rule_is_optional_and_conditional() {
        let r = rule("private_requires_approval");
        assert!(!r.required);
        let mut form = FormValues::default();
        assert!(r.passes(&form));
        form.visibility = Visibility::Private;
        assert!(!r.passes(&form));
    }
}
