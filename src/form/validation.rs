//! Validation rules for the submission wizard.
//!
//! Every rule is a pure function of a value (and sometimes a sibling
//! value) returning `Err(message)` on failure. Rules are grouped by step so
//! a step gate never reports errors for fields the user has not reached.

use chrono::NaiveDate;

use super::fields::{Field, FieldErrorMap};
use crate::models::{FormData, Step, TransactionType};

pub const TITLE_MIN_LEN: usize = 5;
pub const TITLE_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 2000;
pub const ADDRESS_MIN_LEN: usize = 5;
pub const OWNER_NAME_MIN_LEN: usize = 2;
pub const MAX_ROOM_COUNT: u32 = 50;
pub const MIN_IMAGES: usize = 1;
pub const PAYMENT_DAY_RANGE: (u32, u32) = (1, 28);

pub type RuleResult = Result<(), String>;

pub fn required(value: &str, label: &str) -> RuleResult {
    if value.trim().is_empty() {
        Err(format!("{label} is required"))
    } else {
        Ok(())
    }
}

pub fn min_length(value: &str, min: usize, label: &str) -> RuleResult {
    if value.trim().chars().count() < min {
        Err(format!("{label} must be at least {min} characters"))
    } else {
        Ok(())
    }
}

pub fn max_length(value: &str, max: usize, label: &str) -> RuleResult {
    if value.trim().chars().count() > max {
        Err(format!("{label} must be at most {max} characters"))
    } else {
        Ok(())
    }
}

pub fn positive(value: f64, label: &str) -> RuleResult {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{label} must be greater than zero"))
    }
}

pub fn in_range(value: u32, min: u32, max: u32, label: &str) -> RuleResult {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(format!("{label} must be between {min} and {max}"))
    }
}

/// End must not precede start. Either side missing passes.
pub fn date_order(start: Option<NaiveDate>, end: Option<NaiveDate>) -> RuleResult {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err("End date cannot be before the start date".to_string())
        }
        _ => Ok(()),
    }
}

pub fn email_shape(value: &str) -> RuleResult {
    let value = value.trim();
    let invalid = || Err("Enter a valid email address".to_string());
    if value.chars().any(char::is_whitespace) {
        return invalid();
    }
    let Some((local, domain)) = value.split_once('@') else {
        return invalid();
    };
    if local.is_empty() || domain.contains('@') {
        return invalid();
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && tld.len() >= 2 => Ok(()),
        _ => invalid(),
    }
}

/// Digits with optional leading `+` and separators; 8 to 15 digits
pub fn phone_shape(value: &str) -> RuleResult {
    let value = value.trim();
    let body = value.strip_prefix('+').unwrap_or(value);
    let allowed = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '.'));
    let digits = body.chars().filter(char::is_ascii_digit).count();
    if allowed && (8..=15).contains(&digits) {
        Ok(())
    } else {
        Err("Enter a valid phone number".to_string())
    }
}

/// Fields checked by the gate of `step`
pub fn fields_for(step: Step) -> &'static [Field] {
    match step {
        Step::General => &[
            Field::Title,
            Field::Description,
            Field::Bedrooms,
            Field::Bathrooms,
            Field::SurfaceArea,
        ],
        Step::Location => &[Field::City, Field::Address, Field::Coordinates],
        Step::Photos => &[Field::Images],
        Step::PricingContact => &[
            Field::Price,
            Field::PaymentDay,
            Field::AvailableUntil,
            Field::OwnerName,
            Field::Email,
            Field::Phone,
        ],
        Step::Review => &[],
    }
}

/// Run the rules registered for one field
pub fn check_field(field: Field, data: &FormData, image_count: usize) -> RuleResult {
    let general = &data.general;
    let location = &data.location;
    let pricing = &data.pricing;
    let contact = &data.contact;

    match field {
        Field::Title => required(&general.title, "Title")
            .and_then(|_| min_length(&general.title, TITLE_MIN_LEN, "Title"))
            .and_then(|_| max_length(&general.title, TITLE_MAX_LEN, "Title")),
        Field::Description => max_length(&general.description, DESCRIPTION_MAX_LEN, "Description"),
        Field::Bedrooms => in_range(general.bedrooms, 0, MAX_ROOM_COUNT, "Bedrooms"),
        Field::Bathrooms => in_range(general.bathrooms, 0, MAX_ROOM_COUNT, "Bathrooms"),
        Field::SurfaceArea => match general.surface_area {
            Some(area) => positive(area, "Surface area"),
            None => Ok(()),
        },
        Field::City => required(&location.city, "City"),
        Field::Address => required(&location.address, "Address")
            .and_then(|_| min_length(&location.address, ADDRESS_MIN_LEN, "Address")),
        Field::Coordinates => match location.coordinates {
            Some(coords) if !coords.is_valid() => Err("Coordinates are out of range".to_string()),
            _ => Ok(()),
        },
        Field::Images => {
            if image_count < MIN_IMAGES {
                Err("Add at least one photo".to_string())
            } else {
                Ok(())
            }
        }
        Field::Price => positive(pricing.price as f64, "Price"),
        Field::PaymentDay => match (pricing.transaction, pricing.payment_day) {
            (TransactionType::Rent, Some(day)) => in_range(
                u32::from(day),
                PAYMENT_DAY_RANGE.0,
                PAYMENT_DAY_RANGE.1,
                "Payment day",
            ),
            _ => Ok(()),
        },
        Field::AvailableUntil => date_order(pricing.available_from, pricing.available_until),
        Field::OwnerName => required(&contact.owner_name, "Owner name")
            .and_then(|_| min_length(&contact.owner_name, OWNER_NAME_MIN_LEN, "Owner name")),
        Field::Email => required(&contact.email, "Email").and_then(|_| email_shape(&contact.email)),
        Field::Phone => required(&contact.phone, "Phone").and_then(|_| phone_shape(&contact.phone)),
        Field::PropertyType
        | Field::Category
        | Field::District
        | Field::Transaction
        | Field::Deposit
        | Field::AvailableFrom
        | Field::Amenities => Ok(()),
    }
}

/// Errors for the fields of `step` only
pub fn validate_step(step: Step, data: &FormData, image_count: usize) -> FieldErrorMap {
    let mut errors = FieldErrorMap::new();
    for &field in fields_for(step) {
        if let Err(message) = check_field(field, data, image_count) {
            errors.insert(field, message);
        }
    }
    errors
}

pub fn validate_all(data: &FormData, image_count: usize) -> FieldErrorMap {
    let mut errors = FieldErrorMap::new();
    for step in Step::ALL {
        errors.extend(validate_step(step, data, image_count));
    }
    errors
}
