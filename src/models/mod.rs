use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod draft;

pub use draft::{DraftKey, DraftSnapshot};

/// Kind of property being listed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    #[default]
    Apartment,
    House,
    Villa,
    Studio,
    Land,
    Commercial,
    Office,
}

/// Listing tier shown on the marketplace
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingCategory {
    #[default]
    Standard,
    Premium,
    Luxury,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[default]
    Rent,
    Sale,
}

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// General information step
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralInfo {
    pub title: String,
    pub description: String,
    pub property_type: PropertyType,
    pub category: ListingCategory,
    pub bedrooms: u32,
    pub bathrooms: u32,
    /// Surface area in square meters
    pub surface_area: Option<f64>,
}

/// Location information for a property
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Location {
    pub city: String,
    pub district: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Pricing {
    /// Monthly rent or sale price, in whole currency units
    pub price: u64,
    pub transaction: TransactionType,
    pub deposit: Option<u64>,
    /// Day of month rent is due (rentals only)
    pub payment_day: Option<u8>,
    pub available_from: Option<NaiveDate>,
    pub available_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Contact {
    pub owner_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    Furnished,
    Parking,
    Elevator,
    Balcony,
    Garden,
    Pool,
    AirConditioning,
    Internet,
}

impl Amenity {
    pub const ALL: [Amenity; 8] = [
        Amenity::Furnished,
        Amenity::Parking,
        Amenity::Elevator,
        Amenity::Balcony,
        Amenity::Garden,
        Amenity::Pool,
        Amenity::AirConditioning,
        Amenity::Internet,
    ];
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Amenities {
    pub furnished: bool,
    pub parking: bool,
    pub elevator: bool,
    pub balcony: bool,
    pub garden: bool,
    pub pool: bool,
    pub air_conditioning: bool,
    pub internet: bool,
}

impl Amenities {
    fn slot(&mut self, amenity: Amenity) -> &mut bool {
        match amenity {
            Amenity::Furnished => &mut self.furnished,
            Amenity::Parking => &mut self.parking,
            Amenity::Elevator => &mut self.elevator,
            Amenity::Balcony => &mut self.balcony,
            Amenity::Garden => &mut self.garden,
            Amenity::Pool => &mut self.pool,
            Amenity::AirConditioning => &mut self.air_conditioning,
            Amenity::Internet => &mut self.internet,
        }
    }

    pub fn set(&mut self, amenity: Amenity, enabled: bool) {
        *self.slot(amenity) = enabled;
    }

    pub fn get(&self, amenity: Amenity) -> bool {
        match amenity {
            Amenity::Furnished => self.furnished,
            Amenity::Parking => self.parking,
            Amenity::Elevator => self.elevator,
            Amenity::Balcony => self.balcony,
            Amenity::Garden => self.garden,
            Amenity::Pool => self.pool,
            Amenity::AirConditioning => self.air_conditioning,
            Amenity::Internet => self.internet,
        }
    }
}

/// The record built by the submission wizard, minus images.
///
/// Images are owned by the image collection manager and never persisted,
/// so they are kept out of this type; it is what drafts serialize.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FormData {
    pub general: GeneralInfo,
    pub location: Location,
    pub pricing: Pricing,
    pub contact: Contact,
    pub amenities: Amenities,
}

/// Wizard step, in the fixed order the user walks them
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    General,
    Location,
    Photos,
    PricingContact,
    Review,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::General,
        Step::Location,
        Step::Photos,
        Step::PricingContact,
        Step::Review,
    ];

    pub const FIRST: Step = Step::General;
    pub const LAST: Step = Step::Review;

    pub fn index(self) -> usize {
        self as usize
    }

    /// Step at `index`, clamped to the last step
    pub fn from_index(index: usize) -> Step {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn next(self) -> Step {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(self) -> Step {
        Self::from_index(self.index().saturating_sub(1))
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::General => "General information",
            Step::Location => "Location",
            Step::Photos => "Photos",
            Step::PricingContact => "Pricing & contact",
            Step::Review => "Review",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title(), self.index())
    }
}

/// Whether the wizard creates a new listing or edits an existing one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { property_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_navigation_is_clamped() {
        assert_eq!(Step::General.prev(), Step::General);
        assert_eq!(Step::Review.next(), Step::Review);
        assert_eq!(Step::Location.next(), Step::Photos);
        assert_eq!(Step::from_index(42), Step::Review);
    }

    #[test]
    fn coordinates_range_check() {
        assert!(Coordinates::new(59.3145, 18.0736).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn amenity_flags_round_trip_through_setter() {
        let mut amenities = Amenities::default();
        amenities.set(Amenity::Balcony, true);
        assert!(amenities.get(Amenity::Balcony));
        assert!(!amenities.get(Amenity::Pool));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let data: FormData =
            serde_json::from_str(r#"{ "general": { "title": "Götgatan 120" } }"#).unwrap();
        assert_eq!(data.general.title, "Götgatan 120");
        assert_eq!(data.pricing.transaction, TransactionType::Rent);
        assert_eq!(data.location.coordinates, None);
    }
}
