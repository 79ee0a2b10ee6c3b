use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{
    Amenity, Coordinates, FormData, ListingCategory, PropertyType, Step, TransactionType,
};

/// Every field the wizard collects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Description,
    PropertyType,
    Category,
    Bedrooms,
    Bathrooms,
    SurfaceArea,
    City,
    District,
    Address,
    Coordinates,
    Images,
    Price,
    Transaction,
    Deposit,
    PaymentDay,
    AvailableFrom,
    AvailableUntil,
    OwnerName,
    Email,
    Phone,
    Amenities,
}

impl Field {
    /// The step whose gate checks this field
    pub fn step(self) -> Step {
        match self {
            Field::Title
            | Field::Description
            | Field::PropertyType
            | Field::Category
            | Field::Bedrooms
            | Field::Bathrooms
            | Field::SurfaceArea => Step::General,
            Field::City | Field::District | Field::Address | Field::Coordinates => Step::Location,
            Field::Images => Step::Photos,
            Field::Price
            | Field::Transaction
            | Field::Deposit
            | Field::PaymentDay
            | Field::AvailableFrom
            | Field::AvailableUntil
            | Field::OwnerName
            | Field::Email
            | Field::Phone
            | Field::Amenities => Step::PricingContact,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::PropertyType => "property_type",
            Field::Category => "category",
            Field::Bedrooms => "bedrooms",
            Field::Bathrooms => "bathrooms",
            Field::SurfaceArea => "surface_area",
            Field::City => "city",
            Field::District => "district",
            Field::Address => "address",
            Field::Coordinates => "coordinates",
            Field::Images => "images",
            Field::Price => "price",
            Field::Transaction => "transaction",
            Field::Deposit => "deposit",
            Field::PaymentDay => "payment_day",
            Field::AvailableFrom => "available_from",
            Field::AvailableUntil => "available_until",
            Field::OwnerName => "owner_name",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Amenities => "amenities",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A new value for one field. The variant fixes the value's type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Title(String),
    Description(String),
    PropertyType(PropertyType),
    Category(ListingCategory),
    Bedrooms(u32),
    Bathrooms(u32),
    SurfaceArea(Option<f64>),
    City(String),
    District(String),
    Address(String),
    Coordinates(Option<Coordinates>),
    Price(u64),
    Transaction(TransactionType),
    Deposit(Option<u64>),
    PaymentDay(Option<u8>),
    AvailableFrom(Option<NaiveDate>),
    AvailableUntil(Option<NaiveDate>),
    OwnerName(String),
    Email(String),
    Phone(String),
    Amenity(Amenity, bool),
}

impl FieldUpdate {
    pub fn field(&self) -> Field {
        match self {
            FieldUpdate::Title(_) => Field::Title,
            FieldUpdate::Description(_) => Field::Description,
            FieldUpdate::PropertyType(_) => Field::PropertyType,
            FieldUpdate::Category(_) => Field::Category,
            FieldUpdate::Bedrooms(_) => Field::Bedrooms,
            FieldUpdate::Bathrooms(_) => Field::Bathrooms,
            FieldUpdate::SurfaceArea(_) => Field::SurfaceArea,
            FieldUpdate::City(_) => Field::City,
            FieldUpdate::District(_) => Field::District,
            FieldUpdate::Address(_) => Field::Address,
            FieldUpdate::Coordinates(_) => Field::Coordinates,
            FieldUpdate::Price(_) => Field::Price,
            FieldUpdate::Transaction(_) => Field::Transaction,
            FieldUpdate::Deposit(_) => Field::Deposit,
            FieldUpdate::PaymentDay(_) => Field::PaymentDay,
            FieldUpdate::AvailableFrom(_) => Field::AvailableFrom,
            FieldUpdate::AvailableUntil(_) => Field::AvailableUntil,
            FieldUpdate::OwnerName(_) => Field::OwnerName,
            FieldUpdate::Email(_) => Field::Email,
            FieldUpdate::Phone(_) => Field::Phone,
            FieldUpdate::Amenity(..) => Field::Amenities,
        }
    }

    pub(crate) fn apply(self, data: &mut FormData) {
        match self {
            FieldUpdate::Title(v) => data.general.title = v,
            FieldUpdate::Description(v) => data.general.description = v,
            FieldUpdate::PropertyType(v) => data.general.property_type = v,
            FieldUpdate::Category(v) => data.general.category = v,
            FieldUpdate::Bedrooms(v) => data.general.bedrooms = v,
            FieldUpdate::Bathrooms(v) => data.general.bathrooms = v,
            FieldUpdate::SurfaceArea(v) => data.general.surface_area = v,
            FieldUpdate::City(v) => data.location.city = v,
            FieldUpdate::District(v) => data.location.district = v,
            FieldUpdate::Address(v) => data.location.address = v,
            FieldUpdate::Coordinates(v) => data.location.coordinates = v,
            FieldUpdate::Price(v) => data.pricing.price = v,
            FieldUpdate::Transaction(v) => data.pricing.transaction = v,
            FieldUpdate::Deposit(v) => data.pricing.deposit = v,
            FieldUpdate::PaymentDay(v) => data.pricing.payment_day = v,
            FieldUpdate::AvailableFrom(v) => data.pricing.available_from = v,
            FieldUpdate::AvailableUntil(v) => data.pricing.available_until = v,
            FieldUpdate::OwnerName(v) => data.contact.owner_name = v,
            FieldUpdate::Email(v) => data.contact.email = v,
            FieldUpdate::Phone(v) => data.contact.phone = v,
            FieldUpdate::Amenity(amenity, enabled) => data.amenities.set(amenity, enabled),
        }
    }
}

/// Field name to message. A missing key means valid or not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrorMap(BTreeMap<Field, String>);

impl FieldErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn remove(&mut self, field: Field) -> Option<String> {
        self.0.remove(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// Replace every entry belonging to `step` with the ones in `fresh`
    pub fn replace_step(&mut self, step: Step, fresh: FieldErrorMap) {
        self.0.retain(|field, _| field.step() != step);
        self.0.extend(fresh.0);
    }

    pub fn extend(&mut self, other: FieldErrorMap) {
        self.0.extend(other.0);
    }

    /// First step holding at least one error
    pub fn first_step(&self) -> Option<Step> {
        self.0.keys().map(|field| field.step()).min()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Display for FieldErrorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_writes_into_the_matching_group() {
        let mut data = FormData::default();
        FieldUpdate::City("Stockholm".into()).apply(&mut data);
        FieldUpdate::Amenity(Amenity::Elevator, true).apply(&mut data);
        FieldUpdate::Price(5_195_000).apply(&mut data);

        assert_eq!(data.location.city, "Stockholm");
        assert!(data.amenities.elevator);
        assert_eq!(data.pricing.price, 5_195_000);
        assert_eq!(FieldUpdate::Amenity(Amenity::Pool, false).field(), Field::Amenities);
    }

    #[test]
    fn replace_step_leaves_other_steps_alone() {
        let mut errors = FieldErrorMap::new();
        errors.insert(Field::Title, "Title is required");
        errors.insert(Field::City, "City is required");

        let mut fresh = FieldErrorMap::new();
        fresh.insert(Field::Address, "Address is required");
        errors.replace_step(Step::Location, fresh);

        assert!(errors.contains(Field::Title));
        assert!(!errors.contains(Field::City));
        assert!(errors.contains(Field::Address));
        assert_eq!(errors.first_step(), Some(Step::General));
    }
}
