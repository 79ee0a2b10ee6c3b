pub mod mock;
pub mod rest;
pub mod traits;
pub mod types;

pub use mock::MockBackend;
pub use rest::{NominatimGeocoder, RestBackend};
pub use traits::{Geocoder, ImageStorage, SubmissionService};
pub use types::{GeocodeQuery, PropertySubmission};
