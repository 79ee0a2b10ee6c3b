//! Multi-step property submission wizard: form state machine, debounced
//! draft autosave with resume/discard on reload, and an ordered photo
//! collection with a main image.

pub mod config;
pub mod draft;
pub mod form;
pub mod images;
pub mod models;
pub mod services;
pub mod session;

pub use config::{BackendConfig, WizardConfig};
pub use form::{Field, FieldErrorMap, FieldUpdate, FormEvent, FormStateMachine};
pub use images::{ImageCollectionManager, ImageFile};
pub use models::{FormData, FormMode, Step};
pub use session::{
    Collaborators, LocateOutcome, PendingDraft, PropertyFormSession, SessionStart, SubmitError,
    SubmitOutcome,
};
