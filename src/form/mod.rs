pub mod fields;
pub mod machine;
pub mod validation;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use fields::{Field, FieldErrorMap, FieldUpdate};
pub use machine::{FormEvent, FormStateMachine, PendingSubmission, SubmitStart};

/// The form as shared between the session and its autosave task.
/// The lock is never held across an `.await`.
pub type SharedForm = Arc<Mutex<FormStateMachine>>;

pub(crate) fn lock_form(form: &SharedForm) -> MutexGuard<'_, FormStateMachine> {
    form.lock().unwrap_or_else(PoisonError::into_inner)
}
