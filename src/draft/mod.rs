pub mod autosave;
pub mod debounce;
pub mod resolver;
pub mod store;

pub use autosave::{AutosavePersistence, SaveStatus};
pub use debounce::Debouncer;
pub use resolver::{DraftConflictResolver, DraftInspection};
pub use store::{DraftStore, FileDraftStore, MemoryDraftStore, StoreError};
