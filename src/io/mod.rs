pub mod atomic;
pub mod config_io;
pub mod lock;
pub mod side_store;
pub mod store;
pub mod vocab;

pub use side_store::{SideFileError, SideFileKind, SideStore};
pub use store::{DeleteOutcome, PendingPrepend, Store, StoreError};
pub use vocab::{VocabKind, Vocabulary};
