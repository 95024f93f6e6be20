pub mod config;
pub mod entry;
pub mod field;

pub use config::*;
pub use entry::*;
pub use field::*;
