pub mod cli;
pub mod enrich;
pub mod io;
pub mod knowledge_base;
pub mod model;
pub mod ops;
pub mod parse;
pub mod util;

pub use knowledge_base::{KbError, KnowledgeBase};
