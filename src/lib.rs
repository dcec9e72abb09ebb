pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;

pub use error::{ExtractError, Result};
pub use extract::{ExtractSummary, SchemaExtractor};
