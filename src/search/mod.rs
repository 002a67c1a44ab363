//! Declarative filters compiled to search engine queries.

mod compiler;
mod filter;
mod query;
pub mod syntax;

pub use compiler::{compile, compile_value, CompiledQuery};
pub use filter::{FilterExpression, SearchFilter};
pub use query::{SearchQuery, MULTI_FIELD_PROPERTY};
