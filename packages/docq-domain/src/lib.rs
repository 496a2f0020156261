//! Request-to-query translation logic with no I/O.
//!
//! The agent wires these pieces together: a [`schema::SchemaMap`] learned from the database feeds
//! [`matcher`] and [`prompt`], the completion text goes through [`extract`], and the resulting
//! descriptor is checked by [`query::validate`] before anything touches the database.

pub mod conversation;
pub mod extract;
pub mod matcher;
pub mod prompt;
pub mod query;
pub mod schema;

pub use conversation::{ChatMessage, Conversation, Role};
pub use extract::ExtractError;
pub use query::{OperationKind, QueryDescriptor, ValidatedOperation, ValidatedQuery, ValidationError};
pub use schema::SchemaMap;
