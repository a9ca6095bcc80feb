//! The Schema Source Client: maps fully-qualified table names to
//! `{column_name: datatype}` via `DESCRIBE` statements against the SQL
//! execution engine's query endpoint. Failures are non-fatal.

pub mod client;
pub mod describe;
pub mod error;

pub use client::{SchemaSourceConfig, SchemaSourceTransport};
pub use describe::{describe, TableSchema};
pub use error::SchemaSourceError;
