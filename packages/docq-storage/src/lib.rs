//! Named-collection operations against a document database.

pub mod filter;
pub mod memory;
pub mod mongo;

mod error;

pub use error::Error;
pub use memory::MemoryStore;
pub use mongo::MongoStore;

use std::{future::Future, pin::Pin};

use serde_json::{Map, Value};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One document as it crosses the store boundary. Native identifiers are already plain strings.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct UpdateCounts {
	pub matched: u64,
	pub modified: u64,
}

pub trait DocumentStore
where
	Self: Send + Sync,
{
	fn list_collection_names(&self) -> BoxFuture<'_, Result<Vec<String>>>;

	/// An arbitrary record from `collection`, if it holds any.
	fn find_one<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Option<Record>>>;

	fn find<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Record,
	) -> BoxFuture<'a, Result<Vec<Record>>>;

	/// Returns the identifier of the stored record.
	fn insert_one<'a>(&'a self, collection: &'a str, record: &'a Record)
	-> BoxFuture<'a, Result<String>>;

	/// Returns identifiers in input order.
	fn insert_many<'a>(
		&'a self,
		collection: &'a str,
		records: &'a [Record],
	) -> BoxFuture<'a, Result<Vec<String>>>;

	/// Sets `set_fields` on every record matching `filter`.
	fn update_many<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Record,
		set_fields: &'a Record,
	) -> BoxFuture<'a, Result<UpdateCounts>>;

	/// Removes every record matching `filter` and returns how many were removed.
	fn delete_many<'a>(&'a self, collection: &'a str, filter: &'a Record)
	-> BoxFuture<'a, Result<u64>>;

	/// Releases the underlying connection. Later calls may fail.
	fn close(&self) -> BoxFuture<'_, ()> {
		Box::pin(async {})
	}
}
