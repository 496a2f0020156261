//! In-process store for tests and demos.

use std::{
	collections::BTreeMap,
	future,
	sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde_json::Value;
use uuid::Uuid;

use crate::{BoxFuture, DocumentStore, Error, Record, Result, UpdateCounts, filter};

/// Collections of records held in memory. Records without an `_id` receive a generated string
/// identifier on insert.
#[derive(Debug, Default)]
pub struct MemoryStore {
	collections: RwLock<BTreeMap<String, Vec<Record>>>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates `collection` without adding records. Existing records are kept.
	pub fn create_collection(&self, collection: &str) {
		self.write().entry(collection.to_string()).or_default();
	}

	/// Inserts records directly, bypassing the async boundary. Returns their identifiers.
	pub fn seed<I>(&self, collection: &str, records: I) -> Result<Vec<String>>
	where
		I: IntoIterator<Item = Record>,
	{
		let mut collections = self.write();
		let stored = collections.entry(collection.to_string()).or_default();

		records.into_iter().map(|record| insert_record(stored, record)).collect()
	}

	/// A copy of every record in `collection`, in insertion order.
	pub fn snapshot(&self, collection: &str) -> Vec<Record> {
		self.read().get(collection).cloned().unwrap_or_default()
	}

	fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Vec<Record>>> {
		self.collections.read().unwrap_or_else(|err| err.into_inner())
	}

	fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Vec<Record>>> {
		self.collections.write().unwrap_or_else(|err| err.into_inner())
	}

	fn find_sync(&self, collection: &str, filter: &Record) -> Result<Vec<Record>> {
		let collections = self.read();
		let Some(records) = collections.get(collection) else {
			return Ok(Vec::new());
		};
		let mut found = Vec::new();

		for record in records {
			if filter::matches(record, filter)? {
				found.push(record.clone());
			}
		}

		Ok(found)
	}

	fn update_sync(
		&self,
		collection: &str,
		filter: &Record,
		set_fields: &Record,
	) -> Result<UpdateCounts> {
		if set_fields.contains_key("_id") {
			return Err(Error::InvalidArgument("The _id field cannot be updated.".to_string()));
		}

		let mut collections = self.write();
		let Some(records) = collections.get_mut(collection) else {
			return Ok(UpdateCounts::default());
		};
		let mut selected = Vec::new();

		for (index, record) in records.iter().enumerate() {
			if filter::matches(record, filter)? {
				selected.push(index);
			}
		}

		let mut counts = UpdateCounts { matched: selected.len() as u64, modified: 0 };

		for index in selected {
			let record = &mut records[index];
			let mut changed = false;

			for (path, value) in set_fields {
				changed |= set_path(record, path, value.clone())?;
			}

			if changed {
				counts.modified += 1;
			}
		}

		Ok(counts)
	}

	fn delete_sync(&self, collection: &str, filter: &Record) -> Result<u64> {
		let mut collections = self.write();
		let Some(records) = collections.get_mut(collection) else {
			return Ok(0);
		};
		let mut keep = Vec::with_capacity(records.len());

		for record in records.iter() {
			keep.push(!filter::matches(record, filter)?);
		}

		let before = records.len();
		let mut flags = keep.into_iter();

		records.retain(|_| flags.next().unwrap_or(true));

		Ok((before - records.len()) as u64)
	}
}
impl DocumentStore for MemoryStore {
	fn list_collection_names(&self) -> BoxFuture<'_, Result<Vec<String>>> {
		let names = self.read().keys().cloned().collect();

		Box::pin(future::ready(Ok(names)))
	}

	fn find_one<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Option<Record>>> {
		let first = self.read().get(collection).and_then(|records| records.first().cloned());

		Box::pin(future::ready(Ok(first)))
	}

	fn find<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Record,
	) -> BoxFuture<'a, Result<Vec<Record>>> {
		Box::pin(future::ready(self.find_sync(collection, filter)))
	}

	fn insert_one<'a>(
		&'a self,
		collection: &'a str,
		record: &'a Record,
	) -> BoxFuture<'a, Result<String>> {
		let result = {
			let mut collections = self.write();

			insert_record(collections.entry(collection.to_string()).or_default(), record.clone())
		};

		Box::pin(future::ready(result))
	}

	fn insert_many<'a>(
		&'a self,
		collection: &'a str,
		records: &'a [Record],
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(future::ready(self.seed(collection, records.iter().cloned())))
	}

	fn update_many<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Record,
		set_fields: &'a Record,
	) -> BoxFuture<'a, Result<UpdateCounts>> {
		Box::pin(future::ready(self.update_sync(collection, filter, set_fields)))
	}

	fn delete_many<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Record,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(future::ready(self.delete_sync(collection, filter)))
	}
}

fn insert_record(records: &mut Vec<Record>, mut record: Record) -> Result<String> {
	let id = match record.get("_id") {
		Some(Value::String(id)) => id.clone(),
		Some(Value::Null) | None => {
			let id = Uuid::new_v4().simple().to_string();

			record.insert("_id".to_string(), Value::String(id.clone()));

			id
		},
		Some(other) => other.to_string(),
	};
	let id_value = record.get("_id").cloned();

	if records.iter().any(|existing| existing.get("_id") == id_value.as_ref()) {
		return Err(Error::InvalidArgument(format!("Duplicate _id {id}.")));
	}

	records.push(record);

	Ok(id)
}

/// Sets a dotted path, creating intermediate objects. Returns whether the stored value changed.
fn set_path(record: &mut Record, path: &str, value: Value) -> Result<bool> {
	let mut segments = path.split('.').peekable();
	let mut current = record;

	while let Some(segment) = segments.next() {
		if segments.peek().is_none() {
			let previous = current.insert(segment.to_string(), value.clone());

			return Ok(previous.as_ref() != Some(&value));
		}

		let next = current
			.entry(segment.to_string())
			.or_insert_with(|| Value::Object(Default::default()));

		current = match next {
			Value::Object(map) => map,
			_ => {
				return Err(Error::InvalidArgument(format!(
					"Cannot set {path}: {segment} is not an object."
				)));
			},
		};
	}

	Err(Error::InvalidArgument("Update field names must not be empty.".to_string()))
}
