//! MongoDB-backed store.

use mongodb::{
	Client, Collection, Database,
	bson::{Bson, Document, doc, oid::ObjectId},
};
use serde_json::Value;

use crate::{BoxFuture, DocumentStore, Error, Record, Result, UpdateCounts};

const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];

pub struct MongoStore {
	client: Client,
	db: Database,
}
impl MongoStore {
	/// Opens a client for `cfg.uri` and checks the server answers before returning.
	pub async fn connect(cfg: &docq_config::Mongo) -> Result<Self> {
		let client = Client::with_uri_str(&cfg.uri).await?;
		let db = client.database(&cfg.database);
		let store = Self { client, db };

		store.ping().await?;

		tracing::debug!(database = %cfg.database, "Connected to MongoDB.");

		Ok(store)
	}

	pub async fn ping(&self) -> Result<()> {
		self.db.run_command(doc! { "ping": 1 }).await?;

		Ok(())
	}

	pub fn database(&self) -> &Database {
		&self.db
	}

	fn collection(&self, name: &str) -> Collection<Document> {
		self.db.collection::<Document>(name)
	}
}
impl DocumentStore for MongoStore {
	fn list_collection_names(&self) -> BoxFuture<'_, Result<Vec<String>>> {
		Box::pin(async move { Ok(self.db.list_collection_names().await?) })
	}

	fn find_one<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Option<Record>>> {
		Box::pin(async move {
			let found = self.collection(collection).find_one(doc! {}).await?;

			Ok(found.map(document_to_record))
		})
	}

	fn find<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Record,
	) -> BoxFuture<'a, Result<Vec<Record>>> {
		Box::pin(async move {
			let filter = filter_document(filter)?;
			let mut cursor = self.collection(collection).find(filter).await?;
			let mut records = Vec::new();

			while cursor.advance().await? {
				records.push(document_to_record(cursor.deserialize_current()?));
			}

			Ok(records)
		})
	}

	fn insert_one<'a>(
		&'a self,
		collection: &'a str,
		record: &'a Record,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let document = record_to_document(record)?;
			let result = self.collection(collection).insert_one(document).await?;

			Ok(id_to_string(result.inserted_id))
		})
	}

	fn insert_many<'a>(
		&'a self,
		collection: &'a str,
		records: &'a [Record],
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			let documents = records.iter().map(record_to_document).collect::<Result<Vec<_>>>()?;
			let result = self.collection(collection).insert_many(documents).await?;
			let mut ids = result.inserted_ids.into_iter().collect::<Vec<_>>();

			ids.sort_by_key(|(index, _)| *index);

			Ok(ids.into_iter().map(|(_, id)| id_to_string(id)).collect())
		})
	}

	fn update_many<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Record,
		set_fields: &'a Record,
	) -> BoxFuture<'a, Result<UpdateCounts>> {
		Box::pin(async move {
			let filter = filter_document(filter)?;
			let update = doc! { "$set": record_to_document(set_fields)? };
			let result = self.collection(collection).update_many(filter, update).await?;

			Ok(UpdateCounts { matched: result.matched_count, modified: result.modified_count })
		})
	}

	fn delete_many<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Record,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let filter = filter_document(filter)?;
			let result = self.collection(collection).delete_many(filter).await?;

			Ok(result.deleted_count)
		})
	}

	fn close(&self) -> BoxFuture<'_, ()> {
		let client = self.client.clone();

		Box::pin(async move {
			client.shutdown().await;

			tracing::debug!("MongoDB client shut down.");
		})
	}
}

/// Parses a JSON record as extended JSON, so `{"$oid": ..}` and `{"$date": ..}` become native
/// BSON values.
pub fn record_to_document(record: &Record) -> Result<Document> {
	match Bson::try_from(Value::Object(record.clone()))? {
		Bson::Document(document) => Ok(document),
		other => Err(Error::InvalidArgument(format!("Expected a document, got {other}."))),
	}
}

/// Like [`record_to_document`], then lets hex strings compared against `_id` match ObjectIds too.
pub fn filter_document(filter: &Record) -> Result<Document> {
	let mut document = record_to_document(filter)?;

	coerce_object_ids(&mut document);

	Ok(document)
}

pub fn coerce_object_ids(filter: &mut Document) {
	let keys = filter.keys().cloned().collect::<Vec<_>>();

	for key in keys {
		let Some(value) = filter.get_mut(&key) else {
			continue;
		};

		if key == "_id" {
			coerce_id_condition(value);
		} else if LOGICAL_OPERATORS.contains(&key.as_str())
			&& let Bson::Array(clauses) = value
		{
			for clause in clauses {
				if let Bson::Document(clause) = clause {
					coerce_object_ids(clause);
				}
			}
		}
	}
}

/// A hex string compared against `_id` matches the ObjectId it encodes or the string itself, so
/// collections keyed by hex-looking strings still resolve. `$eq` and `$ne` are folded into `$in`
/// and `$nin`.
fn coerce_id_condition(value: &mut Bson) {
	if let Some(forms) = id_forms(value) {
		*value = Bson::Document(doc! { "$in": forms });

		return;
	}

	let Bson::Document(condition) = value else {
		return;
	};

	for operator in ["$in", "$nin"] {
		if let Some(Bson::Array(items)) = condition.get_mut(operator) {
			*items = std::mem::take(items)
				.into_iter()
				.flat_map(|item| id_forms(&item).unwrap_or_else(|| vec![item]))
				.collect();
		}
	}

	if let Some(forms) = condition.get("$eq").and_then(id_forms) {
		condition.remove("$eq");

		match condition.get_mut("$in") {
			Some(Bson::Array(items)) => items.retain(|item| forms.contains(item)),
			_ => {
				condition.insert("$in", forms);
			},
		}
	}
	if let Some(forms) = condition.get("$ne").and_then(id_forms) {
		condition.remove("$ne");

		match condition.get_mut("$nin") {
			Some(Bson::Array(items)) => items.extend(forms),
			_ => {
				condition.insert("$nin", forms);
			},
		}
	}
}

fn id_forms(value: &Bson) -> Option<Vec<Bson>> {
	let Bson::String(text) = value else {
		return None;
	};

	if text.len() != 24 {
		return None;
	}

	ObjectId::parse_str(text.as_str()).ok().map(|id| vec![Bson::ObjectId(id), value.clone()])
}

pub fn document_to_record(document: Document) -> Record {
	document.into_iter().map(|(key, value)| (key, bson_to_json(value))).collect()
}

/// ObjectIds become hex strings and datetimes RFC 3339 strings. Everything else uses relaxed
/// extended JSON.
pub fn bson_to_json(value: Bson) -> Value {
	match value {
		Bson::ObjectId(id) => Value::String(id.to_hex()),
		Bson::DateTime(datetime) => match datetime.try_to_rfc3339_string() {
			Ok(text) => Value::String(text),
			Err(_) => Bson::DateTime(datetime).into_relaxed_extjson(),
		},
		Bson::Document(document) => Value::Object(document_to_record(document)),
		Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
		other => other.into_relaxed_extjson(),
	}
}

fn id_to_string(id: Bson) -> String {
	match bson_to_json(id) {
		Value::String(text) => text,
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	const HEX: &str = "65a1b2c3d4e5f60718293a4b";

	fn record(value: Value) -> Record {
		value.as_object().cloned().expect("record must be an object")
	}

	#[test]
	fn hex_ids_match_both_object_id_and_string_forms() {
		let filter = filter_document(&record(json!({
			"_id": { "$in": [HEX, "not-an-id"], "$ne": HEX },
			"$or": [{ "_id": HEX }, { "owner": HEX }]
		})))
		.expect("conversion failed");
		let id = Bson::ObjectId(ObjectId::parse_str(HEX).expect("valid hex"));
		let hex = Bson::String(HEX.to_string());
		let condition = filter.get_document("_id").expect("_id condition");

		assert_eq!(
			condition.get_array("$in").expect("$in array"),
			&vec![id.clone(), hex.clone(), Bson::String("not-an-id".to_string())]
		);
		assert_eq!(condition.get_array("$nin").expect("$nin array"), &vec![id.clone(), hex.clone()]);
		assert!(condition.get("$ne").is_none());

		let clauses = filter.get_array("$or").expect("$or array");
		let Bson::Document(first) = &clauses[0] else { panic!("Expected a document clause.") };
		let Bson::Document(second) = &clauses[1] else { panic!("Expected a document clause.") };

		assert_eq!(first.get_document("_id").expect("_id condition"), &doc! { "$in": [id, hex] });
		assert_eq!(second.get("owner"), Some(&Bson::String(HEX.to_string())));
	}

	#[test]
	fn eq_on_hex_id_becomes_membership_in_both_forms() {
		let filter = filter_document(&record(json!({ "_id": { "$eq": HEX } })))
			.expect("conversion failed");
		let id = ObjectId::parse_str(HEX).expect("valid hex");

		assert_eq!(filter, doc! { "_id": { "$in": [id, HEX] } });

		let filter = filter_document(&record(json!({ "_id": { "$eq": HEX, "$in": ["u1", HEX] } })))
			.expect("conversion failed");

		assert_eq!(filter, doc! { "_id": { "$in": [id, HEX] } });
	}

	#[test]
	fn extended_json_values_are_parsed() {
		let document = record_to_document(&record(json!({
			"ref": { "$oid": HEX },
			"age": { "$gt": 25 }
		})))
		.expect("conversion failed");

		assert!(matches!(document.get("ref"), Some(Bson::ObjectId(_))));
		assert!(matches!(document.get("age"), Some(Bson::Document(_))));
	}

	#[test]
	fn returned_documents_use_plain_strings_for_ids_and_dates() {
		let id = ObjectId::parse_str(HEX).expect("valid hex");
		let created = mongodb::bson::DateTime::from_millis(0);
		let converted = document_to_record(doc! {
			"_id": id,
			"created": created,
			"nested": { "tags": [id] },
			"age": 30
		});

		assert_eq!(converted["_id"], json!(HEX));
		assert_eq!(converted["created"], json!("1970-01-01T00:00:00Z"));
		assert_eq!(converted["nested"]["tags"][0], json!(HEX));
		assert_eq!(converted["age"], json!(30));
	}
}
