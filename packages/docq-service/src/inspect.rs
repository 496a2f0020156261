use docq_domain::SchemaMap;
use docq_storage::DocumentStore;

use crate::Result;

/// Lists collections in name order and learns field names from one record of each.
///
/// Empty collections stay in the returned name list but get no schema entry. The map is not
/// refreshed afterwards.
pub async fn inspect(store: &dyn DocumentStore) -> Result<(Vec<String>, SchemaMap)> {
	let mut names = store.list_collection_names().await.inspect_err(|err| {
		tracing::error!(error = %err, "Failed to list collections.");
	})?;

	names.sort();

	let mut schema = SchemaMap::new();

	for name in &names {
		let sample = store.find_one(name).await.inspect_err(|err| {
			tracing::error!(collection = %name, error = %err, "Failed to sample collection.");
		})?;

		match sample {
			Some(record) => schema.insert(name.as_str(), record.keys().cloned().collect()),
			None => tracing::debug!(collection = %name, "Skipping empty collection."),
		}
	}

	Ok((names, schema))
}
