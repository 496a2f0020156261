use serde::Serialize;
use serde_json::Value;

use docq_domain::{ValidatedOperation, ValidatedQuery};
use docq_storage::{DocumentStore, Record};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum QueryResult {
	Find { collection: String, records: Vec<Record> },
	Insert { collection: String, inserted_ids: Vec<String> },
	Update { collection: String, matched_count: u64, modified_count: u64 },
	Delete { collection: String, deleted_count: u64 },
}
impl QueryResult {
	pub fn collection(&self) -> &str {
		match self {
			Self::Find { collection, .. }
			| Self::Insert { collection, .. }
			| Self::Update { collection, .. }
			| Self::Delete { collection, .. } => collection,
		}
	}

	/// The bare payload: the record list for reads, a count summary for writes.
	pub fn into_results_value(self) -> Value {
		match self {
			Self::Find { records, .. } =>
				Value::Array(records.into_iter().map(Value::Object).collect()),
			Self::Insert { inserted_ids, .. } => serde_json::json!({ "inserted_ids": inserted_ids }),
			Self::Update { matched_count, modified_count, .. } => serde_json::json!({
				"matched_count": matched_count,
				"modified_count": modified_count,
			}),
			Self::Delete { deleted_count, .. } => serde_json::json!({ "deleted_count": deleted_count }),
		}
	}
}

/// Runs a validated query. Database failures are logged here and returned as execution errors.
pub async fn execute(store: &dyn DocumentStore, query: &ValidatedQuery) -> Result<QueryResult> {
	let collection = query.collection.clone();
	let operation = query.operation.kind();
	let result = match &query.operation {
		ValidatedOperation::Find => store
			.find(&query.collection, &query.filter)
			.await
			.map(|records| QueryResult::Find { collection, records }),
		ValidatedOperation::Insert { records } => match records.as_slice() {
			[record] => store
				.insert_one(&query.collection, record)
				.await
				.map(|id| QueryResult::Insert { collection, inserted_ids: vec![id] }),
			records => store
				.insert_many(&query.collection, records)
				.await
				.map(|inserted_ids| QueryResult::Insert { collection, inserted_ids }),
		},
		ValidatedOperation::Update { set_fields } => store
			.update_many(&query.collection, &query.filter, set_fields)
			.await
			.map(|counts| QueryResult::Update {
				collection,
				matched_count: counts.matched,
				modified_count: counts.modified,
			}),
		ValidatedOperation::Delete => store
			.delete_many(&query.collection, &query.filter)
			.await
			.map(|deleted_count| QueryResult::Delete { collection, deleted_count }),
	};

	result.map_err(|err| {
		tracing::error!(
			collection = %query.collection,
			%operation,
			error = %err,
			"Database operation failed."
		);

		err.into()
	})
}
