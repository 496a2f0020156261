use serde_json::{Value, json};

use docq_storage::{DocumentStore, Error, MemoryStore, Record, UpdateCounts};

fn record(value: Value) -> Record {
	match value {
		Value::Object(map) => map,
		other => panic!("Expected an object, got {other}."),
	}
}

fn seeded() -> MemoryStore {
	let store = MemoryStore::new();

	store
		.seed(
			"users",
			[
				record(json!({ "_id": "u1", "name": "Ada", "age": 36 })),
				record(json!({ "_id": "u2", "name": "Grace", "age": 22 })),
				record(json!({ "_id": "u3", "name": "Linus", "age": 54 })),
			],
		)
		.expect("Failed to seed users.");
	store.create_collection("archive");

	store
}

#[tokio::test]
async fn lists_every_collection_in_name_order() {
	let store = seeded();
	let names = store.list_collection_names().await.expect("Failed to list collections.");

	assert_eq!(names, vec!["archive".to_string(), "users".to_string()]);
	assert!(store.find_one("archive").await.expect("find_one failed").is_none());
	assert_eq!(
		store.find_one("users").await.expect("find_one failed").map(|record| record["_id"].clone()),
		Some(json!("u1"))
	);
}

#[tokio::test]
async fn find_applies_the_filter() {
	let store = seeded();
	let filter = record(json!({ "age": { "$gt": 25 } }));
	let found = store.find("users", &filter).await.expect("find failed");
	let names = found.iter().map(|record| record["name"].clone()).collect::<Vec<_>>();

	assert_eq!(names, vec![json!("Ada"), json!("Linus")]);
	assert!(store.find("missing", &filter).await.expect("find failed").is_empty());
}

#[tokio::test]
async fn unknown_operator_is_an_invalid_argument() {
	let store = seeded();
	let filter = record(json!({ "age": { "$mod": [2, 0] } }));

	assert!(matches!(store.find("users", &filter).await, Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn inserts_return_identifiers_in_order() {
	let store = MemoryStore::new();
	let one = store
		.insert_one("orders", &record(json!({ "total": 5 })))
		.await
		.expect("insert_one failed");
	let many = store
		.insert_many("orders", &[record(json!({ "_id": "o2" })), record(json!({ "_id": "o3" }))])
		.await
		.expect("insert_many failed");

	assert!(!one.is_empty());
	assert_eq!(many, vec!["o2".to_string(), "o3".to_string()]);
	assert_eq!(store.snapshot("orders").len(), 3);
}

#[tokio::test]
async fn update_counts_matched_and_modified_separately() {
	let store = seeded();
	let filter = record(json!({ "age": { "$gte": 36 } }));
	let counts = store
		.update_many("users", &filter, &record(json!({ "age": 54 })))
		.await
		.expect("update failed");

	assert_eq!(counts, UpdateCounts { matched: 2, modified: 1 });
	assert_eq!(store.snapshot("users")[0]["age"], json!(54));
}

#[tokio::test]
async fn delete_removes_only_matching_records() {
	let store = seeded();
	let deleted = store
		.delete_many("users", &record(json!({ "name": { "$in": ["Ada", "Grace"] } })))
		.await
		.expect("delete failed");
	let remaining = store.snapshot("users");

	assert_eq!(deleted, 2);
	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0]["_id"], json!("u3"));
}
