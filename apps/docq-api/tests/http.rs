use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Map, Value, json};
use tower::util::ServiceExt;

use docq_api::{routes, state::AppState};
use docq_config::{CompletionProviderConfig, Config};
use docq_domain::{ChatMessage, Role};
use docq_service::{Agent, BoxFuture, CompletionProvider, Providers};
use docq_storage::{MemoryStore, Record};

/// Answers by the first keyword found in the newest user message and records history lengths.
struct KeywordCompletion {
	replies: Vec<(&'static str, String)>,
	history_lengths: std::sync::Mutex<Vec<usize>>,
	calls: AtomicUsize,
}
impl CompletionProvider for KeywordCompletion {
	fn complete<'a>(
		&'a self,
		_: &'a CompletionProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, docq_providers::Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.history_lengths
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push(messages.len().saturating_sub(2));

		let last_user = messages
			.iter()
			.rev()
			.find(|message| message.role == Role::User)
			.map(|message| message.content.to_lowercase())
			.unwrap_or_default();
		let reply = self
			.replies
			.iter()
			.find(|(keyword, _)| last_user.contains(keyword))
			.map(|(_, reply)| reply.clone())
			.unwrap_or_else(|| "I cannot help with that.".to_string());

		Box::pin(async move { Ok(reply) })
	}
}

fn fenced(value: Value) -> String {
	format!("```json\n{value}\n```")
}

fn record(value: Value) -> Record {
	match value {
		Value::Object(map) => map,
		other => panic!("Expected an object, got {other}."),
	}
}

fn test_config(max_sessions: u32) -> Config {
	Config {
		service: docq_config::Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			max_sessions,
		},
		storage: docq_config::Storage {
			mongo: docq_config::Mongo {
				uri: "mongodb://127.0.0.1:27017".to_string(),
				uri_env: None,
				database: "docq".to_string(),
			},
		},
		providers: docq_config::Providers {
			completion: CompletionProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				path: "/chat/completions".to_string(),
				api_key: "secret".to_string(),
				api_key_env: None,
				model: "test-model".to_string(),
				temperature: None,
				max_tokens: 800,
				timeout_ms: 1_000,
				max_attempts: 3,
				default_headers: Map::new(),
			},
		},
		agent: docq_config::Agent { history_max_entries: 20, allow_writes: false },
	}
}

async fn test_app(max_sessions: u32) -> (Router, AppState, Arc<KeywordCompletion>) {
	let store = MemoryStore::new();

	store
		.seed(
			"users",
			[
				record(json!({ "_id": "u1", "name": "Ada", "age": 36 })),
				record(json!({ "_id": "u2", "name": "Grace", "age": 22 })),
			],
		)
		.expect("Failed to seed users.");

	let completion = Arc::new(KeywordCompletion {
		replies: vec![
			("older", fenced(json!({ "collection": "users", "filter": { "age": { "$gt": 25 } } }))),
			("ghosts", fenced(json!({ "collection": "ghosts", "filter": {} }))),
			("remove", fenced(json!({ "collection": "users", "operation": "delete", "filter": {} }))),
		],
		history_lengths: Default::default(),
		calls: AtomicUsize::new(0),
	});
	let agent = Agent::with_store(
		test_config(max_sessions),
		Arc::new(store),
		Providers::new(completion.clone()),
	)
	.await
	.expect("Failed to open agent.");
	let state = AppState::from_agent(agent);

	(routes::router(state.clone()), state, completion)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.clone().oneshot(request).await.expect("Failed to call the router.");
	let status = response.status();
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = if body.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&body).expect("Failed to parse response.")
	};

	(status, json)
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Failed to build request.")
}

fn post_query(payload: Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/v1/query")
		.header("content-type", "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

#[tokio::test]
async fn health_returns_ok() {
	let (app, _, _) = test_app(4).await;
	let (status, _) = call(&app, get("/health")).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn legacy_query_wraps_records_in_results() {
	let (app, _, _) = test_app(4).await;
	let (status, json) = call(&app, get("/query/?nl_query=users%20older%20than%2025")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["results"], json!([{ "_id": "u1", "name": "Ada", "age": 36 }]));
}

#[tokio::test]
async fn legacy_query_reports_tagged_errors() {
	let (app, _, _) = test_app(4).await;
	let (status, json) = call(&app, get("/query/?nl_query=list%20the%20ghosts")).await;

	assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(json["error"]["kind"], "validation_error");
	assert_eq!(json["error"]["message"], "Collection 'ghosts' does not exist.");
}

#[tokio::test]
async fn json_query_returns_a_tagged_result() {
	let (app, _, _) = test_app(4).await;
	let (status, json) = call(&app, post_query(json!({ "query": "users older than 25" }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["result"]["operation"], "find");
	assert_eq!(json["result"]["collection"], "users");
	assert_eq!(json["result"]["records"][0]["_id"], "u1");
	assert!(json.get("session_id").is_none());
}

#[tokio::test]
async fn writes_are_refused_by_default() {
	let (app, _, _) = test_app(4).await;
	let (status, json) = call(&app, post_query(json!({ "query": "remove everyone" }))).await;

	assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(json["error"]["kind"], "validation_error");
}

#[tokio::test]
async fn unusable_completion_is_an_extraction_error() {
	let (app, _, _) = test_app(4).await;
	let (status, json) = call(&app, post_query(json!({ "query": "tell me a joke" }))).await;

	assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(json["error"]["kind"], "extraction_error");
}

#[tokio::test]
async fn empty_query_is_a_bad_request() {
	let (app, _, completion) = test_app(4).await;
	let (status, json) = call(&app, post_query(json!({ "query": "   " }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error"]["kind"], "bad_request");
	assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_json_body_is_a_tagged_bad_request() {
	let (app, _, completion) = test_app(4).await;
	let request = Request::builder()
		.method("POST")
		.uri("/v1/query")
		.header("content-type", "application/json")
		.body(Body::from("{query: 1"))
		.expect("Failed to build request.");
	let (status, json) = call(&app, request).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error"]["kind"], "bad_request");
	assert!(json["error"]["message"].as_str().is_some_and(|message| !message.is_empty()));
	assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_nl_query_is_a_tagged_bad_request() {
	let (app, _, completion) = test_app(4).await;
	let (status, json) = call(&app, get("/query/")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error"]["kind"], "bad_request");
	assert!(
		json["error"]["message"].as_str().is_some_and(|message| message.contains("nl_query")),
		"Unexpected body: {json}"
	);
	assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sessions_keep_their_own_history() {
	let (app, state, completion) = test_app(4).await;

	for session_id in ["alpha", "alpha", "beta"] {
		let (status, json) = call(
			&app,
			post_query(json!({ "query": "users older than 25", "session_id": session_id })),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(json["session_id"], session_id);
	}

	let lengths = completion.history_lengths.lock().unwrap_or_else(|err| err.into_inner()).clone();

	assert_eq!(lengths, vec![0, 2, 0]);
	assert_eq!(state.session_count().await, 2);

	let request = Request::builder()
		.method("DELETE")
		.uri("/v1/sessions/alpha")
		.body(Body::empty())
		.expect("Failed to build request.");
	let (status, _) = call(&app, request).await;

	assert_eq!(status, StatusCode::NO_CONTENT);
	assert_eq!(state.session_count().await, 1);

	let request = Request::builder()
		.method("DELETE")
		.uri("/v1/sessions/alpha")
		.body(Body::empty())
		.expect("Failed to build request.");
	let (status, _) = call(&app, request).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn new_sessions_beyond_the_limit_are_refused() {
	let (app, _, _) = test_app(1).await;
	let (status, _) =
		call(&app, post_query(json!({ "query": "users older than 25", "session_id": "one" }))).await;

	assert_eq!(status, StatusCode::OK);

	let (status, json) =
		call(&app, post_query(json!({ "query": "users older than 25", "session_id": "two" }))).await;

	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(json["error"]["kind"], "session_limit");
}

#[tokio::test]
async fn schema_lists_inspected_collections() {
	let (app, _, _) = test_app(4).await;
	let (status, json) = call(&app, get("/v1/schema")).await;
	let mut fields = json["users"]
		.as_array()
		.expect("Expected a field list.")
		.iter()
		.filter_map(Value::as_str)
		.map(str::to_string)
		.collect::<Vec<_>>();

	fields.sort();

	assert_eq!(status, StatusCode::OK);
	assert_eq!(fields, vec!["_id".to_string(), "age".to_string(), "name".to_string()]);
}
