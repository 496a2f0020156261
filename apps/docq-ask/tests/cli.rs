use std::sync::{
	Arc, Mutex,
	atomic::{AtomicUsize, Ordering},
};

use clap::Parser;
use serde_json::{Map, Value, json};

use docq_ask::Args;
use docq_config::{CompletionProviderConfig, Config};
use docq_domain::ChatMessage;
use docq_service::{Agent, BoxFuture, CompletionProvider, Providers};
use docq_storage::{DocumentStore, MemoryStore, Record};

/// Always proposes the same query and remembers how much history each call carried.
struct FixedCompletion {
	reply: String,
	history_lengths: Mutex<Vec<usize>>,
	calls: AtomicUsize,
}
impl CompletionProvider for FixedCompletion {
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

		let reply = self.reply.clone();

		Box::pin(async move { Ok(reply) })
	}
}

fn record(value: Value) -> Record {
	match value {
		Value::Object(map) => map,
		other => panic!("Expected an object, got {other}."),
	}
}

fn test_config() -> Config {
	Config {
		service: docq_config::Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			max_sessions: 4,
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

async fn test_agent() -> (Agent, Arc<MemoryStore>, Arc<FixedCompletion>) {
	let store = Arc::new(MemoryStore::new());

	store
		.seed("questions", [record(json!({ "_id": "q1", "content": "Python generators" }))])
		.expect("Failed to seed questions.");

	let completion = Arc::new(FixedCompletion {
		reply: format!(
			"```json\n{}\n```",
			json!({
				"collection": "questions",
				"filter": { "content": { "$regex": "python", "$options": "i" } }
			})
		),
		history_lengths: Mutex::new(Vec::new()),
		calls: AtomicUsize::new(0),
	});
	let agent = Agent::with_store(test_config(), store.clone(), Providers::new(completion.clone()))
		.await
		.expect("Failed to open agent.");

	(agent, store, completion)
}

#[test]
fn parses_query_and_dry_run_flags() {
	let args = Args::try_parse_from(["docq-ask", "-c", "docq.toml", "--dry-run", "find questions"])
		.expect("Failed to parse arguments.");

	assert_eq!(args.config.to_str(), Some("docq.toml"));
	assert_eq!(args.query.as_deref(), Some("find questions"));
	assert!(args.dry_run);

	let args = Args::try_parse_from(["docq-ask", "--config", "docq.toml"])
		.expect("Failed to parse arguments.");

	assert!(args.query.is_none());
	assert!(!args.dry_run);
}

#[tokio::test]
async fn answers_stdin_lines_in_one_conversation_until_exit() {
	let (agent, _, completion) = test_agent().await;
	let input: &[u8] = b"questions about python\n\n  python again  \nexit\nnever asked\n";
	let mut output = Vec::new();

	docq_ask::run_lines(&agent, input, &mut output, false).await.expect("Failed to run lines.");

	let text = String::from_utf8(output).expect("Output is not UTF-8.");
	let answers = serde_json::Deserializer::from_str(&text)
		.into_iter::<Value>()
		.collect::<Result<Vec<_>, _>>()
		.expect("Output is not a JSON stream.");
	let lengths = completion.history_lengths.lock().unwrap_or_else(|err| err.into_inner()).clone();

	assert_eq!(answers.len(), 2);
	assert_eq!(answers[0]["result"]["records"][0]["_id"], "q1");
	assert_eq!(lengths, vec![0, 2]);
}

#[tokio::test]
async fn dry_run_prints_the_query_without_touching_history() {
	let (agent, store, completion) = test_agent().await;
	let mut conversation = agent.new_conversation();
	let answer = docq_ask::answer(&agent, &mut conversation, "questions about python", true).await;

	assert_eq!(answer["query"]["collection"], "questions");
	assert!(answer.get("result").is_none());
	assert!(conversation.is_empty());
	assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
	assert_eq!(store.list_collection_names().await.expect("list failed"), vec!["questions"]);
}
