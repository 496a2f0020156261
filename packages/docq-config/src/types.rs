use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub agent: Agent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	#[serde(default = "default_max_sessions")]
	pub max_sessions: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub mongo: Mongo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Mongo {
	/// Connection string. May be left empty when `uri_env` names the variable holding it.
	#[serde(default)]
	pub uri: String,
	pub uri_env: Option<String>,
	pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub completion: CompletionProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub path: String,
	/// Bearer credential. May be left empty when `api_key_env` names the variable holding it.
	#[serde(default)]
	pub api_key: String,
	pub api_key_env: Option<String>,
	pub model: String,
	pub temperature: Option<f32>,
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Agent {
	/// Upper bound on stored conversation entries. Two entries make one turn.
	pub history_max_entries: usize,
	pub allow_writes: bool,
}
impl Default for Agent {
	fn default() -> Self {
		Self { history_max_entries: 20, allow_writes: false }
	}
}

fn default_max_sessions() -> u32 {
	1_024
}

fn default_max_tokens() -> u32 {
	800
}

fn default_timeout_ms() -> u64 {
	10_000
}

fn default_max_attempts() -> u32 {
	3
}
