use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use docq_config::CompletionProviderConfig;
use docq_domain::ChatMessage;

const MAX_LOGGED_BODY_CHARS: usize = 512;

/// Sends one chat completion request and returns `choices[0].message.content`.
///
/// Network failures and non-2xx statuses are retried immediately, up to `max_attempts` in total,
/// each attempt bounded by `timeout_ms`. A 2xx response that is not JSON or lacks the content field
/// is not retried.
pub async fn complete(cfg: &CompletionProviderConfig, messages: &[ChatMessage]) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
	let body = request_body(cfg, messages);
	let mut last_error = String::from("no attempt was made");

	for attempt in 1..=cfg.max_attempts {
		let res = client.post(&url).headers(headers.clone()).json(&body).send().await;

		match res {
			Ok(res) if res.status().is_success() => {
				let body = res.bytes().await?;
				let json: Value = serde_json::from_slice(&body)?;

				return parse_completion_content(&json);
			},
			Ok(res) => {
				let status = res.status();
				let text = res.text().await.unwrap_or_default();
				let text = truncate(&text, MAX_LOGGED_BODY_CHARS);

				tracing::warn!(
					attempt,
					max_attempts = cfg.max_attempts,
					%status,
					body = %text,
					"Completion endpoint returned an error status."
				);

				last_error = format!("HTTP {status}: {text}");
			},
			Err(err) => {
				tracing::warn!(
					attempt,
					max_attempts = cfg.max_attempts,
					error = %err,
					"Completion request failed."
				);

				last_error = err.to_string();
			},
		}
	}

	Err(Error::Exhausted { attempts: cfg.max_attempts, last_error })
}

pub fn request_body(cfg: &CompletionProviderConfig, messages: &[ChatMessage]) -> Value {
	let mut body = serde_json::json!({
		"model": cfg.model,
		"messages": messages,
		"max_tokens": cfg.max_tokens,
	});

	if let Some(temperature) = cfg.temperature {
		body["temperature"] = serde_json::json!(temperature);
	}

	body
}

pub fn parse_completion_content(json: &Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Completion response is missing choices[0].message.content.".to_string(),
		})
}

fn truncate(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((end, _)) => format!("{}...", &text[..end]),
		None => text.to_string(),
	}
}
