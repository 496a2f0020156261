mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Agent, CompletionProviderConfig, Config, Mongo, Providers, Service, Storage};

use std::{env, fs, net::SocketAddr, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);
	resolve_secrets(&mut cfg, |name| env::var(name).ok())?;
	validate(&cfg)?;

	Ok(cfg)
}

/// Fills empty secrets from the environment variables named by `*_env` keys.
pub fn resolve_secrets<F>(cfg: &mut Config, lookup: F) -> Result<()>
where
	F: Fn(&str) -> Option<String>,
{
	let completion = &mut cfg.providers.completion;

	if completion.api_key.is_empty()
		&& let Some(name) = completion.api_key_env.as_deref()
	{
		completion.api_key = lookup(name).unwrap_or_default().trim().to_string();

		if completion.api_key.is_empty() {
			return Err(Error::Validation {
				message: format!(
					"providers.completion.api_key_env names {name:?}, which is unset or empty."
				),
			});
		}
	}

	let mongo = &mut cfg.storage.mongo;

	if mongo.uri.is_empty()
		&& let Some(name) = mongo.uri_env.as_deref()
	{
		mongo.uri = lookup(name).unwrap_or_default().trim().to_string();

		if mongo.uri.is_empty() {
			return Err(Error::Validation {
				message: format!("storage.mongo.uri_env names {name:?}, which is unset or empty."),
			});
		}
	}

	Ok(())
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.parse::<SocketAddr>().is_err() {
		return Err(Error::Validation {
			message: "service.http_bind must be a socket address.".to_string(),
		});
	}
	if cfg.service.max_sessions == 0 {
		return Err(Error::Validation {
			message: "service.max_sessions must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("storage.mongo.uri", &cfg.storage.mongo.uri),
		("storage.mongo.database", &cfg.storage.mongo.database),
		("providers.completion.api_base", &cfg.providers.completion.api_base),
		("providers.completion.api_key", &cfg.providers.completion.api_key),
		("providers.completion.model", &cfg.providers.completion.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	let completion = &cfg.providers.completion;

	if completion.max_attempts == 0 {
		return Err(Error::Validation {
			message: "providers.completion.max_attempts must be greater than zero.".to_string(),
		});
	}
	if completion.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.completion.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if completion.max_tokens == 0 {
		return Err(Error::Validation {
			message: "providers.completion.max_tokens must be greater than zero.".to_string(),
		});
	}

	if let Some(temperature) = completion.temperature {
		if !temperature.is_finite() {
			return Err(Error::Validation {
				message: "providers.completion.temperature must be a finite number.".to_string(),
			});
		}
		if !(0.0..=2.0).contains(&temperature) {
			return Err(Error::Validation {
				message: "providers.completion.temperature must be in the range 0.0-2.0."
					.to_string(),
			});
		}
	}

	for (key, value) in &completion.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("providers.completion.default_headers.{key} must be a string."),
			});
		}
	}

	if cfg.agent.history_max_entries == 0 {
		return Err(Error::Validation {
			message: "agent.history_max_entries must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.storage.mongo.uri = cfg.storage.mongo.uri.trim().to_string();
	cfg.providers.completion.api_key = cfg.providers.completion.api_key.trim().to_string();

	if is_blank(cfg.providers.completion.api_key_env.as_deref()) {
		cfg.providers.completion.api_key_env = None;
	}
	if is_blank(cfg.storage.mongo.uri_env.as_deref()) {
		cfg.storage.mongo.uri_env = None;
	}

	let api_base = cfg.providers.completion.api_base.trim_end_matches('/').to_string();

	cfg.providers.completion.api_base = api_base;
}

fn is_blank(value: Option<&str>) -> bool {
	value.map(|value| value.trim().is_empty()).unwrap_or(false)
}
