use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, RwLock};

use docq_domain::Conversation;
use docq_service::Agent;

use crate::routes::ApiError;

pub type SharedConversation = Arc<Mutex<Conversation>>;

#[derive(Clone)]
pub struct AppState {
	pub agent: Arc<Agent>,
	sessions: Arc<RwLock<HashMap<String, SharedConversation>>>,
	max_sessions: usize,
}
impl AppState {
	pub async fn new(config: docq_config::Config) -> color_eyre::Result<Self> {
		let agent = Agent::open(config).await?;

		Ok(Self::from_agent(agent))
	}

	pub fn from_agent(agent: Agent) -> Self {
		let max_sessions = agent.cfg.service.max_sessions as usize;

		Self { agent: Arc::new(agent), sessions: Default::default(), max_sessions }
	}

	/// The conversation for `session_id`, created on first use.
	pub async fn session(&self, session_id: &str) -> Result<SharedConversation, ApiError> {
		if let Some(conversation) = self.sessions.read().await.get(session_id) {
			return Ok(conversation.clone());
		}

		let mut sessions = self.sessions.write().await;

		if let Some(conversation) = sessions.get(session_id) {
			return Ok(conversation.clone());
		}
		if sessions.len() >= self.max_sessions {
			tracing::warn!(max_sessions = self.max_sessions, "Session limit reached.");

			return Err(ApiError::session_limit(self.max_sessions));
		}

		let conversation = Arc::new(Mutex::new(self.agent.new_conversation()));

		sessions.insert(session_id.to_string(), conversation.clone());

		Ok(conversation)
	}

	/// Returns whether a session was removed.
	pub async fn forget(&self, session_id: &str) -> bool {
		self.sessions.write().await.remove(session_id).is_some()
	}

	pub async fn session_count(&self) -> usize {
		self.sessions.read().await.len()
	}
}
