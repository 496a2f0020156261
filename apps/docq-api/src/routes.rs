use axum::{
	Json, Router,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use docq_domain::SchemaMap;
use docq_service::{ErrorBody, ErrorKind, QueryResult};

use crate::state::AppState;

const MAX_SESSION_ID_CHARS: usize = 128;

#[derive(Debug, Deserialize)]
pub struct LegacyQueryParams {
	pub nl_query: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
	pub query: String,
	pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
	pub result: QueryResult,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
	pub results: Value,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/query/", get(legacy_query))
		.route("/v1/query", post(query))
		.route("/v1/sessions/{session_id}", delete(forget_session))
		.route("/v1/schema", get(schema))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// Stateless single-turn query: every call starts from an empty conversation.
async fn legacy_query(
	State(state): State<AppState>,
	params: Result<Query<LegacyQueryParams>, QueryRejection>,
) -> Result<Json<ResultsResponse>, ApiError> {
	let Query(params) = params?;
	let text = required_text(&params.nl_query, "nl_query")?;
	let mut conversation = state.agent.new_conversation();
	let result = state.agent.ask(&mut conversation, text).await.into_result()?;

	Ok(Json(ResultsResponse { results: result.into_results_value() }))
}

async fn query(
	State(state): State<AppState>,
	payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
	let Json(payload) = payload?;
	let text = required_text(&payload.query, "query")?;
	let result = match payload.session_id.as_deref() {
		Some(session_id) => {
			validate_session_id(session_id)?;

			let conversation = state.session(session_id).await?;
			let mut conversation = conversation.lock().await;

			state.agent.ask(&mut conversation, text).await
		},
		None => {
			let mut conversation = state.agent.new_conversation();

			state.agent.ask(&mut conversation, text).await
		},
	}
	.into_result()?;

	Ok(Json(QueryResponse { result, session_id: payload.session_id }))
}

async fn forget_session(
	State(state): State<AppState>,
	Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
	if state.forget(&session_id).await {
		Ok(StatusCode::NO_CONTENT)
	} else {
		Err(ApiError::new(StatusCode::NOT_FOUND, "not_found", "Unknown session."))
	}
}

async fn schema(State(state): State<AppState>) -> Json<SchemaMap> {
	Json(state.agent.schema().clone())
}

fn required_text<'a>(raw: &'a str, field: &str) -> Result<&'a str, ApiError> {
	let text = raw.trim();

	if text.is_empty() {
		return Err(ApiError::bad_request(format!("{field} must not be empty.")));
	}

	Ok(text)
}

fn validate_session_id(session_id: &str) -> Result<(), ApiError> {
	if session_id.trim().is_empty() || session_id.chars().count() > MAX_SESSION_ID_CHARS {
		return Err(ApiError::bad_request(format!(
			"session_id must be 1 to {MAX_SESSION_ID_CHARS} characters."
		)));
	}

	Ok(())
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
	error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
	kind: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	kind: String,
	message: String,
}
impl ApiError {
	pub fn new(status: StatusCode, kind: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, kind: kind.into(), message: message.into() }
	}

	pub fn bad_request(message: impl Into<String>) -> Self {
		Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
	}

	pub fn session_limit(max_sessions: usize) -> Self {
		Self::new(
			StatusCode::SERVICE_UNAVAILABLE,
			"session_limit",
			format!("Session limit of {max_sessions} reached."),
		)
	}

	pub fn status(&self) -> StatusCode {
		self.status
	}
}
impl From<ErrorBody> for ApiError {
	fn from(body: ErrorBody) -> Self {
		let (status, kind) = match body.kind {
			ErrorKind::ValidationError => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
			ErrorKind::ExtractionError => (StatusCode::UNPROCESSABLE_ENTITY, "extraction_error"),
			ErrorKind::TransportError => (StatusCode::BAD_GATEWAY, "transport_error"),
			ErrorKind::ExecutionError => (StatusCode::INTERNAL_SERVER_ERROR, "execution_error"),
		};

		Self::new(status, kind, body.message)
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::bad_request(rejection.body_text())
	}
}
impl From<QueryRejection> for ApiError {
	fn from(rejection: QueryRejection) -> Self {
		Self::bad_request(rejection.body_text())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorEnvelope { error: ErrorDetail { kind: self.kind, message: self.message } };

		(self.status, Json(body)).into_response()
	}
}
