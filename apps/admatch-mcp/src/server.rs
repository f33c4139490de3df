use std::{net::SocketAddr, sync::Arc};

use axum::{
	Router,
	body::Body,
	extract::State,
	http::{HeaderMap, Request},
	middleware::{self, Next},
	response::IntoResponse,
};
use color_eyre::Result;
use rmcp::{
	ErrorData, ServerHandler,
	handler::server::router::tool::ToolRouter,
	model::{CallToolResult, JsonObject, ServerCapabilities, ServerInfo},
	transport::streamable_http_server::{
		StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
	},
};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::McpAuthState;
use admatch_domain::Campaign;
use admatch_service::{Error, MatchRequest, MatchService};

const HEADER_AUTHORIZATION: &str = "Authorization";

#[derive(Clone)]
struct AdmatchMcp {
	service: Arc<MatchService>,
	tool_router: ToolRouter<Self>,
}
impl AdmatchMcp {
	fn new(service: Arc<MatchService>) -> Self {
		Self { service, tool_router: Self::tool_router() }
	}
}

#[rmcp::tool_router]
impl AdmatchMcp {
	#[rmcp::tool(
		name = "admatch_match",
		description = "Match sponsor creatives against a context text and return a ranked top-K list.",
		input_schema = match_schema()
	)]
	async fn admatch_match(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let request = parse_match_request(params)?;

		service_result(self.service.match_creatives(&request).await)
	}

	#[rmcp::tool(
		name = "admatch_match_batch",
		description = "Run several match requests sequentially; each slot carries its own result or error.",
		input_schema = match_batch_schema()
	)]
	async fn admatch_match_batch(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let requests: Vec<MatchRequest> = take_typed(&mut params, "requests")?;

		service_result(self.service.match_batch(&requests).await)
	}

	#[rmcp::tool(
		name = "admatch_match_sample",
		description = "Draw a uniform-random sample from the eligible creatives, unbiased by score.",
		input_schema = match_schema()
	)]
	async fn admatch_match_sample(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let request = parse_match_request(params)?;

		service_result(self.service.match_sample(&request).await)
	}

	#[rmcp::tool(
		name = "admatch_match_dry_run",
		description = "Preview a match without caching or persisting anything; returns the response plus its trace.",
		input_schema = match_schema()
	)]
	async fn admatch_match_dry_run(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let request = parse_match_request(params)?;

		service_result(self.service.match_dry_run(&request).await)
	}

	#[rmcp::tool(
		name = "admatch_explain",
		description = "Return the audit trace that produced a previously returned match id.",
		input_schema = explain_schema()
	)]
	async fn admatch_explain(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let raw = take_required_string(&mut params, "match_id")?;
		let match_id: Uuid = raw.parse().map_err(|_| {
			ErrorData::invalid_params("match_id must be a UUID.".to_string(), None)
		})?;

		service_result(self.service.explain(&match_id))
	}

	#[rmcp::tool(
		name = "admatch_upsert_campaigns",
		description = "Expand campaigns into creatives, embed them, and upsert them into the vector index.",
		input_schema = upsert_campaigns_schema()
	)]
	async fn admatch_upsert_campaigns(
		&self,
		mut params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let campaigns: Vec<Campaign> = take_typed(&mut params, "campaigns")?;

		service_result(self.service.upsert_campaigns(&campaigns).await)
	}

	#[rmcp::tool(
		name = "admatch_delete_creative",
		description = "Delete a creative from the vector index by creative_id.",
		input_schema = creative_id_schema()
	)]
	async fn admatch_delete_creative(
		&self,
		mut params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let creative_id = take_required_string(&mut params, "creative_id")?;

		service_result(self.service.delete_creative(&creative_id).await.map(|()| {
			serde_json::json!({ "deleted": creative_id })
		}))
	}

	#[rmcp::tool(
		name = "admatch_disable_creatives",
		description = "Clear the enabled flag on creatives so they stop matching without being deleted.",
		input_schema = disable_creatives_schema()
	)]
	async fn admatch_disable_creatives(
		&self,
		mut params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let creative_ids: Vec<String> = take_typed(&mut params, "creative_ids")?;

		service_result(
			self.service
				.disable_creatives(&creative_ids)
				.await
				.map(|disabled| serde_json::json!({ "disabled": disabled })),
		)
	}

	#[rmcp::tool(
		name = "admatch_get_creative",
		description = "Fetch a stored creative and its campaign metadata by creative_id.",
		input_schema = creative_id_schema()
	)]
	async fn admatch_get_creative(
		&self,
		mut params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let creative_id = take_required_string(&mut params, "creative_id")?;

		service_result(self.service.get_creative(&creative_id).await)
	}

	#[rmcp::tool(
		name = "admatch_health",
		description = "Probe the vector index and the embedding provider and report ok or degraded.",
		input_schema = empty_schema()
	)]
	async fn admatch_health(&self, _params: JsonObject) -> Result<CallToolResult, ErrorData> {
		service_result(Ok(self.service.health().await))
	}

	#[rmcp::tool(
		name = "admatch_capabilities",
		description = "Report supported placements, constraint keys, limits, and the schema version.",
		input_schema = empty_schema()
	)]
	async fn admatch_capabilities(&self, _params: JsonObject) -> Result<CallToolResult, ErrorData> {
		service_result(Ok(self.service.capabilities()))
	}

	#[rmcp::tool(
		name = "admatch_collection_info",
		description = "Report the vector collection's point count, dimension, and status.",
		input_schema = empty_schema()
	)]
	async fn admatch_collection_info(
		&self,
		_params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		service_result(self.service.collection_info().await)
	}
}

#[rmcp::tool_handler]
impl ServerHandler for AdmatchMcp {
	fn get_info(&self) -> ServerInfo {
		ServerInfo {
			instructions: Some(
				"Semantic sponsor-creative matcher: ranked matching with typed constraints, replayable audit traces, and campaign ingestion tools.".to_string(),
			),
			capabilities: ServerCapabilities::builder().enable_tools().build(),
			..Default::default()
		}
	}
}

pub async fn serve_mcp(
	bind_addr: &str,
	auth_state: McpAuthState,
	service: Arc<MatchService>,
) -> Result<()> {
	let bind_addr: SocketAddr = bind_addr.parse()?;
	let middleware_auth_state = auth_state.clone();
	let session_manager: Arc<LocalSessionManager> = Default::default();
	let mcp_service = StreamableHttpService::new(
		move || Ok(AdmatchMcp::new(service.clone())),
		session_manager,
		StreamableHttpServerConfig::default(),
	);
	let router = Router::new()
		.fallback_service(mcp_service)
		.layer(middleware::from_fn_with_state(middleware_auth_state, mcp_auth_middleware));
	let listener = TcpListener::bind(bind_addr).await?;

	tracing::info!(%bind_addr, "MCP server listening.");

	axum::serve(listener, router).await?;

	Ok(())
}

fn is_authorized(headers: &HeaderMap, auth_state: &McpAuthState) -> bool {
	match auth_state {
		McpAuthState::Off => true,
		McpAuthState::Token { bearer_token } =>
			read_bearer_token(headers).is_some_and(|token| token == bearer_token),
	}
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(HEADER_AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}

async fn mcp_auth_middleware(
	State(auth_state): State<McpAuthState>,
	req: Request<Body>,
	next: Next,
) -> axum::response::Response {
	if !is_authorized(req.headers(), &auth_state) {
		return (
			axum::http::StatusCode::UNAUTHORIZED,
			"Authentication required: supply the configured Bearer token.",
		)
			.into_response();
	}

	next.run(req).await
}

/// Successful calls return the serialized result; domain failures come back as structured
/// errors carrying the taxonomy kind, never as transport errors.
fn service_result<T: Serialize>(
	result: admatch_service::Result<T>,
) -> Result<CallToolResult, ErrorData> {
	match result {
		Ok(value) => {
			let json = serde_json::to_value(value).map_err(|err| {
				ErrorData::internal_error(format!("Failed to encode tool result: {err}"), None)
			})?;

			Ok(CallToolResult::structured(json))
		},
		Err(err) => Ok(CallToolResult::structured_error(serde_json::json!({
			"kind": error_kind(&err),
			"message": err.to_string(),
		}))),
	}
}

fn error_kind(err: &Error) -> &'static str {
	match err {
		Error::InvalidRequest { .. } => "invalid_request",
		Error::RetrievalUnavailable { .. } => "retrieval_unavailable",
		Error::NotFound { .. } => "not_found",
		Error::Inconsistency { .. } => "inconsistency",
		Error::Provider { .. } => "provider",
		Error::Storage { .. } => "storage",
	}
}

fn parse_match_request(params: JsonObject) -> Result<MatchRequest, ErrorData> {
	serde_json::from_value(Value::Object(params)).map_err(|err| {
		ErrorData::invalid_params(format!("Invalid match request: {err}."), None)
	})
}

fn take_typed<T: serde::de::DeserializeOwned>(
	params: &mut JsonObject,
	key: &str,
) -> Result<T, ErrorData> {
	let value = params
		.remove(key)
		.ok_or_else(|| ErrorData::invalid_params(format!("{key} is required."), None))?;

	serde_json::from_value(value)
		.map_err(|err| ErrorData::invalid_params(format!("{key} is malformed: {err}."), None))
}

fn take_required_string(params: &mut JsonObject, key: &str) -> Result<String, ErrorData> {
	let value = params
		.remove(key)
		.ok_or_else(|| ErrorData::invalid_params(format!("{key} is required."), None))?;
	let text = value
		.as_str()
		.ok_or_else(|| ErrorData::invalid_params(format!("{key} must be a string."), None))?
		.trim();

	if text.is_empty() {
		return Err(ErrorData::invalid_params(format!("{key} must be non-empty."), None));
	}

	Ok(text.to_string())
}

fn match_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["context_text"],
		"properties": {
			"context_text": { "type": "string", "minLength": 1, "maxLength": 10000 },
			"top_k": { "type": ["integer", "null"], "minimum": 1, "maximum": 100 },
			"placement": { "type": ["string", "null"] },
			"surface": { "type": ["string", "null"] },
			"constraints": {
				"type": "object",
				"additionalProperties": false,
				"properties": {
					"topics": { "type": "array", "items": { "type": "string" } },
					"locale": { "type": ["string", "null"] },
					"verticals": { "type": "array", "items": { "type": "string" } },
					"audience_segments": { "type": "array", "items": { "type": "string" } },
					"exclude_advertiser_ids": { "type": "array", "items": { "type": "string" } },
					"exclude_campaign_ids": { "type": "array", "items": { "type": "string" } },
					"exclude_creative_ids": { "type": "array", "items": { "type": "string" } },
					"age_restricted_ok": { "type": "boolean" },
					"sensitive_ok": { "type": "boolean" }
				}
			},
			"boost_keywords": {
				"type": "object",
				"additionalProperties": { "type": "number", "minimum": 0.1, "maximum": 2.0 }
			}
		}
	}))
}

fn match_batch_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["requests"],
		"properties": {
			"requests": {
				"type": "array",
				"items": { "type": "object", "additionalProperties": true }
			}
		}
	}))
}

fn explain_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["match_id"],
		"properties": {
			"match_id": { "type": "string", "format": "uuid" }
		}
	}))
}

fn upsert_campaigns_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["campaigns"],
		"properties": {
			"campaigns": {
				"type": "array",
				"items": {
					"type": "object",
					"additionalProperties": true,
					"required": ["campaign_id", "advertiser_id", "name"],
					"properties": {
						"campaign_id": { "type": "string" },
						"advertiser_id": { "type": "string" },
						"name": { "type": "string" },
						"topics": { "type": "array", "items": { "type": "string" } },
						"creatives": {
							"type": "array",
							"items": {
								"type": "object",
								"additionalProperties": true,
								"required": ["creative_id", "title", "body"],
								"properties": {
									"creative_id": { "type": "string" },
									"title": { "type": "string" },
									"body": { "type": "string" },
									"cta_text": { "type": "string" },
									"landing_url": { "type": ["string", "null"] },
									"enabled": { "type": "boolean" }
								}
							}
						},
						"targeting": { "type": "object", "additionalProperties": true },
						"policy": { "type": "object", "additionalProperties": true },
						"schedule": { "type": "object", "additionalProperties": true },
						"budget": { "type": "object", "additionalProperties": true }
					}
				}
			}
		}
	}))
}

fn creative_id_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["creative_id"],
		"properties": {
			"creative_id": { "type": "string" }
		}
	}))
}

fn disable_creatives_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["creative_ids"],
		"properties": {
			"creative_ids": { "type": "array", "items": { "type": "string" }, "minItems": 1 }
		}
	}))
}

fn empty_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {}
	}))
}
