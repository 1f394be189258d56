use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::proxy::{self, SseEvent};
use crate::translate::anthropic_types::MessagesRequest;
use crate::translate::openai_types::{ChatCompletionRequest, ModelInfo, ModelList};
use crate::translate::request::{anthropic_turns, openai_turns, Turn};
use crate::translate::response::{anthropic_error, anthropic_message, openai_completion, openai_error};
use crate::translate::Protocol;
use crate::upstream::UpstreamClient;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub struct AppState {
    pub config: ProxyConfig,
    pub upstream: UpstreamClient,
    /// Client API key; `None` disables authentication.
    pub master_key: Option<String>,
    /// Cancelled on shutdown; every in-flight request runs on a child token.
    pub shutdown: CancellationToken,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let openai = Router::new()
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/models", get(handle_models))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let anthropic = Router::new()
        .route("/v1/messages", post(handle_messages))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .merge(openai)
        .merge(anthropic)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// OpenAI-style auth: `Authorization: Bearer <key>`.
async fn require_bearer(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let Some(expected) = state.master_key.as_deref() else {
        return next.run(request).await;
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !header_value.to_ascii_lowercase().contains("bearer") {
        return error_response(
            Protocol::OpenAi,
            &ProxyError::unauthorized("Bearer token required"),
        );
    }

    let parts: Vec<&str> = header_value.split(' ').collect();
    if parts.len() != 2 {
        return error_response(
            Protocol::OpenAi,
            &ProxyError::unauthorized("Invalid authorization format"),
        );
    }
    if parts[1] != expected {
        return error_response(Protocol::OpenAi, &ProxyError::forbidden("Invalid API key"));
    }

    next.run(request).await
}

/// Anthropic-style auth: `x-api-key`, falling back to a Bearer token.
async fn require_api_key(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let Some(expected) = state.master_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = api_key_from(request.headers());
    match provided.as_deref() {
        None | Some("") => error_response(
            Protocol::Anthropic,
            &ProxyError::unauthorized("API key required (x-api-key header)"),
        ),
        Some(key) if key != expected => {
            error_response(Protocol::Anthropic, &ProxyError::forbidden("Invalid API key"))
        }
        Some(_) => next.run(request).await,
    }
}

fn api_key_from(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key.trim().to_string());
    }
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    let (scheme, token) = auth.split_at_checked(7)?;
    scheme
        .eq_ignore_ascii_case("bearer ")
        .then(|| token.trim().to_string())
}

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                Protocol::OpenAi,
                &ProxyError::invalid_request(format!("Invalid request body: {e}")),
            );
        }
    };

    let model = state.config.public_model(req.model.as_deref());
    let is_streaming = req.stream.unwrap_or(true);
    let turns = openai_turns(&req);

    serve_completion(state, Protocol::OpenAi, model, turns, is_streaming).await
}

async fn handle_messages(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: MessagesRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                Protocol::Anthropic,
                &ProxyError::invalid_request(format!("Invalid request body: {e}")),
            );
        }
    };

    let model = state.config.public_model(req.model.as_deref());
    let is_streaming = req.stream.unwrap_or(false);
    let turns = anthropic_turns(&req);

    serve_completion(state, Protocol::Anthropic, model, turns, is_streaming).await
}

async fn serve_completion(
    state: Arc<AppState>,
    protocol: Protocol,
    model: String,
    turns: Vec<Turn>,
    is_streaming: bool,
) -> Response {
    let upstream_model = state.config.upstream_model(&model);
    info!(
        protocol = protocol.as_str(),
        model = %model,
        upstream_model = %upstream_model,
        streaming = is_streaming,
        turns = turns.len(),
        "Request"
    );

    let cancel = state.shutdown.child_token();

    // The answer is complete before anything is written, so every failure
    // still gets its own status.
    let answer = match proxy::complete(&state.upstream, &upstream_model, &turns, &cancel).await {
        Ok(answer) => answer,
        Err(e) => return error_response(protocol, &e),
    };

    if !is_streaming {
        return match protocol {
            Protocol::OpenAi => Json(openai_completion(&answer, &model)).into_response(),
            Protocol::Anthropic => Json(anthropic_message(&answer, &model)).into_response(),
        };
    }

    let events = match proxy::render_answer(protocol, &answer, &model) {
        Ok(events) => events,
        Err(e) => return error_response(protocol, &e),
    };
    let stream = futures::stream::iter(
        events
            .into_iter()
            .map(|event| Ok::<_, Infallible>(to_sse_event(event))),
    );

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn to_sse_event(event: SseEvent) -> Event {
    let sse = Event::default().data(event.data);
    match event.event {
        Some(name) => sse.event(name),
        None => sse,
    }
}

fn error_response(protocol: Protocol, err: &ProxyError) -> Response {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        warn!(protocol = protocol.as_str(), status = status.as_u16(), error = %err, "Request failed");
    } else {
        info!(protocol = protocol.as_str(), status = status.as_u16(), error = %err, "Request rejected");
    }

    match protocol {
        Protocol::OpenAi => (status, Json(openai_error(err))).into_response(),
        Protocol::Anthropic => (status, Json(anthropic_error(err))).into_response(),
    }
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": format!(
            "Welcome to notion-proxy v{}. Service is running.",
            env!("CARGO_PKG_VERSION")
        ),
    }))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let created = chrono::Utc::now().timestamp();
    let data = state
        .config
        .known_models()
        .into_iter()
        .map(|id| ModelInfo {
            id: id.to_string(),
            object: "model".to_string(),
            created,
            owned_by: "notion".to_string(),
        })
        .collect();

    Json(ModelList {
        object: "list".to_string(),
        data,
    })
}
