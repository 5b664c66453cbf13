//! HTTP transport for the dispatcher.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use ctrld_proto::{ErrorCode, ResponseEnvelope, RpcError, headers};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_service::Service;

use crate::core::{SessionId, SessionSecret};
use crate::dispatch::{InboundCall, Reply};
use crate::service::DispatchService;

/// Transport settings.
#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
	/// Value of `Access-Control-Allow-Origin` on every reply.
	pub allowed_origin: Option<String>,
}

struct HttpState {
	service: DispatchService,
	config: HttpConfig,
}

/// Builds the router serving JSON-RPC calls on `POST /`.
pub fn router(service: DispatchService, config: HttpConfig) -> Router {
	Router::new()
		.route("/", post(handle_call))
		.with_state(Arc::new(HttpState { service, config }))
}

/// Serves `router` on `listener` until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
	listener: TcpListener,
	router: Router,
	shutdown: CancellationToken,
) -> std::io::Result<()> {
	if let Ok(addr) = listener.local_addr() {
		tracing::info!(%addr, "API server listening");
	}
	axum::serve(listener, router)
		.with_graceful_shutdown(shutdown.cancelled_owned())
		.await?;
	tracing::info!("API server shut down");
	Ok(())
}

async fn handle_call(
	State(state): State<Arc<HttpState>>,
	request_headers: HeaderMap,
	body: Bytes,
) -> Response {
	let session = request_headers
		.get(headers::SESSION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.parse::<SessionId>().ok())
		.unwrap_or_else(SessionId::generate);

	// Dropping this handler (client gone) cancels the call.
	let disconnect = CancellationToken::new();
	let _disconnect_guard = disconnect.clone().drop_guard();

	let call = InboundCall {
		session,
		body: body.to_vec(),
		disconnect,
	};
	let mut service = state.service.clone();
	let reply = match tokio::spawn(service.call(call)).await {
		Ok(Ok(reply)) => reply,
		Ok(Err(never)) => match never {},
		Err(err) => {
			tracing::error!(error = %err, "dispatch task failed");
			Reply::Response {
				envelope: ResponseEnvelope::error(
					Value::Null,
					RpcError::from_code(ErrorCode::InternalError),
				),
				next_secret: None,
			}
		}
	};

	render(reply, session, &state.config)
}

fn render(reply: Reply, session: SessionId, config: &HttpConfig) -> Response {
	let status = StatusCode::from_u16(reply.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
	let (body, secret) = match reply {
		Reply::Handshake { secret } => (Body::from(headers::HANDSHAKE_ACK), Some(secret)),
		Reply::Response {
			envelope,
			next_secret,
		} => match envelope.render() {
			Ok(bytes) => (Body::from(bytes), next_secret),
			Err(err) => {
				tracing::error!(error = %err, "failed to render response");
				let fallback = ResponseEnvelope::error(
					envelope.id,
					RpcError::from_code(ErrorCode::InternalError),
				);
				let bytes = fallback.render().unwrap_or_default();
				let mut response = (StatusCode::INTERNAL_SERVER_ERROR, bytes).into_response();
				apply_headers(response.headers_mut(), session, next_secret.as_ref(), config);
				return response;
			}
		},
		Reply::Dropped => return StatusCode::NO_CONTENT.into_response(),
	};

	let mut response = (status, body).into_response();
	apply_headers(response.headers_mut(), session, secret.as_ref(), config);
	response
}

fn apply_headers(
	map: &mut HeaderMap,
	session: SessionId,
	secret: Option<&SessionSecret>,
	config: &HttpConfig,
) {
	map.insert(
		header::CONTENT_TYPE,
		HeaderValue::from_static(headers::CONTENT_TYPE_JSON),
	);
	map.insert(
		header::ACCEPT,
		HeaderValue::from_static(headers::ACCEPT_JSON_RPC),
	);
	if let Ok(value) = HeaderValue::from_str(&session.to_string()) {
		map.insert(HeaderName::from_static(headers::SESSION), value);
	}
	if let Some(secret) = secret
		&& let Ok(value) = HeaderValue::from_str(secret.as_str())
	{
		map.insert(HeaderName::from_static(headers::SECRET), value);
	}
	if let Some(origin) = &config.allowed_origin
		&& let Ok(value) = HeaderValue::from_str(origin)
	{
		map.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
	}
}
