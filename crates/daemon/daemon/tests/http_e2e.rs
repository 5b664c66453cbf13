//! End-to-end calls over a real listener.

use std::net::SocketAddr;
use std::sync::Arc;

use ctrld_daemon::core::MethodRegistry;
use ctrld_daemon::{DispatchConfig, DispatchService, Dispatcher, builtins, http};
use ctrld_proto::{ErrorCode, Outcome, ResponseEnvelope, canonical_message, compute_token, headers};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct TestDaemon {
	addr: SocketAddr,
	shutdown: CancellationToken,
	server: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestDaemon {
	async fn start(use_auth: bool) -> Self {
		let shutdown = CancellationToken::new();
		let registry = builtins::register(MethodRegistry::builder(), shutdown.clone())
			.build()
			.unwrap();
		let dispatcher = Dispatcher::new(
			Arc::new(registry),
			ctrld_daemon::core::SessionStore::new(),
			DispatchConfig {
				use_auth,
				include_traceback: true,
			},
		);
		dispatcher.registry().mark_started();

		let router = http::router(
			DispatchService::new(dispatcher),
			http::HttpConfig {
				allowed_origin: Some("http://localhost:5279".into()),
			},
		);
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let server = tokio::spawn(http::serve(listener, router, shutdown.clone()));
		Self {
			addr,
			shutdown,
			server,
		}
	}

	fn url(&self) -> String {
		format!("http://{}/", self.addr)
	}

	async fn stop(self) {
		self.shutdown.cancel();
		self.server.await.unwrap().unwrap();
	}
}

fn header<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
	response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn sign(secret: &str, request: Value) -> Value {
	let Value::Object(mut object) = request else {
		panic!("request must be an object");
	};
	let token = compute_token(secret, &canonical_message(&object).unwrap()).unwrap();
	object.insert("hmac".into(), Value::from(token));
	Value::Object(object)
}

#[tokio::test]
async fn unauthenticated_call_round_trips() {
	let daemon = TestDaemon::start(false).await;
	let client = reqwest::Client::new();

	let response = client
		.post(daemon.url())
		.json(&json!({"method": "commands", "params": [], "id": 1}))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 200);
	assert_eq!(header(&response, "content-type"), Some("application/json"));
	assert_eq!(header(&response, "accept"), Some("application/json-rpc"));
	assert_eq!(
		header(&response, "access-control-allow-origin"),
		Some("http://localhost:5279")
	);
	assert!(header(&response, headers::SESSION).is_some());
	assert!(header(&response, headers::SECRET).is_none());

	let body = response.bytes().await.unwrap();
	assert!(body.ends_with(b"\n"));
	let envelope = ResponseEnvelope::parse(&body).unwrap();
	assert_eq!(envelope.id, json!(1));
	let Outcome::Result(Value::Array(names)) = envelope.outcome else {
		panic!("expected the command list");
	};
	assert!(names.contains(&json!("status")));

	daemon.stop().await;
}

#[tokio::test]
async fn unknown_method_maps_to_404() {
	let daemon = TestDaemon::start(false).await;
	let response = reqwest::Client::new()
		.post(daemon.url())
		.json(&json!({"method": "nope", "id": 2}))
		.send()
		.await
		.unwrap();
	assert_eq!(response.status(), 404);
	let envelope = ResponseEnvelope::parse(&response.bytes().await.unwrap()).unwrap();
	let Outcome::Error(err) = envelope.outcome else {
		panic!("expected an error");
	};
	assert_eq!(err.code, ErrorCode::MethodNotFound);

	daemon.stop().await;
}

#[tokio::test]
async fn handshake_then_signed_call() {
	let daemon = TestDaemon::start(true).await;
	let client = reqwest::Client::new();

	let handshake = client
		.post(daemon.url())
		.json(&json!({"method": "status"}))
		.send()
		.await
		.unwrap();
	assert_eq!(handshake.status(), 200);
	let session = header(&handshake, headers::SESSION).unwrap().to_owned();
	let secret = header(&handshake, headers::SECRET).unwrap().to_owned();
	assert_eq!(handshake.text().await.unwrap(), headers::HANDSHAKE_ACK);

	let unsigned = client
		.post(daemon.url())
		.header(headers::SESSION, &session)
		.json(&json!({"method": "logout", "id": 3}))
		.send()
		.await
		.unwrap();
	assert_eq!(unsigned.status(), 401);
	assert!(header(&unsigned, headers::SECRET).is_none());

	let signed = client
		.post(daemon.url())
		.header(headers::SESSION, &session)
		.json(&sign(&secret, json!({"method": "logout", "params": [], "id": 4})))
		.send()
		.await
		.unwrap();
	assert_eq!(signed.status(), 200);
	let next = header(&signed, headers::SECRET).unwrap().to_owned();
	assert_ne!(next, secret);
	let envelope = ResponseEnvelope::parse(&signed.bytes().await.unwrap()).unwrap();
	assert_eq!(envelope.outcome, Outcome::Result(Value::Bool(true)));

	// The session is gone, so the next contact is a fresh handshake.
	let again = client
		.post(daemon.url())
		.header(headers::SESSION, &session)
		.json(&json!({"method": "status"}))
		.send()
		.await
		.unwrap();
	assert_eq!(again.text().await.unwrap(), headers::HANDSHAKE_ACK);

	daemon.stop().await;
}

#[tokio::test]
async fn stop_procedure_shuts_the_server_down() {
	let daemon = TestDaemon::start(false).await;
	let response = reqwest::Client::new()
		.post(daemon.url())
		.json(&json!({"method": "stop", "id": 5}))
		.send()
		.await
		.unwrap();
	let envelope = ResponseEnvelope::parse(&response.bytes().await.unwrap()).unwrap();
	assert_eq!(envelope.outcome, Outcome::Result(json!("Shutting down")));

	assert!(daemon.shutdown.is_cancelled());
	daemon.server.await.unwrap().unwrap();
}
