//! HTTP header names and values used on the wire.

/// Carries the session id. Sent by clients, echoed on every reply.
pub const SESSION: &str = "x-ctrld-session";

/// Carries the secret the client must sign its next call with.
pub const SECRET: &str = "x-ctrld-secret";

/// Content type of every JSON-RPC body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Value of the `Accept` header on replies.
pub const ACCEPT_JSON_RPC: &str = "application/json-rpc";

/// Body of the handshake acknowledgment.
pub const HANDSHAKE_ACK: &str = "OK";
