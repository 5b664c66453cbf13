//! Authenticated JSON-RPC request dispatcher for the ctrld control daemon.
//!
//! The daemon exposes named procedures over HTTP. Each call is matched to a
//! session, authenticated, resolved in the [`core::MethodRegistry`], bound to
//! the procedure's signature, executed (one at a time for serialized
//! procedures) and rendered as a JSON-RPC response.

#![warn(missing_docs)]

pub mod auth;
pub mod builtins;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod http;
pub mod procedure;
pub mod service;

pub use dispatch::{DispatchConfig, Dispatcher, InboundCall, Reply};
pub use procedure::{CallContext, Procedure, ProcedureError, ProcedureResult};
pub use service::DispatchService;
