//! Process-scoped state of the dispatcher: sessions, registered procedures,
//! and per-procedure call serialization.
//!
//! # Purpose
//!
//! - Own every piece of mutable state that outlives a single request.
//! - Keep that state behind explicit objects created at daemon start and
//!   dropped at daemon stop. Nothing here is global.
//! - Exclude wire decoding and HTTP concerns; see [`crate::dispatch`] and
//!   [`crate::http`].
//!
//! # Mental model
//!
//! - A client first contacts the daemon without a session. The
//!   [`SessionStore`] creates one and the client receives its first secret.
//! - Every authenticated call consumes the current secret and receives the
//!   next one. A secret is valid for exactly one call.
//! - The [`MethodRegistry`] is frozen after construction. The only thing that
//!   changes afterwards is the startup gate, which opens once.
//! - The [`CallSerializer`] chains calls of the same serialized procedure
//!   behind each other. Each call waits for the completion signal of the call
//!   ahead of it and publishes its own when its work is done.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`SessionStore`] | Session table keyed by [`SessionId`] | MUST drop sessions idle past the timeout before any lookup | `SessionStore::create_or_touch`, `SessionStore::rotate`, `SessionStore::purge_expired` |
//! | [`SessionSecret`] | Rotating shared value for one session | MUST be replaced after every authenticated call | `SessionStore::rotate` |
//! | [`MethodRegistry`] | Name to [`Procedure`] map | MUST be immutable after `build`; startup gate opens once | `RegistryBuilder::build`, `MethodRegistry::mark_started` |
//! | [`CallSerializer`] | Lock table for serialized procedures | MUST hold at most one live lock per name | `CallSerializer::run` |
//!
//! # Invariants
//!
//! 1. A session's secret MUST change after every authenticated call and the old one MUST stop verifying.
//!    - Enforced in: `SessionStore::rotate`
//!    - Tested by: `core::tests::session_store::rotation_invalidates_previous_secret`
//!    - Failure symptom: a captured request can be replayed.
//!
//! 2. A session idle past its timeout MUST behave as if it never existed.
//!    - Enforced in: `session::live_entry`
//!    - Tested by: `core::tests::session_store::idle_session_expires`
//!    - Failure symptom: stale clients keep authenticating forever.
//!
//! 3. Until the startup gate opens, only procedures available during startup MUST resolve.
//!    - Enforced in: `MethodRegistry::resolve`
//!    - Tested by: `core::tests::registry::startup_gate_hides_regular_procedures`
//!    - Failure symptom: procedures run against half-initialized components.
//!
//! 4. At most one call per serialized procedure name MUST execute at a time, in arrival order.
//!    - Enforced in: `CallSerializer::run`, `Slot::drop`
//!    - Tested by: `core::tests::serializer::calls_never_overlap`, `core::tests::serializer::abandoned_waiter_keeps_its_place`
//!    - Failure symptom: concurrent executions of a procedure that assumes exclusive access.
//!
//! # Concurrency and ordering
//!
//! - The daemon drives everything from a single event loop. The mutexes here
//!   exist so the types are `Send + Sync` for `tokio::spawn`; no lock is ever
//!   held across an await point.
//! - A queued serialized call that is abandoned before it starts keeps its
//!   place in the chain until the call ahead of it finishes.

mod registry;
mod serializer;
mod session;

pub use registry::{MethodRegistry, RegistryBuilder, RegistryError};
pub use serializer::CallSerializer;
pub use session::{SessionConfig, SessionId, SessionSecret, SessionStore};

pub use crate::procedure::Procedure;

#[cfg(test)]
mod tests;
