//! Unit tests for the dispatcher core.

mod helpers;
mod session_store;
