//! Wire protocol for the ctrld control daemon.
//!
//! Shared by the daemon and its clients:
//! * [`envelope`]: request decoding and response rendering
//! * [`error`]: the fixed error-code taxonomy and its HTTP mapping
//! * [`token`]: request canonicalization and keyed-hash tokens
//! * [`headers`] and [`paths`]: transport constants and default addresses

#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod headers;
pub mod paths;
pub mod token;

pub use envelope::{Outcome, RequestEnvelope, RequestError, ResponseEnvelope, encode_params};
pub use error::{ErrorCode, RpcError};
pub use token::{TokenError, canonical_message, compute_token, verify_token};
