//! Procedure signatures and argument binding for named RPC procedures.
//!
//! This crate is shared by the daemon and its command line front-end:
//! * [`ProcedureSignature`]: the declared parameter shape of a procedure
//! * [`bind`]: maps caller-supplied positional and named values onto a signature
//! * [`coerce`]: best-effort typing of string arguments typed on a command line

#![warn(missing_docs)]

pub mod bind;
pub mod coerce;
pub mod signature;

pub use bind::{BindingError, BindingErrorKind, BoundArgs, bind};
pub use coerce::{coerce, guess_value};
pub use signature::{Parameter, ProcedureSignature, SignatureBuilder, SignatureError};
