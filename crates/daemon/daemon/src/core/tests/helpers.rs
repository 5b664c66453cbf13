//! Common test utilities and helpers.

use ctrld_rpc::ProcedureSignature;
use serde_json::Value;

use crate::core::Procedure;

/// Procedure returning `null`, with all flags off.
pub fn noop(name: &str) -> Procedure {
	Procedure::new(name, ProcedureSignature::default(), |_ctx, _args| async {
		Ok(Value::Null)
	})
}
