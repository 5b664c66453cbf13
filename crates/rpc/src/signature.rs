//! Declared parameter shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while declaring a [`ProcedureSignature`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
	/// The same name was declared twice (parameters and collectors share one namespace).
	#[error("parameter \"{0}\" is declared more than once")]
	DuplicateParameter(String),
	/// A parameter without a default follows one with a default.
	#[error("required parameter \"{0}\" follows a parameter with a default")]
	RequiredAfterDefault(String),
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
	name: String,
	default: Option<Value>,
}

impl Parameter {
	/// Parameter name as it appears in named arguments.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Default value, if the parameter is optional.
	pub fn default(&self) -> Option<&Value> {
		self.default.as_ref()
	}

	/// Returns `true` if the caller must supply a value.
	pub fn is_required(&self) -> bool {
		self.default.is_none()
	}
}

/// Immutable parameter shape of a registered procedure.
///
/// Parameters are ordered. Defaults only ever cover a trailing suffix of the
/// parameter list. Collectors absorb positional or named values that do not
/// match a declared parameter and are addressable by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SignatureParts", into = "SignatureParts")]
pub struct ProcedureSignature {
	params: Vec<Parameter>,
	positional_collector: Option<String>,
	named_collector: Option<String>,
}

impl ProcedureSignature {
	/// Starts declaring a signature.
	pub fn builder() -> SignatureBuilder {
		SignatureBuilder::default()
	}

	/// Declared parameters in order.
	pub fn params(&self) -> &[Parameter] {
		&self.params
	}

	/// Number of parameters that have no default.
	pub fn required_count(&self) -> usize {
		self.params.iter().filter(|p| p.is_required()).count()
	}

	/// Name of the collector for excess positional values.
	pub fn positional_collector(&self) -> Option<&str> {
		self.positional_collector.as_deref()
	}

	/// Name of the collector for unmatched named values.
	pub fn named_collector(&self) -> Option<&str> {
		self.named_collector.as_deref()
	}

	/// Human readable rendering, e.g. `one, two=null, *rest, **opts`.
	pub fn describe(&self) -> String {
		let mut parts: Vec<String> = self
			.params
			.iter()
			.map(|p| match &p.default {
				Some(default) => format!("{}={}", p.name, default),
				None => p.name.clone(),
			})
			.collect();
		if let Some(name) = &self.positional_collector {
			parts.push(format!("*{name}"));
		}
		if let Some(name) = &self.named_collector {
			parts.push(format!("**{name}"));
		}
		parts.join(", ")
	}
}

/// Builder for [`ProcedureSignature`].
#[derive(Debug, Default)]
pub struct SignatureBuilder {
	params: Vec<Parameter>,
	positional_collector: Option<String>,
	named_collector: Option<String>,
}

impl SignatureBuilder {
	/// Declares a parameter without a default.
	pub fn required(mut self, name: impl Into<String>) -> Self {
		self.params.push(Parameter {
			name: name.into(),
			default: None,
		});
		self
	}

	/// Declares a parameter with a default value.
	pub fn optional(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
		self.params.push(Parameter {
			name: name.into(),
			default: Some(default.into()),
		});
		self
	}

	/// Declares a collector for excess positional values.
	pub fn collect_positional(mut self, name: impl Into<String>) -> Self {
		self.positional_collector = Some(name.into());
		self
	}

	/// Declares a collector for unmatched named values.
	pub fn collect_named(mut self, name: impl Into<String>) -> Self {
		self.named_collector = Some(name.into());
		self
	}

	/// Validates and freezes the signature.
	///
	/// # Errors
	///
	/// Returns [`SignatureError`] on a duplicated name or when a required
	/// parameter follows a defaulted one.
	pub fn build(self) -> Result<ProcedureSignature, SignatureError> {
		let mut seen: Vec<&str> = Vec::new();
		let mut saw_default = false;
		for param in &self.params {
			if seen.contains(&param.name.as_str()) {
				return Err(SignatureError::DuplicateParameter(param.name.clone()));
			}
			seen.push(&param.name);
			match param.default {
				Some(_) => saw_default = true,
				None if saw_default => {
					return Err(SignatureError::RequiredAfterDefault(param.name.clone()));
				}
				None => {}
			}
		}
		for collector in [&self.positional_collector, &self.named_collector]
			.into_iter()
			.flatten()
		{
			if seen.contains(&collector.as_str()) {
				return Err(SignatureError::DuplicateParameter(collector.clone()));
			}
			seen.push(collector);
		}

		Ok(ProcedureSignature {
			params: self.params,
			positional_collector: self.positional_collector,
			named_collector: self.named_collector,
		})
	}
}

/// Serialized form of a signature.
///
/// `defaults` is an object so that a `null` default stays distinguishable
/// from "no default".
#[derive(Serialize, Deserialize)]
struct SignatureParts {
	params: Vec<String>,
	#[serde(default)]
	defaults: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	positional_collector: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	named_collector: Option<String>,
}

impl From<ProcedureSignature> for SignatureParts {
	fn from(sig: ProcedureSignature) -> Self {
		let mut params = Vec::with_capacity(sig.params.len());
		let mut defaults = Map::new();
		for param in sig.params {
			if let Some(default) = param.default {
				defaults.insert(param.name.clone(), default);
			}
			params.push(param.name);
		}
		Self {
			params,
			defaults,
			positional_collector: sig.positional_collector,
			named_collector: sig.named_collector,
		}
	}
}

impl TryFrom<SignatureParts> for ProcedureSignature {
	type Error = SignatureError;

	fn try_from(mut parts: SignatureParts) -> Result<Self, Self::Error> {
		let mut builder = ProcedureSignature::builder();
		for name in parts.params {
			builder = match parts.defaults.remove(&name) {
				Some(default) => builder.optional(name, default),
				None => builder.required(name),
			};
		}
		if let Some(name) = parts.positional_collector {
			builder = builder.collect_positional(name);
		}
		if let Some(name) = parts.named_collector {
			builder = builder.collect_named(name);
		}
		builder.build()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn rejects_required_after_default() {
		let err = ProcedureSignature::builder()
			.optional("one", 1)
			.required("two")
			.build()
			.unwrap_err();
		assert_eq!(err, SignatureError::RequiredAfterDefault("two".into()));
	}

	#[test]
	fn rejects_collector_shadowing_parameter() {
		let err = ProcedureSignature::builder()
			.required("one")
			.collect_positional("one")
			.build()
			.unwrap_err();
		assert_eq!(err, SignatureError::DuplicateParameter("one".into()));
	}

	#[test]
	fn null_default_survives_serialization() {
		let sig = ProcedureSignature::builder()
			.required("one")
			.optional("two", Value::Null)
			.collect_named("rest")
			.build()
			.unwrap();

		let encoded = serde_json::to_value(&sig).unwrap();
		assert_eq!(
			encoded,
			json!({"params": ["one", "two"], "defaults": {"two": null}, "named_collector": "rest"})
		);

		let decoded: ProcedureSignature = serde_json::from_value(encoded).unwrap();
		assert_eq!(decoded, sig);
		assert_eq!(decoded.params()[1].default(), Some(&Value::Null));
	}

	#[test]
	fn describe_lists_collectors_last() {
		let sig = ProcedureSignature::builder()
			.required("one")
			.optional("two", "two")
			.collect_positional("three")
			.collect_named("four")
			.build()
			.unwrap();
		assert_eq!(sig.describe(), r#"one, two="two", *three, **four"#);
	}
}
